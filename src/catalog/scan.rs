//! Folder scanner.
//!
//! Reads the catalog root one level deep. Every immediate subdirectory is a
//! product folder; the files directly inside it are listed flat. Nested
//! directories and loose files at the root are ignored.
//!
//! All functions here perform blocking I/O and are meant to run on the
//! blocking thread pool.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::models::{FileEntry, FolderEntry};
use crate::utils::file_extension;

/// Scan the catalog root.
///
/// A missing root yields an empty catalog. A folder that cannot be listed is
/// reported with no files instead of failing the whole scan.
pub fn scan_root(root: &Path) -> Result<Vec<FolderEntry>> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::warn!("Catalog root {} does not exist", root.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(AppError::scan(root.display().to_string(), e)),
    };

    let mut folders = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable entry in {}: {}", root.display(), e);
                continue;
            }
        };

        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            log::warn!("Skipping folder with non UTF-8 name: {}", path.display());
            continue;
        };

        folders.push(FolderEntry {
            files: list_files(&path),
            name,
        });
    }

    folders.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(folders)
}

/// List the files directly inside a folder, sorted by name.
///
/// Any listing error degrades the folder to empty.
pub fn list_files(folder: &Path) -> Vec<FileEntry> {
    match try_list_files(folder) {
        Ok(files) => files,
        Err(e) => {
            log::warn!("Failed to list {}: {}. Treating as empty.", folder.display(), e);
            Vec::new()
        }
    }
}

fn try_list_files(folder: &Path) -> std::io::Result<Vec<FileEntry>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(folder)? {
        let entry = entry?;
        let metadata = fs::metadata(entry.path())?;
        if !metadata.is_file() {
            continue;
        }

        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };

        files.push(FileEntry {
            kind: file_extension(&name),
            size: metadata.len(),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            name,
        });
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_scan_one_level() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();

        fs::create_dir(root.join("KF001")).unwrap();
        fs::write(root.join("KF001/b.png"), b"png").unwrap();
        fs::write(root.join("KF001/a.JPG"), b"jpeg!").unwrap();
        fs::create_dir(root.join("KF001/nested")).unwrap();
        fs::write(root.join("KF001/nested/hidden.png"), b"x").unwrap();
        fs::write(root.join("loose.txt"), b"ignored").unwrap();

        let folders = scan_root(root).unwrap();
        assert_eq!(folders.len(), 1);

        let folder = &folders[0];
        assert_eq!(folder.name, "KF001");
        let names: Vec<_> = folder.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.JPG", "b.png"]);
        assert_eq!(folder.files[0].kind, "jpg");
        assert_eq!(folder.files[0].size, 5);
        assert!(folder.files[0].modified.is_some());
    }

    #[test]
    fn test_missing_root_is_empty() {
        let tmp = TempDir::new().unwrap();
        let folders = scan_root(&tmp.path().join("absent")).unwrap();
        assert!(folders.is_empty());
    }

    #[test]
    fn test_unlistable_folder_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(list_files(&tmp.path().join("gone")).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_keeps_unlistable_folder_as_empty() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();

        fs::create_dir(root.join("KF001")).unwrap();
        fs::write(root.join("KF001/a.png"), b"png").unwrap();
        fs::create_dir(root.join("KF002")).unwrap();
        fs::write(root.join("KF002/b.png"), b"png").unwrap();
        std::os::unix::fs::symlink(root.join("nowhere"), root.join("KF002/dangling.png")).unwrap();

        let folders = scan_root(root).unwrap();
        let names: Vec<_> = folders.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["KF001", "KF002"]);
        assert_eq!(folders[0].files.len(), 1);
        assert!(folders[1].files.is_empty());
    }

    #[test]
    fn test_empty_folder_is_kept() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("misc")).unwrap();

        let folders = scan_root(tmp.path()).unwrap();
        assert_eq!(folders.len(), 1);
        assert!(folders[0].files.is_empty());
    }
}
