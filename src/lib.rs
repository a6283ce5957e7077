// src/lib.rs

//! Storefront Library
//!
//! Folder-based catalog, deterministic daily offer and order fulfillment
//! with multi-provider email delivery.

pub mod catalog;
pub mod error;
pub mod fulfillment;
pub mod models;
pub mod notify;
pub mod server;
pub mod storage;
pub mod utils;
