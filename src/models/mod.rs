// src/models/mod.rs

//! Domain models for the storefront.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod order;
mod product;

// Re-export all public types
pub use config::{
    ApiProviderConfig, CatalogConfig, Config, EmailJsConfig, FulfillmentConfig,
    MAX_LINK_VALIDITY_DAYS, MailConfig, PaymentConfig, PricingConfig, ProviderKind,
    ServerConfig, SmtpConfig,
};
pub use order::{
    NewOrder, NotificationStatus, Order, OrderStatus, OrderSummary, ReceivingLink,
};
pub use product::{
    ArtifactInfo, Catalog, CatalogStats, DailyOffer, FileEntry, FolderEntry, Product,
    ProductDetail, ProductImage,
};
