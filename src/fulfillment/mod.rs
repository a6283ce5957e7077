//! Order fulfillment: payment confirmation, receiving links, downloads.

pub mod dispatcher;
pub mod gateway;
pub mod signature;

pub use dispatcher::{Confirmation, Dispatcher, SweepReport, new_receiving_id};
pub use gateway::{DownloadGateway, Lookup, Resolution};
