pub mod client;

pub use client::{CatalogClient, CatalogError, LogfileDefinition, LogfilesResponse};

/// Path of the logfile catalog endpoint
pub const LOGFILES_ENDPOINT: &str = "/api/v1/logfiles";
