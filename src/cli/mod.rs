pub mod browse;
pub mod config;
pub mod logfiles;
pub mod serve;
pub mod terminal;

use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::pagination::ViewerError;
use crate::server::ServerError;
use crate::stream::{StreamFailure, TransportError};
use std::path::PathBuf;
use thiserror::Error;

pub use terminal::TerminalView;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("catalog request failed: {0}")]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Viewer(#[from] ViewerError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("scan failed: {0}")]
    Scan(StreamFailure),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config has no 'server' section; run `logscan config init` for an example")]
    NoServerSection,

    #[error("no logfile selected; pass --logfile or set client.logfile")]
    NoLogfile,

    #[error("unknown logfile '{name}' (available: {available})")]
    UnknownLogfile { name: String, available: String },

    #[error("config file already exists at {0}; remove it first or use --stdout")]
    ConfigExists(PathBuf),
}
