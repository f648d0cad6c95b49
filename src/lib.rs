pub mod catalog;
pub mod cli;
pub mod config;
pub mod pagination;
pub mod query;
pub mod server;
pub mod stream;
pub mod testing;
