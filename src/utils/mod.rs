//! Utils

pub mod config_store;
