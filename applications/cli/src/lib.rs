//! smm command line front end
//!
//! Loads configuration, installs logging and runs the sync operations of
//! `smm-sync` one category at a time or on a schedule.

pub mod config;
pub mod error;
pub mod logging;

pub use config::AppConfig;
pub use error::{CliError, Result};
