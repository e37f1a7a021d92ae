//! Bootstrap module for starting the login hub
//!
//! This module handles:
//! - Configuration loading
//! - Provider registry construction and adapter initialization

pub mod config;
pub mod providers;

pub use config::{load_config, log_config_summary};
pub use providers::init_dispatcher;
