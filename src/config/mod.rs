//! Configuration module
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files. Credentials are never read from the file.
//!
//! # Example
//!
//! ```no_run
//! use quikturn_logos::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("quikturn.toml")).unwrap();
//! println!("Max retries: {}", config.client.max_retries);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{BatchConfig, ClientConfig, Config, UserAgentConfig};

pub use parser::{load_config, parse_config};
