//! Configuration loading and validation.
//!
//! - Schema definitions in [`schema`]
//! - File discovery and loading in [`loader`]
//!
//! # Example
//!
//! ```
//! use httpstash::config::{load_config, CacheConfig};
//! use tempfile::TempDir;
//! use std::fs;
//!
//! let temp = TempDir::new().unwrap();
//! fs::write(temp.path().join("httpstash.yml"), "max_error_version: 2").unwrap();
//!
//! let config = load_config(None, temp.path()).unwrap();
//! assert_eq!(config.max_error_version, 2);
//! assert_eq!(config.timeout_secs, CacheConfig::default().timeout_secs);
//! ```

pub mod loader;
pub mod schema;

pub use loader::{find_config, load_config, load_config_file, parse_config, CONFIG_FILE_NAME};
pub use schema::CacheConfig;
