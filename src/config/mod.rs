//! # Configuration Module
//!
//! This module handles application configuration loading and management.
//! Configuration can be loaded from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{environment}.toml)
//! - .env files (via dotenvy)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use oauth_server::config::Settings;
//!
//! let settings = Settings::load()?;
//! println!("Access tokens live for {}s", settings.oauth.access_token_ttl_secs);
//! ```

mod settings;

pub use settings::*;
