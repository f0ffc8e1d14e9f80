//! Configuration management
//!
//! Handles selecting the data source and loading dashboard settings.

pub mod settings;
pub mod source;

pub use settings::{Settings, SurnameMode, SurnameSettings, ViewNames, load_settings};
pub use source::{Backend, ConnectionConfig, RestConfig, SourceConfig, SslMode};
