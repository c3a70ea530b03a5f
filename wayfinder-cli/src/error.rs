//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use wayfinder::config::ConfigError;
use wayfinder::{ErrorCategory, MapError};

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(std::io::Error),
    /// Configuration file could not be read, written or validated
    Config(ConfigError),
    /// A command-line argument could not be interpreted
    InvalidArgument(String),
    /// Failed to build the async runtime
    Runtime(std::io::Error),
    /// A map lookup failed
    Lookup(MapError),
    /// Failed to install the Ctrl+C handler
    Signal(String),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgument(_) => 2,
            CliError::Lookup(e) if e.category() == ErrorCategory::NotFound => 3,
            _ => 1,
        }
    }

    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Lookup(e) if e.is_retryable() => {
                eprintln!();
                eprintln!("Common issues:");
                eprintln!("  1. The proxy server is not running (default: http://localhost:10000)");
                eprintln!("  2. proxy.base_url in ~/.wayfinder/config.ini points elsewhere");
                eprintln!("  3. The upstream provider is rate limiting requests");
            }
            CliError::Config(_) => {
                eprintln!();
                eprintln!("Run 'wayfinder config path' to locate the config file.");
            }
            _ => {}
        }

        process::exit(self.exit_code())
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Config(e) => write!(f, "{}", e),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::Lookup(e) => write!(f, "{}", e),
            CliError::Signal(msg) => write!(f, "Failed to install signal handler: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::LoggingInit(e) | CliError::Runtime(e) => Some(e),
            CliError::Config(e) => Some(e),
            CliError::Lookup(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MapError> for CliError {
    fn from(e: MapError) -> Self {
        CliError::Lookup(e)
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}
