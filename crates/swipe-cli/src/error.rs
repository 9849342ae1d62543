use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] swipe_core::Error),
    #[error(transparent)]
    Config(#[from] swipe_core::config::ConfigError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("{0} must be between {1} and {2}")]
    OutOfRange(&'static str, usize, usize),
}
