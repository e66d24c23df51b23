//! Error types for the editor

use redline_document::DocumentError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Mutation error: {0}")]
    Mutation(#[from] crate::mutations::MutationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Selection does not address a text node")]
    InvalidSelection,
}
