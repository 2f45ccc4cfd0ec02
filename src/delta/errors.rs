//! Error variants for the custom delta encoder/decoder so callers can surface friendly failures.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GitDeltaError {
    #[error("delta encoder error: {0}")]
    DeltaEncoderError(String),

    #[error("delta decoder error: {0}")]
    DeltaDecoderError(String),

    #[error("IO error while reading delta stream: {0}")]
    IOError(#[from] std::io::Error),
}
