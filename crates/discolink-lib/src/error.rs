//! Unified error type for the discolink-lib crate.
//!
//! [`DiscoError`] wraps module-specific errors (`LinkError`, `AudioError`,
//! `StripError`) and domain-specific kinds (`Config`, `RestartRequired`).
//! `From` impls allow `?` to propagate across module boundaries seamlessly.

use std::fmt;

use crate::animation::StripError;
use crate::link::LinkError;
use crate::playback::AudioError;

/// Unified error type for discolink-lib operations.
#[derive(Debug)]
pub enum DiscoError {
    /// Network or broker transport error.
    Link(LinkError),
    /// Audio subsystem error (open, decode, output).
    Audio(AudioError),
    /// Pixel strip write error.
    Strip(StripError),
    /// Standard I/O error (catalog scan, config persistence).
    Io(std::io::Error),
    /// Configuration validation error.
    Config(String),
    /// Unrecoverable fault. The node must be torn down and rebuilt.
    RestartRequired(String),
}

impl DiscoError {
    /// Whether the caller must respond with a full node restart.
    pub fn requires_restart(&self) -> bool {
        matches!(self, DiscoError::RestartRequired(_))
    }
}

impl fmt::Display for DiscoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoError::Link(e) => write!(f, "{e}"),
            DiscoError::Audio(e) => write!(f, "{e}"),
            DiscoError::Strip(e) => write!(f, "{e}"),
            DiscoError::Io(e) => write!(f, "I/O error: {e}"),
            DiscoError::Config(e) => write!(f, "Config error: {e}"),
            DiscoError::RestartRequired(e) => write!(f, "Restart required: {e}"),
        }
    }
}

impl std::error::Error for DiscoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DiscoError::Link(e) => Some(e),
            DiscoError::Audio(e) => Some(e),
            DiscoError::Strip(e) => Some(e),
            DiscoError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LinkError> for DiscoError {
    fn from(e: LinkError) -> Self {
        DiscoError::Link(e)
    }
}

impl From<AudioError> for DiscoError {
    fn from(e: AudioError) -> Self {
        DiscoError::Audio(e)
    }
}

impl From<StripError> for DiscoError {
    fn from(e: StripError) -> Self {
        DiscoError::Strip(e)
    }
}

impl From<std::io::Error> for DiscoError {
    fn from(e: std::io::Error) -> Self {
        DiscoError::Io(e)
    }
}

/// Crate-level Result alias using [`DiscoError`].
pub type Result<T> = std::result::Result<T, DiscoError>;
