//! Error types for adclaims

use crate::dn::DnError;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // Configuration Errors
    #[error("Invalid account name: {0}")]
    InvalidAccountName(String),

    #[error("Missing credentials: {0} must not be empty")]
    MissingCredentials(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Parse Errors
    #[error("Malformed distinguished name: {0}")]
    MalformedDn(#[from] DnError),

    // Directory Errors
    #[error("Directory error: {0}")]
    Directory(String),

    #[error("Group resolution timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidAccountName(_) => "InvalidAccountName",
            Error::MissingCredentials(_) => "MissingCredentials",
            Error::InvalidConfig(_) => "InvalidConfig",
            Error::MalformedDn(_) => "MalformedDistinguishedName",
            Error::Directory(_) => "DirectoryError",
            Error::Timeout(_) => "Timeout",
            Error::Io(_) => "InternalError",
            Error::Other(_) => "InternalError",
        }
    }

    /// Configuration errors are raised before any directory interaction.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::InvalidAccountName(_) | Error::MissingCredentials(_) | Error::InvalidConfig(_)
        )
    }
}
