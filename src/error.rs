//! Crate-level error type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::registry::RegistryError;
use crate::schema::codec::CodecError;
use crate::schema::validation::{BatchError, FieldError};
use crate::vault::VaultError;

/// Any error this crate can return
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Field(#[from] FieldError),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error(transparent)]
    Vault(#[from] VaultError),
}

/// Result alias over [`Error`]
pub type Result<T> = std::result::Result<T, Error>;
