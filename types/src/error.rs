//! Error type for value parsing shared across crates.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("invalid amount: {0:?}")]
    InvalidAmount(String),

    #[error("invalid account name: {0:?}")]
    InvalidAccount(String),
}
