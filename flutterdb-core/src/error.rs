// src/error.rs
//! Error taxonomy (§7). Only storage errors ever reach a caller as an
//! `Err`; query-structural and type-mismatch errors are absorbed into
//! boolean falsity at the Matcher/Pipeline boundary and have no variant
//! here by design (§7.1).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    #[error("document missing or malformed payload for id: {0}")]
    CorruptDocument(String),
}

pub type Result<T> = std::result::Result<T, Error>;
