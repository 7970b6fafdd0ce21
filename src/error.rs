//! Fatal failure taxonomy for scan and reconciliation passes.
//!
//! Content anomalies (unknown status words, mismatching correct pages) are
//! not errors; they are counted in the pass statistics and processing
//! continues. Everything here aborts the pass.

use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("plist has no root dictionary")]
    NoRootDict,

    #[error("failed to find \"{key}\" in plist")]
    MissingPlistKey { key: &'static str },

    #[error("\"{key}\" in plist is not an integer")]
    BadPlistValue { key: &'static str },

    #[error("could not parse plist: {0}")]
    Plist(#[from] plist::Error),

    #[error("dump is {actual} bytes but the geometry calls for {expected}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("dump ended early while reading page {page}")]
    TruncatedRead { page: u64 },

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
