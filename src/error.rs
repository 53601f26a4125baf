//! Top-level error type composing each component's own error enum.
//! Individual components still expose their precise enum for callers that
//! need to `match` on it; this type is what crosses component boundaries
//! and what `flightless-cli` ultimately turns into an exit code.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Credential(#[from] crate::credential::Error),

    #[error(transparent)]
    Store(#[from] crate::store::Error),

    #[error(transparent)]
    Relay(#[from] crate::relay::Error),

    #[error(transparent)]
    Zap(#[from] crate::zap::Error),

    #[error(transparent)]
    SealedDm(#[from] crate::sealed_dm::Error),

    #[error(transparent)]
    Ingest(#[from] crate::ingest::Error),

    #[error(transparent)]
    Publisher(#[from] crate::publisher::Error),

    /// Store open failure, login mismatch at startup: the only category
    /// `main` is expected to translate into a non-zero exit code.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl Error {
    /// Exit code policy: `0` graceful, non-zero only on login failure or
    /// fatal init.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Fatal(_) => 1,
            Error::Credential(crate::credential::Error::LoginMismatch) => 1,
            _ => 1,
        }
    }
}
