use thiserror::Error;

/// Error surfaced by the domain to callers outside the crate.
///
/// Every user-input problem lands in `BadRequest` or `Conflict`; the
/// remaining variants are produced by collaborators (stores, replication).
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("store error: {0}")]
    Store(String),
}

impl DomainError {
    /// Returns `true` for errors caused by the caller's input.
    pub fn is_bad_request(&self) -> bool {
        matches!(self, Self::BadRequest(_) | Self::Conflict(_))
    }
}
