use thiserror::Error;

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("Sign in to run this operation")]
    Unauthenticated,

    #[error("Only administrators may run this operation")]
    PermissionDenied,

    #[error("Store failure: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl AggregateError {
    /// Error code reported back to the caller of the manual entry point.
    pub fn kind(&self) -> &'static str {
        match self {
            AggregateError::Unauthenticated => "unauthenticated",
            AggregateError::PermissionDenied => "permission-denied",
            AggregateError::Store(_) => "internal",
        }
    }
}
