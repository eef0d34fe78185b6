use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The backend answered with an error body; `message` is passed through verbatim.
    #[error("{message}")]
    Remote {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Backend unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed {collection} record: {reason}")]
    Malformed {
        collection: &'static str,
        reason: String,
    },

    #[error("No matching {collection} record")]
    NotFound { collection: &'static str },
}

#[derive(Error, Debug)]
pub enum AuthError {
    /// Invalid credentials, expired token, duplicate account and so on.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("Authentication service unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed authentication response: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("You are not authorized to login.")]
    NotAuthorized,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
