use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthError>;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing authentication headers")]
    MissingHeaders,

    #[error("Request expired or timestamp invalid")]
    Expired,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Server public key is not configured")]
    MissingPublicKey,

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Key store error: {0}")]
    Store(#[from] std::io::Error),
}

impl AuthError {
    /// Rejections caused by the caller, as opposed to server misconfiguration.
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingHeaders | Self::Expired | Self::InvalidSignature
        )
    }
}
