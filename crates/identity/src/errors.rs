use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Encryption error: {0}")]
    EncryptionError(String),

    #[error("Decryption error: {0}")]
    DecryptionError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Password required to unlock key file")]
    PasswordRequired,

    #[error("Invalid password")]
    InvalidPassword,

    #[error("Password entry cancelled")]
    Cancelled,

    #[error("Identity error: {0}")]
    AgentIdentity(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Crypto error: {0}")]
    CryptoError(String),
}

pub type Result<T> = std::result::Result<T, IdentityError>;
