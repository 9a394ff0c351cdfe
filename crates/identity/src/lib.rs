//! Local identities for the upkeep registration client.
//!
//! Keys live in a versioned JSON key file, optionally protected by a
//! password (Argon2id + AES-256-GCM). [`KeyFileProvider`] implements the
//! SDK's login flow on top of it and also accepts plain dfx PEM files.

pub mod errors;
pub mod keyfile;
pub mod password;
pub mod provider;

pub use errors::*;
pub use keyfile::{KeyFile, KeyMetadata, KeySecret, UnlockedKey};
pub use password::PasswordSource;
pub use provider::KeyFileProvider;
