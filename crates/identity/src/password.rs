use crate::errors::{IdentityError, Result};
use rpassword::prompt_password;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use zeroize::Zeroizing;

/// Where the key file password comes from.
#[derive(Clone, Default)]
pub enum PasswordSource {
    /// Unprotected key file.
    #[default]
    None,
    Fixed(Zeroizing<String>),
    /// Name of an environment variable holding the password.
    Env(String),
    /// First line of a file.
    File(PathBuf),
    /// Ask on the terminal without echo; an empty answer cancels.
    Prompt,
}

impl fmt::Debug for PasswordSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordSource::None => f.write_str("None"),
            PasswordSource::Fixed(_) => f.write_str("Fixed(<redacted>)"),
            PasswordSource::Env(var) => f.debug_tuple("Env").field(var).finish(),
            PasswordSource::File(path) => f.debug_tuple("File").field(path).finish(),
            PasswordSource::Prompt => f.write_str("Prompt"),
        }
    }
}

impl PasswordSource {
    pub fn fixed(password: impl Into<String>) -> Self {
        PasswordSource::Fixed(Zeroizing::new(password.into()))
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self, PasswordSource::Prompt)
    }

    /// Blocks while prompting.
    pub fn resolve(&self, prompt: &str) -> Result<Option<Zeroizing<String>>> {
        match self {
            PasswordSource::None => Ok(None),
            PasswordSource::Fixed(password) => Ok(Some(password.clone())),
            PasswordSource::Env(var) => std::env::var(var)
                .map(|value| Some(Zeroizing::new(value)))
                .map_err(|_| {
                    IdentityError::StorageError(format!("environment variable {var} is not set"))
                }),
            PasswordSource::File(path) => {
                let contents = Zeroizing::new(fs::read_to_string(path)?);
                let line = contents.lines().next().unwrap_or_default().trim_end();
                Ok(Some(Zeroizing::new(line.to_string())))
            }
            PasswordSource::Prompt => {
                let answer = Zeroizing::new(prompt_password(prompt)?);
                if answer.is_empty() {
                    return Err(IdentityError::Cancelled);
                }
                Ok(Some(answer))
            }
        }
    }
}
