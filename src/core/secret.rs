// src/core/secret.rs

use super::errors::AutoconfError;

pub const SECRET_LEN: usize = 16;

/// Random token authorizing the agent's registration with the temBoard UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedSecret(String);

impl SharedSecret {
    /// Draws `SECRET_LEN` bytes from the OS random source, hex-encoded.
    pub fn generate() -> Result<Self, AutoconfError> {
        let mut bytes = [0u8; SECRET_LEN];
        getrandom::fill(&mut bytes)?;
        Ok(Self(hex::encode(bytes)))
    }

    pub fn from_hex(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
