//! Challenge/response login.
//!
//! The handshake is driven by the session one frame at a time:
//! 1. Robot sends its username, server asks for a key id
//! 2. Robot sends the key id, server replies with `hash + server_key`
//! 3. Robot sends `hash + client_key`, server verifies it

use log::debug;
use shared::{auth_key, username_hash, AuthKey};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("key id {0} is not in the key table")]
    KeyOutOfRange(u32),
    #[error("confirmation {0} does not match the username hash")]
    Mismatch(u32),
}

/// Login progress of one connection after the username has been accepted.
#[derive(Debug, Clone)]
pub struct Handshake {
    hash: u16,
    key: Option<&'static AuthKey>,
}

impl Handshake {
    pub fn new(username: &[u8]) -> Self {
        Self {
            hash: username_hash(username),
            key: None,
        }
    }

    pub fn hash(&self) -> u16 {
        self.hash
    }

    /// Selects the key pair and returns the server's half of the challenge.
    pub fn select_key(&mut self, key_id: u32) -> Result<u16, AuthError> {
        let key = auth_key(key_id).ok_or(AuthError::KeyOutOfRange(key_id))?;
        self.key = Some(key);
        let reply = key.server_confirmation(self.hash);
        debug!("key {} selected, hash {} -> challenge {}", key_id, self.hash, reply);
        Ok(reply)
    }

    /// Checks the robot's answer against the selected key.
    ///
    /// Without a selected key nothing can match.
    pub fn verify(&self, confirmation: u32) -> Result<(), AuthError> {
        match self.key {
            Some(key) if key.accepts(confirmation, self.hash) => Ok(()),
            _ => Err(AuthError::Mismatch(confirmation)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_handshake() {
        let mut handshake = Handshake::new(b"Mario");
        assert_eq!(handshake.hash(), 45248);
        assert_eq!(handshake.select_key(0), Ok(2731));
        assert_eq!(handshake.verify(11749), Ok(()));
    }

    #[test]
    fn test_wrong_confirmation() {
        let mut handshake = Handshake::new(b"Mario");
        handshake.select_key(0).unwrap();
        assert_eq!(handshake.verify(11748), Err(AuthError::Mismatch(11748)));
        assert_eq!(handshake.verify(0), Err(AuthError::Mismatch(0)));
    }

    #[test]
    fn test_key_range() {
        let mut handshake = Handshake::new(b"Mario");
        assert!(handshake.select_key(4).is_ok());
        assert_eq!(handshake.select_key(5), Err(AuthError::KeyOutOfRange(5)));
        assert_eq!(handshake.select_key(999), Err(AuthError::KeyOutOfRange(999)));
    }

    #[test]
    fn test_verify_without_key() {
        let handshake = Handshake::new(b"Mario");
        assert!(handshake.verify(11749).is_err());
    }
}
