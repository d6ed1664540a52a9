//! Key table and username hash for the challenge/response login.
//!
//! Both sides derive the same 16-bit hash from the username. The server
//! proves itself by sending `hash + server_key`, the robot answers with
//! `hash + client_key`, all modulo 2^16.

/// One row of the fixed key table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthKey {
    pub server: u16,
    pub client: u16,
}

impl AuthKey {
    /// Value the server sends in answer to the key id.
    pub fn server_confirmation(&self, hash: u16) -> u16 {
        hash.wrapping_add(self.server)
    }

    /// Value a genuine robot sends back.
    pub fn client_confirmation(&self, hash: u16) -> u16 {
        hash.wrapping_add(self.client)
    }

    /// Checks the robot's answer by stripping the client key again.
    pub fn accepts(&self, confirmation: u32, hash: u16) -> bool {
        (u64::from(confirmation) + 65536 - u64::from(self.client)) % 65536 == u64::from(hash)
    }
}

pub const AUTH_KEYS: [AuthKey; 5] = [
    AuthKey { server: 23019, client: 32037 },
    AuthKey { server: 32037, client: 29295 },
    AuthKey { server: 18789, client: 13603 },
    AuthKey { server: 16443, client: 29533 },
    AuthKey { server: 18189, client: 21952 },
];

/// Looks up a key id received from the robot.
pub fn auth_key(key_id: u32) -> Option<&'static AuthKey> {
    usize::try_from(key_id).ok().and_then(|index| AUTH_KEYS.get(index))
}

/// `(sum of username bytes * 1000) mod 65536`
pub fn username_hash(username: &[u8]) -> u16 {
    let sum: u64 = username.iter().map(|byte| u64::from(*byte)).sum();
    ((sum * 1000) % 65536) as u16
}
