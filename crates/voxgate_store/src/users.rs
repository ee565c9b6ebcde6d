//! User accounts and first-run seeding.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::{Entity, FileStore, StoreError};

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    /// SHA-256 of the password, hex encoded.
    pub password_hash: String,
    pub is_admin: bool,
    pub created_at_ms: i64,
}

impl Entity for User {
    const COLLECTION: &'static str = "users";

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

pub fn hash_password(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    hash_password(password) == password_hash
}

/// Provisions the default super-admin on a fresh database.
pub struct SeedService<'a> {
    users: &'a FileStore<User>,
}

impl<'a> SeedService<'a> {
    pub fn new(users: &'a FileStore<User>) -> Self {
        Self { users }
    }

    /// Inserts the super-admin when the user store is empty. Returns
    /// whether anything was seeded.
    pub fn seed_default_admin(&self, email: &str, password: &str) -> Result<bool, StoreError> {
        if self.users.count() > 0 {
            return Ok(false);
        }

        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        self.users.insert(User {
            id: 0,
            email: email.to_owned(),
            password_hash: hash_password(password),
            is_admin: true,
            created_at_ms: now_ms,
        })?;

        info!(email, "seeded default super-admin");
        Ok(true)
    }
}
