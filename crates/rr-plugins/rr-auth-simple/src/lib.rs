//! # rr-auth-simple
//!
//! HMAC-SHA256 implementation of `AuthProvider`.
//! A token is `<user-uuid>.<hex(hmac(secret, user-uuid))>`; anyone holding the
//! secret can mint one, so this suits single-tenant deployments and tests.
//! Moderators are a fixed set of user ids taken from configuration.

use std::collections::HashSet;

use hmac::{Hmac, Mac};
use rr_core::models::UserId;
use rr_core::traits::AuthProvider;
use sha2::Sha256;
use tracing::debug;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub struct SimpleAuthProvider {
    secret: Vec<u8>,
    moderators: HashSet<UserId>,
}

impl SimpleAuthProvider {
    /// Accepts the signing secret (e.g., from configuration).
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            moderators: HashSet::new(),
        }
    }

    pub fn with_moderators(mut self, moderators: impl IntoIterator<Item = UserId>) -> Self {
        self.moderators.extend(moderators);
        self
    }

    fn mac(&self, user_id: &str) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .unwrap_or_else(|_| unreachable!("hmac accepts any key length"));
        mac.update(user_id.as_bytes());
        mac
    }

    /// Mints a token for `user_id`.
    pub fn issue_token(&self, user_id: UserId) -> String {
        let subject = user_id.hyphenated().to_string();
        let signature = hex::encode(self.mac(&subject).finalize().into_bytes());
        format!("{subject}.{signature}")
    }
}

impl AuthProvider for SimpleAuthProvider {
    fn resolve_caller(&self, token: &str) -> Option<UserId> {
        let (subject, signature) = token.trim().split_once('.')?;
        let user_id = Uuid::parse_str(subject).ok()?;
        let signature = hex::decode(signature).ok()?;

        // Constant-time comparison over the canonical form of the id.
        match self
            .mac(&user_id.hyphenated().to_string())
            .verify_slice(&signature)
        {
            Ok(()) => Some(user_id),
            Err(_) => {
                debug!(%user_id, "token signature mismatch");
                None
            }
        }
    }

    fn is_moderator(&self, user_id: UserId) -> bool {
        self.moderators.contains(&user_id)
    }
}
