//! Account identity: signup, login, and opaque session tokens.
//!
//! Only the raw token leaves the process (inside a cookie); the store keeps
//! a SHA-256 digest, so a leaked sessions table cannot be replayed.

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::info;
use uuid::Uuid;

use crate::application::repos::{
    CreateSessionParams, CreateUserParams, RepoError, SessionsRepo, UsersRepo,
};
use crate::domain::entities::UserRecord;
use crate::domain::text;

const TOKEN_PREFIX: &str = "qs_";
const MIN_PASSWORD_LEN: usize = 8;
const SALT_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("username is not available")]
    UsernameTaken,
    #[error("username is not valid")]
    InvalidUsername,
    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// A freshly signed-in identity plus the raw token for the cookie.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub user: UserRecord,
    pub token: String,
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UsersRepo>,
    sessions: Arc<dyn SessionsRepo>,
    session_ttl: Duration,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        sessions: Arc<dyn SessionsRepo>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            users,
            sessions,
            session_ttl,
        }
    }

    pub async fn sign_up(&self, username: &str, password: &str) -> Result<SignedIn, AccountError> {
        if !text::valid_username(username) {
            return Err(AccountError::InvalidUsername);
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AccountError::WeakPassword);
        }

        let salt = new_salt();
        let user = match self
            .users
            .create_user(CreateUserParams {
                username: username.to_string(),
                password_digest: password_digest(&salt, password),
            })
            .await
        {
            Ok(user) => user,
            Err(RepoError::Duplicate { .. }) => return Err(AccountError::UsernameTaken),
            Err(err) => return Err(err.into()),
        };

        info!(target: "quaderno::accounts", username = %user.username, "account created");
        self.open_session(user).await
    }

    pub async fn sign_in(&self, username: &str, password: &str) -> Result<SignedIn, AccountError> {
        let Some((user_id, stored)) = self.users.password_digest(username).await? else {
            return Err(AccountError::InvalidCredentials);
        };

        if !verify_password(&stored, password) {
            return Err(AccountError::InvalidCredentials);
        }

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AccountError::InvalidCredentials)?;
        self.open_session(user).await
    }

    pub async fn sign_out(&self, token: &str) -> Result<(), AccountError> {
        self.sessions.delete_by_digest(&token_digest(token)).await?;
        Ok(())
    }

    /// Resolve a cookie token into its user, if the session is still live.
    pub async fn authenticate(&self, token: &str) -> Result<Option<UserRecord>, AccountError> {
        let now = OffsetDateTime::now_utc();
        let Some(session) = self
            .sessions
            .find_active_by_digest(&token_digest(token), now)
            .await?
        else {
            return Ok(None);
        };
        Ok(self.users.find_by_id(session.user_id).await?)
    }

    async fn open_session(&self, user: UserRecord) -> Result<SignedIn, AccountError> {
        let token = new_token();
        self.sessions
            .insert(CreateSessionParams {
                token_digest: token_digest(&token),
                user_id: user.id,
                expires_at: OffsetDateTime::now_utc() + self.session_ttl,
            })
            .await?;
        Ok(SignedIn { user, token })
    }
}

fn new_token() -> String {
    let mut bytes = Vec::with_capacity(32);
    bytes.extend_from_slice(Uuid::new_v4().as_bytes());
    bytes.extend_from_slice(Uuid::new_v4().as_bytes());
    format!("{TOKEN_PREFIX}{}", URL_SAFE_NO_PAD.encode(bytes))
}

fn token_digest(token: &str) -> Vec<u8> {
    Sha256::digest(token.as_bytes()).to_vec()
}

fn new_salt() -> [u8; SALT_LEN] {
    *Uuid::new_v4().as_bytes()
}

/// Stored layout: `salt || sha256(salt || password)`.
fn password_digest(salt: &[u8; SALT_LEN], password: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    let mut out = Vec::with_capacity(SALT_LEN + 32);
    out.extend_from_slice(salt);
    out.extend_from_slice(&hasher.finalize());
    out
}

fn verify_password(stored: &[u8], password: &str) -> bool {
    if stored.len() <= SALT_LEN {
        return false;
    }
    let mut salt = [0u8; SALT_LEN];
    salt.copy_from_slice(&stored[..SALT_LEN]);
    let candidate = password_digest(&salt, password);
    stored.ct_eq(&candidate).unwrap_u8() == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip_verifies() {
        let salt = new_salt();
        let stored = password_digest(&salt, "correct horse battery");
        assert!(verify_password(&stored, "correct horse battery"));
        assert!(!verify_password(&stored, "correct horse battery!"));
    }

    #[test]
    fn truncated_digest_never_verifies() {
        assert!(!verify_password(&[0u8; 4], "anything"));
    }

    #[test]
    fn tokens_are_prefixed_and_unique() {
        let a = new_token();
        let b = new_token();
        assert!(a.starts_with(TOKEN_PREFIX));
        assert_ne!(a, b);
    }
}
