//! User accounts and bearer-token authentication.
//!
//! New accounts start inactive unless `auth.activate_on_register` is set; an operator
//! activates them with `ragchat users activate`.

mod password;
mod token;
mod users;

pub use password::{hash_password, verify_password};
pub use token::{Claims, TokenIssuer};
pub use users::UserStore;

use crate::config::AuthSettings;
use crate::error::{RagChatError, Result};
use chrono::{DateTime, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 6;
const MAX_PASSWORD_LEN: usize = 128;

/// A registered account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

fn validate_email(email: &str) -> Result<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(RagChatError::InvalidInput(format!("'{}' is not a valid email", email)))
    }
}

fn validate_password(password: &str) -> Result<()> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(RagChatError::InvalidInput(format!(
            "password must be {} to {} characters",
            MIN_PASSWORD_LEN, MAX_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn token_secret(settings: &AuthSettings) -> Result<Vec<u8>> {
    if !settings.jwt_secret.is_empty() {
        return Ok(settings.jwt_secret.as_bytes().to_vec());
    }
    warn!("auth.jwt_secret is not set; tokens will not survive a restart");
    let mut secret = vec![0u8; 32];
    SystemRandom::new()
        .fill(&mut secret)
        .map_err(|_| RagChatError::Config("failed to generate a token secret".into()))?;
    Ok(secret)
}

/// Registration, login and token resolution.
pub struct AuthService {
    users: UserStore,
    tokens: TokenIssuer,
    activate_on_register: bool,
}

impl AuthService {
    pub fn new(users: UserStore, tokens: TokenIssuer, activate_on_register: bool) -> Self {
        Self {
            users,
            tokens,
            activate_on_register,
        }
    }

    /// Build the service from settings. An empty `jwt_secret` gets a random
    /// per-process secret.
    pub fn from_settings(settings: &AuthSettings, users: UserStore) -> Result<Self> {
        let secret = token_secret(settings)?;
        Ok(Self::new(
            users,
            TokenIssuer::new(&secret, settings.token_ttl_minutes)?,
            settings.activate_on_register,
        ))
    }

    pub fn users(&self) -> &UserStore {
        &self.users
    }

    pub fn register(&self, email: &str, password: &str) -> Result<User> {
        let email = email.trim();
        validate_email(email)?;
        validate_password(password)?;

        let hash = hash_password(password)?;
        let user = self
            .users
            .create(email, &hash, self.activate_on_register)
            .inspect_err(|e| warn!("Register attempt failed for {}: {}", email, e))?;
        info!("User registered: {}", user.email);
        Ok(user)
    }

    /// Check credentials and issue an access token.
    pub fn login(&self, email: &str, password: &str) -> Result<String> {
        let user = self
            .users
            .find_by_email(email.trim())?
            .filter(|u| verify_password(password, &u.password_hash));

        match user {
            Some(user) => {
                info!("User authenticated: {}", user.email);
                self.tokens.issue(&user)
            }
            None => {
                warn!("Login attempt failed: {}", email);
                Err(RagChatError::Auth("Invalid credentials.".into()))
            }
        }
    }

    /// Resolve a bearer token to its current account.
    pub fn authenticate(&self, token: &str) -> Result<User> {
        let claims = self.tokens.verify(token)?;
        let id = Uuid::parse_str(&claims.sub).map_err(|_| RagChatError::Auth("Invalid token subject.".into()))?;
        self.users
            .find_by_id(&id)?
            .ok_or_else(|| RagChatError::Auth("Account no longer exists.".into()))
    }

    /// Like [`authenticate`](Self::authenticate), but the account must be active.
    pub fn authenticate_active(&self, token: &str) -> Result<User> {
        let user = self.authenticate(token)?;
        if !user.is_active {
            return Err(RagChatError::AccountInactive);
        }
        Ok(user)
    }
}
