//! Accounts, password hashing and session-backed JWTs.

use std::time::Duration;

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, TimeDelta, Utc};
use db::models::{session::Session, user::User};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

pub const EMAIL_MAX_CHARS: usize = 255;
pub const PASSWORD_MIN_CHARS: usize = 8;
pub const PASSWORD_MAX_CHARS: usize = 128;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Validation(String),
    #[error("an account with this email already exists")]
    EmailTaken,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("session is invalid or has expired")]
    InvalidToken,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("token signing failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub sid: Uuid,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly issued login.
#[derive(Debug)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// The caller behind a verified token.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,
    pub session_id: Uuid,
}

#[derive(Clone)]
pub struct AuthService {
    pool: SqlitePool,
    encoding: EncodingKey,
    decoding: DecodingKey,
    session_ttl: TimeDelta,
    hasher: Argon2<'static>,
}

impl AuthService {
    pub fn new(pool: SqlitePool, jwt_secret: &SecretString, session_ttl: Duration) -> Self {
        let secret = jwt_secret.expose_secret().as_bytes();
        Self {
            pool,
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            session_ttl: TimeDelta::from_std(session_ttl).unwrap_or(TimeDelta::days(7)),
            hasher: Argon2::default(),
        }
    }

    /// Swap the argon2 cost parameters. Tests use this to keep hashing cheap.
    pub fn with_hasher_params(mut self, params: Params) -> Self {
        self.hasher = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        self
    }

    pub fn with_session_ttl(mut self, ttl: TimeDelta) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = normalize_email(email)?;
        validate_password(password)?;

        if User::find_by_email(&self.pool, &email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = self.hash_password(password)?;
        let user = User::create(&self.pool, &email, &password_hash, Uuid::new_v4())
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => AuthError::EmailTaken,
                other => AuthError::Database(other),
            })?;

        info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Verifies credentials and opens a new session.
    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedSession, AuthError> {
        let user = User::find_by_email(&self.pool, email.trim())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        if !self.verify_password(password, &user.password_hash)? {
            debug!(user_id = %user.id, "Password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        let now = Utc::now();
        let expires_at = now + self.session_ttl;
        let session = Session::create(&self.pool, user.id, expires_at).await?;
        let claims = Claims {
            sub: user.id,
            sid: session.id,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;

        info!(user_id = %user.id, session_id = %session.id, "User logged in");
        Ok(IssuedSession {
            token,
            expires_at,
            user,
        })
    }

    /// Resolves a token to its user. The session row must still be live.
    pub async fn authenticate(&self, token: &str) -> Result<AuthContext, AuthError> {
        let claims = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|e| {
                debug!(error = %e, "Rejected token");
                AuthError::InvalidToken
            })?
            .claims;

        let session = Session::find_active(&self.pool, claims.sid, Utc::now())
            .await?
            .filter(|s| s.user_id == claims.sub)
            .ok_or(AuthError::InvalidToken)?;
        let user = User::find_by_id(&self.pool, session.user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        Ok(AuthContext {
            user,
            session_id: session.id,
        })
    }

    pub async fn logout(&self, session_id: Uuid) -> Result<(), AuthError> {
        if Session::delete(&self.pool, session_id).await? > 0 {
            info!(session_id = %session_id, "Session closed");
        }
        Ok(())
    }

    fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        self.hasher
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Hash(e.to_string()))
    }

    fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(hash).map_err(|e| AuthError::Hash(e.to_string()))?;
        Ok(self
            .hasher
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}

/// Trims and lowercases, then checks the `local@domain` shape.
pub fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    if email.chars().count() > EMAIL_MAX_CHARS {
        return Err(AuthError::Validation(format!(
            "email must be at most {EMAIL_MAX_CHARS} characters"
        )));
    }
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.contains(char::is_whitespace) =>
        {
            Ok(email)
        }
        _ => Err(AuthError::Validation("email is not valid".to_string())),
    }
}

pub fn validate_password(password: &str) -> Result<(), AuthError> {
    let len = password.chars().count();
    if !(PASSWORD_MIN_CHARS..=PASSWORD_MAX_CHARS).contains(&len) {
        return Err(AuthError::Validation(format!(
            "password must be between {PASSWORD_MIN_CHARS} and {PASSWORD_MAX_CHARS} characters"
        )));
    }
    Ok(())
}
