use std::sync::Arc;

use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::{
    auth::{
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        reset,
        store::{NewUser, Role, User, UserStore},
    },
    error::ApiError,
    mailer::Mailer,
    state::AppState,
};

// Single message for unknown email and wrong password alike.
const BAD_CREDENTIALS: &str = "incorrect email or password";
const BAD_RESET_TOKEN: &str = "reset token is invalid or has expired";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_new_password(password: &str, password_confirm: &str) -> Result<(), ApiError> {
    if password != password_confirm {
        warn!("password confirmation mismatch");
        return Err(ApiError::Validation("passwords do not match".into()));
    }
    if password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::Validation("password too short".into()));
    }
    Ok(())
}

/// Orchestrates hasher, token codec, reset generator, user store and
/// mail delivery for every credential flow.
pub struct CredentialService {
    store: Arc<dyn UserStore>,
    mailer: Arc<dyn Mailer>,
    keys: JwtKeys,
    base_url: String,
}

impl FromRef<AppState> for CredentialService {
    fn from_ref(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            mailer: state.mailer.clone(),
            keys: JwtKeys::from_ref(state),
            base_url: state.config.base_url.clone(),
        }
    }
}

impl CredentialService {
    pub fn new(
        store: Arc<dyn UserStore>,
        mailer: Arc<dyn Mailer>,
        keys: JwtKeys,
        base_url: String,
    ) -> Self {
        Self {
            store,
            mailer,
            keys,
            base_url,
        }
    }

    pub async fn signup(
        &self,
        name: &str,
        email: &str,
        password: &str,
        password_confirm: &str,
    ) -> Result<(User, String), ApiError> {
        let email = normalize_email(email);

        if name.trim().is_empty() {
            return Err(ApiError::Validation("name is required".into()));
        }
        if !is_valid_email(&email) {
            warn!(email = %email, "invalid email");
            return Err(ApiError::Validation("invalid email".into()));
        }
        validate_new_password(password, password_confirm)?;

        if self.store.find_by_email(&email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(ApiError::Conflict("email already registered".into()));
        }

        let hash = hash_password(password)?;
        let user = self
            .store
            .create(NewUser {
                name: name.trim().to_string(),
                email,
                password_hash: hash,
                role: Role::User,
            })
            .await?;

        let token = self.keys.issue(user.id, OffsetDateTime::now_utc())?;
        info!(user_id = %user.id, email = %user.email, "user signed up");
        Ok((user, token))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(User, String), ApiError> {
        if email.is_empty() || password.is_empty() {
            return Err(ApiError::Validation(
                "please provide email and password".into(),
            ));
        }
        let email = normalize_email(email);

        let user = match self.store.find_by_email(&email).await? {
            Some(u) => u,
            None => {
                warn!(email = %email, "login unknown email");
                return Err(ApiError::Unauthorized(BAD_CREDENTIALS.into()));
            }
        };

        if !verify_password(password, &user.password_hash)? {
            warn!(user_id = %user.id, "login invalid password");
            return Err(ApiError::Unauthorized(BAD_CREDENTIALS.into()));
        }

        let token = self.keys.issue(user.id, OffsetDateTime::now_utc())?;
        info!(user_id = %user.id, "user logged in");
        Ok((user, token))
    }

    /// Rehashes and stamps `password_changed_at`, which retires every
    /// token issued in an earlier second than the returned one.
    pub async fn change_password(
        &self,
        user: &User,
        password_current: &str,
        password: &str,
        password_confirm: &str,
    ) -> Result<(User, String), ApiError> {
        if !verify_password(password_current, &user.password_hash)? {
            warn!(user_id = %user.id, "wrong current password");
            return Err(ApiError::Unauthorized("wrong current password".into()));
        }
        validate_new_password(password, password_confirm)?;

        let now = OffsetDateTime::now_utc();
        let mut updated = user.clone();
        updated.password_hash = hash_password(password)?;
        updated.password_changed_at = Some(now);
        let updated = self.store.save(&updated).await?;

        let token = self.keys.issue(updated.id, now)?;
        info!(user_id = %updated.id, "password changed");
        Ok((updated, token))
    }

    /// Stores a reset digest and mails the secret. A delivery failure
    /// clears the half-written reset state before surfacing.
    pub async fn forgot_password(&self, email: &str) -> Result<(), ApiError> {
        let email = normalize_email(email);
        let user = match self.store.find_by_email(&email).await? {
            Some(u) => u,
            None => {
                warn!(email = %email, "forgot password for unknown email");
                return Err(ApiError::NotFound("no user with that email address".into()));
            }
        };

        let (secret, digest) = reset::generate();
        let mut updated = user.clone();
        updated.password_reset_token_hash = Some(digest);
        updated.password_reset_expires =
            Some(OffsetDateTime::now_utc() + reset::RESET_TOKEN_TTL);
        let updated = self.store.save(&updated).await?;

        let reset_url = format!("{}/api/v1/users/resetPassword/{}", self.base_url, secret);
        let body = format!(
            "Forgot your password? Submit a PATCH request with your new password to: {reset_url}\n\
             If you didn't forget your password, ignore this message."
        );
        if let Err(e) = self
            .mailer
            .send(
                &updated.email,
                "Your password reset token (expires in 10 minutes)",
                &body,
            )
            .await
        {
            warn!(user_id = %updated.id, error = %e, "reset mail delivery failed");
            let mut rollback = updated.clone();
            rollback.password_reset_token_hash = None;
            rollback.password_reset_expires = None;
            if let Err(save_err) = self.store.save(&rollback).await {
                // Do not mask the delivery error with the rollback one.
                error!(user_id = %updated.id, error = %save_err, "reset field rollback failed");
            }
            return Err(ApiError::Delivery("failed to send the reset email".into()));
        }

        info!(user_id = %updated.id, "reset mail sent");
        Ok(())
    }

    pub async fn reset_password(
        &self,
        secret: &str,
        password: &str,
        password_confirm: &str,
    ) -> Result<(User, String), ApiError> {
        let digest = reset::digest_of(secret);
        let user = self
            .store
            .find_by_reset_digest(&digest)
            .await?
            .ok_or_else(|| ApiError::Validation(BAD_RESET_TOKEN.into()))?;

        let now = OffsetDateTime::now_utc();
        match user.password_reset_expires {
            Some(expires) if expires > now => {}
            _ => {
                warn!(user_id = %user.id, "reset secret expired");
                return Err(ApiError::Validation(BAD_RESET_TOKEN.into()));
            }
        }
        validate_new_password(password, password_confirm)?;

        let mut updated = user.clone();
        updated.password_hash = hash_password(password)?;
        updated.password_reset_token_hash = None;
        updated.password_reset_expires = None;
        updated.password_changed_at = Some(now);
        let updated = self.store.save(&updated).await?;

        let token = self.keys.issue(updated.id, now)?;
        info!(user_id = %updated.id, "password reset");
        Ok((updated, token))
    }
}
