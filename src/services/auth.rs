use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::database::{Store, StoreError, StoreTx};
use crate::error::AppError;
use crate::mailer::VerificationMailer;
use crate::models::{NewUser, User, UserSummary};
use crate::utils::{
    ensure_max_chars, extract_university_info, generate_token, generate_verification_token,
    hash_password, verify_password, verify_token,
};

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterOutcome {
    pub user_id: i64,
    pub message: String,
    pub verification_required: bool,
    pub email_sent: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyOutcome {
    pub message: String,
    pub user_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: i64,
    pub user_info: UserSummary,
}

#[derive(Clone)]
pub struct AuthService<S> {
    store: S,
    config: Arc<Config>,
    mailer: Arc<dyn VerificationMailer>,
}

impl<S: Store> AuthService<S> {
    pub fn new(store: S, config: Arc<Config>, mailer: Arc<dyn VerificationMailer>) -> Self {
        Self {
            store,
            config,
            mailer,
        }
    }

    /// Creates an unverified account and mails its verification token.
    ///
    /// Checks run in a fixed order: university domain, input shape, username
    /// uniqueness, email uniqueness. Mail delivery happens after the commit and
    /// its failure only shows up as `email_sent: false`.
    pub async fn register(&self, candidate: RegisterRequest) -> Result<RegisterOutcome, AppError> {
        let email = candidate.email.trim().to_ascii_lowercase();
        let university = extract_university_info(&email, &self.config.university_domains)
            .ok_or(AppError::InvalidDomain)?;

        validate_candidate(&candidate)?;

        let password_hash = hash_credential(candidate.password.clone(), self.config.bcrypt_cost).await?;
        let verification_token = generate_verification_token();

        let mut tx = self.store.begin().await?;

        if tx.find_user_by_username(&candidate.username).await?.is_some() {
            return Err(AppError::DuplicateUsername);
        }
        if tx.find_user_by_email(&email).await?.is_some() {
            return Err(AppError::DuplicateEmail);
        }

        let user = tx
            .insert_user(NewUser {
                username: candidate.username,
                email: email.clone(),
                password_hash,
                first_name: candidate.first_name.trim().to_string(),
                last_name: candidate.last_name.trim().to_string(),
                university_domain: university.domain,
                university_badge: university.badge,
                verification_token: verification_token.clone(),
            })
            .await
            .map_err(map_user_conflict)?;
        tx.commit().await.map_err(map_user_conflict)?;

        tracing::info!(
            "Registered user {} ({}) from {}",
            user.id,
            user.username,
            user.university_domain
        );

        let email_sent = self
            .mailer
            .send_verification_email(&email, &user.first_name, &verification_token)
            .await;

        Ok(RegisterOutcome {
            user_id: user.id,
            message: "Registration successful! Please check your email to verify your account."
                .to_string(),
            verification_required: true,
            email_sent,
        })
    }

    /// Consumes a verification token. A token works at most once because it is
    /// cleared in the same write that marks the user verified.
    pub async fn verify_email(&self, token: &str) -> Result<VerifyOutcome, AppError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::InvalidToken);
        }

        let mut tx = self.store.begin().await?;
        let user = tx
            .find_user_by_verification_token(token)
            .await?
            .ok_or(AppError::InvalidToken)?;

        if user.is_verified {
            return Err(AppError::AlreadyVerified);
        }

        tx.mark_user_verified(user.id).await?;
        tx.commit().await?;

        tracing::info!("Verified email for user {}", user.id);
        Ok(VerifyOutcome {
            message: "Email verified successfully! You can now log in.".to_string(),
            user_id: user.id,
        })
    }

    /// Checks credentials and records the login time. An unknown username and
    /// a wrong password fail identically.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, AppError> {
        let mut tx = self.store.begin().await?;

        let mut user = tx
            .find_user_by_username(username)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if !check_credential(password.to_string(), user.password_hash.clone()).await? {
            return Err(AppError::InvalidCredentials);
        }
        if !user.is_verified {
            return Err(AppError::EmailNotVerified);
        }
        if !user.is_active {
            return Err(AppError::AccountDeactivated);
        }

        let now = Utc::now();
        tx.update_last_seen(user.id, now).await?;
        tx.commit().await?;

        user.last_seen = Some(now);
        tracing::debug!("User {} authenticated", user.username);
        Ok(user)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, AppError> {
        let user = self.authenticate(username, password).await?;

        let (access_token, expires_at) = generate_token(&user.username, &self.config)
            .map_err(|e| AppError::Internal(format!("Failed to issue token: {e}")))?;

        Ok(LoginOutcome {
            access_token,
            token_type: "bearer".to_string(),
            expires_at,
            user_info: UserSummary::from(&user),
        })
    }

    /// Resolves a bearer token to the user named by its subject.
    pub async fn current_user(&self, token: &str) -> Result<User, AppError> {
        let claims = verify_token(token, &self.config).map_err(|e| {
            tracing::debug!("Rejected bearer token: {}", e);
            AppError::Unauthorized
        })?;

        let mut tx = self.store.begin().await?;
        let user = tx
            .find_user_by_username(&claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)?;
        tx.commit().await?;

        if !user.is_active {
            return Err(AppError::AccountDeactivated);
        }
        Ok(user)
    }

    pub async fn deactivate_account(&self, user_id: i64) -> Result<(), AppError> {
        let mut tx = self.store.begin().await?;
        if tx.find_user_by_id(user_id).await?.is_none() {
            return Err(AppError::UserNotFound);
        }
        tx.set_user_active(user_id, false).await?;
        tx.commit().await?;

        tracing::info!("Deactivated user {}", user_id);
        Ok(())
    }
}

fn validate_candidate(candidate: &RegisterRequest) -> Result<(), AppError> {
    let username = &candidate.username;
    if username.len() < 3 || username.len() > 50 {
        return Err(AppError::Validation(
            "Username must be between 3 and 50 characters".to_string(),
        ));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(AppError::Validation(
            "Username may only contain letters, digits and underscores".to_string(),
        ));
    }
    ensure_max_chars("Email", candidate.email.trim(), 255)?;
    if candidate.password.chars().count() < 8 {
        return Err(AppError::Validation(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    for (field, value) in [
        ("First name", &candidate.first_name),
        ("Last name", &candidate.last_name),
    ] {
        let value = value.trim();
        if value.is_empty() || value.chars().count() > 50 {
            return Err(AppError::Validation(format!(
                "{field} must be between 1 and 50 characters"
            )));
        }
    }
    Ok(())
}

// A concurrent registration can slip past the existence checks; the unique
// constraints still reject it and the caller sees the same error kinds.
fn map_user_conflict(err: StoreError) -> AppError {
    match &err {
        StoreError::Conflict(constraint) if constraint.contains("username") => {
            AppError::DuplicateUsername
        }
        StoreError::Conflict(constraint) if constraint.contains("email") => AppError::DuplicateEmail,
        _ => AppError::Storage(err),
    }
}

async fn hash_credential(password: String, cost: u32) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("Hashing task failed: {e}")))?
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

async fn check_credential(password: String, credential: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &credential))
        .await
        .map_err(|e| AppError::Internal(format!("Verification task failed: {e}")))?
        .map_err(|e| AppError::Internal(format!("Failed to verify password: {e}")))
}
