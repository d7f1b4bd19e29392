use axum::extract::FromRef;
use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;
use tracing::{info, warn};

use crate::{error::ApiError, state::AppState};

use super::{
    dto::{ChangePasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest, UserSummary},
    jwt::JwtKeys,
    password,
    store::User,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn check_email_format(email: &str) -> Result<(), ApiError> {
    if !is_valid_email(email) {
        return Err(ApiError::Validation("Invalid email format".into()));
    }
    Ok(())
}

pub(crate) fn check_password_strength(password: &str) -> Result<(), ApiError> {
    if password.len() < 6 {
        return Err(ApiError::Validation("Password too short".into()));
    }
    Ok(())
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Uniform 6-digit one-time passcode.
pub(crate) fn generate_otp() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

pub async fn register(state: &AppState, req: RegisterRequest) -> Result<User, ApiError> {
    let first_name = req.first_name.trim();
    let last_name = req.last_name.trim();
    let email = normalize_email(&req.email);

    if first_name.is_empty() || last_name.is_empty() {
        return Err(ApiError::Validation("All fields are required".into()));
    }
    if req.password != req.confirm_password {
        return Err(ApiError::Validation("Passwords do not match".into()));
    }
    check_email_format(&email)?;
    check_password_strength(&req.password)?;

    if state
        .store
        .find_by_email(&email)
        .await
        .map_err(ApiError::Storage)?
        .is_some()
    {
        warn!(email = %email, "registration with taken email");
        return Err(ApiError::Conflict("Email already exists".into()));
    }

    let hash = password::hash_password(&req.password)?;
    let user = state
        .store
        .create(first_name, last_name, &email, &hash)
        .await
        .map_err(ApiError::Storage)?;

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok(user)
}

pub async fn login(state: &AppState, req: LoginRequest) -> Result<(String, User), ApiError> {
    let email = normalize_email(&req.email);

    let user = state
        .store
        .find_by_email(&email)
        .await
        .map_err(ApiError::Storage)?
        .ok_or_else(|| ApiError::Auth("Invalid email or password".into()))?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        warn!(user_id = user.id, "login with invalid password");
        return Err(ApiError::Auth("Invalid email or password".into()));
    }

    let keys = JwtKeys::from_ref(state);
    let token = keys.sign_access(user.id, &user.email)?;

    info!(user_id = user.id, email = %user.email, "user logged in");
    Ok((token, user))
}

pub async fn change_password(
    state: &AppState,
    user_id: i64,
    req: ChangePasswordRequest,
) -> Result<String, ApiError> {
    if req.new_password != req.confirm_password {
        return Err(ApiError::Validation(
            "New password and confirmation must match".into(),
        ));
    }
    check_password_strength(&req.new_password)?;

    let user = state
        .store
        .find_by_id(user_id)
        .await
        .map_err(ApiError::Storage)?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    if !password::verify_password(&req.old_password, &user.password_hash)? {
        return Err(ApiError::Auth("Old password does not match".into()));
    }

    let hash = password::hash_password(&req.new_password)?;
    state
        .store
        .update_password(user.id, &hash)
        .await
        .map_err(ApiError::Storage)?;

    // rotate the session token so the client does not keep a stale one
    let keys = JwtKeys::from_ref(state);
    let token = keys.sign_access(user.id, &user.email)?;

    info!(user_id = user.id, "password changed");
    Ok(token)
}

pub async fn forgot_password(state: &AppState, email: &str) -> Result<(), ApiError> {
    let email = normalize_email(email);
    check_email_format(&email)?;

    let user = state
        .store
        .find_by_email(&email)
        .await
        .map_err(ApiError::Storage)?
        .ok_or_else(|| ApiError::NotFound("Email not found".into()))?;

    let code = generate_otp();
    state
        .store
        .set_reset_code(&user.email, &code)
        .await
        .map_err(ApiError::Storage)?;

    state
        .mailer
        .send_otp(&user.email, &code)
        .await
        .map_err(ApiError::Delivery)?;

    info!(user_id = user.id, "reset OTP dispatched");
    Ok(())
}

/// Redeems an OTP: clears it and hands back a short-lived proof token
/// bound to the account that held the code.
pub async fn verify_otp(state: &AppState, code: &str) -> Result<String, ApiError> {
    let user = state
        .store
        .find_by_reset_code(code)
        .await
        .map_err(ApiError::Storage)?
        .ok_or_else(|| ApiError::Auth("Invalid OTP".into()))?;

    // a racing forgot-password may have replaced the code in the meantime
    if !state
        .store
        .clear_reset_code(code)
        .await
        .map_err(ApiError::Storage)?
    {
        return Err(ApiError::Auth("Invalid OTP".into()));
    }

    let keys = JwtKeys::from_ref(state);
    let token = keys.sign_reset(user.id, &user.email)?;

    info!(user_id = user.id, "OTP verified");
    Ok(token)
}

pub async fn reset_password(
    state: &AppState,
    email: &str,
    req: ResetPasswordRequest,
) -> Result<(), ApiError> {
    let email = normalize_email(email);
    check_password_strength(&req.new_password)?;

    let keys = JwtKeys::from_ref(state);
    let claims = keys
        .verify_reset(&req.reset_token)
        .map_err(|_| ApiError::Auth("Invalid or expired reset token".into()))?;
    if claims.email != email {
        warn!(user_id = claims.sub, "reset token presented for another account");
        return Err(ApiError::Auth("Reset token does not match this account".into()));
    }

    let hash = password::hash_password(&req.new_password)?;
    if !state
        .store
        .reset_password_by_email(&email, &hash)
        .await
        .map_err(ApiError::Storage)?
    {
        return Err(ApiError::NotFound("Email not found".into()));
    }

    info!(user_id = claims.sub, "password reset completed");
    Ok(())
}

pub async fn list_users(state: &AppState) -> Result<Vec<UserSummary>, ApiError> {
    let users = state.store.list_all().await.map_err(ApiError::Storage)?;
    Ok(users.into_iter().map(UserSummary::from).collect())
}
