use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use tracing::instrument;

use crate::{error::ApiError, state::AppState};

use super::{
    dto::{
        ChangePasswordRequest, Envelope, ForgotPasswordRequest, LoginRequest, PublicUser,
        RegisterRequest, ResetPasswordRequest, UserSummary, VerifyOtpRequest,
    },
    jwt::AuthUser,
    services,
};

pub const SESSION_COOKIE: &str = "jwtUserToken";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/change-password", post(change_password))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/verify-otp", post(verify_otp))
        .route("/auth/reset-password/:email", post(reset_password))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me))
        .route("/users", get(list_users))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Envelope>), ApiError> {
    services::register(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(Envelope::success("User registered successfully")),
    ))
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<Envelope<String>>), ApiError> {
    let (token, _user) = services::login(&state, payload).await?;

    let cookie = Cookie::build((SESSION_COOKIE, token.clone()))
        .path("/")
        .http_only(true)
        .max_age(time::Duration::minutes(state.config.jwt.ttl_minutes))
        .build();

    Ok((
        jar.add(cookie),
        Json(Envelope::success_with("Login successful", token)),
    ))
}

#[instrument(skip(state, claims, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<Envelope<String>>, ApiError> {
    let token = services::change_password(&state, claims.sub, payload).await?;
    Ok(Json(Envelope::success_with(
        "Password changed successfully",
        token,
    )))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<Envelope>, ApiError> {
    services::forgot_password(&state, &payload.email).await?;
    Ok(Json(Envelope::success("OTP sent")))
}

#[instrument(skip(state, payload))]
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<Json<Envelope<String>>, ApiError> {
    let reset_token = services::verify_otp(&state, &payload.code).await?;
    Ok(Json(Envelope::success_with(
        "Correct OTP entered",
        reset_token,
    )))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(email): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<Envelope>, ApiError> {
    services::reset_password(&state, &email, payload).await?;
    Ok(Json(Envelope::success("Password reset successfully")))
}

#[instrument(skip(claims))]
pub async fn get_me(AuthUser(claims): AuthUser) -> Json<Envelope<PublicUser>> {
    Json(Envelope::success_with(
        "OK",
        PublicUser {
            id: claims.sub,
            email: claims.email,
        },
    ))
}

#[instrument(skip(state, claims))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<Envelope<Vec<UserSummary>>>, ApiError> {
    if !state.config.admin_emails.iter().any(|a| a == &claims.email) {
        return Err(ApiError::Forbidden("Admin access required".into()));
    }
    let users = services::list_users(&state).await?;
    Ok(Json(Envelope::success_with("OK", users)))
}
