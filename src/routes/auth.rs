use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::auth::{
        LoginRequest, LoginResponse, PasswordResetConfirm, PasswordResetRequest, RegisterRequest,
    },
    error::AppResult,
    middleware::client_ip::ClientIp,
    models::User,
    response::ApiResponse,
    services::auth_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/password-reset", post(password_reset))
        .route("/password-reset/confirm", post(password_reset_confirm))
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Register user", body = ApiResponse<User>),
        (status = 400, description = "Invalid username or password")
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<AppState>,
    ip: ClientIp,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    let resp = auth_service::register_user(&state, payload, ip.as_deref()).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login user", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    ip: ClientIp,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    let resp = auth_service::login_user(&state, payload, ip.as_deref()).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/password-reset",
    request_body = PasswordResetRequest,
    responses(
        (status = 200, description = "Generic acknowledgement, identical for unknown usernames")
    ),
    tag = "Auth"
)]
pub async fn password_reset(
    State(state): State<AppState>,
    ip: ClientIp,
    Json(payload): Json<PasswordResetRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = auth_service::request_password_reset(&state, payload, ip.as_deref()).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/password-reset/confirm",
    request_body = PasswordResetConfirm,
    responses(
        (status = 200, description = "Password updated"),
        (status = 401, description = "Invalid or expired token")
    ),
    tag = "Auth"
)]
pub async fn password_reset_confirm(
    State(state): State<AppState>,
    ip: ClientIp,
    Json(payload): Json<PasswordResetConfirm>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = auth_service::confirm_password_reset(&state, payload, ip.as_deref()).await?;
    Ok(Json(resp))
}
