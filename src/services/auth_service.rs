use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit::log_audit,
    dto::auth::{
        Claims, LoginRequest, LoginResponse, PasswordResetConfirm, PasswordResetRequest,
        RegisterRequest,
    },
    entity::{
        password_reset_tokens::{
            ActiveModel as TokenActive, Column as TokenCol, Entity as Tokens,
        },
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    mailer::OutboundEmail,
    models::User,
    response::{ApiResponse, Meta},
    state::AppState,
};

const RESET_TOKEN_TTL_HOURS: i64 = 1;

/// Reply for reset requests, identical whether or not the username exists.
const RESET_REQUEST_MESSAGE: &str =
    "If that account exists, a password reset message has been sent";

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
    ip: Option<&str>,
) -> AppResult<ApiResponse<User>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let RegisterRequest { email, password } = payload;

    let exists = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?;
    if exists.is_some() {
        return Err(AppError::Validation("Username is already taken".into()));
    }

    let password_hash = hash_password(&password)?;

    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email),
        password_hash: Set(password_hash),
        role: Set("user".into()),
        active: Set(true),
        last_login_at: Set(None),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.id),
        "user_register",
        Some("users"),
        Some(user.id),
        None,
        ip,
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "User created",
        user_from_entity(user),
        None,
    ))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
    ip: Option<&str>,
) -> AppResult<ApiResponse<LoginResponse>> {
    let LoginRequest { email, password } = payload;
    let user = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?;

    let user = match user {
        Some(u) => u,
        None => return Err(AppError::Auth("Invalid email or password".into())),
    };

    if !user.active {
        return Err(AppError::Auth("Invalid email or password".into()));
    }

    verify_password(&password, &user.password_hash)?;

    let token = issue_token(&user)?;

    let mut active: UserActive = user.clone().into();
    active.last_login_at = Set(Some(Utc::now().into()));
    active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.id),
        "user_login",
        Some("users"),
        Some(user.id),
        None,
        ip,
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let resp = LoginResponse {
        token: format!("Bearer {token}"),
    };
    Ok(ApiResponse::success("Logged in", resp, Some(Meta::empty())))
}

/// Issue a password reset token. The response body is the same for known
/// and unknown usernames, and the token is generated on both paths so the
/// two take roughly the same amount of work.
pub async fn request_password_reset(
    state: &AppState,
    payload: PasswordResetRequest,
    ip: Option<&str>,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let token = format!(
        "{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    );

    let user = Users::find()
        .filter(UserCol::Email.eq(payload.email.as_str()))
        .filter(UserCol::Active.eq(true))
        .one(&state.orm)
        .await?;

    if let Some(user) = user {
        // Supersede any outstanding tokens for this user.
        Tokens::update_many()
            .col_expr(TokenCol::Used, sea_orm::sea_query::Expr::value(true))
            .filter(TokenCol::UserId.eq(user.id))
            .filter(TokenCol::Used.eq(false))
            .exec(&state.orm)
            .await?;

        TokenActive {
            id: Set(Uuid::new_v4()),
            user_id: Set(user.id),
            token: Set(token.clone()),
            expires_at: Set((Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS)).into()),
            used: Set(false),
            created_at: NotSet,
        }
        .insert(&state.orm)
        .await?;

        let email = OutboundEmail {
            to: user.email.clone(),
            subject: "Password reset".into(),
            body: format!(
                "A password reset was requested for your account.\n\n\
                 Reset token: {token}\n\n\
                 The token expires in {RESET_TOKEN_TTL_HOURS} hour(s). \
                 If you did not request this, you can ignore this message."
            ),
            attachment: None,
        };
        // A send failure must not leak account existence through the
        // response, so it is only logged.
        if let Err(err) = state.mailer.send(&email).await {
            tracing::warn!(error = %err, "password reset mail failed");
        }

        if let Err(err) = log_audit(
            &state.pool,
            Some(user.id),
            "password_reset_requested",
            Some("users"),
            Some(user.id),
            None,
            ip,
        )
        .await
        {
            tracing::warn!(error = %err, "audit log failed");
        }
    }

    Ok(ApiResponse::success(
        RESET_REQUEST_MESSAGE,
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn confirm_password_reset(
    state: &AppState,
    payload: PasswordResetConfirm,
    ip: Option<&str>,
) -> AppResult<ApiResponse<serde_json::Value>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let token = Tokens::find()
        .filter(TokenCol::Token.eq(payload.token.as_str()))
        .one(&state.orm)
        .await?;

    let token = match token {
        Some(t) if !t.used && t.expires_at.with_timezone(&Utc) > Utc::now() => t,
        _ => return Err(AppError::Auth("Invalid or expired reset token".into())),
    };

    let user = Users::find_by_id(token.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let password_hash = hash_password(&payload.new_password)?;

    let user_id = user.id;
    let mut user_active: UserActive = user.into();
    user_active.password_hash = Set(password_hash);
    user_active.update(&state.orm).await?;

    let mut token_active: TokenActive = token.into();
    token_active.used = Set(true);
    token_active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user_id),
        "password_reset_completed",
        Some("users"),
        Some(user_id),
        None,
        ip,
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Password updated",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, stored_hash: &str) -> AppResult<()> {
    let parsed_hash = PasswordHash::new(stored_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    let argon2 = Argon2::default();
    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AppError::Auth("Invalid email or password".into()))
}

fn issue_token(user: &UserModel) -> AppResult<String> {
    let secret = std::env::var("JWT_SECRET")
        .map_err(|_| AppError::Internal(anyhow::anyhow!("JWT_SECRET is not set")))?;

    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(24))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user.id.to_string(),
        role: user.role.clone(),
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn user_from_entity(model: UserModel) -> User {
    User {
        id: model.id,
        email: model.email,
        role: model.role,
        active: model.active,
        last_login_at: model.last_login_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
    }
}
