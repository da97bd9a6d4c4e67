use std::sync::Arc;

use invoicing_api::{
    db::{create_orm_conn, create_pool, run_migrations},
    dto::auth::{LoginRequest, PasswordResetConfirm, PasswordResetRequest, RegisterRequest},
    error::AppError,
    mailer::NoopMailer,
    services::auth_service,
    state::AppState,
};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Statement};

// Register, request a reset, redeem the token and log in with the new
// password. Redeeming twice must fail, and the request response must not
// reveal whether the account exists.
#[tokio::test]
async fn password_reset_round_trip() -> anyhow::Result<()> {
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
                );
                return Ok(());
            }
        };
    if std::env::var("JWT_SECRET").is_err() {
        unsafe {
            std::env::set_var("JWT_SECRET", "test-secret");
        }
    }

    let state = setup_state(&database_url).await?;

    auth_service::register_user(
        &state,
        RegisterRequest {
            email: "reset@example.com".into(),
            password: "original-password".into(),
        },
        None,
    )
    .await?;

    let known = auth_service::request_password_reset(
        &state,
        PasswordResetRequest {
            email: "reset@example.com".into(),
        },
        None,
    )
    .await?;
    let unknown = auth_service::request_password_reset(
        &state,
        PasswordResetRequest {
            email: "nobody@example.com".into(),
        },
        None,
    )
    .await?;
    assert_eq!(known.message, unknown.message);

    // Pull the token straight from the table; mail delivery is a no-op here.
    let token = invoicing_api::entity::password_reset_tokens::Entity::find()
        .filter(invoicing_api::entity::password_reset_tokens::Column::Used.eq(false))
        .one(&state.orm)
        .await?
        .expect("a reset token should have been stored")
        .token;

    auth_service::confirm_password_reset(
        &state,
        PasswordResetConfirm {
            token: token.clone(),
            new_password: "brand-new-password".into(),
        },
        None,
    )
    .await?;

    let login = auth_service::login_user(
        &state,
        LoginRequest {
            email: "reset@example.com".into(),
            password: "brand-new-password".into(),
        },
        None,
    )
    .await?;
    assert!(!login.data.unwrap().token.is_empty());

    let reuse = auth_service::confirm_password_reset(
        &state,
        PasswordResetConfirm {
            token,
            new_password: "yet-another-password".into(),
        },
        None,
    )
    .await;
    assert!(matches!(reuse, Err(AppError::Auth(_))));

    Ok(())
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE invoice_items, invoices, quote_items, quotes, password_reset_tokens, audit_logs, clients, services, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    Ok(AppState {
        pool,
        orm,
        mailer: Arc::new(NoopMailer),
    })
}
