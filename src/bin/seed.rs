use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use invoicing_api::{config::AppConfig, db::create_pool};
use rust_decimal_macros::dec;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_email = std::env::var("ADMIN_USER").unwrap_or_else(|_| "admin@example.com".into());
    let admin_password = std::env::var("ADMIN_PASS").unwrap_or_else(|_| "admin123".into());

    let admin_id = ensure_user_with_role(&pool, &admin_email, &admin_password, "admin").await?;
    seed_services(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}");
    Ok(())
}

async fn ensure_user_with_role(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    // Keep the password of an existing account; only the role is enforced.
    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_optional(pool)
    .await?;

    let user_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM users WHERE email = $1")
                .bind(email)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn seed_services(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let services = vec![
        (
            "Initial consultation",
            "One hour discovery call",
            dec!(90.00),
            "consulting",
        ),
        (
            "Website setup",
            "Static site build and deployment",
            dec!(850.00),
            "development",
        ),
        (
            "Monthly maintenance",
            "Updates, backups and monitoring",
            dec!(120.00),
            "support",
        ),
    ];

    for (name, desc, price, category) in services {
        sqlx::query(
            r#"
            INSERT INTO services (id, name, description, price, category)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(desc)
        .bind(price)
        .bind(category)
        .execute(pool)
        .await?;
    }

    println!("Seeded service catalog");
    Ok(())
}
