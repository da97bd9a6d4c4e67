use uuid::Uuid;

use crate::{db::DbPool, error::AppResult};

/// Append an audit row. The table is append-only; nothing in this crate
/// updates or deletes from it.
pub async fn log_audit(
    pool: &DbPool,
    user_id: Option<Uuid>,
    action: &str,
    entity_type: Option<&str>,
    entity_id: Option<Uuid>,
    detail: Option<String>,
    ip_address: Option<&str>,
) -> AppResult<()> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, user_id, action, entity_type, entity_id, detail, ip_address)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(action)
    .bind(entity_type)
    .bind(entity_id)
    .bind(detail)
    .bind(ip_address)
    .execute(pool)
    .await?;

    Ok(())
}
