//! Per-client document numbering. Numbers are `max + 1` over the client's
//! existing documents of the same kind, allocated while holding a row lock
//! on the client so two concurrent allocations for the same client cannot
//! hand out the same number. Different clients proceed in parallel. Gaps
//! from rolled-back work are acceptable; duplicates are not, and the
//! unique `(client_id, number)` indexes back this up.

use sea_orm::sea_query::LockType;
use sea_orm::{ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QuerySelect};
use uuid::Uuid;

use crate::{
    entity::{
        clients::Entity as Clients,
        invoices::{Column as InvoiceCol, Entity as Invoices},
        quotes::{Column as QuoteCol, Entity as Quotes},
    },
    error::{AppError, AppResult},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Quote,
    Invoice,
}

/// Allocate the next number for `client_id`. Must be called inside the
/// same transaction as the insert that consumes the number.
pub async fn next_number(
    txn: &DatabaseTransaction,
    client_id: Uuid,
    kind: DocumentKind,
) -> AppResult<i32> {
    let client = Clients::find_by_id(client_id)
        .lock(LockType::Update)
        .one(txn)
        .await?;
    if client.is_none() {
        return Err(AppError::NotFound);
    }

    let current: Option<Option<i32>> = match kind {
        DocumentKind::Quote => {
            Quotes::find()
                .select_only()
                .column_as(QuoteCol::QuoteNumber.max(), "max_number")
                .filter(QuoteCol::ClientId.eq(client_id))
                .into_tuple()
                .one(txn)
                .await?
        }
        DocumentKind::Invoice => {
            Invoices::find()
                .select_only()
                .column_as(InvoiceCol::InvoiceNumber.max(), "max_number")
                .filter(InvoiceCol::ClientId.eq(client_id))
                .into_tuple()
                .one(txn)
                .await?
        }
    };

    Ok(current.flatten().unwrap_or(0) + 1)
}
