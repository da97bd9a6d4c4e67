use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::quotes::{CreateQuoteRequest, QuoteItemInput, QuoteList, QuoteWithItems},
    entity::{
        clients::{Entity as Clients, Model as ClientModel},
        quote_items::{
            ActiveModel as QuoteItemActive, Column as QuoteItemCol, Entity as QuoteItems,
            Model as QuoteItemModel,
        },
        quotes::{ActiveModel as QuoteActive, Column as QuoteCol, Entity as Quotes, Model as QuoteModel},
    },
    error::{AppError, AppResult},
    mailer::{Attachment, OutboundEmail},
    middleware::auth::AuthUser,
    models::{Quote, QuoteItem, QuoteStatus},
    pdf::render_document,
    policy,
    response::{ApiResponse, Meta},
    routes::params::{QuoteListQuery, SortOrder},
    sequence::{DocumentKind, next_number},
    services::{client_service, document_service},
    state::AppState,
};

pub async fn create_quote(
    state: &AppState,
    user: &AuthUser,
    payload: CreateQuoteRequest,
    ip: Option<&str>,
) -> AppResult<ApiResponse<QuoteWithItems>> {
    validate_items(&payload.items)?;

    // Quoting against another user's client is a policy violation, checked
    // before any write.
    client_service::find_visible(state, user, payload.client_id).await?;

    let txn = state.orm.begin().await?;

    let number = next_number(&txn, payload.client_id, DocumentKind::Quote).await?;

    let total: Decimal = payload
        .items
        .iter()
        .map(|i| i.unit_cost * i.quantity)
        .sum();

    let quote = QuoteActive {
        id: Set(Uuid::new_v4()),
        quote_number: Set(number),
        client_id: Set(payload.client_id),
        total: Set(total),
        status: Set(QuoteStatus::Draft.as_str().into()),
        converted: Set(false),
        created_by: Set(user.user_id),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items: Vec<QuoteItem> = Vec::with_capacity(payload.items.len());
    for (position, input) in payload.items.into_iter().enumerate() {
        let item = QuoteItemActive {
            id: Set(Uuid::new_v4()),
            quote_id: Set(quote.id),
            position: Set(position as i32 + 1),
            description: Set(input.description),
            unit_cost: Set(input.unit_cost),
            quantity: Set(input.quantity),
        }
        .insert(&txn)
        .await?;
        items.push(quote_item_from_entity(item));
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "quote_created",
        Some("quotes"),
        Some(quote.id),
        Some(format!("number={} total={}", quote.quote_number, quote.total)),
        ip,
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Quote created",
        QuoteWithItems {
            quote: quote_from_entity(quote)?,
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_quotes(
    state: &AppState,
    user: &AuthUser,
    query: QuoteListQuery,
) -> AppResult<ApiResponse<QuoteList>> {
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if !user.is_admin() {
        condition = condition.add(QuoteCol::CreatedBy.eq(user.user_id));
    }
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        QuoteStatus::parse(status)?;
        condition = condition.add(QuoteCol::Status.eq(status.clone()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let mut finder = Quotes::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(QuoteCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(QuoteCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let quotes = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(quote_from_entity)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ApiResponse::success(
        "Ok",
        QuoteList { items: quotes },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_quote(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<QuoteWithItems>> {
    let quote = find_visible(state, user, id).await?;
    let items = items_for(state, quote.id).await?;

    Ok(ApiResponse::success(
        "Ok",
        QuoteWithItems {
            quote: quote_from_entity(quote)?,
            items: items.into_iter().map(quote_item_from_entity).collect(),
        },
        Some(Meta::empty()),
    ))
}

pub async fn set_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    target: QuoteStatus,
    ip: Option<&str>,
) -> AppResult<ApiResponse<Quote>> {
    let quote = Quotes::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    policy::ensure_can_modify(user, &quote)?;

    if quote.converted {
        return Err(AppError::InvalidState(
            "Converted quotes can no longer change status".into(),
        ));
    }

    let current = QuoteStatus::parse(&quote.status)?;
    let allowed = matches!(
        (current, target),
        (QuoteStatus::Draft, QuoteStatus::Sent)
            | (QuoteStatus::Draft, QuoteStatus::Approved)
            | (QuoteStatus::Draft, QuoteStatus::Rejected)
            | (QuoteStatus::Sent, QuoteStatus::Approved)
            | (QuoteStatus::Sent, QuoteStatus::Rejected)
    );
    if !allowed {
        return Err(AppError::InvalidState(format!(
            "Cannot move quote from {} to {}",
            current.as_str(),
            target.as_str()
        )));
    }

    let mut active: QuoteActive = quote.into();
    active.status = Set(target.as_str().into());
    let quote = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "quote_status_changed",
        Some("quotes"),
        Some(quote.id),
        Some(format!("status={}", quote.status)),
        ip,
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Status updated",
        quote_from_entity(quote)?,
        Some(Meta::empty()),
    ))
}

pub async fn delete_quote(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    ip: Option<&str>,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let quote = Quotes::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    policy::ensure_can_modify(user, &quote)?;

    if quote.converted {
        return Err(AppError::InvalidState(
            "Converted quotes cannot be deleted".into(),
        ));
    }

    let quote_id = quote.id;
    // Items go with the quote in the same transaction via the cascade rule.
    quote.delete(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "quote_deleted",
        Some("quotes"),
        Some(quote_id),
        None,
        ip,
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Quote deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Assemble and render the quote as a PDF. Returns the bytes and a
/// suggested filename.
pub async fn quote_pdf(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<(String, Vec<u8>)> {
    let (quote, client, items) = load_for_rendering(state, user, id).await?;
    let view = document_service::build_quote_view(&quote, &client, &items);
    let bytes = render_document(&view)?;
    Ok((format!("{}.pdf", view.number), bytes))
}

pub async fn email_quote(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    ip: Option<&str>,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let (quote, client, items) = load_for_rendering(state, user, id).await?;
    let recipient = document_service::mail_recipient(&client)?;

    let view = document_service::build_quote_view(&quote, &client, &items);
    let bytes = render_document(&view)?;

    let email = OutboundEmail {
        to: recipient,
        subject: format!("Quote {}", view.number),
        body: format!(
            "Dear {},\n\nPlease find your quote attached.\n\nTotal: {:.2}\n\nThank you for your business.",
            client.name, view.total
        ),
        attachment: Some(Attachment {
            filename: format!("{}.pdf", view.number),
            content: bytes,
        }),
    };
    state.mailer.send(&email).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "quote_emailed",
        Some("quotes"),
        Some(quote.id),
        Some(format!("to={}", email.to)),
        ip,
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Quote emailed",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

async fn load_for_rendering(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<(QuoteModel, ClientModel, Vec<QuoteItemModel>)> {
    let quote = find_visible(state, user, id).await?;
    let client = Clients::find_by_id(quote.client_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let items = items_for(state, quote.id).await?;
    Ok((quote, client, items))
}

pub(crate) async fn find_visible(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<QuoteModel> {
    let quote = Quotes::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    policy::ensure_can_view(user, &quote)?;
    Ok(quote)
}

pub(crate) async fn items_for(state: &AppState, quote_id: Uuid) -> AppResult<Vec<QuoteItemModel>> {
    let items = QuoteItems::find()
        .filter(QuoteItemCol::QuoteId.eq(quote_id))
        .order_by_asc(QuoteItemCol::Position)
        .all(&state.orm)
        .await?;
    Ok(items)
}

/// Lock the quote row for the duration of a transaction. Conversion uses
/// this to rule out two concurrent conversions of the same quote.
pub(crate) async fn find_locked(
    txn: &sea_orm::DatabaseTransaction,
    id: Uuid,
) -> AppResult<Option<QuoteModel>> {
    let quote = Quotes::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?;
    Ok(quote)
}

fn validate_items(items: &[QuoteItemInput]) -> AppResult<()> {
    if items.is_empty() {
        return Err(AppError::Validation(
            "A quote needs at least one line item".into(),
        ));
    }
    for item in items {
        if item.description.trim().is_empty() {
            return Err(AppError::Validation(
                "Line item description must not be empty".into(),
            ));
        }
        if item.unit_cost <= Decimal::ZERO {
            return Err(AppError::Validation(
                "Line item unit cost must be positive".into(),
            ));
        }
        if item.quantity <= Decimal::ZERO {
            return Err(AppError::Validation(
                "Line item quantity must be positive".into(),
            ));
        }
    }
    Ok(())
}

pub fn quote_from_entity(model: QuoteModel) -> AppResult<Quote> {
    Ok(Quote {
        id: model.id,
        quote_number: model.quote_number,
        client_id: model.client_id,
        total: model.total,
        status: QuoteStatus::parse(&model.status)?,
        converted: model.converted,
        created_by: model.created_by,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

pub fn quote_item_from_entity(model: QuoteItemModel) -> QuoteItem {
    QuoteItem {
        id: model.id,
        quote_id: model.quote_id,
        position: model.position,
        description: model.description,
        unit_cost: model.unit_cost,
        quantity: model.quantity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(description: &str, unit_cost: Decimal, quantity: Decimal) -> QuoteItemInput {
        QuoteItemInput {
            description: description.into(),
            unit_cost,
            quantity,
        }
    }

    #[test]
    fn empty_item_list_is_rejected() {
        assert!(matches!(
            validate_items(&[]),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn non_positive_cost_or_quantity_is_rejected() {
        assert!(validate_items(&[item("Setup", dec!(0), dec!(1))]).is_err());
        assert!(validate_items(&[item("Setup", dec!(-5), dec!(1))]).is_err());
        assert!(validate_items(&[item("Setup", dec!(10), dec!(0))]).is_err());
    }

    #[test]
    fn blank_description_is_rejected() {
        assert!(validate_items(&[item("   ", dec!(10), dec!(1))]).is_err());
    }

    #[test]
    fn fractional_quantities_are_allowed() {
        assert!(validate_items(&[item("Consulting", dec!(80), dec!(2.5))]).is_ok());
    }
}
