use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::invoices::{InvoiceList, InvoiceWithItems},
    entity::{
        clients::{Entity as Clients, Model as ClientModel},
        invoice_items::{
            ActiveModel as InvoiceItemActive, Column as InvoiceItemCol, Entity as InvoiceItems,
            Model as InvoiceItemModel,
        },
        invoices::{
            ActiveModel as InvoiceActive, Column as InvoiceCol, Entity as Invoices,
            Model as InvoiceModel,
        },
    },
    error::{AppError, AppResult},
    mailer::{Attachment, OutboundEmail},
    middleware::auth::AuthUser,
    models::{Invoice, InvoiceItem, QuoteStatus},
    pdf::render_document,
    policy,
    response::{ApiResponse, Meta},
    routes::params::{InvoiceListQuery, SortOrder},
    sequence::{DocumentKind, next_number},
    services::{document_service, quote_service},
    state::AppState,
};

/// Convert an approved quote into an invoice.
///
/// Precondition order matters and first failure wins: missing quote,
/// then ownership, then the idempotency guard, then the status check.
/// The whole effect is one transaction; the quote row lock rules out two
/// concurrent conversions both succeeding.
pub async fn convert_quote(
    state: &AppState,
    user: &AuthUser,
    quote_id: Uuid,
    ip: Option<&str>,
) -> AppResult<ApiResponse<InvoiceWithItems>> {
    let txn = state.orm.begin().await?;

    let quote = quote_service::find_locked(&txn, quote_id)
        .await?
        .ok_or(AppError::NotFound)?;
    policy::ensure_can_modify(user, &quote)?;

    if quote.converted {
        return Err(AppError::AlreadyConverted);
    }
    if QuoteStatus::parse(&quote.status)? != QuoteStatus::Approved {
        return Err(AppError::InvalidState(format!(
            "Only approved quotes can be converted, status is {}",
            quote.status
        )));
    }

    let number = next_number(&txn, quote.client_id, DocumentKind::Invoice).await?;

    let invoice = InvoiceActive {
        id: Set(Uuid::new_v4()),
        invoice_number: Set(number),
        client_id: Set(quote.client_id),
        total: Set(Decimal::ZERO),
        paid: Set(false),
        paid_at: Set(None),
        created_by: Set(user.user_id),
        marked_paid_by: Set(None),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let quote_items = crate::entity::quote_items::Entity::find()
        .filter(crate::entity::quote_items::Column::QuoteId.eq(quote.id))
        .order_by_asc(crate::entity::quote_items::Column::Position)
        .all(&txn)
        .await?;

    let mut total = Decimal::ZERO;
    let mut items: Vec<InvoiceItem> = Vec::with_capacity(quote_items.len());
    for source in &quote_items {
        total += source.unit_cost * source.quantity;
        let item = InvoiceItemActive {
            id: Set(Uuid::new_v4()),
            invoice_id: Set(invoice.id),
            position: Set(source.position),
            description: Set(source.description.clone()),
            unit_cost: Set(source.unit_cost),
            quantity: Set(source.quantity),
        }
        .insert(&txn)
        .await?;
        items.push(invoice_item_from_entity(item));
    }

    let mut invoice_active: InvoiceActive = invoice.into();
    invoice_active.total = Set(total);
    let invoice = invoice_active.update(&txn).await?;

    let mut quote_active: crate::entity::quotes::ActiveModel = quote.into();
    quote_active.converted = Set(true);
    quote_active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "quote_converted",
        Some("invoices"),
        Some(invoice.id),
        Some(format!("quote={quote_id} invoice={}", invoice.id)),
        ip,
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Quote converted",
        InvoiceWithItems {
            invoice: invoice_from_entity(invoice),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_invoices(
    state: &AppState,
    user: &AuthUser,
    query: InvoiceListQuery,
) -> AppResult<ApiResponse<InvoiceList>> {
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if !user.is_admin() {
        condition = condition.add(InvoiceCol::CreatedBy.eq(user.user_id));
    }
    if let Some(paid) = query.paid {
        condition = condition.add(InvoiceCol::Paid.eq(paid));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let mut finder = Invoices::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(InvoiceCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(InvoiceCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let invoices = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(invoice_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Ok",
        InvoiceList { items: invoices },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_invoice(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<InvoiceWithItems>> {
    let invoice = find_visible(state, user, id).await?;
    let items = items_for(state, invoice.id).await?;

    Ok(ApiResponse::success(
        "Ok",
        InvoiceWithItems {
            invoice: invoice_from_entity(invoice),
            items: items.into_iter().map(invoice_item_from_entity).collect(),
        },
        Some(Meta::empty()),
    ))
}

pub async fn mark_paid(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    ip: Option<&str>,
) -> AppResult<ApiResponse<Invoice>> {
    let invoice = Invoices::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    policy::ensure_can_modify(user, &invoice)?;

    if invoice.paid {
        return Err(AppError::InvalidState("Invoice is already paid".into()));
    }

    let mut active: InvoiceActive = invoice.into();
    active.paid = Set(true);
    active.paid_at = Set(Some(Utc::now().into()));
    active.marked_paid_by = Set(Some(user.user_id));
    let invoice = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "invoice_paid",
        Some("invoices"),
        Some(invoice.id),
        None,
        ip,
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Payment recorded",
        invoice_from_entity(invoice),
        Some(Meta::empty()),
    ))
}

/// Assemble and render the invoice as a PDF. Returns the bytes and a
/// suggested filename.
pub async fn invoice_pdf(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<(String, Vec<u8>)> {
    let (invoice, client, items) = load_for_rendering(state, user, id).await?;
    let view = document_service::build_invoice_view(&invoice, &client, &items);
    let bytes = render_document(&view)?;
    Ok((format!("{}.pdf", view.number), bytes))
}

/// Email the rendered invoice to the client. The invoice was committed
/// long before this; a mail failure is reported and changes nothing in
/// the record store.
pub async fn email_invoice(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    ip: Option<&str>,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let (invoice, client, items) = load_for_rendering(state, user, id).await?;
    let recipient = document_service::mail_recipient(&client)?;

    let view = document_service::build_invoice_view(&invoice, &client, &items);
    let bytes = render_document(&view)?;

    let email = OutboundEmail {
        to: recipient,
        subject: format!("Invoice {}", view.number),
        body: format!(
            "Dear {},\n\nPlease find your invoice attached.\n\nTotal: {:.2}\n\nThank you for your business.",
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
        "invoice_emailed",
        Some("invoices"),
        Some(invoice.id),
        Some(format!("to={}", email.to)),
        ip,
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Invoice emailed",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

async fn load_for_rendering(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<(InvoiceModel, ClientModel, Vec<InvoiceItemModel>)> {
    let invoice = find_visible(state, user, id).await?;
    let client = Clients::find_by_id(invoice.client_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let items = items_for(state, invoice.id).await?;
    Ok((invoice, client, items))
}

async fn find_visible(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<InvoiceModel> {
    let invoice = Invoices::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    policy::ensure_can_view(user, &invoice)?;
    Ok(invoice)
}

async fn items_for(state: &AppState, invoice_id: Uuid) -> AppResult<Vec<InvoiceItemModel>> {
    let items = InvoiceItems::find()
        .filter(InvoiceItemCol::InvoiceId.eq(invoice_id))
        .order_by_asc(InvoiceItemCol::Position)
        .all(&state.orm)
        .await?;
    Ok(items)
}

pub fn invoice_from_entity(model: InvoiceModel) -> Invoice {
    Invoice {
        id: model.id,
        invoice_number: model.invoice_number,
        client_id: model.client_id,
        total: model.total,
        paid: model.paid,
        paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
        created_by: model.created_by,
        marked_paid_by: model.marked_paid_by,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub fn invoice_item_from_entity(model: InvoiceItemModel) -> InvoiceItem {
    InvoiceItem {
        id: model.id,
        invoice_id: model.invoice_id,
        position: model.position,
        description: model.description,
        unit_cost: model.unit_cost,
        quantity: model.quantity,
    }
}
