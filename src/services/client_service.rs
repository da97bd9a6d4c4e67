use chrono::Utc;
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit::log_audit,
    client_code::generate_code,
    dto::clients::{ClientHistory, ClientList, CreateClientRequest, UpdateClientRequest},
    entity::{
        clients::{ActiveModel as ClientActive, Column as ClientCol, Entity as Clients, Model as ClientModel},
        invoices::{Column as InvoiceCol, Entity as Invoices},
        quotes::{Column as QuoteCol, Entity as Quotes},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Client,
    policy,
    response::{ApiResponse, Meta},
    services::{invoice_service::invoice_from_entity, quote_service::quote_from_entity},
    state::AppState,
};

// Two creates racing on the same name prefix can both pick the same code;
// the unique index rejects the loser, which retries with a fresh read.
const CODE_ASSIGN_ATTEMPTS: u32 = 3;

pub async fn create_client(
    state: &AppState,
    user: &AuthUser,
    payload: CreateClientRequest,
    ip: Option<&str>,
) -> AppResult<ApiResponse<Client>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let mut attempt = 0;
    let client = loop {
        attempt += 1;
        let txn = state.orm.begin().await?;

        let existing_codes: Vec<String> = Clients::find()
            .select_only()
            .column(ClientCol::ClientCode)
            .into_tuple()
            .all(&txn)
            .await?;
        let code = generate_code(
            &payload.name,
            existing_codes.iter().map(String::as_str),
        );

        let inserted = ClientActive {
            id: Set(Uuid::new_v4()),
            name: Set(payload.name.clone()),
            email: Set(payload.email.clone()),
            phone: Set(payload.phone.clone()),
            address: Set(payload.address.clone()),
            client_code: Set(code),
            billing_name: Set(payload.billing_name.clone()),
            billing_email: Set(payload.billing_email.clone()),
            billing_address: Set(payload.billing_address.clone()),
            vat_number: Set(payload.vat_number.clone()),
            tax_number: Set(payload.tax_number.clone()),
            payment_terms: Set(payload.payment_terms.clone()),
            created_by: Set(user.user_id),
            created_at: NotSet,
        }
        .insert(&txn)
        .await;

        match inserted {
            Ok(client) => {
                txn.commit().await?;
                break client;
            }
            Err(err) if is_unique_violation(&err) && attempt < CODE_ASSIGN_ATTEMPTS => {
                tracing::debug!(attempt, "client code taken, regenerating");
                txn.rollback().await?;
            }
            Err(err) if is_unique_violation(&err) => {
                return Err(AppError::Validation(
                    "Could not assign a unique client code, try again".into(),
                ));
            }
            Err(err) => return Err(err.into()),
        }
    };

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "client_created",
        Some("clients"),
        Some(client.id),
        Some(format!("code={}", client.client_code)),
        ip,
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Client created",
        client_from_entity(client),
        Some(Meta::empty()),
    ))
}

pub async fn list_clients(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<ClientList>> {
    let mut condition = Condition::all();
    if !user.is_admin() {
        condition = condition.add(ClientCol::CreatedBy.eq(user.user_id));
    }

    let clients = Clients::find()
        .filter(condition)
        .order_by_asc(ClientCol::Name)
        .all(&state.orm)
        .await?;

    let total = clients.len() as i64;
    let items = clients.into_iter().map(client_from_entity).collect();

    Ok(ApiResponse::success(
        "Ok",
        ClientList { items },
        Some(Meta::new(1, total, total)),
    ))
}

pub async fn get_client(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Client>> {
    let client = find_visible(state, user, id).await?;
    Ok(ApiResponse::success(
        "Ok",
        client_from_entity(client),
        Some(Meta::empty()),
    ))
}

pub async fn update_client(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateClientRequest,
    ip: Option<&str>,
) -> AppResult<ApiResponse<Client>> {
    let client = Clients::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    policy::ensure_can_modify(user, &client)?;

    // client_code is derived at creation and never regenerated; renaming a
    // client keeps its code stable on existing documents.
    let mut active: ClientActive = client.into();
    if let Some(name) = payload.name {
        if name.is_empty() {
            return Err(AppError::Validation("name must not be empty".into()));
        }
        active.name = Set(name);
    }
    if let Some(email) = payload.email {
        active.email = Set(Some(email));
    }
    if let Some(phone) = payload.phone {
        active.phone = Set(Some(phone));
    }
    if let Some(address) = payload.address {
        active.address = Set(Some(address));
    }
    if let Some(billing_name) = payload.billing_name {
        active.billing_name = Set(Some(billing_name));
    }
    if let Some(billing_email) = payload.billing_email {
        active.billing_email = Set(Some(billing_email));
    }
    if let Some(billing_address) = payload.billing_address {
        active.billing_address = Set(Some(billing_address));
    }
    if let Some(vat_number) = payload.vat_number {
        active.vat_number = Set(Some(vat_number));
    }
    if let Some(tax_number) = payload.tax_number {
        active.tax_number = Set(Some(tax_number));
    }
    if let Some(payment_terms) = payload.payment_terms {
        active.payment_terms = Set(Some(payment_terms));
    }

    let client = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "client_updated",
        Some("clients"),
        Some(client.id),
        None,
        ip,
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Client updated",
        client_from_entity(client),
        Some(Meta::empty()),
    ))
}

/// The client view with every quote and invoice issued to it.
pub async fn client_history(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<ClientHistory>> {
    let client = find_visible(state, user, id).await?;

    let quotes = Quotes::find()
        .filter(QuoteCol::ClientId.eq(id))
        .order_by_asc(QuoteCol::QuoteNumber)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(quote_from_entity)
        .collect::<Result<Vec<_>, _>>()?;

    let invoices = Invoices::find()
        .filter(InvoiceCol::ClientId.eq(id))
        .order_by_asc(InvoiceCol::InvoiceNumber)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(invoice_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Ok",
        ClientHistory {
            client: client_from_entity(client),
            quotes,
            invoices,
        },
        Some(Meta::empty()),
    ))
}

pub(crate) async fn find_visible(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ClientModel> {
    let client = Clients::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    policy::ensure_can_view(user, &client)?;
    Ok(client)
}

fn is_unique_violation(err: &sea_orm::DbErr) -> bool {
    matches!(
        err.sql_err(),
        Some(sea_orm::SqlErr::UniqueConstraintViolation(_))
    )
}

pub fn client_from_entity(model: ClientModel) -> Client {
    Client {
        id: model.id,
        name: model.name,
        email: model.email,
        phone: model.phone,
        address: model.address,
        client_code: model.client_code,
        billing_name: model.billing_name,
        billing_email: model.billing_email,
        billing_address: model.billing_address,
        vat_number: model.vat_number,
        tax_number: model.tax_number,
        payment_terms: model.payment_terms,
        created_by: model.created_by,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
