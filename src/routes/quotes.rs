use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::{delete, get, post},
};
use uuid::Uuid;

use crate::{
    dto::quotes::{CreateQuoteRequest, QuoteList, QuoteWithItems, SetQuoteStatusRequest},
    dto::invoices::InvoiceWithItems,
    error::AppResult,
    middleware::{auth::AuthUser, client_ip::ClientIp},
    models::Quote,
    response::ApiResponse,
    routes::params::QuoteListQuery,
    services::{invoice_service, quote_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_quote))
        .route("/", get(list_quotes))
        .route("/{id}", get(get_quote))
        .route("/{id}", delete(delete_quote))
        .route("/{id}/status", post(set_status))
        .route("/{id}/convert", post(convert_quote))
        .route("/{id}/pdf", get(quote_pdf))
        .route("/{id}/email", post(email_quote))
}

#[utoipa::path(
    post,
    path = "/api/quotes",
    request_body = CreateQuoteRequest,
    responses(
        (status = 200, description = "Quote created with its items", body = ApiResponse<QuoteWithItems>),
        (status = 400, description = "Empty item list or non-positive amounts")
    ),
    tag = "Quotes"
)]
pub async fn create_quote(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Json(payload): Json<CreateQuoteRequest>,
) -> AppResult<Json<ApiResponse<QuoteWithItems>>> {
    let resp = quote_service::create_quote(&state, &user, payload, ip.as_deref()).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/quotes",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by status"),
    ),
    responses(
        (status = 200, description = "List quotes", body = ApiResponse<QuoteList>)
    ),
    tag = "Quotes"
)]
pub async fn list_quotes(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<QuoteListQuery>,
) -> AppResult<Json<ApiResponse<QuoteList>>> {
    let resp = quote_service::list_quotes(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/quotes/{id}",
    responses(
        (status = 200, description = "Quote with items", body = ApiResponse<QuoteWithItems>)
    ),
    tag = "Quotes"
)]
pub async fn get_quote(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<QuoteWithItems>>> {
    let resp = quote_service::get_quote(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/quotes/{id}",
    responses(
        (status = 200, description = "Quote and its items deleted"),
        (status = 409, description = "Converted quotes cannot be deleted")
    ),
    tag = "Quotes"
)]
pub async fn delete_quote(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = quote_service::delete_quote(&state, &user, id, ip.as_deref()).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/quotes/{id}/status",
    request_body = SetQuoteStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<Quote>),
        (status = 409, description = "Transition not allowed")
    ),
    tag = "Quotes"
)]
pub async fn set_status(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetQuoteStatusRequest>,
) -> AppResult<Json<ApiResponse<Quote>>> {
    let resp = quote_service::set_status(&state, &user, id, payload.status, ip.as_deref()).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/quotes/{id}/convert",
    responses(
        (status = 200, description = "Invoice created from the quote", body = ApiResponse<InvoiceWithItems>),
        (status = 409, description = "Already converted or not approved")
    ),
    tag = "Quotes"
)]
pub async fn convert_quote(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<InvoiceWithItems>>> {
    let resp = invoice_service::convert_quote(&state, &user, id, ip.as_deref()).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/quotes/{id}/pdf",
    responses(
        (status = 200, description = "Rendered PDF", content_type = "application/pdf")
    ),
    tag = "Quotes"
)]
pub async fn quote_pdf(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let (filename, bytes) = quote_service::quote_pdf(&state, &user, id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    ))
}

#[utoipa::path(
    post,
    path = "/api/quotes/{id}/email",
    responses(
        (status = 200, description = "Quote emailed to the client"),
        (status = 502, description = "Mail provider failure")
    ),
    tag = "Quotes"
)]
pub async fn email_quote(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = quote_service::email_quote(&state, &user, id, ip.as_deref()).await?;
    Ok(Json(resp))
}
