use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::invoices::{InvoiceList, InvoiceWithItems},
    error::AppResult,
    middleware::{auth::AuthUser, client_ip::ClientIp},
    models::Invoice,
    response::ApiResponse,
    routes::params::InvoiceListQuery,
    services::invoice_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_invoices))
        .route("/{id}", get(get_invoice))
        .route("/{id}/paid", post(mark_paid))
        .route("/{id}/pdf", get(invoice_pdf))
        .route("/{id}/email", post(email_invoice))
}

#[utoipa::path(
    get,
    path = "/api/invoices",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("paid" = Option<bool>, Query, description = "Filter by paid flag"),
    ),
    responses(
        (status = 200, description = "List invoices", body = ApiResponse<InvoiceList>)
    ),
    tag = "Invoices"
)]
pub async fn list_invoices(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<InvoiceListQuery>,
) -> AppResult<Json<ApiResponse<InvoiceList>>> {
    let resp = invoice_service::list_invoices(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/invoices/{id}",
    responses(
        (status = 200, description = "Invoice with items", body = ApiResponse<InvoiceWithItems>)
    ),
    tag = "Invoices"
)]
pub async fn get_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<InvoiceWithItems>>> {
    let resp = invoice_service::get_invoice(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/invoices/{id}/paid",
    responses(
        (status = 200, description = "Payment recorded", body = ApiResponse<Invoice>),
        (status = 409, description = "Invoice already paid")
    ),
    tag = "Invoices"
)]
pub async fn mark_paid(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Invoice>>> {
    let resp = invoice_service::mark_paid(&state, &user, id, ip.as_deref()).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/invoices/{id}/pdf",
    responses(
        (status = 200, description = "Rendered PDF", content_type = "application/pdf")
    ),
    tag = "Invoices"
)]
pub async fn invoice_pdf(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let (filename, bytes) = invoice_service::invoice_pdf(&state, &user, id).await?;
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
    path = "/api/invoices/{id}/email",
    responses(
        (status = 200, description = "Invoice emailed to the client"),
        (status = 502, description = "Mail provider failure; the invoice itself is unaffected")
    ),
    tag = "Invoices"
)]
pub async fn email_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = invoice_service::email_invoice(&state, &user, id, ip.as_deref()).await?;
    Ok(Json(resp))
}
