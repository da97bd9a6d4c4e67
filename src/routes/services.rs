use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::services::{CreateServiceRequest, ServiceList, UpdateServiceRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Service,
    response::ApiResponse,
    routes::params::ServiceListQuery,
    services::catalog_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_service))
        .route("/", get(list_services))
        .route("/{id}", get(get_service))
        .route("/{id}", put(update_service))
}

#[utoipa::path(
    post,
    path = "/api/services",
    request_body = CreateServiceRequest,
    responses(
        (status = 200, description = "Catalog entry created", body = ApiResponse<Service>),
        (status = 403, description = "Admin only")
    ),
    tag = "Services"
)]
pub async fn create_service(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateServiceRequest>,
) -> AppResult<Json<ApiResponse<Service>>> {
    let resp = catalog_service::create_service(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/services",
    params(
        ("include_inactive" = Option<bool>, Query, description = "Include retired entries"),
        ("category" = Option<String>, Query, description = "Filter by category"),
    ),
    responses(
        (status = 200, description = "List catalog entries", body = ApiResponse<ServiceList>)
    ),
    tag = "Services"
)]
pub async fn list_services(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<ServiceListQuery>,
) -> AppResult<Json<ApiResponse<ServiceList>>> {
    let resp = catalog_service::list_services(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/services/{id}",
    responses(
        (status = 200, description = "Catalog entry", body = ApiResponse<Service>)
    ),
    tag = "Services"
)]
pub async fn get_service(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Service>>> {
    let resp = catalog_service::get_service(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/services/{id}",
    request_body = UpdateServiceRequest,
    responses(
        (status = 200, description = "Catalog entry updated", body = ApiResponse<Service>),
        (status = 403, description = "Admin only")
    ),
    tag = "Services"
)]
pub async fn update_service(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateServiceRequest>,
) -> AppResult<Json<ApiResponse<Service>>> {
    let resp = catalog_service::update_service(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
