use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::clients::{ClientHistory, ClientList, CreateClientRequest, UpdateClientRequest},
    error::AppResult,
    middleware::{auth::AuthUser, client_ip::ClientIp},
    models::Client,
    response::ApiResponse,
    services::client_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_client))
        .route("/", get(list_clients))
        .route("/{id}", get(get_client))
        .route("/{id}", put(update_client))
        .route("/{id}/history", get(client_history))
}

#[utoipa::path(
    post,
    path = "/api/clients",
    request_body = CreateClientRequest,
    responses(
        (status = 200, description = "Client created", body = ApiResponse<Client>)
    ),
    tag = "Clients"
)]
pub async fn create_client(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Json(payload): Json<CreateClientRequest>,
) -> AppResult<Json<ApiResponse<Client>>> {
    let resp = client_service::create_client(&state, &user, payload, ip.as_deref()).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/clients",
    responses(
        (status = 200, description = "List clients", body = ApiResponse<ClientList>)
    ),
    tag = "Clients"
)]
pub async fn list_clients(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<ClientList>>> {
    let resp = client_service::list_clients(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/clients/{id}",
    responses(
        (status = 200, description = "Client", body = ApiResponse<Client>),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Unknown client")
    ),
    tag = "Clients"
)]
pub async fn get_client(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Client>>> {
    let resp = client_service::get_client(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/clients/{id}",
    request_body = UpdateClientRequest,
    responses(
        (status = 200, description = "Client updated", body = ApiResponse<Client>)
    ),
    tag = "Clients"
)]
pub async fn update_client(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateClientRequest>,
) -> AppResult<Json<ApiResponse<Client>>> {
    let resp = client_service::update_client(&state, &user, id, payload, ip.as_deref()).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/clients/{id}/history",
    responses(
        (status = 200, description = "Client with quotes and invoices", body = ApiResponse<ClientHistory>)
    ),
    tag = "Clients"
)]
pub async fn client_history(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ClientHistory>>> {
    let resp = client_service::client_history(&state, &user, id).await?;
    Ok(Json(resp))
}
