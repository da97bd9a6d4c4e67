use axum::Router;

use crate::state::AppState;

pub mod auth;
pub mod clients;
pub mod dashboard;
pub mod doc;
pub mod health;
pub mod invoices;
pub mod params;
pub mod quotes;
pub mod services;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/clients", clients::router())
        .nest("/services", services::router())
        .nest("/quotes", quotes::router())
        .nest("/invoices", invoices::router())
        .nest("/dashboard", dashboard::router())
}
