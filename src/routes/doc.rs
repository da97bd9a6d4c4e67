use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginResponse, PasswordResetConfirm, PasswordResetRequest},
        clients::{ClientHistory, ClientList},
        invoices::{InvoiceList, InvoiceWithItems},
        quotes::{QuoteList, QuoteWithItems},
        services::ServiceList,
    },
    models::{Client, Invoice, InvoiceItem, Quote, QuoteItem, Service, User},
    response::{ApiResponse, Meta},
    routes::{auth, clients, dashboard, health, invoices, params, quotes, services},
    services::dashboard_service::DashboardCounts,
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::password_reset,
        auth::password_reset_confirm,
        clients::create_client,
        clients::list_clients,
        clients::get_client,
        clients::update_client,
        clients::client_history,
        services::create_service,
        services::list_services,
        services::get_service,
        services::update_service,
        quotes::create_quote,
        quotes::list_quotes,
        quotes::get_quote,
        quotes::delete_quote,
        quotes::set_status,
        quotes::convert_quote,
        quotes::quote_pdf,
        quotes::email_quote,
        invoices::list_invoices,
        invoices::get_invoice,
        invoices::mark_paid,
        invoices::invoice_pdf,
        invoices::email_invoice,
        dashboard::dashboard
    ),
    components(
        schemas(
            User,
            Client,
            Service,
            Quote,
            QuoteItem,
            Invoice,
            InvoiceItem,
            LoginResponse,
            PasswordResetRequest,
            PasswordResetConfirm,
            ClientList,
            ClientHistory,
            ServiceList,
            QuoteList,
            QuoteWithItems,
            InvoiceList,
            InvoiceWithItems,
            DashboardCounts,
            params::Pagination,
            params::QuoteListQuery,
            params::InvoiceListQuery,
            params::ServiceListQuery,
            Meta,
            ApiResponse<Client>,
            ApiResponse<ClientList>,
            ApiResponse<QuoteWithItems>,
            ApiResponse<QuoteList>,
            ApiResponse<InvoiceWithItems>,
            ApiResponse<InvoiceList>,
            ApiResponse<DashboardCounts>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Clients", description = "Client endpoints"),
        (name = "Services", description = "Service catalog endpoints"),
        (name = "Quotes", description = "Quote endpoints"),
        (name = "Invoices", description = "Invoice endpoints"),
        (name = "Dashboard", description = "Dashboard endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
