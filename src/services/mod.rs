pub mod auth_service;
pub mod catalog_service;
pub mod client_service;
pub mod dashboard_service;
pub mod document_service;
pub mod invoice_service;
pub mod quote_service;
