use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::{Client, Invoice, Quote};

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateClientRequest {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    #[validate(email(message = "email must be a valid address"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub billing_name: Option<String>,
    #[validate(email(message = "billing email must be a valid address"))]
    pub billing_email: Option<String>,
    pub billing_address: Option<String>,
    pub vat_number: Option<String>,
    pub tax_number: Option<String>,
    pub payment_terms: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateClientRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub billing_name: Option<String>,
    pub billing_email: Option<String>,
    pub billing_address: Option<String>,
    pub vat_number: Option<String>,
    pub tax_number: Option<String>,
    pub payment_terms: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClientList {
    pub items: Vec<Client>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClientHistory {
    pub client: Client,
    pub quotes: Vec<Quote>,
    pub invoices: Vec<Invoice>,
}
