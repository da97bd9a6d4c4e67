use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub client_code: String,
    pub billing_name: Option<String>,
    pub billing_email: Option<String>,
    pub billing_address: Option<String>,
    pub vat_number: Option<String>,
    pub tax_number: Option<String>,
    pub payment_terms: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Catalog entry used to pre-fill quote items. Line items are copied by
/// value; nothing links back here afterwards.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub category: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Draft,
    Sent,
    Approved,
    Rejected,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Draft => "draft",
            QuoteStatus::Sent => "sent",
            QuoteStatus::Approved => "approved",
            QuoteStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "draft" => Ok(QuoteStatus::Draft),
            "sent" => Ok(QuoteStatus::Sent),
            "approved" => Ok(QuoteStatus::Approved),
            "rejected" => Ok(QuoteStatus::Rejected),
            other => Err(AppError::Validation(format!(
                "Unknown quote status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Quote {
    pub id: Uuid,
    pub quote_number: i32,
    pub client_id: Uuid,
    pub total: Decimal,
    pub status: QuoteStatus,
    pub converted: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QuoteItem {
    pub id: Uuid,
    pub quote_id: Uuid,
    pub position: i32,
    pub description: String,
    pub unit_cost: Decimal,
    pub quantity: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Invoice {
    pub id: Uuid,
    pub invoice_number: i32,
    pub client_id: Uuid,
    pub total: Decimal,
    pub paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub marked_paid_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InvoiceItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub position: i32,
    pub description: String,
    pub unit_cost: Decimal,
    pub quantity: Decimal,
}
