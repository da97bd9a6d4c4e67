use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Quote, QuoteItem, QuoteStatus};

#[derive(Debug, Deserialize, ToSchema)]
pub struct QuoteItemInput {
    pub description: String,
    pub unit_cost: Decimal,
    pub quantity: Decimal,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateQuoteRequest {
    pub client_id: Uuid,
    pub items: Vec<QuoteItemInput>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetQuoteStatusRequest {
    pub status: QuoteStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QuoteList {
    pub items: Vec<Quote>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QuoteWithItems {
    pub quote: Quote,
    pub items: Vec<QuoteItem>,
}
