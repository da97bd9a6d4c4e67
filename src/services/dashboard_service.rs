use sea_orm::{ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    entity::{
        invoices::{Column as InvoiceCol, Entity as Invoices},
        quotes::{Column as QuoteCol, Entity as Quotes},
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::QuoteStatus,
    response::{ApiResponse, Meta},
    state::AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardCounts {
    pub total_quotes: u64,
    pub approved_quotes: u64,
    pub converted_quotes: u64,
    pub total_invoices: u64,
    pub paid_invoices: u64,
    pub unpaid_invoices: u64,
}

pub async fn dashboard(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<DashboardCounts>> {
    let quote_scope = || {
        let mut condition = Condition::all();
        if !user.is_admin() {
            condition = condition.add(QuoteCol::CreatedBy.eq(user.user_id));
        }
        condition
    };
    let invoice_scope = || {
        let mut condition = Condition::all();
        if !user.is_admin() {
            condition = condition.add(InvoiceCol::CreatedBy.eq(user.user_id));
        }
        condition
    };

    let counts = DashboardCounts {
        total_quotes: Quotes::find().filter(quote_scope()).count(&state.orm).await?,
        approved_quotes: Quotes::find()
            .filter(quote_scope().add(QuoteCol::Status.eq(QuoteStatus::Approved.as_str())))
            .count(&state.orm)
            .await?,
        converted_quotes: Quotes::find()
            .filter(quote_scope().add(QuoteCol::Converted.eq(true)))
            .count(&state.orm)
            .await?,
        total_invoices: Invoices::find()
            .filter(invoice_scope())
            .count(&state.orm)
            .await?,
        paid_invoices: Invoices::find()
            .filter(invoice_scope().add(InvoiceCol::Paid.eq(true)))
            .count(&state.orm)
            .await?,
        unpaid_invoices: Invoices::find()
            .filter(invoice_scope().add(InvoiceCol::Paid.eq(false)))
            .count(&state.orm)
            .await?,
    };

    Ok(ApiResponse::success("Ok", counts, Some(Meta::empty())))
}
