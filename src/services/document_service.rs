//! Builds the renderable view of a quote or invoice: ordered line rows,
//! subtotal and grand total, plus the human-facing document number. Layout
//! is entirely the renderer's business (`pdf.rs`).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{
    entity::{clients, invoice_items, invoices, quote_items, quotes},
    error::{AppError, AppResult},
};

#[derive(Debug, Clone)]
pub struct LineRow {
    pub index: usize,
    pub description: String,
    pub unit_cost: Decimal,
    pub quantity: Decimal,
    pub amount: Decimal,
}

#[derive(Debug, Clone)]
pub struct BillTo {
    pub name: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub vat_number: Option<String>,
    pub payment_terms: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DocumentView {
    pub title: &'static str,
    pub number: String,
    pub issued_on: DateTime<Utc>,
    pub bill_to: BillTo,
    pub rows: Vec<LineRow>,
    pub subtotal: Decimal,
    /// Disabled switch; always `None` until tax support is turned on.
    pub tax_rate: Option<Decimal>,
    pub total: Decimal,
}

pub fn quote_label(number: i32) -> String {
    format!("Q-{number:04}")
}

pub fn invoice_label(client_code: &str, number: i32) -> String {
    format!("{client_code}-INV-{number:04}")
}

pub fn build_quote_view(
    quote: &quotes::Model,
    client: &clients::Model,
    items: &[quote_items::Model],
) -> DocumentView {
    let rows = items
        .iter()
        .map(|i| (i.description.clone(), i.unit_cost, i.quantity));
    assemble(
        "QUOTE",
        quote_label(quote.quote_number),
        quote.created_at.with_timezone(&Utc),
        client,
        rows,
    )
}

pub fn build_invoice_view(
    invoice: &invoices::Model,
    client: &clients::Model,
    items: &[invoice_items::Model],
) -> DocumentView {
    let rows = items
        .iter()
        .map(|i| (i.description.clone(), i.unit_cost, i.quantity));
    assemble(
        "INVOICE",
        invoice_label(&client.client_code, invoice.invoice_number),
        invoice.created_at.with_timezone(&Utc),
        client,
        rows,
    )
}

/// Pick the address a document should be emailed to. Billing overrides win
/// over the client's base contact email.
pub fn mail_recipient(client: &clients::Model) -> AppResult<String> {
    client
        .billing_email
        .clone()
        .or_else(|| client.email.clone())
        .ok_or_else(|| AppError::Validation("Client has no email address".into()))
}

fn assemble(
    title: &'static str,
    number: String,
    issued_on: DateTime<Utc>,
    client: &clients::Model,
    items: impl IntoIterator<Item = (String, Decimal, Decimal)>,
) -> DocumentView {
    let mut rows = Vec::new();
    let mut subtotal = Decimal::ZERO;
    for (index, (description, unit_cost, quantity)) in items.into_iter().enumerate() {
        let amount = unit_cost * quantity;
        subtotal += amount;
        rows.push(LineRow {
            index: index + 1,
            description,
            unit_cost,
            quantity,
            amount,
        });
    }

    let bill_to = BillTo {
        name: client
            .billing_name
            .clone()
            .unwrap_or_else(|| client.name.clone()),
        email: client.billing_email.clone().or_else(|| client.email.clone()),
        address: client
            .billing_address
            .clone()
            .or_else(|| client.address.clone()),
        vat_number: client.vat_number.clone(),
        payment_terms: client.payment_terms.clone(),
    };

    DocumentView {
        title,
        number,
        issued_on,
        bill_to,
        rows,
        subtotal,
        tax_rate: None,
        total: subtotal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn client() -> clients::Model {
        clients::Model {
            id: Uuid::new_v4(),
            name: "Acme Corp".into(),
            email: Some("info@acme.test".into()),
            phone: None,
            address: Some("1 Acme Way".into()),
            client_code: "ACM".into(),
            billing_name: None,
            billing_email: None,
            billing_address: None,
            vat_number: None,
            tax_number: None,
            payment_terms: None,
            created_by: Uuid::new_v4(),
            created_at: Utc::now().into(),
        }
    }

    fn item(position: i32, description: &str, unit_cost: Decimal, quantity: Decimal) -> quote_items::Model {
        quote_items::Model {
            id: Uuid::new_v4(),
            quote_id: Uuid::new_v4(),
            position,
            description: description.into(),
            unit_cost,
            quantity,
        }
    }

    fn quote(number: i32) -> quotes::Model {
        quotes::Model {
            id: Uuid::new_v4(),
            quote_number: number,
            client_id: Uuid::new_v4(),
            total: dec!(250),
            status: "approved".into(),
            converted: false,
            created_by: Uuid::new_v4(),
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn quote_numbers_are_zero_padded() {
        assert_eq!(quote_label(7), "Q-0007");
        assert_eq!(quote_label(12345), "Q-12345");
    }

    #[test]
    fn invoice_numbers_carry_the_client_code() {
        assert_eq!(invoice_label("ACM", 42), "ACM-INV-0042");
    }

    #[test]
    fn view_sums_line_amounts_in_order() {
        let items = vec![
            item(1, "Setup", dec!(100), dec!(2)),
            item(2, "Support", dec!(50), dec!(1)),
        ];
        let view = build_quote_view(&quote(1), &client(), &items);

        assert_eq!(view.title, "QUOTE");
        assert_eq!(view.number, "Q-0001");
        assert_eq!(view.rows.len(), 2);
        assert_eq!(view.rows[0].index, 1);
        assert_eq!(view.rows[0].amount, dec!(200));
        assert_eq!(view.rows[1].description, "Support");
        assert_eq!(view.subtotal, dec!(250));
        assert_eq!(view.total, dec!(250));
    }

    #[test]
    fn tax_defaults_off() {
        let view = build_quote_view(&quote(1), &client(), &[]);
        assert!(view.tax_rate.is_none());
        assert_eq!(view.total, view.subtotal);
    }

    #[test]
    fn fractional_quantities_are_exact() {
        let items = vec![item(1, "Consulting", dec!(80), dec!(2.5))];
        let view = build_quote_view(&quote(3), &client(), &items);
        assert_eq!(view.total, dec!(200));
    }

    #[test]
    fn billing_overrides_win() {
        let mut c = client();
        c.billing_name = Some("Acme Holdings".into());
        c.billing_email = Some("ap@acme.test".into());
        let view = build_quote_view(&quote(1), &c, &[]);
        assert_eq!(view.bill_to.name, "Acme Holdings");
        assert_eq!(view.bill_to.email.as_deref(), Some("ap@acme.test"));
        assert_eq!(mail_recipient(&c).unwrap(), "ap@acme.test");
    }

    #[test]
    fn recipient_requires_some_email() {
        let mut c = client();
        c.email = None;
        assert!(matches!(
            mail_recipient(&c),
            Err(AppError::Validation(_))
        ));
    }
}
