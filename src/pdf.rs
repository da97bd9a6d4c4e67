//! PDF rendering of an assembled [`DocumentView`] with genpdf. Fonts are
//! loaded from `./fonts` (Roboto, same layout as the deployment image).

use genpdf::{Alignment, Element, elements, style};

use crate::{
    error::{AppError, AppResult},
    services::document_service::DocumentView,
};

const FONT_DIR: &str = "./fonts";
const FONT_NAME: &str = "Roboto";

pub fn render_document(view: &DocumentView) -> AppResult<Vec<u8>> {
    let font_family = genpdf::fonts::from_files(FONT_DIR, FONT_NAME, None)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("font load failed: {e}")))?;

    let mut doc = genpdf::Document::new(font_family);
    doc.set_title(format!("{} {}", view.title, view.number));
    let mut decorator = genpdf::SimplePageDecorator::new();
    decorator.set_margins(10);
    doc.set_page_decorator(decorator);

    doc.push(
        elements::Paragraph::new(view.title)
            .styled(style::Style::new().bold().with_font_size(18)),
    );
    doc.push(elements::Paragraph::new(format!("No: {}", view.number)));
    doc.push(elements::Paragraph::new(format!(
        "Date: {}",
        view.issued_on.format("%Y-%m-%d")
    )));
    doc.push(elements::Break::new(1.5));

    doc.push(
        elements::Paragraph::new("Billed To")
            .styled(style::Style::new().bold().with_font_size(12)),
    );
    doc.push(elements::Paragraph::new(view.bill_to.name.clone()));
    if let Some(address) = &view.bill_to.address {
        doc.push(elements::Paragraph::new(address.clone()));
    }
    if let Some(email) = &view.bill_to.email {
        doc.push(elements::Paragraph::new(email.clone()));
    }
    if let Some(vat) = &view.bill_to.vat_number {
        doc.push(elements::Paragraph::new(format!("VAT: {vat}")));
    }
    doc.push(elements::Break::new(2));

    let mut table = elements::TableLayout::new(vec![1, 5, 2, 2, 2]);
    table.set_cell_decorator(elements::FrameCellDecorator::new(true, true, false));

    let bold = style::Style::new().bold();
    table
        .row()
        .element(elements::Paragraph::new("#").styled(bold))
        .element(elements::Paragraph::new("Description").styled(bold))
        .element(elements::Paragraph::new("Unit").styled(bold))
        .element(elements::Paragraph::new("Qty").styled(bold))
        .element(elements::Paragraph::new("Amount").styled(bold))
        .push()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("table layout failed: {e}")))?;

    for row in &view.rows {
        table
            .row()
            .element(elements::Paragraph::new(row.index.to_string()))
            .element(elements::Paragraph::new(row.description.clone()))
            .element(elements::Paragraph::new(format!("{:.2}", row.unit_cost)))
            .element(elements::Paragraph::new(format!("{}", row.quantity.normalize())))
            .element(elements::Paragraph::new(format!("{:.2}", row.amount)))
            .push()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("table layout failed: {e}")))?;
    }

    doc.push(table);
    doc.push(elements::Break::new(2));

    let mut subtotal = elements::Paragraph::new(format!("Subtotal: {:.2}", view.subtotal));
    subtotal.set_alignment(Alignment::Right);
    doc.push(subtotal);

    let mut total = elements::Paragraph::new(format!("TOTAL: {:.2}", view.total));
    total.set_alignment(Alignment::Right);
    doc.push(total.styled(style::Style::new().bold().with_font_size(12)));

    if let Some(terms) = &view.bill_to.payment_terms {
        doc.push(elements::Break::new(2));
        doc.push(
            elements::Paragraph::new(format!("Payment terms: {terms}"))
                .styled(style::Style::new().italic().with_font_size(8)),
        );
    }

    let mut buffer = Vec::new();
    doc.render(&mut buffer)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("pdf render failed: {e}")))?;

    Ok(buffer)
}
