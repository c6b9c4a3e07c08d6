//! PDF invoice rendering
//!
//! Single A4 page using the built-in Helvetica font, so no font files are
//! needed at runtime.

use chrono::{TimeZone, Utc};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, StringFormat, dictionary};
use shared::error::{AppError, AppResult};

use super::money::format_amount;
use crate::db::models::Order;

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: f32 = 50.0;
const LINE_HEIGHT: f32 = 16.0;
/// Lines listed before the remainder is summarized
const MAX_LISTED_ITEMS: usize = 28;

/// Accumulates text operations top to bottom
struct PageWriter {
    operations: Vec<Operation>,
    y: f32,
}

impl PageWriter {
    fn new() -> Self {
        Self {
            operations: Vec::new(),
            y: PAGE_HEIGHT as f32 - MARGIN,
        }
    }

    fn text(&mut self, x: f32, size: f32, value: &str) {
        self.operations.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), size.into()]),
            Operation::new("Td", vec![x.into(), self.y.into()]),
            Operation::new("Tj", vec![Object::String(pdf_text(value), StringFormat::Literal)]),
            Operation::new("ET", vec![]),
        ]);
    }

    fn line(&mut self, size: f32, value: &str) {
        self.text(MARGIN, size, value);
        self.advance(1.0);
    }

    fn advance(&mut self, lines: f32) {
        self.y -= LINE_HEIGHT * lines;
    }

    fn rule(&mut self) {
        let y = self.y + LINE_HEIGHT / 2.0;
        self.operations.extend([
            Operation::new("m", vec![MARGIN.into(), y.into()]),
            Operation::new("l", vec![(PAGE_WIDTH as f32 - MARGIN).into(), y.into()]),
            Operation::new("S", vec![]),
        ]);
        self.advance(0.5);
    }
}

/// Latin-1 bytes for the WinAnsi-encoded font; anything else becomes `?`
fn pdf_text(value: &str) -> Vec<u8> {
    value
        .chars()
        .map(|c| match u8::try_from(u32::from(c)) {
            Ok(byte) if !c.is_control() => byte,
            _ => b'?',
        })
        .collect()
}

fn format_date(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Render `order` as a PDF document
pub fn render_invoice(order: &Order, shop_name: &str) -> AppResult<Vec<u8>> {
    let mut page = PageWriter::new();

    page.line(20.0, shop_name);
    page.line(14.0, &format!("Invoice {}", order.order_number));
    page.advance(0.5);
    page.line(10.0, &format!("Date: {}", format_date(order.created_at)));
    page.line(
        10.0,
        &format!("Customer: {} <{}>", order.customer.name, order.customer.email),
    );
    let address = &order.shipping_address;
    page.line(
        10.0,
        &format!(
            "Ship to: {}, {}, {} {}",
            address.street, address.city, address.island, address.postal_code
        ),
    );
    page.line(
        10.0,
        &format!(
            "Payment: {} ({})",
            order.payment_method.label(),
            order.payment_status.as_str()
        ),
    );
    page.advance(1.0);

    let columns = [MARGIN, 330.0, 400.0, 480.0];
    for (x, title) in columns.iter().zip(["Item", "Qty", "Unit", "Amount"]) {
        page.text(*x, 10.0, title);
    }
    page.advance(1.0);
    page.rule();

    for item in order.items.iter().take(MAX_LISTED_ITEMS) {
        let amount = super::money::to_f64(super::money::line_total(item.price, item.quantity));
        page.text(columns[0], 10.0, &item.name);
        page.text(columns[1], 10.0, &item.quantity.to_string());
        page.text(columns[2], 10.0, &format_amount(item.price));
        page.text(columns[3], 10.0, &format_amount(amount));
        page.advance(1.0);
    }
    if order.items.len() > MAX_LISTED_ITEMS {
        page.line(
            10.0,
            &format!("... and {} more items", order.items.len() - MAX_LISTED_ITEMS),
        );
    }

    page.rule();
    page.text(columns[2], 12.0, "Total");
    page.text(columns[3], 12.0, &format_amount(order.total_price));
    page.advance(2.0);
    if order.is_paid {
        page.line(10.0, "Paid - thank you!");
    }

    build_document(page.operations)
}

fn build_document(operations: Vec<Operation>) -> AppResult<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let content = Content { operations };
    let encoded = content
        .encode()
        .map_err(|e| AppError::internal(format!("Failed to encode invoice: {e}")))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut buf = Vec::new();
    doc.save_to(&mut buf)
        .map_err(|e| AppError::internal(format!("Failed to write invoice: {e}")))?;
    Ok(buf)
}
