//! Printable order invoice.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Path, State};
use rust_decimal::Decimal;
use tracing::instrument;

use partsdesk_core::{InvoiceTotals, OrderId};

use super::find_order;
use crate::error::AppError;
use crate::filters;
use crate::middleware::RequireStaff;
use crate::models::Order;
use crate::routes::barcode_svg;
use crate::state::AppState;

/// One invoice line.
#[derive(Debug, Clone)]
pub struct PrintItemView {
    pub description: String,
    pub sku: String,
    pub quantity: i32,
    pub price: Decimal,
    pub amount: Decimal,
}

/// Invoice print template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/print_invoice.html")]
pub struct OrderInvoiceTemplate {
    pub number: String,
    pub order: Order,
    pub items: Vec<PrintItemView>,
    pub shipping_lines: Vec<String>,
    pub billing_lines: Vec<String>,
    pub totals: InvoiceTotals,
    pub barcode_svg: String,
    pub printed_at: String,
}

impl OrderInvoiceTemplate {
    fn new(order: Order) -> Result<Self, AppError> {
        let number = format!("ORDER-{}", order.id);
        let items = order
            .items
            .iter()
            .map(|item| PrintItemView {
                description: item.description.clone(),
                sku: item.sku.clone(),
                quantity: item.quantity,
                price: item.price,
                amount: Decimal::from(item.quantity) * item.price,
            })
            .collect();

        // Billing falls back to the shipping address when left blank.
        let billing = if order.billing.is_empty() {
            &order.shipping
        } else {
            &order.billing
        };

        Ok(Self {
            barcode_svg: barcode_svg(&number)?,
            number,
            items,
            shipping_lines: order.shipping.lines(),
            billing_lines: billing.lines(),
            totals: order.totals(),
            printed_at: chrono::Utc::now().format("%Y-%m-%d %H:%M UTC").to_string(),
            order,
        })
    }
}

/// GET /orders/{id}/invoice
#[instrument(skip(state, staff))]
pub(super) async fn invoice(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<OrderId>,
) -> Result<OrderInvoiceTemplate, AppError> {
    staff.require("invoices.print")?;

    OrderInvoiceTemplate::new(find_order(&state, id).await?)
}
