//! Order route handlers.
//!
//! This module contains handlers for the order list and bulk delete, the
//! create and detail forms with the status change, and the printable
//! invoice.

mod detail;
mod list;
mod print;

use axum::{
    Router,
    routing::{get, patch, post},
};
use serde_json::{Value, json};

use partsdesk_core::{OrderId, OrderStatus, OrderType, PaymentMethod};

use super::choices;
use crate::db::{OrderRepository, ProductRepository, StaffRepository};
use crate::error::AppError;
use crate::models::Order;
use crate::state::AppState;

const ORDERS_PATH: &str = "/orders";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list::index).post(detail::store))
        .route("/orders/create", get(detail::create))
        .route("/orders/bulk-delete", post(list::bulk_delete))
        .route(
            "/orders/{id}",
            get(detail::show)
                .put(detail::update)
                .delete(detail::destroy),
        )
        .route("/orders/{id}/status", patch(detail::update_status))
        .route("/orders/{id}/invoice", get(print::invoice))
}

async fn find_order(state: &AppState, id: OrderId) -> Result<Order, AppError> {
    OrderRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))
}

fn status_choices() -> Vec<super::Choice> {
    choices(OrderStatus::ALL.iter().map(|s| (s.as_str(), s.label())))
}

fn type_choices() -> Vec<super::Choice> {
    choices(OrderType::ALL.iter().map(|t| (t.as_str(), t.label())))
}

/// Select options for the order form.
async fn form_options(state: &AppState) -> Result<Value, AppError> {
    let employees = StaffRepository::new(state.pool()).options().await?;
    let products = ProductRepository::new(state.pool()).options().await?;
    Ok(json!({
        "employees": employees,
        "products": products,
        "statuses": status_choices(),
        "order_types": type_choices(),
        "payment_methods": choices(PaymentMethod::ALL.iter().map(|m| (m.as_str(), m.label()))),
    }))
}
