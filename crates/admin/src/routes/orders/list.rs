//! Order list and bulk delete.

use axum::{
    Json,
    extract::{Query, State},
    response::Response,
};
use serde_json::json;
use tracing::instrument;

use super::{ORDERS_PATH, status_choices, type_choices};
use crate::db::{OrderRepository, StaffRepository};
use crate::error::AppError;
use crate::inertia::{Inertia, Redirector};
use crate::middleware::RequireStaff;
use crate::models::{BulkDeleteForm, OrderFilters, PageQuery};
use crate::routes::{pagination, plural};
use crate::state::AppState;

/// GET /orders
#[instrument(skip(state, staff, inertia))]
pub(super) async fn index(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    inertia: Inertia,
    Query(filters): Query<OrderFilters>,
    Query(page): Query<PageQuery>,
) -> Result<Response, AppError> {
    staff.require("orders.view")?;

    let orders = OrderRepository::new(state.pool())
        .list(&filters, pagination(&state, &page))
        .await?;
    let employees = StaffRepository::new(state.pool()).options().await?;

    Ok(inertia.render(
        "Orders/Index",
        json!({
            "orders": orders,
            "filters": filters,
            "employees": employees,
            "statuses": status_choices(),
            "order_types": type_choices(),
        }),
    ))
}

/// POST /orders/bulk-delete
#[instrument(skip(state, staff, redirect, form))]
pub(super) async fn bulk_delete(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    redirect: Redirector,
    Json(form): Json<BulkDeleteForm<OrderFilters>>,
) -> Result<Response, AppError> {
    staff.require("orders.delete")?;

    let selection = form.selection();
    if selection.is_empty() {
        redirect.error("Select at least one order.").await;
        return Ok(redirect.back(ORDERS_PATH));
    }

    let deleted = OrderRepository::new(state.pool())
        .delete_selection(&selection, &form.filters)
        .await?;
    redirect
        .success(format!("Deleted {}.", plural(deleted, "order", "orders")))
        .await;
    Ok(redirect.back(ORDERS_PATH))
}
