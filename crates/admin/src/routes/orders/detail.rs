//! Order create, detail and edit handlers.

use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;
use tracing::instrument;

use partsdesk_core::OrderId;

use super::{ORDERS_PATH, find_order, form_options};
use crate::db::{OrderRepository, ProductRepository, StaffRepository};
use crate::error::AppError;
use crate::inertia::{Inertia, Redirector};
use crate::middleware::RequireStaff;
use crate::models::OrderForm;
use crate::models::order::{OrderInput, OrderStatusForm};
use crate::state::AppState;
use crate::validation::FieldErrors;

/// Validate an order form against the products and staff it references.
async fn validate(
    state: &AppState,
    form: OrderForm,
) -> Result<Result<OrderInput, FieldErrors>, AppError> {
    let list_prices = ProductRepository::new(state.pool())
        .list_prices(&form.product_ids())
        .await?;
    let staff_ids = StaffRepository::new(state.pool()).ids().await?;
    Ok(form.into_input(&list_prices, &staff_ids))
}

/// GET /orders/create
#[instrument(skip_all)]
pub(super) async fn create(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    inertia: Inertia,
) -> Result<Response, AppError> {
    staff.require("orders.create")?;

    Ok(inertia.render(
        "Orders/Create",
        json!({
            "form": OrderForm::blank(),
            "options": form_options(&state).await?,
        }),
    ))
}

/// POST /orders
#[instrument(skip(state, staff, redirect, form))]
pub(super) async fn store(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    redirect: Redirector,
    Json(form): Json<OrderForm>,
) -> Result<Response, AppError> {
    staff.require("orders.create")?;

    let input = match validate(&state, form).await? {
        Ok(input) => input,
        Err(errors) => return Ok(redirect.invalid(errors, "/orders/create").await),
    };

    let id = OrderRepository::new(state.pool()).create(&input).await?;
    tracing::info!(
        order_id = %id,
        items = input.items.len(),
        created_by = %staff.staff.id,
        "Order created"
    );

    redirect.success("Order created.").await;
    Ok(Redirect::to(&format!("/orders/{id}")).into_response())
}

/// GET /orders/{id}
#[instrument(skip(state, staff, inertia))]
pub(super) async fn show(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    inertia: Inertia,
    Path(id): Path<OrderId>,
) -> Result<Response, AppError> {
    staff.require("orders.view")?;

    let order = find_order(&state, id).await?;
    let options = if staff.can("orders.edit") {
        form_options(&state).await?
    } else {
        json!({})
    };

    Ok(inertia.render(
        "Orders/Show",
        json!({
            "form": OrderForm::from_order(&order),
            "totals": order.totals(),
            "order": order,
            "can_edit": staff.can("orders.edit"),
            "options": options,
        }),
    ))
}

/// PUT /orders/{id}
#[instrument(skip(state, staff, redirect, form))]
pub(super) async fn update(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    redirect: Redirector,
    Path(id): Path<OrderId>,
    Json(form): Json<OrderForm>,
) -> Result<Response, AppError> {
    staff.require("orders.edit")?;

    let show_path = format!("/orders/{id}");
    let input = match validate(&state, form).await? {
        Ok(input) => input,
        Err(errors) => return Ok(redirect.invalid(errors, &show_path).await),
    };

    OrderRepository::new(state.pool()).update(id, &input).await?;
    tracing::info!(order_id = %id, updated_by = %staff.staff.id, "Order updated");

    redirect.success("Order updated.").await;
    Ok(redirect.back(&show_path))
}

/// PATCH /orders/{id}/status
#[instrument(skip(state, staff, redirect))]
pub(super) async fn update_status(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    redirect: Redirector,
    Path(id): Path<OrderId>,
    Json(form): Json<OrderStatusForm>,
) -> Result<Response, AppError> {
    staff.require("orders.edit")?;

    let show_path = format!("/orders/{id}");
    let status = match form.into_status() {
        Ok(status) => status,
        Err(errors) => return Ok(redirect.invalid(errors, &show_path).await),
    };

    OrderRepository::new(state.pool()).set_status(id, status).await?;
    tracing::info!(order_id = %id, status = status.as_str(), "Order status changed");

    redirect
        .success(format!("Order marked {}.", status.label().to_lowercase()))
        .await;
    Ok(redirect.back(&show_path))
}

/// DELETE /orders/{id}
#[instrument(skip(state, staff, redirect))]
pub(super) async fn destroy(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    redirect: Redirector,
    Path(id): Path<OrderId>,
) -> Result<Response, AppError> {
    staff.require("orders.delete")?;

    OrderRepository::new(state.pool()).delete(id).await?;
    tracing::info!(order_id = %id, deleted_by = %staff.staff.id, "Order deleted");

    redirect.success("Order deleted.").await;
    Ok(Redirect::to(ORDERS_PATH).into_response())
}
