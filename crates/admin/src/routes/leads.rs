//! Lead route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post, put},
};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use partsdesk_core::{LeadId, LeadStatus, PartFulfillmentStatus, PaymentStatus};

use super::{barcode_svg, choices, pagination, plural};
use crate::db::{LeadRepository, StaffRepository};
use crate::error::AppError;
use crate::filters;
use crate::inertia::{Inertia, Redirector};
use crate::middleware::RequireStaff;
use crate::models::{BulkDeleteForm, Lead, LeadFilters, LeadForm, PageQuery};
use crate::state::AppState;

const LEADS_PATH: &str = "/leads";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/leads", get(index).post(store))
        .route("/leads/create", get(create))
        .route("/leads/bulk-delete", post(bulk_delete))
        .route("/leads/{id}", put(update).delete(destroy))
        .route("/leads/{id}/edit", get(edit))
        .route("/leads/{id}/invoice", get(invoice))
}

async fn find_lead(state: &AppState, id: LeadId) -> Result<Lead, AppError> {
    LeadRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("lead {id}")))
}

/// Select options shared by the create and edit forms.
async fn form_options(state: &AppState) -> Result<serde_json::Value, AppError> {
    let employees = StaffRepository::new(state.pool()).options().await?;
    Ok(json!({
        "employees": employees,
        "statuses": choices(LeadStatus::ALL.iter().map(|s| (s.as_str(), s.label()))),
        "payment_statuses": choices(PaymentStatus::ALL.iter().map(|s| (s.as_str(), s.label()))),
        "fulfillment_statuses":
            choices(PartFulfillmentStatus::ALL.iter().map(|s| (s.as_str(), s.label()))),
    }))
}

// =============================================================================
// List
// =============================================================================

/// GET /leads
#[instrument(skip(state, staff, inertia))]
async fn index(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    inertia: Inertia,
    Query(filters): Query<LeadFilters>,
    Query(page): Query<PageQuery>,
) -> Result<Response, AppError> {
    staff.require("leads.view")?;

    let repo = LeadRepository::new(state.pool());
    let leads = repo.list(&filters, pagination(&state, &page)).await?;
    let cities = repo.cities().await?;
    let employees = StaffRepository::new(state.pool()).options().await?;

    Ok(inertia.render(
        "Leads/Index",
        json!({
            "leads": leads,
            "filters": filters,
            "employees": employees,
            "cities": cities,
            "statuses": choices(LeadStatus::ALL.iter().map(|s| (s.as_str(), s.label()))),
        }),
    ))
}

/// POST /leads/bulk-delete
#[instrument(skip(state, staff, redirect, form))]
async fn bulk_delete(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    redirect: Redirector,
    Json(form): Json<BulkDeleteForm<LeadFilters>>,
) -> Result<Response, AppError> {
    staff.require("leads.delete")?;

    let selection = form.selection();
    if selection.is_empty() {
        redirect.error("Select at least one lead.").await;
        return Ok(redirect.back(LEADS_PATH));
    }

    let deleted = LeadRepository::new(state.pool())
        .delete_selection(&selection, &form.filters)
        .await?;
    redirect
        .success(format!("Deleted {}.", plural(deleted, "lead", "leads")))
        .await;
    Ok(redirect.back(LEADS_PATH))
}

// =============================================================================
// Create and edit
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CreateQuery {
    /// Lead to copy into the new form.
    from: Option<LeadId>,
}

/// GET /leads/create
#[instrument(skip(state, staff, inertia))]
async fn create(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    inertia: Inertia,
    Query(query): Query<CreateQuery>,
) -> Result<Response, AppError> {
    staff.require("leads.create")?;

    let form = match query.from {
        Some(id) => LeadForm::copy_of(&find_lead(&state, id).await?),
        None => LeadForm::blank(),
    };

    Ok(inertia.render(
        "Leads/Create",
        json!({
            "form": form,
            "copied_from": query.from,
            "options": form_options(&state).await?,
        }),
    ))
}

/// POST /leads
#[instrument(skip(state, staff, redirect, form))]
async fn store(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    redirect: Redirector,
    Json(form): Json<LeadForm>,
) -> Result<Response, AppError> {
    staff.require("leads.create")?;

    let staff_ids = StaffRepository::new(state.pool()).ids().await?;
    let input = match form.into_input(&staff_ids) {
        Ok(input) => input,
        Err(errors) => return Ok(redirect.invalid(errors, "/leads/create").await),
    };

    let id = LeadRepository::new(state.pool()).create(&input).await?;
    tracing::info!(lead_id = %id, created_by = %staff.staff.id, "Lead created");

    redirect.success("Lead created.").await;
    Ok(Redirect::to(&format!("/leads/{id}/edit")).into_response())
}

/// GET /leads/{id}/edit
#[instrument(skip(state, staff, inertia))]
async fn edit(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    inertia: Inertia,
    Path(id): Path<LeadId>,
) -> Result<Response, AppError> {
    staff.require("leads.edit")?;

    let lead = find_lead(&state, id).await?;
    Ok(inertia.render(
        "Leads/Edit",
        json!({
            "form": LeadForm::from_lead(&lead),
            "totals": lead.totals(),
            "lead": lead,
            "options": form_options(&state).await?,
        }),
    ))
}

/// PUT /leads/{id}
#[instrument(skip(state, staff, redirect, form))]
async fn update(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    redirect: Redirector,
    Path(id): Path<LeadId>,
    Json(form): Json<LeadForm>,
) -> Result<Response, AppError> {
    staff.require("leads.edit")?;

    let edit_path = format!("/leads/{id}/edit");
    let staff_ids = StaffRepository::new(state.pool()).ids().await?;
    let input = match form.into_input(&staff_ids) {
        Ok(input) => input,
        Err(errors) => return Ok(redirect.invalid(errors, &edit_path).await),
    };

    LeadRepository::new(state.pool()).update(id, &input).await?;
    tracing::info!(lead_id = %id, updated_by = %staff.staff.id, "Lead updated");

    redirect.success("Lead updated.").await;
    Ok(redirect.back(&edit_path))
}

/// DELETE /leads/{id}
#[instrument(skip(state, staff, redirect))]
async fn destroy(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    redirect: Redirector,
    Path(id): Path<LeadId>,
) -> Result<Response, AppError> {
    staff.require("leads.delete")?;

    LeadRepository::new(state.pool()).delete(id).await?;
    tracing::info!(lead_id = %id, deleted_by = %staff.staff.id, "Lead deleted");

    redirect.success("Lead deleted.").await;
    Ok(Redirect::to(LEADS_PATH).into_response())
}

// =============================================================================
// Invoice
// =============================================================================

/// Printable lead invoice.
#[derive(Template, WebTemplate)]
#[template(path = "leads/print_invoice.html")]
pub struct LeadInvoiceTemplate {
    pub number: String,
    pub lead: Lead,
    pub vehicle: String,
    pub totals: partsdesk_core::InvoiceTotals,
    pub barcode_svg: String,
    pub printed_at: String,
}

impl LeadInvoiceTemplate {
    fn new(lead: Lead) -> Result<Self, AppError> {
        let number = format!("LEAD-{}", lead.id);
        Ok(Self {
            barcode_svg: barcode_svg(&number)?,
            number,
            vehicle: lead.vehicle(),
            totals: lead.totals(),
            printed_at: chrono::Utc::now().format("%Y-%m-%d %H:%M UTC").to_string(),
            lead,
        })
    }
}

/// GET /leads/{id}/invoice
#[instrument(skip(state, staff))]
async fn invoice(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<LeadId>,
) -> Result<LeadInvoiceTemplate, AppError> {
    staff.require("invoices.print")?;

    LeadInvoiceTemplate::new(find_lead(&state, id).await?)
}
