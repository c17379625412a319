//! Dashboard route handler.

use std::collections::BTreeMap;

use axum::{Router, extract::State, response::Response, routing::get};
use serde_json::json;
use tracing::instrument;

use partsdesk_core::{LeadStatus, OrderStatus};

use crate::db::{LeadRepository, OrderRepository, ProductRepository};
use crate::error::AppError;
use crate::inertia::Inertia;
use crate::middleware::RequireStaff;
use crate::state::AppState;

/// Leads shown in the "recent" panel.
const RECENT_LEADS: i64 = 5;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(index))
}

/// Lead counts per status, every status present.
fn lead_counts(counts: &[(LeadStatus, i64)]) -> BTreeMap<&'static str, i64> {
    LeadStatus::ALL
        .iter()
        .map(|status| {
            let count = counts
                .iter()
                .find(|(s, _)| s == status)
                .map_or(0, |(_, n)| *n);
            (status.as_str(), count)
        })
        .collect()
}

/// GET /
#[instrument(skip_all)]
async fn index(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    inertia: Inertia,
) -> Result<Response, AppError> {
    let leads = LeadRepository::new(state.pool());

    let counts = if staff.can("leads.view") {
        lead_counts(&leads.status_counts().await?)
    } else {
        BTreeMap::new()
    };
    let recent_leads = if staff.can("leads.view") {
        leads.recent(RECENT_LEADS).await?
    } else {
        Vec::new()
    };
    let processing_orders = if staff.can("orders.view") {
        OrderRepository::new(state.pool())
            .count_with_status(OrderStatus::Processing)
            .await?
    } else {
        0
    };
    let product_count = if staff.can("products.view") {
        ProductRepository::new(state.pool()).count().await?
    } else {
        0
    };

    Ok(inertia.render(
        "Dashboard",
        json!({
            "lead_counts": counts,
            "processing_orders": processing_orders,
            "product_count": product_count,
            "recent_leads": recent_leads,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lead_counts_fill_missing_statuses() {
        let counts = lead_counts(&[(LeadStatus::Processing, 4)]);
        assert_eq!(counts.len(), LeadStatus::ALL.len());
        assert_eq!(counts.get("processing"), Some(&4));
        assert_eq!(counts.get("quote"), Some(&0));
    }
}
