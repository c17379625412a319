//! Lead domain types, list filters and the lead form.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use partsdesk_core::{
    BlankRow, Email, InvoiceTotals, LeadId, LeadPartId, LeadStatus, PartFulfillmentStatus,
    PaymentStatus, Rows, SortDirection, StaffUserId,
};

use super::{non_empty, optional_text, select_value};
use crate::validation::{FieldErrors, not_blank};

// =============================================================================
// Stored records
// =============================================================================

/// A prospective customer's part request.
#[derive(Debug, Clone, Serialize)]
pub struct Lead {
    pub id: LeadId,
    /// Assigned employee.
    pub user_id: Option<StaffUserId>,
    pub shop_name: String,
    pub contact_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub street: String,
    pub city: String,
    pub province: String,
    pub postal_code: String,
    pub vehicle_year: Option<i32>,
    pub vehicle_make: String,
    pub vehicle_model: String,
    pub vin: Option<String>,
    pub status: LeadStatus,
    pub discount: Decimal,
    pub notes: String,
    pub po_number: String,
    pub parts: Vec<LeadPart>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// Invoice totals: each part is one unit at its sell price.
    #[must_use]
    pub fn totals(&self) -> InvoiceTotals {
        InvoiceTotals::for_sell_prices(self.parts.iter().map(|p| p.sell_price), self.discount)
    }

    /// The shop name, or the contact's name for walk-in customers.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.shop_name.trim().is_empty() {
            &self.contact_name
        } else {
            &self.shop_name
        }
    }

    /// `2015 Honda Civic`, skipping whatever is unknown.
    #[must_use]
    pub fn vehicle(&self) -> String {
        let year = self.vehicle_year.map(|y| y.to_string()).unwrap_or_default();
        [year.as_str(), &self.vehicle_make, &self.vehicle_model]
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A requested part on a lead.
#[derive(Debug, Clone, Serialize)]
pub struct LeadPart {
    pub id: LeadPartId,
    pub description: String,
    pub part_number: String,
    pub vendor: String,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub payment_status: PaymentStatus,
    pub fulfillment_status: PartFulfillmentStatus,
}

/// One row of the leads table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LeadRow {
    pub id: LeadId,
    pub shop_name: String,
    pub contact_name: String,
    pub phone: String,
    pub city: String,
    pub status: LeadStatus,
    pub po_number: String,
    /// Assigned employee's name.
    pub employee: Option<String>,
    pub parts_count: i64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// List filters
// =============================================================================

/// Query-string filters for the leads list, echoed back to the page as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadFilters {
    pub search: String,
    pub status: String,
    pub user_id: String,
    pub city: String,
    pub sort: String,
    pub direction: String,
}

impl LeadFilters {
    #[must_use]
    pub fn search(&self) -> Option<&str> {
        non_empty(&self.search)
    }

    /// Status filter; unknown values are ignored.
    #[must_use]
    pub fn status(&self) -> Option<LeadStatus> {
        non_empty(&self.status)?.parse().ok()
    }

    #[must_use]
    pub fn user_id(&self) -> Option<StaffUserId> {
        non_empty(&self.user_id)?.parse().ok().map(StaffUserId::new)
    }

    #[must_use]
    pub fn city(&self) -> Option<&str> {
        non_empty(&self.city)
    }

    #[must_use]
    pub fn sort(&self) -> LeadSort {
        LeadSort::from_query(&self.sort)
    }

    #[must_use]
    pub fn direction(&self) -> SortDirection {
        SortDirection::from_query(non_empty(&self.direction))
    }
}

/// Sortable columns of the leads table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeadSort {
    #[default]
    CreatedAt,
    ShopName,
    ContactName,
    City,
    Status,
    PoNumber,
}

impl LeadSort {
    /// Unknown keys fall back to newest first.
    #[must_use]
    pub fn from_query(value: &str) -> Self {
        match value.trim() {
            "shop_name" => Self::ShopName,
            "contact_name" => Self::ContactName,
            "city" => Self::City,
            "status" => Self::Status,
            "po_number" => Self::PoNumber,
            _ => Self::CreatedAt,
        }
    }

    /// SQL expression to order by.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "l.created_at",
            Self::ShopName => "l.shop_name",
            Self::ContactName => "l.contact_name",
            Self::City => "l.city",
            Self::Status => "l.status",
            Self::PoNumber => "l.po_number",
        }
    }
}

// =============================================================================
// Form
// =============================================================================

/// The lead form as submitted by the browser. Everything the user types is
/// a string so that bad input becomes a field error instead of a 400.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LeadForm {
    #[serde(deserialize_with = "select_value")]
    pub user_id: String,
    #[validate(length(max = 255))]
    pub shop_name: String,
    #[validate(length(max = 255))]
    pub contact_name: String,
    #[validate(custom(function = "not_blank"), length(max = 50))]
    pub phone: String,
    pub email: String,
    #[validate(length(max = 255))]
    pub street: String,
    #[validate(length(max = 100))]
    pub city: String,
    #[validate(length(max = 100))]
    pub province: String,
    #[validate(length(max = 20))]
    pub postal_code: String,
    pub vehicle_year: String,
    #[validate(length(max = 100))]
    pub vehicle_make: String,
    #[validate(length(max = 100))]
    pub vehicle_model: String,
    #[validate(length(max = 17))]
    pub vin: String,
    pub status: String,
    pub discount: String,
    pub notes: String,
    #[validate(length(max = 100))]
    pub po_number: String,
    pub parts: Rows<LeadPartForm>,
}

/// One editable part row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LeadPartForm {
    #[validate(custom(function = "not_blank"), length(max = 255))]
    pub description: String,
    #[validate(length(max = 100))]
    pub part_number: String,
    #[validate(length(max = 255))]
    pub vendor: String,
    pub buy_price: String,
    pub sell_price: String,
    pub payment_status: String,
    pub fulfillment_status: String,
}

impl BlankRow for LeadPartForm {
    fn is_blank(&self) -> bool {
        [
            &self.description,
            &self.part_number,
            &self.vendor,
            &self.buy_price,
            &self.sell_price,
        ]
        .iter()
        .all(|s| s.trim().is_empty())
    }
}

/// A validated lead, ready to store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadInput {
    pub user_id: Option<StaffUserId>,
    pub shop_name: String,
    pub contact_name: String,
    pub phone: String,
    pub email: Option<Email>,
    pub street: String,
    pub city: String,
    pub province: String,
    pub postal_code: String,
    pub vehicle_year: Option<i32>,
    pub vehicle_make: String,
    pub vehicle_model: String,
    pub vin: Option<String>,
    pub status: LeadStatus,
    pub discount: Decimal,
    pub notes: String,
    pub po_number: String,
    pub parts: Vec<LeadPartInput>,
}

/// A validated part row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadPartInput {
    pub description: String,
    pub part_number: String,
    pub vendor: String,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub payment_status: PaymentStatus,
    pub fulfillment_status: PartFulfillmentStatus,
}

impl LeadForm {
    /// Empty draft with one part row to type into.
    #[must_use]
    pub fn blank() -> Self {
        let mut form = Self::default();
        form.parts.push(LeadPartForm::default());
        form
    }

    /// Draft pre-filled from a stored lead.
    #[must_use]
    pub fn from_lead(lead: &Lead) -> Self {
        Self {
            user_id: lead.user_id.map(|id| id.to_string()).unwrap_or_default(),
            shop_name: lead.shop_name.clone(),
            contact_name: lead.contact_name.clone(),
            phone: lead.phone.clone(),
            email: lead.email.clone().unwrap_or_default(),
            street: lead.street.clone(),
            city: lead.city.clone(),
            province: lead.province.clone(),
            postal_code: lead.postal_code.clone(),
            vehicle_year: lead.vehicle_year.map(|y| y.to_string()).unwrap_or_default(),
            vehicle_make: lead.vehicle_make.clone(),
            vehicle_model: lead.vehicle_model.clone(),
            vin: lead.vin.clone().unwrap_or_default(),
            status: lead.status.as_str().to_owned(),
            discount: lead.discount.to_string(),
            notes: lead.notes.clone(),
            po_number: lead.po_number.clone(),
            parts: lead
                .parts
                .iter()
                .map(|part| LeadPartForm {
                    description: part.description.clone(),
                    part_number: part.part_number.clone(),
                    vendor: part.vendor.clone(),
                    buy_price: part.buy_price.to_string(),
                    sell_price: part.sell_price.to_string(),
                    payment_status: part.payment_status.as_str().to_owned(),
                    fulfillment_status: part.fulfillment_status.as_str().to_owned(),
                })
                .collect::<Vec<_>>()
                .into(),
        }
    }

    /// Draft for a new lead from an existing one: same customer, vehicle
    /// and parts, back at the quote stage with fresh part statuses and no
    /// PO number.
    #[must_use]
    pub fn copy_of(lead: &Lead) -> Self {
        let mut form = Self::from_lead(lead);
        form.status = LeadStatus::Quote.as_str().to_owned();
        form.po_number = String::new();
        form.parts = form
            .parts
            .into_vec()
            .into_iter()
            .map(|part| LeadPartForm {
                payment_status: PaymentStatus::Unpaid.as_str().to_owned(),
                fulfillment_status: PartFulfillmentStatus::Pending.as_str().to_owned(),
                ..part
            })
            .collect::<Vec<_>>()
            .into();
        form
    }

    /// Validate the draft. Blank part rows are dropped; errors on the rest
    /// keep the row's position in the submitted list.
    ///
    /// `staff_ids` are the employees a lead may be assigned to.
    ///
    /// # Errors
    ///
    /// Returns every field error found.
    pub fn into_input(self, staff_ids: &[StaffUserId]) -> Result<LeadInput, FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.check(&self);

        if self.shop_name.trim().is_empty() && self.contact_name.trim().is_empty() {
            errors.add("shop_name", "Enter a shop name or a contact name.");
        }

        let user_id = non_empty(&self.user_id)
            .and_then(|raw| errors.parse::<i32>("user_id", raw, "Choose an existing employee."))
            .map(StaffUserId::new);
        if let Some(id) = user_id {
            if !staff_ids.contains(&id) {
                errors.add("user_id", "Choose an existing employee.");
            }
        }

        let email = match non_empty(&self.email) {
            Some(raw) => Email::parse(raw)
                .map_err(|_| errors.add("email", "Email must be a valid email address."))
                .ok(),
            None => None,
        };

        let vehicle_year = errors.vehicle_year("vehicle_year", &self.vehicle_year);
        let status = errors.choice("status", &self.status);
        let discount = errors.money_or_zero("discount", &self.discount);

        let mut parts = Vec::new();
        for (index, part) in self.parts.iter().enumerate() {
            if part.is_blank() {
                continue;
            }
            let prefix = format!("parts.{index}");
            errors.check_nested(&prefix, part);
            parts.push(LeadPartInput {
                description: part.description.trim().to_owned(),
                part_number: part.part_number.trim().to_owned(),
                vendor: part.vendor.trim().to_owned(),
                buy_price: errors.money_or_zero(&format!("{prefix}.buy_price"), &part.buy_price),
                sell_price: errors
                    .money_or_zero(&format!("{prefix}.sell_price"), &part.sell_price),
                payment_status: errors
                    .choice(&format!("{prefix}.payment_status"), &part.payment_status),
                fulfillment_status: errors.choice(
                    &format!("{prefix}.fulfillment_status"),
                    &part.fulfillment_status,
                ),
            });
        }
        if parts.is_empty() {
            errors.add("parts", "Add at least one part.");
        }

        errors.finish(LeadInput {
            user_id,
            shop_name: self.shop_name.trim().to_owned(),
            contact_name: self.contact_name.trim().to_owned(),
            phone: self.phone.trim().to_owned(),
            email,
            street: self.street.trim().to_owned(),
            city: self.city.trim().to_owned(),
            province: self.province.trim().to_owned(),
            postal_code: self.postal_code.trim().to_uppercase(),
            vehicle_year,
            vehicle_make: self.vehicle_make.trim().to_owned(),
            vehicle_model: self.vehicle_model.trim().to_owned(),
            vin: optional_text(&self.vin).map(|v| v.to_uppercase()),
            status,
            discount,
            notes: self.notes.trim().to_owned(),
            po_number: self.po_number.trim().to_owned(),
            parts,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn part(description: &str, sell: &str) -> LeadPartForm {
        LeadPartForm {
            description: description.to_string(),
            sell_price: sell.to_string(),
            ..LeadPartForm::default()
        }
    }

    fn form(parts: Vec<LeadPartForm>) -> LeadForm {
        LeadForm {
            shop_name: "Eastside Auto".to_string(),
            phone: "416-555-0100".to_string(),
            parts: parts.into(),
            ..LeadForm::default()
        }
    }

    #[test]
    fn test_valid_form_keeps_every_filled_part() {
        let input = form(vec![part("Brake rotor", "89.99"), part("Pads", "45")])
            .into_input(&[])
            .unwrap();
        assert_eq!(input.parts.len(), 2);
        assert_eq!(input.parts[0].sell_price, Decimal::new(8999, 2));
        assert_eq!(input.status, LeadStatus::Quote);
        assert_eq!(input.discount, Decimal::ZERO);
    }

    #[test]
    fn test_blank_rows_are_dropped_and_indexes_kept() {
        let errors = form(vec![
            part("Rotor", "10"),
            LeadPartForm::default(),
            part("", "12"),
        ])
        .into_input(&[])
        .unwrap_err();
        assert!(errors.has("parts.2.description"));
        assert!(!errors.has("parts.1.description"));
    }

    #[test]
    fn test_needs_at_least_one_part() {
        let errors = form(vec![LeadPartForm::default()])
            .into_input(&[])
            .unwrap_err();
        assert_eq!(errors.get("parts"), Some("Add at least one part."));
    }

    #[test]
    fn test_shop_or_contact_and_phone_required() {
        let mut lead = form(vec![part("Rotor", "10")]);
        lead.shop_name = String::new();
        lead.phone = " ".to_string();
        let errors = lead.clone().into_input(&[]).unwrap_err();
        assert!(errors.has("shop_name"));
        assert_eq!(errors.get("phone"), Some("Phone is required."));

        lead.contact_name = "Sam".to_string();
        lead.phone = "555".to_string();
        assert!(lead.into_input(&[]).is_ok());
    }

    #[test]
    fn test_field_rules() {
        let mut lead = form(vec![part("Rotor", "-5")]);
        lead.email = "nope".to_string();
        lead.vehicle_year = "1800".to_string();
        lead.status = "lost".to_string();
        lead.discount = "abc".to_string();
        lead.user_id = "9".to_string();
        let errors = lead.into_input(&[StaffUserId::new(1)]).unwrap_err();

        assert!(errors.has("email"));
        assert!(errors.has("vehicle_year"));
        assert!(errors.has("status"));
        assert_eq!(errors.get("discount"), Some("Must be a valid amount."));
        assert_eq!(errors.get("parts.0.sell_price"), Some("Must be zero or more."));
        assert!(errors.has("user_id"));
    }

    #[test]
    fn test_unassigned_employee_select() {
        let lead: LeadForm = serde_json::from_value(serde_json::json!({
            "user_id": "",
            "shop_name": "Eastside Auto",
            "phone": "555",
            "parts": [{"description": "Rotor", "sell_price": "10"}]
        }))
        .unwrap();
        assert_eq!(lead.into_input(&[]).unwrap().user_id, None);

        let mut lead = form(vec![part("Rotor", "10")]);
        lead.user_id = "someone".to_string();
        let errors = lead.into_input(&[]).unwrap_err();
        assert_eq!(errors.get("user_id"), Some("Choose an existing employee."));
    }

    #[test]
    fn test_normalizes_values() {
        let mut lead = form(vec![part("  Rotor ", "$1,000")]);
        lead.email = " Parts@Shop.CA ".to_string();
        lead.vin = "1hgcm82633a004352".to_string();
        lead.user_id = "1".to_string();
        let input = lead.into_input(&[StaffUserId::new(1)]).unwrap();

        assert_eq!(input.email.unwrap().as_str(), "parts@shop.ca");
        assert_eq!(input.vin.as_deref(), Some("1HGCM82633A004352"));
        assert_eq!(input.parts[0].description, "Rotor");
        assert_eq!(input.parts[0].sell_price, Decimal::new(1000, 0));
        assert_eq!(input.user_id, Some(StaffUserId::new(1)));
    }

    #[test]
    fn test_copy_of_resets_progress() {
        let now = Utc::now();
        let lead = Lead {
            id: LeadId::new(3),
            user_id: None,
            shop_name: "Eastside Auto".to_string(),
            contact_name: String::new(),
            phone: "555".to_string(),
            email: None,
            street: String::new(),
            city: "Guelph".to_string(),
            province: "ON".to_string(),
            postal_code: String::new(),
            vehicle_year: Some(2015),
            vehicle_make: "Honda".to_string(),
            vehicle_model: "Civic".to_string(),
            vin: None,
            status: LeadStatus::Fulfilled,
            discount: Decimal::ZERO,
            notes: String::new(),
            po_number: "PO-77".to_string(),
            parts: vec![LeadPart {
                id: LeadPartId::new(1),
                description: "Rotor".to_string(),
                part_number: "R-1".to_string(),
                vendor: "Acme".to_string(),
                buy_price: Decimal::new(40, 0),
                sell_price: Decimal::new(80, 0),
                payment_status: PaymentStatus::Paid,
                fulfillment_status: PartFulfillmentStatus::Delivered,
            }],
            created_at: now,
            updated_at: now,
        };

        let form = LeadForm::copy_of(&lead);
        assert_eq!(form.shop_name, "Eastside Auto");
        assert_eq!(form.status, "quote");
        assert!(form.po_number.is_empty());
        assert_eq!(form.parts.len(), 1);
        let part = form.parts.iter().next().unwrap();
        assert_eq!(part.description, "Rotor");
        assert_eq!(part.payment_status, "unpaid");
        assert_eq!(part.fulfillment_status, "pending");
        assert!(form.into_input(&[]).is_ok());
    }

    #[test]
    fn test_blank_draft_has_one_row() {
        assert_eq!(LeadForm::blank().parts.len(), 1);
    }

    #[test]
    fn test_filters() {
        let filters = LeadFilters {
            status: "processing".to_string(),
            user_id: "x".to_string(),
            sort: "city".to_string(),
            direction: "asc".to_string(),
            ..LeadFilters::default()
        };
        assert_eq!(filters.status(), Some(LeadStatus::Processing));
        assert_eq!(filters.user_id(), None);
        assert_eq!(filters.sort(), LeadSort::City);
        assert_eq!(filters.direction(), SortDirection::Asc);
        assert_eq!(filters.search(), None);
        assert_eq!(LeadSort::from_query("drop table"), LeadSort::CreatedAt);
    }
}
