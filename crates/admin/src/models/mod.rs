//! Domain models for the back-office.
//!
//! Each entity module holds the stored record, its list row, the list
//! filters it accepts from the query string, and the form it is edited
//! through together with that form's validation.

pub mod access;
pub mod lead;
pub mod order;
pub mod product;
pub mod session;

use serde::{Deserialize, Deserializer};

use partsdesk_core::BulkSelection;

pub use access::{Role, StaffOption, StaffUser};
pub use lead::{Lead, LeadFilters, LeadForm, LeadInput, LeadPart, LeadRow, LeadSort};
pub use order::{Order, OrderFilters, OrderForm, OrderInput, OrderRow, OrderSort};
pub use product::{Product, ProductFilters, ProductForm, ProductInput, ProductRow, ProductSort};
pub use session::{CurrentStaff, Flash, keys as session_keys};

/// `?page=` for list views.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PageQuery {
    pub page: String,
}

impl PageQuery {
    /// Requested page; anything unparsable means the first page.
    #[must_use]
    pub fn page(&self) -> Option<u32> {
        self.page.trim().parse().ok()
    }
}

/// Body of a bulk delete: explicit ids, or every row matching `filters`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BulkDeleteForm<F> {
    /// Comma-separated ids of the checked rows.
    pub ids: String,
    pub all_matching: bool,
    #[serde(flatten)]
    pub filters: F,
}

impl<F> BulkDeleteForm<F> {
    #[must_use]
    pub fn selection(&self) -> BulkSelection {
        BulkSelection::from_request(self.all_matching, &self.ids)
    }
}

/// Trimmed, non-empty text.
pub(crate) fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

/// Trimmed text, `None` when blank.
pub(crate) fn optional_text(value: &str) -> Option<String> {
    non_empty(value).map(str::to_owned)
}

/// Select values arrive as a number, a string or `null`. All of them are
/// kept as text and parsed during validation.
pub(crate) fn select_value<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) => n.to_string(),
        Some(Raw::Text(text)) => text,
        None => String::new(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Filters {
        status: String,
    }

    #[test]
    fn test_page_query() {
        let query = PageQuery {
            page: "3".to_string(),
        };
        assert_eq!(query.page(), Some(3));
        assert_eq!(PageQuery::default().page(), None);
    }

    #[test]
    fn test_bulk_delete_form_flattens_filters() {
        let form: BulkDeleteForm<Filters> = serde_json::from_value(serde_json::json!({
            "ids": "4,5",
            "status": "quote"
        }))
        .unwrap();
        assert_eq!(form.selection(), BulkSelection::Ids(vec![4, 5]));
        assert_eq!(form.filters.status, "quote");

        let form: BulkDeleteForm<Filters> = serde_json::from_value(serde_json::json!({
            "ids": "4,5",
            "all_matching": true
        }))
        .unwrap();
        assert_eq!(form.selection(), BulkSelection::AllMatching);
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Picker {
        #[serde(deserialize_with = "select_value")]
        user_id: String,
    }

    #[test]
    fn test_select_value_accepts_numbers_text_and_null() {
        let parse = |value| serde_json::from_value::<Picker>(value).unwrap().user_id;
        assert_eq!(parse(serde_json::json!({"user_id": 7})), "7");
        assert_eq!(parse(serde_json::json!({"user_id": "7"})), "7");
        assert_eq!(parse(serde_json::json!({"user_id": ""})), "");
        assert_eq!(parse(serde_json::json!({"user_id": null})), "");
        assert_eq!(parse(serde_json::json!({})), "");
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty("  x "), Some("x"));
        assert_eq!(non_empty("   "), None);
        assert_eq!(optional_text(" a "), Some("a".to_string()));
    }
}
