//! Field-keyed form validation errors.
//!
//! Forms are validated in two passes: `validator` derive rules for the simple
//! per-field checks, then hand-written checks for anything that depends on
//! other fields, the current date, or the database. Both passes feed one
//! [`FieldErrors`] map keyed by field path (`parts.0.description`), which is
//! what the browser shows inline next to each input.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::Datelike;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

/// Oldest vehicle model year accepted anywhere in the catalog.
pub const MIN_VEHICLE_YEAR: i32 = 1900;

/// Money columns are `NUMERIC(12, 2)`: ten integer digits, two decimals.
pub const MONEY_SCALE: u32 = 2;
const MONEY_INTEGER_DIGITS: u32 = 10;

/// Ordered map of field path to its first error message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience for a single error.
    #[must_use]
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// Record an error. Only the first message per field is kept.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_owned())
            .or_insert_with(|| message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Run the `validator` derive rules on `value` and collect the failures.
    pub fn check<T: Validate>(&mut self, value: &T) {
        if let Err(errors) = value.validate() {
            self.collect("", &errors);
        }
    }

    /// Same as [`FieldErrors::check`] but nested under `prefix`.
    pub fn check_nested<T: Validate>(&mut self, prefix: &str, value: &T) {
        if let Err(errors) = value.validate() {
            self.collect(prefix, &errors);
        }
    }

    /// `Ok(value)` when no errors were recorded, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns the collected errors if there are any.
    pub fn finish<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }

    fn collect(&mut self, prefix: &str, errors: &ValidationErrors) {
        for (field, kind) in errors.errors() {
            let key = if prefix.is_empty() {
                field.to_string()
            } else {
                format!("{prefix}.{field}")
            };
            match kind {
                ValidationErrorsKind::Field(list) => {
                    if let Some(error) = list.first() {
                        self.add(&key, message_for(field, error));
                    }
                }
                ValidationErrorsKind::Struct(inner) => self.collect(&key, inner),
                ValidationErrorsKind::List(items) => {
                    for (index, inner) in items {
                        self.collect(&format!("{key}.{index}"), inner);
                    }
                }
            }
        }
    }

    /// Parse a required money amount (`12.50`, `$1,200`), recording an error
    /// under `field` when it is missing, malformed, negative or does not fit
    /// a money column.
    pub fn money(&mut self, field: &str, raw: &str) -> Decimal {
        match parse_money(raw) {
            Some(amount) if amount < Decimal::ZERO => {
                self.add(field, "Must be zero or more.");
                Decimal::ZERO
            }
            Some(amount) if amount >= max_money() => {
                self.add(field, "Must be less than 10,000,000,000.");
                Decimal::ZERO
            }
            Some(amount) if amount.normalize().scale() > MONEY_SCALE => {
                self.add(field, "Must have at most 2 decimal places.");
                Decimal::ZERO
            }
            Some(amount) => amount,
            None if raw.trim().is_empty() => {
                self.add(field, "This field is required.");
                Decimal::ZERO
            }
            None => {
                self.add(field, "Must be a valid amount.");
                Decimal::ZERO
            }
        }
    }

    /// Like [`FieldErrors::money`] but blank means zero.
    pub fn money_or_zero(&mut self, field: &str, raw: &str) -> Decimal {
        if raw.trim().is_empty() {
            Decimal::ZERO
        } else {
            self.money(field, raw)
        }
    }

    /// Parse an optional vehicle model year between 1900 and next year.
    pub fn vehicle_year(&mut self, field: &str, raw: &str) -> Option<i32> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match raw.parse::<i32>() {
            Ok(year) if (MIN_VEHICLE_YEAR..=max_vehicle_year()).contains(&year) => Some(year),
            Ok(_) => {
                self.add(
                    field,
                    format!(
                        "Must be between {MIN_VEHICLE_YEAR} and {}.",
                        max_vehicle_year()
                    ),
                );
                None
            }
            Err(_) => {
                self.add(field, "Must be a year.");
                None
            }
        }
    }

    /// Parse a value with `FromStr`, recording `message` on failure.
    pub fn parse<T: FromStr>(&mut self, field: &str, raw: &str, message: &str) -> Option<T> {
        raw.trim().parse::<T>().map_or_else(
            |_| {
                self.add(field, message);
                None
            },
            Some,
        )
    }

    /// Parse an enum choice. Blank means the type's default.
    pub fn choice<T: FromStr + Default>(&mut self, field: &str, raw: &str) -> T {
        if raw.trim().is_empty() {
            return T::default();
        }
        self.parse(field, raw, "Choose a valid option.")
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

impl From<ValidationErrors> for FieldErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut collected = Self::new();
        collected.collect("", &errors);
        collected
    }
}

/// Newest model year accepted: next calendar year, since dealers sell next
/// year's models in the fall.
#[must_use]
pub fn max_vehicle_year() -> i32 {
    chrono::Utc::now().year() + 1
}

/// Smallest amount a money column cannot hold.
fn max_money() -> Decimal {
    Decimal::from(10_i64.pow(MONEY_INTEGER_DIGITS))
}

/// Parse a money amount typed by a person. Accepts an optional leading `$`
/// and thousands separators.
#[must_use]
pub fn parse_money(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// `validator` custom rule: not blank after trimming.
///
/// # Errors
///
/// Returns a `required` error for whitespace-only values.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new("required"))
    } else {
        Ok(())
    }
}

fn message_for(field: &str, error: &ValidationError) -> String {
    if let Some(message) = &error.message {
        return message.to_string();
    }
    let name = humanize(field);
    match error.code.as_ref() {
        "required" => format!("{name} is required."),
        "email" => format!("{name} must be a valid email address."),
        "length" => match (error.params.get("min"), error.params.get("max")) {
            (Some(min), None) => format!("{name} must be at least {min} characters."),
            (None, Some(max)) => format!("{name} may not be longer than {max} characters."),
            _ => format!("{name} has an invalid length."),
        },
        "range" => format!("{name} is out of range."),
        _ => format!("{name} is invalid."),
    }
}

/// `shop_name` -> `Shop name`
fn humanize(field: &str) -> String {
    let spaced = field.replace('_', " ");
    let mut chars = spaced.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Debug, Validate)]
    struct PartInput {
        #[validate(custom(function = "not_blank"))]
        description: String,
    }

    #[derive(Debug, Validate)]
    struct LeadInput {
        #[validate(custom(function = "not_blank"))]
        phone: String,
        #[validate(email)]
        email: Option<String>,
        #[validate(length(max = 10))]
        po_number: String,
        #[validate(nested)]
        parts: Vec<PartInput>,
    }

    fn lead(phone: &str, email: Option<&str>, parts: &[&str]) -> LeadInput {
        LeadInput {
            phone: phone.to_string(),
            email: email.map(String::from),
            po_number: "PO-1".to_string(),
            parts: parts
                .iter()
                .map(|d| PartInput {
                    description: (*d).to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_valid_input_has_no_errors() {
        let mut errors = FieldErrors::new();
        errors.check(&lead("555-0100", Some("shop@garage.ca"), &["Rotor"]));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_field_errors_are_keyed_by_path() {
        let mut errors = FieldErrors::new();
        errors.check(&lead("  ", Some("nope"), &["Rotor", ""]));

        assert_eq!(errors.get("phone"), Some("Phone is required."));
        assert_eq!(
            errors.get("email"),
            Some("Email must be a valid email address.")
        );
        assert_eq!(
            errors.get("parts.1.description"),
            Some("Description is required.")
        );
        assert!(!errors.has("parts.0.description"));
    }

    #[test]
    fn test_check_nested_prefixes_keys() {
        let mut errors = FieldErrors::new();
        errors.check_nested("parts.3", &PartInput {
            description: String::new(),
        });
        assert!(errors.has("parts.3.description"));
    }

    #[test]
    fn test_first_message_wins() {
        let mut errors = FieldErrors::new();
        errors.add("sku", "first");
        errors.add("sku", "second");
        assert_eq!(errors.get("sku"), Some("first"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_money_parsing() {
        let mut errors = FieldErrors::new();
        assert_eq!(errors.money("a", "$1,250.50"), Decimal::new(125_050, 2));
        assert_eq!(errors.money_or_zero("b", " "), Decimal::ZERO);
        errors.money("c", "-3");
        errors.money("d", "abc");
        errors.money("e", "");

        assert!(!errors.has("a"));
        assert!(!errors.has("b"));
        assert_eq!(errors.get("c"), Some("Must be zero or more."));
        assert_eq!(errors.get("d"), Some("Must be a valid amount."));
        assert_eq!(errors.get("e"), Some("This field is required."));
    }

    #[test]
    fn test_money_fits_the_column() {
        let mut errors = FieldErrors::new();
        assert_eq!(
            errors.money("a", "9999999999.99"),
            Decimal::new(999_999_999_999, 2)
        );
        assert_eq!(errors.money("b", "12.500"), Decimal::new(12_500, 3));
        errors.money("c", "123456789012.999");
        errors.money("d", "10000000000");
        errors.money("e", "0.005");
        errors.money_or_zero("f", "1.999");

        assert!(!errors.has("a"));
        assert!(!errors.has("b"));
        assert_eq!(errors.get("c"), Some("Must be less than 10,000,000,000."));
        assert_eq!(errors.get("d"), Some("Must be less than 10,000,000,000."));
        assert_eq!(errors.get("e"), Some("Must have at most 2 decimal places."));
        assert_eq!(errors.get("f"), Some("Must have at most 2 decimal places."));
    }

    #[test]
    fn test_vehicle_year() {
        let mut errors = FieldErrors::new();
        assert_eq!(errors.vehicle_year("y1", "2015"), Some(2015));
        assert_eq!(errors.vehicle_year("y2", ""), None);
        assert_eq!(errors.vehicle_year("y3", "1850"), None);
        assert_eq!(errors.vehicle_year("y4", "soon"), None);
        let next = max_vehicle_year().to_string();
        assert_eq!(errors.vehicle_year("y5", &next), Some(max_vehicle_year()));

        assert!(!errors.has("y2"));
        assert!(errors.has("y3"));
        assert_eq!(errors.get("y4"), Some("Must be a year."));
    }

    #[test]
    fn test_choice_defaults_when_blank() {
        let mut errors = FieldErrors::new();
        let status: partsdesk_core::LeadStatus = errors.choice("status", "");
        assert_eq!(status, partsdesk_core::LeadStatus::Quote);
        let status: partsdesk_core::LeadStatus = errors.choice("status", "Processing");
        assert_eq!(status, partsdesk_core::LeadStatus::Processing);
        let _: partsdesk_core::LeadStatus = errors.choice("other", "lost");
        assert_eq!(errors.get("other"), Some("Choose a valid option."));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_finish() {
        assert_eq!(FieldErrors::new().finish(7), Ok(7));
        let errors = FieldErrors::single("name", "Name is required.");
        assert_eq!(errors.clone().finish(7), Err(errors));
    }

    #[test]
    fn test_serializes_as_object() {
        let errors = FieldErrors::single("parts.0.description", "Description is required.");
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"parts.0.description": "Description is required."})
        );
    }

    #[test]
    fn test_humanize() {
        assert_eq!(humanize("shop_name"), "Shop name");
        assert_eq!(humanize(""), "");
    }
}
