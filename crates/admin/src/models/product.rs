//! Catalog domain types, list filters and the product form.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use partsdesk_core::{
    BlankRow, FitmentId, ProductId, ProductImageId, Rows, SortDirection, Visibility, WarehouseId,
};

use super::{non_empty, optional_text};
use crate::validation::{FieldErrors, MIN_VEHICLE_YEAR, max_vehicle_year, not_blank};

/// Joins part numbers and fitments inside one spreadsheet cell, so it cannot
/// appear inside them.
pub const LIST_SEPARATOR: char = '|';
const SEPARATOR_MESSAGE: &str = "May not contain \"|\".";

// =============================================================================
// Stored records
// =============================================================================

/// A catalog product with everything the edit page shows.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub description: String,
    pub sku: String,
    pub location_bin: String,
    pub list_price: Decimal,
    pub buy_price: Decimal,
    pub visibility: Visibility,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub sub_subcategory: Option<String>,
    pub fitments: Vec<Fitment>,
    pub part_numbers: Vec<String>,
    pub stock: Vec<StockLevel>,
    pub images: Vec<ProductImage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[must_use]
    pub fn total_stock(&self) -> i64 {
        self.stock.iter().map(|s| i64::from(s.quantity)).sum()
    }
}

/// A vehicle range a product fits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fitment {
    pub id: FitmentId,
    pub year_from: i32,
    pub year_to: i32,
    pub make: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub name: String,
}

/// Units on hand at one warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockLevel {
    pub warehouse_id: WarehouseId,
    pub warehouse: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductImage {
    pub id: ProductImageId,
    /// Stored file name under the media directory.
    pub file_name: String,
    pub original_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub position: i32,
    pub url: String,
}

/// Product as a select option on the order form.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductOption {
    pub id: ProductId,
    pub sku: String,
    pub description: String,
    pub list_price: Decimal,
}

/// One row of the products table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductRow {
    pub id: ProductId,
    pub description: String,
    pub sku: String,
    pub location_bin: String,
    pub list_price: Decimal,
    pub visibility: Visibility,
    pub category: Option<String>,
    /// Units on hand across all warehouses.
    pub stock: i64,
    pub fitment_count: i64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// List filters
// =============================================================================

/// Query-string filters for the products list and CSV export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductFilters {
    pub search: String,
    pub visibility: String,
    pub category: String,
    pub warehouse_id: String,
    pub sort: String,
    pub direction: String,
}

impl ProductFilters {
    #[must_use]
    pub fn search(&self) -> Option<&str> {
        non_empty(&self.search)
    }

    #[must_use]
    pub fn visibility(&self) -> Option<Visibility> {
        non_empty(&self.visibility)?.parse().ok()
    }

    #[must_use]
    pub fn category(&self) -> Option<&str> {
        non_empty(&self.category)
    }

    /// Only products with stock on hand at this warehouse.
    #[must_use]
    pub fn warehouse_id(&self) -> Option<WarehouseId> {
        non_empty(&self.warehouse_id)?
            .parse()
            .ok()
            .map(WarehouseId::new)
    }

    #[must_use]
    pub fn sort(&self) -> ProductSort {
        ProductSort::from_query(&self.sort)
    }

    #[must_use]
    pub fn direction(&self) -> SortDirection {
        SortDirection::from_query(non_empty(&self.direction))
    }
}

/// Sortable columns of the products table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductSort {
    #[default]
    CreatedAt,
    Description,
    Sku,
    ListPrice,
    Stock,
}

impl ProductSort {
    #[must_use]
    pub fn from_query(value: &str) -> Self {
        match value.trim() {
            "description" => Self::Description,
            "sku" => Self::Sku,
            "list_price" => Self::ListPrice,
            "stock" => Self::Stock,
            _ => Self::CreatedAt,
        }
    }

    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "p.created_at",
            Self::Description => "p.description",
            Self::Sku => "p.sku",
            Self::ListPrice => "p.list_price",
            Self::Stock => "st.stock",
        }
    }
}

// =============================================================================
// Form
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ProductForm {
    #[validate(custom(function = "not_blank"), length(max = 500))]
    pub description: String,
    #[validate(custom(function = "not_blank"), length(max = 64))]
    pub sku: String,
    #[validate(length(max = 50))]
    pub location_bin: String,
    pub list_price: String,
    pub buy_price: String,
    pub visibility: String,
    #[validate(length(max = 100))]
    pub category: String,
    #[validate(length(max = 100))]
    pub subcategory: String,
    #[validate(length(max = 100))]
    pub sub_subcategory: String,
    pub fitments: Rows<FitmentForm>,
    pub part_numbers: Rows<String>,
    pub stock: Vec<StockForm>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct FitmentForm {
    pub year_from: String,
    pub year_to: String,
    #[validate(custom(function = "not_blank"), length(max = 100))]
    pub make: String,
    #[validate(custom(function = "not_blank"), length(max = 100))]
    pub model: String,
}

impl BlankRow for FitmentForm {
    fn is_blank(&self) -> bool {
        [&self.year_from, &self.year_to, &self.make, &self.model]
            .iter()
            .all(|s| s.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StockForm {
    pub warehouse_id: i32,
    /// Blank means zero.
    pub quantity: String,
}

/// A validated product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductInput {
    pub description: String,
    pub sku: String,
    pub location_bin: String,
    pub list_price: Decimal,
    pub buy_price: Decimal,
    pub visibility: Visibility,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub sub_subcategory: Option<String>,
    pub fitments: Vec<FitmentInput>,
    pub part_numbers: Vec<String>,
    pub stock: BTreeMap<WarehouseId, i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FitmentInput {
    pub year_from: i32,
    pub year_to: i32,
    pub make: String,
    pub model: String,
}

impl ProductForm {
    /// Empty draft: one fitment row, one part number row, zero stock at
    /// every warehouse.
    #[must_use]
    pub fn blank(warehouses: &[Warehouse]) -> Self {
        let mut form = Self::default();
        form.fitments.push(FitmentForm::default());
        form.part_numbers.push(String::new());
        form.stock = warehouses
            .iter()
            .map(|w| StockForm {
                warehouse_id: w.id.as_i32(),
                quantity: "0".to_owned(),
            })
            .collect();
        form
    }

    /// Draft for an existing product, with a stock entry for every warehouse.
    #[must_use]
    pub fn from_product(product: &Product, warehouses: &[Warehouse]) -> Self {
        let on_hand = |id: WarehouseId| {
            product
                .stock
                .iter()
                .find(|s| s.warehouse_id == id)
                .map_or(0, |s| s.quantity)
        };

        Self {
            description: product.description.clone(),
            sku: product.sku.clone(),
            location_bin: product.location_bin.clone(),
            list_price: product.list_price.to_string(),
            buy_price: product.buy_price.to_string(),
            visibility: product.visibility.as_str().to_owned(),
            category: product.category.clone().unwrap_or_default(),
            subcategory: product.subcategory.clone().unwrap_or_default(),
            sub_subcategory: product.sub_subcategory.clone().unwrap_or_default(),
            fitments: product
                .fitments
                .iter()
                .map(|f| FitmentForm {
                    year_from: f.year_from.to_string(),
                    year_to: f.year_to.to_string(),
                    make: f.make.clone(),
                    model: f.model.clone(),
                })
                .collect::<Vec<_>>()
                .into(),
            part_numbers: product.part_numbers.clone().into(),
            stock: warehouses
                .iter()
                .map(|w| StockForm {
                    warehouse_id: w.id.as_i32(),
                    quantity: on_hand(w.id).to_string(),
                })
                .collect(),
        }
    }

    /// Validate the draft against the known warehouses.
    ///
    /// # Errors
    ///
    /// Returns every field error found.
    pub fn into_input(self, warehouses: &[WarehouseId]) -> Result<ProductInput, FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.check(&self);

        let list_price = errors.money("list_price", &self.list_price);
        let buy_price = errors.money_or_zero("buy_price", &self.buy_price);
        let visibility = errors.choice("visibility", &self.visibility);

        let mut fitments = Vec::new();
        for (index, fitment) in self.fitments.iter().enumerate() {
            if fitment.is_blank() {
                continue;
            }
            let prefix = format!("fitments.{index}");
            errors.check_nested(&prefix, fitment);

            let from_field = format!("{prefix}.year_from");
            let year_from = if fitment.year_from.trim().is_empty() {
                errors.add(&from_field, "This field is required.");
                None
            } else {
                errors.vehicle_year(&from_field, &fitment.year_from)
            };
            let year_to = if fitment.year_to.trim().is_empty() {
                year_from
            } else {
                errors.vehicle_year(&format!("{prefix}.year_to"), &fitment.year_to)
            };

            if fitment.make.contains('"') {
                errors.add(&format!("{prefix}.make"), "May not contain quotes.");
            }
            for (field, value) in [("make", &fitment.make), ("model", &fitment.model)] {
                if value.contains(LIST_SEPARATOR) {
                    errors.add(&format!("{prefix}.{field}"), SEPARATOR_MESSAGE);
                }
            }

            if let (Some(year_from), Some(year_to)) = (year_from, year_to) {
                if year_from > year_to {
                    errors.add(
                        &format!("{prefix}.year_to"),
                        "Must not be before the start year.",
                    );
                }
                fitments.push(FitmentInput {
                    year_from,
                    year_to,
                    make: fitment.make.trim().to_owned(),
                    model: fitment.model.trim().to_owned(),
                });
            }
        }

        let mut part_numbers: Vec<String> = Vec::new();
        for (index, number) in self.part_numbers.iter().enumerate() {
            let number = number.trim().to_owned();
            if number.is_empty() {
                continue;
            }
            if number.contains(LIST_SEPARATOR) {
                errors.add(&format!("part_numbers.{index}"), SEPARATOR_MESSAGE);
                continue;
            }
            if !part_numbers.iter().any(|n| n.eq_ignore_ascii_case(&number)) {
                part_numbers.push(number);
            }
        }

        let mut stock = BTreeMap::new();
        for (index, entry) in self.stock.iter().enumerate() {
            let warehouse_id = WarehouseId::new(entry.warehouse_id);
            if !warehouses.contains(&warehouse_id) {
                errors.add(&format!("stock.{index}.warehouse_id"), "Unknown warehouse.");
                continue;
            }
            let quantity = if entry.quantity.trim().is_empty() {
                0
            } else {
                match entry.quantity.trim().parse::<i32>() {
                    Ok(quantity) if quantity >= 0 => quantity,
                    _ => {
                        errors.add(
                            &format!("stock.{index}.quantity"),
                            "Must be a whole number of zero or more.",
                        );
                        0
                    }
                }
            };
            stock.insert(warehouse_id, quantity);
        }

        errors.finish(ProductInput {
            description: self.description.trim().to_owned(),
            sku: self.sku.trim().to_owned(),
            location_bin: self.location_bin.trim().to_owned(),
            list_price,
            buy_price,
            visibility,
            category: optional_text(&self.category),
            subcategory: optional_text(&self.subcategory),
            sub_subcategory: optional_text(&self.sub_subcategory),
            fitments,
            part_numbers,
            stock,
        })
    }
}

impl ProductInput {
    /// Input for a copy of `product` under `sku`. The copy starts as a draft
    /// with the same fitments, part numbers and stock levels.
    #[must_use]
    pub fn copy_of(product: &Product, sku: String) -> Self {
        Self {
            description: product.description.clone(),
            sku,
            location_bin: product.location_bin.clone(),
            list_price: product.list_price,
            buy_price: product.buy_price,
            visibility: Visibility::Draft,
            category: product.category.clone(),
            subcategory: product.subcategory.clone(),
            sub_subcategory: product.sub_subcategory.clone(),
            fitments: product
                .fitments
                .iter()
                .map(|f| FitmentInput {
                    year_from: f.year_from,
                    year_to: f.year_to,
                    make: f.make.clone(),
                    model: f.model.clone(),
                })
                .collect(),
            part_numbers: product.part_numbers.clone(),
            stock: product
                .stock
                .iter()
                .map(|level| (level.warehouse_id, level.quantity))
                .collect(),
        }
    }
}

/// A product with the sub-lists written to a catalog CSV.
#[derive(Debug, Clone)]
pub struct ProductExport {
    pub sku: String,
    pub description: String,
    pub location_bin: String,
    pub list_price: Decimal,
    pub buy_price: Decimal,
    pub visibility: Visibility,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub sub_subcategory: Option<String>,
    pub part_numbers: Vec<String>,
    pub fitments: Vec<Fitment>,
    pub stock: Vec<StockLevel>,
}

/// An uploaded image already written to the media directory.
#[derive(Debug, Clone)]
pub struct NewProductImage {
    pub file_name: String,
    pub original_name: String,
    pub content_type: String,
    pub size_bytes: i64,
}

/// SKU for a duplicated product: `<sku>-COPY`, then `<sku>-COPY-2`, and so
/// on until one is free. `taken` is compared case-insensitively.
#[must_use]
pub fn next_copy_sku(sku: &str, taken: &[String]) -> String {
    let is_taken = |candidate: &str| taken.iter().any(|t| t.eq_ignore_ascii_case(candidate));

    let base = format!("{sku}-COPY");
    if !is_taken(&base) {
        return base;
    }
    (2..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !is_taken(candidate))
        .unwrap_or(base)
}

/// Year range accepted for fitments, for form hints.
#[must_use]
pub fn fitment_year_range() -> (i32, i32) {
    (MIN_VEHICLE_YEAR, max_vehicle_year())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn fitment(from: &str, to: &str, make: &str, model: &str) -> FitmentForm {
        FitmentForm {
            year_from: from.to_string(),
            year_to: to.to_string(),
            make: make.to_string(),
            model: model.to_string(),
        }
    }

    fn form() -> ProductForm {
        ProductForm {
            description: "Front brake rotor".to_string(),
            sku: " BR-100 ".to_string(),
            list_price: "89.99".to_string(),
            ..ProductForm::default()
        }
    }

    #[test]
    fn test_valid_product() {
        let mut product = form();
        product.fitments = vec![
            fitment("2010", "2015", "Honda", "Civic"),
            FitmentForm::default(),
            fitment("2018", "", "Toyota", "Corolla"),
        ]
        .into();
        product.part_numbers = vec![
            "45251-SNA-A01".to_string(),
            " ".to_string(),
            "45251-sna-a01".to_string(),
            "BR100".to_string(),
        ]
        .into();
        product.stock = vec![StockForm {
            warehouse_id: 1,
            quantity: "4".to_string(),
        }];

        let input = product.into_input(&[WarehouseId::new(1)]).unwrap();
        assert_eq!(input.sku, "BR-100");
        assert_eq!(input.visibility, Visibility::Draft);
        assert_eq!(input.fitments.len(), 2);
        assert_eq!(input.fitments[1].year_to, 2018);
        assert_eq!(input.part_numbers, vec!["45251-SNA-A01", "BR100"]);
        assert_eq!(input.stock.get(&WarehouseId::new(1)), Some(&4));
    }

    #[test]
    fn test_required_fields() {
        let errors = ProductForm::default().into_input(&[]).unwrap_err();
        assert_eq!(errors.get("description"), Some("Description is required."));
        assert_eq!(errors.get("sku"), Some("Sku is required."));
        assert_eq!(errors.get("list_price"), Some("This field is required."));
    }

    #[test]
    fn test_fitment_rules() {
        let mut product = form();
        product.fitments = vec![
            fitment("2015", "2010", "Honda", "Civic"),
            fitment("1850", "1900", "Ford", "T"),
            fitment("", "2000", "", "Camry"),
        ]
        .into();
        let errors = product.into_input(&[]).unwrap_err();

        assert_eq!(
            errors.get("fitments.0.year_to"),
            Some("Must not be before the start year.")
        );
        assert!(errors.has("fitments.1.year_from"));
        assert_eq!(
            errors.get("fitments.2.year_from"),
            Some("This field is required.")
        );
        assert_eq!(errors.get("fitments.2.make"), Some("Make is required."));
    }

    #[test]
    fn test_stock_rules() {
        let mut product = form();
        product.stock = vec![
            StockForm {
                warehouse_id: 7,
                quantity: "1".to_string(),
            },
            StockForm {
                warehouse_id: 1,
                quantity: "-2".to_string(),
            },
        ];
        let errors = product.into_input(&[WarehouseId::new(1)]).unwrap_err();
        assert_eq!(errors.get("stock.0.warehouse_id"), Some("Unknown warehouse."));
        assert!(errors.has("stock.1.quantity"));
    }

    #[test]
    fn test_next_copy_sku() {
        assert_eq!(next_copy_sku("BR-100", &[]), "BR-100-COPY");
        let taken = vec!["br-100-copy".to_string(), "BR-100-COPY-2".to_string()];
        assert_eq!(next_copy_sku("BR-100", &taken), "BR-100-COPY-3");
    }

    #[test]
    fn test_blank_draft_has_stock_per_warehouse() {
        let warehouses = vec![
            Warehouse {
                id: WarehouseId::new(1),
                name: "Main".to_string(),
            },
            Warehouse {
                id: WarehouseId::new(2),
                name: "North".to_string(),
            },
        ];
        let draft = ProductForm::blank(&warehouses);
        assert_eq!(draft.stock.len(), 2);
        assert_eq!(draft.fitments.len(), 1);
        assert_eq!(draft.part_numbers.len(), 1);
    }

    #[test]
    fn test_spreadsheet_separators_are_rejected() {
        let mut product = form();
        product.fitments = vec![
            fitment("2010", "2015", "Land|Rover", "Defender"),
            fitment("2012", "2014", "Alfa \"Romeo\"", "Giulia|Sprint"),
            fitment("2011", "2011", "Aston Martin", "DB9"),
        ]
        .into();
        product.part_numbers = vec!["BR100".to_string(), "A|B".to_string()].into();
        let errors = product.into_input(&[]).unwrap_err();

        assert_eq!(errors.get("fitments.0.make"), Some("May not contain \"|\"."));
        assert_eq!(errors.get("fitments.1.make"), Some("May not contain quotes."));
        assert_eq!(errors.get("fitments.1.model"), Some("May not contain \"|\"."));
        assert!(!errors.has("fitments.2.make"));
        assert!(!errors.has("part_numbers.0"));
        assert_eq!(errors.get("part_numbers.1"), Some("May not contain \"|\"."));
    }
}
