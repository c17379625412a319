//! Catalog spreadsheet import and export.
//!
//! One CSV row per product. Sub-lists are packed into single cells joined
//! with `|`:
//!
//! - `part_numbers`: `45251-SNA-A01|BR100`
//! - `fitments`: `2010-2015 Honda Civic|2018-2018 "Land Rover" Defender`
//! - `stock`: `Main:4|North:0`
//!
//! A make with spaces is quoted so the model can be told apart from it. The
//! product form rejects `|` inside part numbers, makes and models.
//!
//! Imported rows go through the same [`ProductForm`] validation as the
//! product editor.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use partsdesk_core::WarehouseId;

use crate::models::product::{
    Fitment, FitmentForm, LIST_SEPARATOR, ProductExport, ProductForm, ProductInput, StockForm,
    Warehouse,
};

/// Column order of exported files. Imports require `sku`; the rest may be
/// missing or reordered.
pub const HEADER: [&str; 12] = [
    "sku",
    "description",
    "location_bin",
    "list_price",
    "buy_price",
    "visibility",
    "category",
    "subcategory",
    "sub_subcategory",
    "part_numbers",
    "fitments",
    "stock",
];

#[derive(Debug, Error)]
pub enum CatalogCsvError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("the file has no \"sku\" column")]
    MissingSkuColumn,

    #[error("failed to finish csv output: {0}")]
    Flush(String),
}

/// One catalog row as it appears in the file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogRecord {
    pub sku: String,
    pub description: String,
    pub location_bin: String,
    pub list_price: String,
    pub buy_price: String,
    pub visibility: String,
    pub category: String,
    pub subcategory: String,
    pub sub_subcategory: String,
    pub part_numbers: String,
    pub fitments: String,
    pub stock: String,
}

impl From<&ProductExport> for CatalogRecord {
    fn from(product: &ProductExport) -> Self {
        Self {
            sku: product.sku.clone(),
            description: product.description.clone(),
            location_bin: product.location_bin.clone(),
            list_price: product.list_price.to_string(),
            buy_price: product.buy_price.to_string(),
            visibility: product.visibility.as_str().to_owned(),
            category: product.category.clone().unwrap_or_default(),
            subcategory: product.subcategory.clone().unwrap_or_default(),
            sub_subcategory: product.sub_subcategory.clone().unwrap_or_default(),
            part_numbers: join(product.part_numbers.iter().cloned()),
            fitments: join(product.fitments.iter().map(fitment_cell)),
            stock: join(
                product
                    .stock
                    .iter()
                    .map(|s| format!("{}:{}", s.warehouse, s.quantity)),
            ),
        }
    }
}

impl CatalogRecord {
    /// Unpack the cells into a product form draft.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first cell that cannot be read.
    pub fn into_form(self, warehouses: &[Warehouse]) -> Result<ProductForm, String> {
        let fitments = split(&self.fitments)
            .map(|cell| {
                parse_fitment(cell).ok_or_else(|| format!("fitments: cannot read \"{cell}\""))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let stock = split(&self.stock)
            .map(|cell| parse_stock(cell, warehouses))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ProductForm {
            description: self.description,
            sku: self.sku,
            location_bin: self.location_bin,
            list_price: self.list_price,
            buy_price: self.buy_price,
            visibility: self.visibility,
            category: self.category,
            subcategory: self.subcategory,
            sub_subcategory: self.sub_subcategory,
            fitments: fitments.into(),
            part_numbers: split(&self.part_numbers)
                .map(str::to_owned)
                .collect::<Vec<_>>()
                .into(),
            stock,
        })
    }
}

fn join(values: impl Iterator<Item = String>) -> String {
    values.collect::<Vec<_>>().join(&LIST_SEPARATOR.to_string())
}

fn split(cell: &str) -> impl Iterator<Item = &str> {
    cell.split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// `2010-2015 Honda Civic`, `2010-2015 "Land Rover" Defender`.
fn fitment_cell(fitment: &Fitment) -> String {
    let make = if fitment.make.contains(char::is_whitespace) {
        format!("\"{}\"", fitment.make)
    } else {
        fitment.make.clone()
    };
    format!(
        "{}-{} {make} {}",
        fitment.year_from, fitment.year_to, fitment.model
    )
}

/// `2010-2015 Honda Civic`, `2018 Toyota Corolla Hatchback`,
/// `2012-2016 "Alfa Romeo" Giulietta`.
fn parse_fitment(cell: &str) -> Option<FitmentForm> {
    let (years, vehicle) = cell.split_once(char::is_whitespace)?;
    let vehicle = vehicle.trim();
    let (make, model) = match vehicle.strip_prefix('"') {
        Some(quoted) => quoted.split_once('"')?,
        None => vehicle.split_once(char::is_whitespace)?,
    };
    let (year_from, year_to) = years.split_once('-').unwrap_or((years, ""));
    Some(FitmentForm {
        year_from: year_from.to_owned(),
        year_to: year_to.to_owned(),
        make: make.trim().to_owned(),
        model: model.trim().to_owned(),
    })
}

/// `Main:4`, matched to a warehouse by name, ignoring case.
fn parse_stock(cell: &str, warehouses: &[Warehouse]) -> Result<StockForm, String> {
    let (name, quantity) = cell
        .rsplit_once(':')
        .ok_or_else(|| format!("stock: cannot read \"{cell}\""))?;
    let name = name.trim();
    let warehouse = warehouses
        .iter()
        .find(|w| w.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| format!("stock: unknown warehouse \"{name}\""))?;
    Ok(StockForm {
        warehouse_id: warehouse.id.as_i32(),
        quantity: quantity.trim().to_owned(),
    })
}

/// Write products as a catalog CSV.
///
/// # Errors
///
/// Returns `CatalogCsvError` if a record cannot be serialized.
pub fn write_catalog(products: &[ProductExport]) -> Result<Vec<u8>, CatalogCsvError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(HEADER)?;
    for product in products {
        writer.serialize(CatalogRecord::from(product))?;
    }
    writer
        .into_inner()
        .map_err(|e| CatalogCsvError::Flush(e.error().to_string()))
}

/// One data row of an import file.
#[derive(Debug)]
pub struct ImportRow {
    /// 1-based line number in the file; the header is line 1.
    pub line: u64,
    pub product: Result<ProductInput, String>,
}

/// Read and validate an import file. Rows are returned in file order; bad
/// rows carry their error instead of stopping the import.
///
/// # Errors
///
/// Returns `CatalogCsvError` if the header cannot be read or has no `sku`
/// column.
pub fn read_catalog(
    bytes: &[u8],
    warehouses: &[Warehouse],
) -> Result<Vec<ImportRow>, CatalogCsvError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(bytes);

    let headers = reader.headers()?.clone();
    if !headers.iter().any(|h| h.eq_ignore_ascii_case("sku")) {
        return Err(CatalogCsvError::MissingSkuColumn);
    }
    let headers = csv::StringRecord::from(
        headers
            .iter()
            .map(|h| h.to_ascii_lowercase())
            .collect::<Vec<_>>(),
    );

    let warehouse_ids: Vec<WarehouseId> = warehouses.iter().map(|w| w.id).collect();
    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let fallback_line = u64::try_from(index).unwrap_or(u64::MAX).saturating_add(2);
        let (line, product) = match record {
            Ok(record) => {
                let line = record.position().map_or(fallback_line, csv::Position::line);
                let product = record
                    .deserialize::<CatalogRecord>(Some(&headers))
                    .map_err(|e| e.to_string())
                    .and_then(|r| r.into_form(warehouses))
                    .and_then(|form| {
                        form.into_input(&warehouse_ids)
                            .map_err(|errors| errors.to_string())
                    });
                (line, product)
            }
            Err(e) => (fallback_line, Err(e.to_string())),
        };
        rows.push(ImportRow { line, product });
    }
    Ok(rows)
}

/// A row that was not imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportFailure {
    pub line: u64,
    pub message: String,
}

/// Outcome of an import, reported back to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub created: u32,
    pub updated: u32,
    pub failed: Vec<ImportFailure>,
}

impl ImportReport {
    pub fn fail(&mut self, line: u64, message: impl Into<String>) {
        self.failed.push(ImportFailure {
            line,
            message: message.into(),
        });
    }

    /// One-line summary for the flash message.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Import finished: {} created, {} updated, {} failed.",
            self.created,
            self.updated,
            self.failed.len()
        );
        for failure in self.failed.iter().take(5) {
            summary.push_str(&format!(" Line {}: {}.", failure.line, failure.message));
        }
        if self.failed.len() > 5 {
            summary.push_str(&format!(" {} more not shown.", self.failed.len() - 5));
        }
        summary
    }
}
