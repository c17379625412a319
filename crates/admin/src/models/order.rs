//! Order domain types, list filters and the order form.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use partsdesk_core::{
    BlankRow, Email, InvoiceLine, InvoiceTotals, OrderId, OrderItemId, OrderStatus, OrderType,
    PaymentMethod, ProductId, Rows, SortDirection, StaffUserId,
};

use super::{non_empty, select_value};
use crate::validation::{FieldErrors, not_blank};

// =============================================================================
// Stored records
// =============================================================================

/// A postal address. Orders carry one for shipping and one for billing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Address {
    #[validate(length(max = 255))]
    pub street: String,
    #[validate(length(max = 100))]
    pub city: String,
    #[validate(length(max = 100))]
    pub province: String,
    #[validate(length(max = 20))]
    pub postal_code: String,
}

impl Address {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        [&self.street, &self.city, &self.province, &self.postal_code]
            .iter()
            .all(|s| s.trim().is_empty())
    }

    /// Printable lines: street, then `City, Province  Postal`.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(street) = non_empty(&self.street) {
            lines.push(street.to_owned());
        }
        let locality = [self.city.trim(), self.province.trim()]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(", ");
        let last = [locality.as_str(), self.postal_code.trim()]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("  ");
        if !last.is_empty() {
            lines.push(last);
        }
        lines
    }

    fn trimmed(&self) -> Self {
        Self {
            street: self.street.trim().to_owned(),
            city: self.city.trim().to_owned(),
            province: self.province.trim().to_owned(),
            postal_code: self.postal_code.trim().to_uppercase(),
        }
    }
}

/// A customer order.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    /// Employee who took the order.
    pub user_id: Option<StaffUserId>,
    pub employee: Option<String>,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: String,
    pub order_type: OrderType,
    pub shipping: Address,
    pub billing: Address,
    pub status: OrderStatus,
    pub discount: Decimal,
    pub notes: String,
    pub items: Vec<OrderItem>,
    pub payment: Option<Payment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[must_use]
    pub fn invoice_lines(&self) -> Vec<InvoiceLine> {
        self.items
            .iter()
            .map(|item| InvoiceLine {
                description: item.description.clone(),
                quantity: item.quantity,
                unit_price: item.price,
            })
            .collect()
    }

    #[must_use]
    pub fn totals(&self) -> InvoiceTotals {
        InvoiceTotals::compute(&self.invoice_lines(), self.discount)
    }
}

/// A line item joined with its product.
#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub description: String,
    pub sku: String,
    pub quantity: i32,
    /// Unit price at the time of sale.
    pub price: Decimal,
}

/// The payment recorded against an order.
#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub reference: String,
    pub paid_at: Option<DateTime<Utc>>,
}

/// One row of the orders table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderRow {
    pub id: OrderId,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: String,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub employee: Option<String>,
    pub item_count: i64,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// List filters
// =============================================================================

/// Query-string filters for the orders list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderFilters {
    pub search: String,
    pub status: String,
    pub order_type: String,
    pub user_id: String,
    pub sort: String,
    pub direction: String,
}

impl OrderFilters {
    #[must_use]
    pub fn search(&self) -> Option<&str> {
        non_empty(&self.search)
    }

    /// An order number typed into the search box (`1042` or `#1042`).
    #[must_use]
    pub fn search_id(&self) -> Option<i32> {
        self.search()?
            .trim_start_matches('#')
            .parse()
            .ok()
            .filter(|id| *id > 0)
    }

    #[must_use]
    pub fn status(&self) -> Option<OrderStatus> {
        non_empty(&self.status)?.parse().ok()
    }

    #[must_use]
    pub fn order_type(&self) -> Option<OrderType> {
        non_empty(&self.order_type)?.parse().ok()
    }

    #[must_use]
    pub fn user_id(&self) -> Option<StaffUserId> {
        non_empty(&self.user_id)?.parse().ok().map(StaffUserId::new)
    }

    #[must_use]
    pub fn sort(&self) -> OrderSort {
        OrderSort::from_query(&self.sort)
    }

    #[must_use]
    pub fn direction(&self) -> SortDirection {
        SortDirection::from_query(non_empty(&self.direction))
    }
}

/// Sortable columns of the orders table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderSort {
    #[default]
    CreatedAt,
    CustomerName,
    Status,
    OrderType,
    Total,
}

impl OrderSort {
    #[must_use]
    pub fn from_query(value: &str) -> Self {
        match value.trim() {
            "customer_name" => Self::CustomerName,
            "status" => Self::Status,
            "order_type" => Self::OrderType,
            "total" => Self::Total,
            _ => Self::CreatedAt,
        }
    }

    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "o.created_at",
            Self::CustomerName => "o.customer_name",
            Self::Status => "o.status",
            Self::OrderType => "o.order_type",
            Self::Total => "t.total",
        }
    }
}

// =============================================================================
// Forms
// =============================================================================

/// The order form as submitted by the browser.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct OrderForm {
    #[serde(deserialize_with = "select_value")]
    pub user_id: String,
    #[validate(custom(function = "not_blank"), length(max = 255))]
    pub customer_name: String,
    pub customer_email: String,
    #[validate(length(max = 50))]
    pub customer_phone: String,
    pub order_type: String,
    #[validate(nested)]
    pub shipping: Address,
    #[validate(nested)]
    pub billing: Address,
    pub status: String,
    pub discount: String,
    pub notes: String,
    pub items: Rows<OrderItemForm>,
    pub payment: PaymentForm,
}

/// One editable line item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderItemForm {
    #[serde(deserialize_with = "select_value")]
    pub product_id: String,
    pub quantity: String,
    /// Blank means the product's list price.
    pub price: String,
}

impl BlankRow for OrderItemForm {
    fn is_blank(&self) -> bool {
        self.product_id.trim().is_empty() && self.quantity.trim().is_empty() && self.price.trim().is_empty()
    }
}

/// Payment fields; all blank means no payment recorded yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentForm {
    pub method: String,
    pub amount: String,
    pub reference: String,
    /// `YYYY-MM-DD` or RFC 3339.
    pub paid_at: String,
}

impl PaymentForm {
    fn is_blank(&self) -> bool {
        [&self.method, &self.amount, &self.reference, &self.paid_at]
            .iter()
            .all(|s| s.trim().is_empty())
    }
}

/// `PATCH /orders/{id}/status` body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OrderStatusForm {
    pub status: String,
}

/// A validated order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderInput {
    pub user_id: Option<StaffUserId>,
    pub customer_name: String,
    pub customer_email: Option<Email>,
    pub customer_phone: String,
    pub order_type: OrderType,
    pub shipping: Address,
    pub billing: Address,
    pub status: OrderStatus,
    pub discount: Decimal,
    pub notes: String,
    pub items: Vec<OrderItemInput>,
    pub payment: Option<PaymentInput>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItemInput {
    pub product_id: ProductId,
    pub quantity: i32,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentInput {
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub reference: String,
    pub paid_at: Option<DateTime<Utc>>,
}

impl OrderForm {
    /// Empty draft with one item row.
    #[must_use]
    pub fn blank() -> Self {
        let mut form = Self::default();
        form.items.push(OrderItemForm::default());
        form
    }

    #[must_use]
    pub fn from_order(order: &Order) -> Self {
        Self {
            user_id: order.user_id.map(|id| id.to_string()).unwrap_or_default(),
            customer_name: order.customer_name.clone(),
            customer_email: order.customer_email.clone().unwrap_or_default(),
            customer_phone: order.customer_phone.clone(),
            order_type: order.order_type.as_str().to_owned(),
            shipping: order.shipping.clone(),
            billing: order.billing.clone(),
            status: order.status.as_str().to_owned(),
            discount: order.discount.to_string(),
            notes: order.notes.clone(),
            items: order
                .items
                .iter()
                .map(|item| OrderItemForm {
                    product_id: item.product_id.to_string(),
                    quantity: item.quantity.to_string(),
                    price: item.price.to_string(),
                })
                .collect::<Vec<_>>()
                .into(),
            payment: order
                .payment
                .as_ref()
                .map(|payment| PaymentForm {
                    method: payment.method.as_str().to_owned(),
                    amount: payment.amount.to_string(),
                    reference: payment.reference.clone(),
                    paid_at: payment
                        .paid_at
                        .map(|at| at.date_naive().to_string())
                        .unwrap_or_default(),
                })
                .unwrap_or_default(),
        }
    }

    /// Product ids referenced by filled item rows.
    #[must_use]
    pub fn product_ids(&self) -> Vec<ProductId> {
        let mut ids: Vec<ProductId> = self
            .items
            .iter()
            .filter_map(|item| non_empty(&item.product_id)?.parse().ok().map(ProductId::new))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Validate the draft.
    ///
    /// `list_prices` holds every referenced product that exists, keyed to its
    /// list price, which fills in blank item prices. `staff_ids` are the
    /// employees an order may be attributed to.
    ///
    /// # Errors
    ///
    /// Returns every field error found.
    pub fn into_input(
        self,
        list_prices: &BTreeMap<ProductId, Decimal>,
        staff_ids: &[StaffUserId],
    ) -> Result<OrderInput, FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.check(&self);

        let user_id = non_empty(&self.user_id)
            .and_then(|raw| errors.parse::<i32>("user_id", raw, "Choose an existing employee."))
            .map(StaffUserId::new);
        if let Some(id) = user_id {
            if !staff_ids.contains(&id) {
                errors.add("user_id", "Choose an existing employee.");
            }
        }

        let customer_email = match non_empty(&self.customer_email) {
            Some(raw) => Email::parse(raw)
                .map_err(|_| {
                    errors.add("customer_email", "Customer email must be a valid email address.");
                })
                .ok(),
            None => None,
        };

        let order_type: OrderType = errors.choice("order_type", &self.order_type);
        if order_type.requires_address() {
            if self.shipping.street.trim().is_empty() {
                errors.add(
                    "shipping.street",
                    "A street address is required for delivery and shipping.",
                );
            }
            if self.shipping.city.trim().is_empty() {
                errors.add(
                    "shipping.city",
                    "A city is required for delivery and shipping.",
                );
            }
        }

        let status = errors.choice("status", &self.status);
        let discount = errors.money_or_zero("discount", &self.discount);

        let mut items = Vec::new();
        for (index, item) in self.items.iter().enumerate() {
            if item.is_blank() {
                continue;
            }
            let prefix = format!("items.{index}");
            let product_field = format!("{prefix}.product_id");
            let product = match non_empty(&item.product_id) {
                None => {
                    errors.add(&product_field, "Choose a product.");
                    None
                }
                Some(raw) => errors
                    .parse::<i32>(&product_field, raw, "Choose an existing product.")
                    .map(ProductId::new),
            };
            let list_price = product.and_then(|id| {
                let price = list_prices.get(&id).copied();
                if price.is_none() {
                    errors.add(&product_field, "Choose an existing product.");
                }
                price
            });

            let quantity = match item.quantity.trim().parse::<i32>() {
                Ok(quantity) if quantity >= 1 => quantity,
                _ => {
                    errors.add(
                        &format!("{prefix}.quantity"),
                        "Quantity must be a whole number of at least 1.",
                    );
                    1
                }
            };

            let price = if item.price.trim().is_empty() {
                list_price.unwrap_or_default()
            } else {
                errors.money(&format!("{prefix}.price"), &item.price)
            };

            if let Some(product_id) = product {
                items.push(OrderItemInput {
                    product_id,
                    quantity,
                    price,
                });
            }
        }
        if items.is_empty() && !errors.iter().any(|(field, _)| field.starts_with("items.")) {
            errors.add("items", "Add at least one item.");
        }

        let payment = if self.payment.is_blank() {
            None
        } else {
            let method = errors.parse(
                "payment.method",
                &self.payment.method,
                "Choose a payment method.",
            );
            let amount = errors.money("payment.amount", &self.payment.amount);
            let paid_at = parse_paid_at(&mut errors, &self.payment.paid_at);
            method.map(|method| PaymentInput {
                method,
                amount,
                reference: self.payment.reference.trim().to_owned(),
                paid_at,
            })
        };

        let shipping = self.shipping.trimmed();
        let billing = if self.billing.is_empty() {
            shipping.clone()
        } else {
            self.billing.trimmed()
        };

        errors.finish(OrderInput {
            user_id,
            customer_name: self.customer_name.trim().to_owned(),
            customer_email,
            customer_phone: self.customer_phone.trim().to_owned(),
            order_type,
            shipping,
            billing,
            status,
            discount,
            notes: self.notes.trim().to_owned(),
            items,
            payment,
        })
    }
}

impl OrderStatusForm {
    /// # Errors
    ///
    /// Returns a `status` field error for unknown statuses.
    pub fn into_status(self) -> Result<OrderStatus, FieldErrors> {
        self.status
            .trim()
            .parse()
            .map_err(|_| FieldErrors::single("status", "Choose a valid status."))
    }
}

fn parse_paid_at(errors: &mut FieldErrors, raw: &str) -> Option<DateTime<Utc>> {
    let raw = non_empty(raw)?;
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => date.and_hms_opt(0, 0, 0).map(|at| at.and_utc()),
        Err(_) => {
            errors.add("payment.paid_at", "Must be a date.");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn catalog() -> BTreeMap<ProductId, Decimal> {
        BTreeMap::from([
            (ProductId::new(1), Decimal::new(4999, 2)),
            (ProductId::new(2), Decimal::new(1500, 2)),
        ])
    }

    fn item(product_id: Option<i32>, quantity: &str, price: &str) -> OrderItemForm {
        OrderItemForm {
            product_id: product_id.map(|id| id.to_string()).unwrap_or_default(),
            quantity: quantity.to_string(),
            price: price.to_string(),
        }
    }

    fn form(items: Vec<OrderItemForm>) -> OrderForm {
        OrderForm {
            customer_name: "Dana Fix-It".to_string(),
            items: items.into(),
            ..OrderForm::default()
        }
    }

    #[test]
    fn test_valid_pickup_order() {
        let input = form(vec![item(Some(1), "2", ""), item(Some(2), "1", "12.00")])
            .into_input(&catalog(), &[])
            .unwrap();
        assert_eq!(input.order_type, OrderType::Pickup);
        assert_eq!(input.items.len(), 2);
        assert_eq!(input.items[0].price, Decimal::new(4999, 2));
        assert_eq!(input.items[1].price, Decimal::new(1200, 2));
        assert!(input.payment.is_none());
    }

    #[test]
    fn test_item_rules() {
        let errors = form(vec![
            item(Some(1), "0", ""),
            item(Some(99), "1", "-1"),
            item(None, "3", ""),
            OrderItemForm::default(),
        ])
        .into_input(&catalog(), &[])
        .unwrap_err();

        assert!(errors.has("items.0.quantity"));
        assert_eq!(
            errors.get("items.1.product_id"),
            Some("Choose an existing product.")
        );
        assert_eq!(errors.get("items.1.price"), Some("Must be zero or more."));
        assert_eq!(errors.get("items.2.product_id"), Some("Choose a product."));
        assert!(!errors.has("items.3.product_id"));
    }

    #[test]
    fn test_needs_an_item_and_a_customer() {
        let mut order = form(vec![OrderItemForm::default()]);
        order.customer_name = String::new();
        let errors = order.into_input(&catalog(), &[]).unwrap_err();
        assert_eq!(errors.get("items"), Some("Add at least one item."));
        assert_eq!(errors.get("customer_name"), Some("Customer name is required."));
    }

    #[test]
    fn test_delivery_requires_shipping_address() {
        let mut order = form(vec![item(Some(1), "1", "")]);
        order.order_type = "delivery".to_string();
        let errors = order.clone().into_input(&catalog(), &[]).unwrap_err();
        assert!(errors.has("shipping.street"));
        assert!(errors.has("shipping.city"));

        order.shipping = Address {
            street: "12 King St".to_string(),
            city: "Hamilton".to_string(),
            province: "ON".to_string(),
            postal_code: "l8p 1a1".to_string(),
        };
        let input = order.into_input(&catalog(), &[]).unwrap();
        assert_eq!(input.shipping.postal_code, "L8P 1A1");
        assert_eq!(input.billing, input.shipping);
    }

    #[test]
    fn test_payment() {
        let mut order = form(vec![item(Some(1), "1", "")]);
        order.payment = PaymentForm {
            method: "etransfer".to_string(),
            amount: "56.49".to_string(),
            reference: " REF-1 ".to_string(),
            paid_at: "2026-03-14".to_string(),
        };
        let payment = order.clone().into_input(&catalog(), &[]).unwrap().payment.unwrap();
        assert_eq!(payment.method, PaymentMethod::Etransfer);
        assert_eq!(payment.reference, "REF-1");
        assert_eq!(
            payment.paid_at.unwrap().to_rfc3339(),
            "2026-03-14T00:00:00+00:00"
        );

        order.payment.method = "bitcoin".to_string();
        order.payment.paid_at = "yesterday".to_string();
        let errors = order.into_input(&catalog(), &[]).unwrap_err();
        assert!(errors.has("payment.method"));
        assert!(errors.has("payment.paid_at"));
    }

    #[test]
    fn test_select_values_from_json() {
        let order: OrderForm = serde_json::from_value(serde_json::json!({
            "user_id": "",
            "customer_name": "Dana Fix-It",
            "items": [
                {"product_id": 1, "quantity": "1"},
                {"product_id": "2", "quantity": "1"},
                {"product_id": "", "quantity": "2"},
                {"product_id": "abc", "quantity": "1"}
            ]
        }))
        .unwrap();
        assert_eq!(order.product_ids(), vec![ProductId::new(1), ProductId::new(2)]);

        let errors = order.into_input(&catalog(), &[]).unwrap_err();
        assert!(!errors.has("user_id"));
        assert_eq!(errors.get("items.2.product_id"), Some("Choose a product."));
        assert_eq!(
            errors.get("items.3.product_id"),
            Some("Choose an existing product.")
        );
    }

    #[test]
    fn test_product_ids_are_unique() {
        let order = form(vec![
            item(Some(2), "1", ""),
            item(Some(1), "1", ""),
            item(Some(2), "1", ""),
        ]);
        assert_eq!(
            order.product_ids(),
            vec![ProductId::new(1), ProductId::new(2)]
        );
    }

    #[test]
    fn test_address_lines() {
        let address = Address {
            street: "1 Main St".to_string(),
            city: "Guelph".to_string(),
            province: "ON".to_string(),
            postal_code: "N1H 1A1".to_string(),
        };
        assert_eq!(address.lines(), vec!["1 Main St", "Guelph, ON  N1H 1A1"]);
        assert!(Address::default().lines().is_empty());
    }

    #[test]
    fn test_filters_search_by_id() {
        let filters = OrderFilters {
            search: "#1042".to_string(),
            ..OrderFilters::default()
        };
        assert_eq!(filters.search_id(), Some(1042));
        let filters = OrderFilters {
            search: "Dana".to_string(),
            sort: "total".to_string(),
            ..OrderFilters::default()
        };
        assert_eq!(filters.search_id(), None);
        assert_eq!(filters.sort(), OrderSort::Total);
    }

    #[test]
    fn test_status_form() {
        let form = OrderStatusForm {
            status: "fulfilled".to_string(),
        };
        assert_eq!(form.into_status().unwrap(), OrderStatus::Fulfilled);
        let form = OrderStatusForm {
            status: "lost".to_string(),
        };
        assert!(form.into_status().unwrap_err().has("status"));
    }
}
