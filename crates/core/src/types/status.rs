//! Status and kind enums for leads, orders and products.
//!
//! Every enum here is stored as a Postgres enum type (with the `postgres`
//! feature), travels as a lowercase string over the wire, and can be parsed
//! back from query-string filter values with `FromStr`.

use serde::{Deserialize, Serialize};

/// Error returned when a string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value}")]
pub struct UnknownVariant {
    /// Which enum was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Generates `as_str`, `label`, `ALL`, `Display` and `FromStr` for a
/// fieldless enum whose variants map 1:1 to lowercase wire names.
macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => ($wire:literal, $label:literal)),+ $(,)? }) => {
        impl $name {
            /// Every variant, in display order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Wire / database name.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }

            /// Human-readable label for tables and invoices.
            #[must_use]
            pub const fn label(self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($wire => Ok(Self::$variant),)+
                    _ => Err(UnknownVariant {
                        kind: $kind,
                        value: s.to_owned(),
                    }),
                }
            }
        }
    };
}

/// Overall status of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "lead_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    /// Quoted, not yet accepted.
    #[default]
    Quote,
    /// Accepted and being sourced.
    Processing,
    /// All parts delivered.
    Fulfilled,
}

string_enum!(LeadStatus, "lead status", {
    Quote => ("quote", "Quote"),
    Processing => ("processing", "Processing"),
    Fulfilled => ("fulfilled", "Fulfilled"),
});

/// Whether the customer has paid for a requested part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Paid,
}

string_enum!(PaymentStatus, "payment status", {
    Unpaid => ("unpaid", "Unpaid"),
    Paid => ("paid", "Paid"),
});

/// Sourcing progress of a single requested part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "part_fulfillment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PartFulfillmentStatus {
    #[default]
    Pending,
    Ordered,
    Received,
    Delivered,
}

string_enum!(PartFulfillmentStatus, "fulfillment status", {
    Pending => ("pending", "Pending"),
    Ordered => ("ordered", "Ordered"),
    Received => ("received", "Received"),
    Delivered => ("delivered", "Delivered"),
});

/// How an order reaches the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    #[default]
    Pickup,
    Delivery,
    Ship,
}

string_enum!(OrderType, "order type", {
    Pickup => ("pickup", "Pickup"),
    Delivery => ("delivery", "Delivery"),
    Ship => ("ship", "Ship"),
});

impl OrderType {
    /// Whether the order needs a shipping address.
    #[must_use]
    pub const fn requires_address(self) -> bool {
        matches!(self, Self::Delivery | Self::Ship)
    }
}

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Processing,
    Fulfilled,
    Canceled,
}

string_enum!(OrderStatus, "order status", {
    Processing => ("processing", "Processing"),
    Fulfilled => ("fulfilled", "Fulfilled"),
    Canceled => ("canceled", "Canceled"),
});

/// How an order was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    #[default]
    Card,
    Etransfer,
    Cheque,
    /// Charged to the customer's store account.
    Account,
}

string_enum!(PaymentMethod, "payment method", {
    Cash => ("cash", "Cash"),
    Card => ("card", "Card"),
    Etransfer => ("etransfer", "E-Transfer"),
    Cheque => ("cheque", "Cheque"),
    Account => ("account", "On Account"),
});

/// Catalog exposure of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "visibility", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
    #[default]
    Draft,
}

string_enum!(Visibility, "visibility", {
    Public => ("public", "Public"),
    Private => ("private", "Private"),
    Draft => ("draft", "Draft"),
});

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_lead_status_parse_is_case_insensitive() {
        assert_eq!("Quote".parse::<LeadStatus>().unwrap(), LeadStatus::Quote);
        assert_eq!(
            " PROCESSING ".parse::<LeadStatus>().unwrap(),
            LeadStatus::Processing
        );
    }

    #[test]
    fn test_unknown_variant_reports_kind() {
        let err = "archived".parse::<OrderStatus>().unwrap_err();
        assert_eq!(err.to_string(), "invalid order status: archived");
    }

    #[test]
    fn test_all_variants_roundtrip_through_str() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), *status);
        }
        for visibility in Visibility::ALL {
            assert_eq!(
                visibility.to_string().parse::<Visibility>().unwrap(),
                *visibility
            );
        }
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&PartFulfillmentStatus::Received).unwrap();
        assert_eq!(json, "\"received\"");
        let method: PaymentMethod = serde_json::from_str("\"etransfer\"").unwrap();
        assert_eq!(method, PaymentMethod::Etransfer);
    }

    #[test]
    fn test_order_type_requires_address() {
        assert!(!OrderType::Pickup.requires_address());
        assert!(OrderType::Delivery.requires_address());
        assert!(OrderType::Ship.requires_address());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(LeadStatus::default(), LeadStatus::Quote);
        assert_eq!(Visibility::default(), Visibility::Draft);
        assert_eq!(PaymentStatus::default(), PaymentStatus::Unpaid);
    }
}
