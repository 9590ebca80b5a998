//! Inbound order document and money representation

use std::fmt;
use std::ops::Mul;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Completion message for a run whose input failed validation
pub const REJECTION_REPORT: &str = "Order is not valid";

/// A monetary amount with two decimal places, stored as integer cents
///
/// Prices arrive as JSON numbers (`19.99`) and are rounded to the nearest
/// cent on deserialization. All arithmetic stays in integer cents, so
/// `unit_price * quantity` is exact and never accumulates float drift;
/// multiplication saturates at the i64 bounds rather than overflowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(i64);

impl Money {
    /// Zero amount
    pub const ZERO: Money = Money(0);

    /// Create an amount from integer cents
    pub fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// The amount in integer cents
    pub fn cents(self) -> i64 {
        self.0
    }

    /// Check whether the amount is strictly greater than zero
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }
}

impl Mul<i64> for Money {
    type Output = Money;

    fn mul(self, quantity: i64) -> Money {
        Money(self.0.saturating_mul(quantity))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0 as f64 / 100.0)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        if !value.is_finite() {
            return Err(serde::de::Error::custom("amount must be a finite number"));
        }
        Ok(Money((value * 100.0).round() as i64))
    }
}

/// The inbound order document, immutable once accepted
///
/// Field names follow the wire format of the start-run endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputOrder {
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: Money,
}

impl InputOrder {
    /// Validate the order document
    ///
    /// The orchestration must not begin when this returns false: the run
    /// completes immediately with [`REJECTION_REPORT`] instead.
    pub fn validate(&self) -> bool {
        !self.product_name.is_empty() && self.quantity > 0 && self.unit_price.is_positive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(product_name: &str, quantity: i64, cents: i64) -> InputOrder {
        InputOrder {
            product_name: product_name.to_string(),
            quantity,
            unit_price: Money::from_cents(cents),
        }
    }

    #[test]
    fn test_valid_order() {
        assert!(order("Widget", 5, 1000).validate());
    }

    #[test]
    fn test_empty_product_name_rejected() {
        assert!(!order("", 5, 1000).validate());
    }

    #[test]
    fn test_non_positive_quantity_rejected() {
        assert!(!order("Widget", 0, 1000).validate());
        assert!(!order("Widget", -3, 1000).validate());
    }

    #[test]
    fn test_non_positive_price_rejected() {
        assert!(!order("Widget", 5, 0).validate());
        assert!(!order("Widget", 5, -50).validate());
    }

    #[test]
    fn test_money_multiplication_is_exact() {
        let unit_price = Money::from_cents(1999);
        assert_eq!(unit_price * 3, Money::from_cents(5997));
        assert_eq!((unit_price * 3).to_string(), "59.97");
    }

    #[test]
    fn test_money_multiplication_saturates() {
        let huge = Money::from_cents(i64::MAX / 2);
        assert_eq!(huge * 1000, Money::from_cents(i64::MAX));
        assert_eq!(Money::from_cents(i64::MIN / 2) * 1000, Money::from_cents(i64::MIN));
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_cents(5000).to_string(), "50.00");
        assert_eq!(Money::from_cents(7).to_string(), "0.07");
        assert_eq!(Money::from_cents(-125).to_string(), "-1.25");
    }

    #[test]
    fn test_money_json_round_trip() {
        let price: Money = serde_json::from_str("19.99").unwrap();
        assert_eq!(price, Money::from_cents(1999));

        let json = serde_json::to_string(&price).unwrap();
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(back, price);
    }

    #[test]
    fn test_input_order_wire_format() {
        let json = r#"{"productName":"Widget","quantity":5,"unitPrice":10.00}"#;
        let input: InputOrder = serde_json::from_str(json).unwrap();

        assert_eq!(input.product_name, "Widget");
        assert_eq!(input.quantity, 5);
        assert_eq!(input.unit_price, Money::from_cents(1000));
    }
}
