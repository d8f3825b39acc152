use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::PayloadError;

/// Values the extraction step emits when it has nothing real to report.
const PLACEHOLDER_VALUES: &[&str] = &["n/a", "none", "null", "unknown", "undefined", "-", "tbd"];

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderCode(String);

impl OrderCode {
    pub fn parse(value: &str) -> Result<Self, PayloadError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(PayloadError::MissingField { field: "orderCode" });
        }
        let valid = trimmed.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
        if !valid {
            return Err(PayloadError::InvalidField {
                field: "orderCode",
                reason: format!("`{trimmed}` may only contain letters, digits, `-` and `_`"),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl CustomerInfo {
    pub fn sanitized(self) -> Option<Self> {
        let cleaned = Self {
            name: clean_text(self.name),
            phone: clean_text(self.phone),
            email: clean_text(self.email),
            address: clean_text(self.address),
        };
        (cleaned != Self::default()).then_some(cleaned)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductLine {
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "product_id")]
    pub product_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "quantity_needed")]
    pub quantity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "unit_price")]
    pub unit_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ProductLine {
    /// Drops lines that name no product and rejects impossible quantities or prices.
    pub fn sanitized(self) -> Result<Option<Self>, PayloadError> {
        let product_id = clean_text(self.product_id);
        let name = clean_text(self.name);
        if product_id.is_none() && name.is_none() {
            return Ok(None);
        }

        if self.quantity == Some(0) {
            return Err(PayloadError::InvalidField {
                field: "products.quantity",
                reason: format!(
                    "quantity for `{}` must be greater than zero",
                    name.as_deref().or(product_id.as_deref()).unwrap_or_default()
                ),
            });
        }

        if let Some(price) = self.unit_price {
            if price.is_sign_negative() {
                return Err(PayloadError::InvalidField {
                    field: "products.unitPrice",
                    reason: format!("unit price {price} cannot be negative"),
                });
            }
        }

        Ok(Some(Self {
            product_id,
            name,
            quantity: self.quantity,
            unit_price: self.unit_price,
            notes: clean_text(self.notes),
        }))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl PaymentInfo {
    pub fn sanitized(self) -> Option<Self> {
        let cleaned = Self { method: clean_text(self.method), status: clean_text(self.status) };
        (cleaned != Self::default()).then_some(cleaned)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "expected_date")]
    pub expected_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl DeliveryInfo {
    pub fn sanitized(self) -> Option<Self> {
        let cleaned = Self {
            address: clean_text(self.address),
            method: clean_text(self.method),
            expected_date: clean_text(self.expected_date),
            notes: clean_text(self.notes),
        };
        (cleaned != Self::default()).then_some(cleaned)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelInfo {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "user_id")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "page_id")]
    pub page_id: Option<String>,
}

impl ChannelInfo {
    pub fn sanitized(self) -> Option<Self> {
        let cleaned = Self {
            kind: clean_text(self.kind),
            user_id: clean_text(self.user_id),
            page_id: clean_text(self.page_id),
        };
        (cleaned != Self::default()).then_some(cleaned)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMetadata {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub source: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Normal,
    High,
    Urgent,
}

impl Urgency {
    /// Lenient mapping from free-text urgency; unrecognized values are treated as unstated.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "normal" | "medium" | "standard" => Some(Self::Normal),
            "high" => Some(Self::High),
            "urgent" | "asap" | "critical" => Some(Self::Urgent),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

/// Fields an update may touch. Absent sections are left unchanged by the backend.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub products: Option<Vec<ProductLine>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliveryInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl OrderChanges {
    pub fn sanitized(self) -> Result<Option<Self>, PayloadError> {
        let products = match self.products {
            Some(lines) => {
                let kept = sanitize_lines(lines)?;
                (!kept.is_empty()).then_some(kept)
            }
            None => None,
        };

        let cleaned = Self {
            customer: self.customer.and_then(CustomerInfo::sanitized),
            products,
            delivery: self.delivery.and_then(DeliveryInfo::sanitized),
            payment: self.payment.and_then(PaymentInfo::sanitized),
            notes: clean_text(self.notes),
        };
        Ok((cleaned != Self::default()).then_some(cleaned))
    }
}

pub fn sanitize_lines(lines: Vec<ProductLine>) -> Result<Vec<ProductLine>, PayloadError> {
    let mut kept = Vec::with_capacity(lines.len());
    for line in lines {
        if let Some(line) = line.sanitized()? {
            kept.push(line);
        }
    }
    Ok(kept)
}

/// Trims a free-text value and discards blanks and placeholder tokens.
pub fn clean_text(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if trimmed.is_empty() || is_placeholder(trimmed) {
        return None;
    }
    Some(trimmed.to_string())
}

pub fn is_placeholder(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    PLACEHOLDER_VALUES.contains(&normalized.as_str())
}
