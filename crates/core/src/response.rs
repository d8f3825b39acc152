use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::operation::OperationKind;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub message: String,
    pub data: ResponseData,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ResponseData {
    Order(OrderSummary),
    Update(UpdateSummary),
    Check(CheckTicket),
    /// `data` was present but did not have the shape expected for the operation.
    Unstructured(Value),
    Empty,
}

// Summary fields are parsed one by one: a field with an unexpected type is
// dropped on its own instead of discarding the facts that did parse.

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    #[serde(default, alias = "order_code", deserialize_with = "lenient_text")]
    pub order_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub status: Option<String>,
    #[serde(default, alias = "total_amount", deserialize_with = "lenient")]
    pub total_amount: Option<Decimal>,
    #[serde(default, alias = "formatted_total", deserialize_with = "lenient_text")]
    pub formatted_total: Option<String>,
    #[serde(default, alias = "item_count", deserialize_with = "lenient")]
    pub item_count: Option<u32>,
    #[serde(default, alias = "estimated_delivery", deserialize_with = "lenient_text")]
    pub estimated_delivery: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSummary {
    #[serde(default, alias = "order_code", deserialize_with = "lenient_text")]
    pub order_code: Option<String>,
    #[serde(default, alias = "updated_fields", deserialize_with = "lenient_list")]
    pub updated_fields: Vec<String>,
    #[serde(default)]
    pub changes: Option<Value>,
    #[serde(default, alias = "total_amount", deserialize_with = "lenient")]
    pub total_amount: Option<Decimal>,
    #[serde(default, alias = "formatted_total", deserialize_with = "lenient_text")]
    pub formatted_total: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckTicket {
    #[serde(default, alias = "check_id", deserialize_with = "lenient_text")]
    pub check_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub status: Option<String>,
    #[serde(default, alias = "estimated_response_time", deserialize_with = "lenient_text")]
    pub estimated_response_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub availability: Vec<ProductAvailability>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductAvailability {
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub available: Option<bool>,
    #[serde(default, alias = "available_quantity", deserialize_with = "lenient")]
    pub available_quantity: Option<u32>,
}

/// Any value that fits `T`, otherwise `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Non-blank strings, and numbers rendered as text (numeric ids).
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = match Value::deserialize(deserializer)? {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        _ => return Ok(None),
    };
    Ok(Some(text).filter(|text| !text.is_empty()))
}

/// Keeps the array items that fit `T`; anything but an array is empty.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(items.into_iter().filter_map(|item| serde_json::from_value(item).ok()).collect())
}

#[derive(Deserialize)]
struct RawResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

impl WebhookResponse {
    /// Parses a backend body. A body without a boolean `success` is not a webhook response.
    pub fn parse(kind: OperationKind, body: &str) -> Result<Self, serde_json::Error> {
        let raw = serde_json::from_str::<RawResponse>(body)?;
        Ok(Self::from_raw(kind, raw))
    }

    fn from_raw(kind: OperationKind, raw: RawResponse) -> Self {
        let data = match raw.data {
            None | Some(Value::Null) => ResponseData::Empty,
            Some(value) => typed_data(kind, value),
        };

        Self { success: raw.success, message: raw.message.unwrap_or_default(), data }
    }
}

fn typed_data(kind: OperationKind, value: Value) -> ResponseData {
    let parsed = match kind {
        OperationKind::CreateOrder => {
            serde_json::from_value::<OrderSummary>(value.clone()).map(ResponseData::Order)
        }
        OperationKind::UpdateOrder => {
            serde_json::from_value::<UpdateSummary>(value.clone()).map(ResponseData::Update)
        }
        OperationKind::CheckQuantity => {
            serde_json::from_value::<CheckTicket>(value.clone()).map(ResponseData::Check)
        }
    };
    parsed.unwrap_or(ResponseData::Unstructured(value))
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::operation::OperationKind;

    use super::{ResponseData, WebhookResponse};

    #[test]
    fn parses_create_order_summary() {
        let response = WebhookResponse::parse(
            OperationKind::CreateOrder,
            r#"{"success":true,"message":"Order created",
                "data":{"orderCode":"ORD20250818001","totalAmount":250000,
                        "formattedTotal":"250.000 ₫","itemCount":2}}"#,
        )
        .expect("parses");

        assert!(response.success);
        let ResponseData::Order(summary) = response.data else {
            panic!("expected order summary");
        };
        assert_eq!(summary.order_code.as_deref(), Some("ORD20250818001"));
        assert_eq!(summary.total_amount, Some(Decimal::new(250_000, 0)));
        assert_eq!(summary.formatted_total.as_deref(), Some("250.000 ₫"));
    }

    #[test]
    fn parses_update_summary_with_changes() {
        let response = WebhookResponse::parse(
            OperationKind::UpdateOrder,
            r#"{"success":true,"message":"Order updated",
                "data":{"orderCode":"ORD1","updatedFields":["delivery.address"],
                        "changes":{"delivery":{"address":"456 XYZ Street"}},"totalAmount":1250000}}"#,
        )
        .expect("parses");

        let ResponseData::Update(summary) = response.data else {
            panic!("expected update summary");
        };
        assert_eq!(summary.updated_fields, vec!["delivery.address".to_string()]);
        assert_eq!(summary.total_amount, Some(Decimal::new(1_250_000, 0)));
    }

    #[test]
    fn business_failure_without_data_parses() {
        let response =
            WebhookResponse::parse(OperationKind::UpdateOrder, r#"{"success":false,"message":"Order not found"}"#)
                .expect("parses");

        assert!(!response.success);
        assert_eq!(response.message, "Order not found");
        assert_eq!(response.data, ResponseData::Empty);
    }

    #[test]
    fn unexpected_data_shape_is_kept_unstructured() {
        let response = WebhookResponse::parse(
            OperationKind::CheckQuantity,
            r#"{"success":true,"data":["CHK-1","CHK-2"]}"#,
        )
        .expect("parses");

        assert!(matches!(response.data, ResponseData::Unstructured(_)));
    }

    #[test]
    fn malformed_field_does_not_discard_order_summary() {
        let response = WebhookResponse::parse(
            OperationKind::CreateOrder,
            r#"{"success":true,"message":"Order created",
                "data":{"orderCode":"ORD20250818001","formattedTotal":"250.000 VND","itemCount":2,
                        "estimatedDelivery":{"from":"2025-08-20","to":"2025-08-22"}}}"#,
        )
        .expect("parses");

        let ResponseData::Order(summary) = response.data else {
            panic!("expected order summary");
        };
        assert_eq!(summary.order_code.as_deref(), Some("ORD20250818001"));
        assert_eq!(summary.formatted_total.as_deref(), Some("250.000 VND"));
        assert_eq!(summary.item_count, Some(2));
        assert_eq!(summary.estimated_delivery, None);
    }

    #[test]
    fn numeric_check_id_is_kept_as_text() {
        let response = WebhookResponse::parse(
            OperationKind::CheckQuantity,
            r#"{"success":true,"message":"Check request created",
                "data":{"checkId":98765,"status":"pending","availability":[
                    {"name":"Latte","availableQuantity":3},"garbage"]}}"#,
        )
        .expect("parses");

        let ResponseData::Check(ticket) = response.data else {
            panic!("expected check ticket");
        };
        assert_eq!(ticket.check_id.as_deref(), Some("98765"));
        assert_eq!(ticket.status.as_deref(), Some("pending"));
        assert_eq!(ticket.availability.len(), 1);
    }

    #[test]
    fn wrongly_typed_total_is_dropped_alone() {
        let response = WebhookResponse::parse(
            OperationKind::UpdateOrder,
            r#"{"success":true,"data":{"orderCode":"ORD1","updatedFields":"notes","totalAmount":[1]}}"#,
        )
        .expect("parses");

        let ResponseData::Update(summary) = response.data else {
            panic!("expected update summary");
        };
        assert_eq!(summary.order_code.as_deref(), Some("ORD1"));
        assert!(summary.updated_fields.is_empty());
        assert_eq!(summary.total_amount, None);
    }

    #[test]
    fn body_without_success_flag_is_rejected() {
        assert!(WebhookResponse::parse(OperationKind::CreateOrder, "<html>502</html>").is_err());
        assert!(WebhookResponse::parse(OperationKind::CreateOrder, r#"{"ok":true}"#).is_err());
    }
}
