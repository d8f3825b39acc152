//! Intake for the structured JSON the AI extraction step produces for a turn.
//!
//! The model is asked to answer with a single JSON object, but in practice it
//! sometimes wraps the object in a Markdown code fence or adds a sentence
//! around it. Parsing tolerates both and nothing else: field values are taken
//! as-is and cleaned later by the payload builder.

use serde::Deserialize;

use crate::domain::operation::OperationKind;
use crate::domain::order::{
    ChannelInfo, CustomerInfo, DeliveryInfo, OrderChanges, PaymentInfo, ProductLine,
};
use crate::errors::PayloadError;

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedOrder {
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default, alias = "order_code")]
    pub order_code: Option<String>,
    #[serde(default)]
    pub customer: Option<CustomerInfo>,
    #[serde(default)]
    pub products: Option<Vec<ProductLine>>,
    #[serde(default)]
    pub payment: Option<PaymentInfo>,
    #[serde(default)]
    pub delivery: Option<DeliveryInfo>,
    #[serde(default)]
    pub channel: Option<ChannelInfo>,
    #[serde(default)]
    pub changes: Option<OrderChanges>,
    #[serde(default, alias = "update_reason")]
    pub update_reason: Option<String>,
    #[serde(default, alias = "customer_contact")]
    pub customer_contact: Option<String>,
    #[serde(default, alias = "contact_method")]
    pub contact_method: Option<String>,
    #[serde(default)]
    pub urgency: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ExtractedOrder {
    pub fn operation(&self) -> Result<OperationKind, PayloadError> {
        let intent = self
            .intent
            .as_deref()
            .map(str::trim)
            .filter(|intent| !intent.is_empty())
            .ok_or(PayloadError::MissingField { field: "intent" })?;

        OperationKind::parse(intent).ok_or_else(|| PayloadError::InvalidField {
            field: "intent",
            reason: format!(
                "unsupported intent `{intent}` (expected create_order|update_order|check_quantity)"
            ),
        })
    }
}

pub fn parse_extraction(raw: &str) -> Result<ExtractedOrder, PayloadError> {
    let body = json_body(raw);
    if body.is_empty() {
        return Err(PayloadError::MalformedExtraction("extraction output is empty".to_string()));
    }

    serde_json::from_str::<ExtractedOrder>(body)
        .map_err(|error| PayloadError::MalformedExtraction(error.to_string()))
}

fn json_body(raw: &str) -> &str {
    let trimmed = raw.trim();

    if let Some(fenced) = trimmed.strip_prefix("```") {
        let fenced = fenced
            .strip_prefix("json")
            .or_else(|| fenced.strip_prefix("JSON"))
            .unwrap_or(fenced)
            .trim();
        return fenced.strip_suffix("```").unwrap_or(fenced).trim();
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::operation::OperationKind;
    use crate::errors::PayloadError;

    use super::parse_extraction;

    #[test]
    fn parses_fenced_update_extraction() {
        let raw = "```json\n{\"intent\":\"update_order\",\"orderCode\":\"ORD20250818001\",\
                   \"changes\":{\"delivery\":{\"address\":\"456 XYZ Street\"}}}\n```";
        let extracted = parse_extraction(raw).expect("fenced json parses");

        assert_eq!(extracted.operation(), Ok(OperationKind::UpdateOrder));
        assert_eq!(extracted.order_code.as_deref(), Some("ORD20250818001"));
        let address = extracted
            .changes
            .and_then(|changes| changes.delivery)
            .and_then(|delivery| delivery.address);
        assert_eq!(address.as_deref(), Some("456 XYZ Street"));
    }

    #[test]
    fn parses_json_surrounded_by_prose() {
        let raw = "Here is the order: {\"intent\":\"check_quantity\",\
                   \"products\":[{\"name\":\"Oolong tea\",\"quantity_needed\":40}]} Thanks!";
        let extracted = parse_extraction(raw).expect("embedded json parses");

        assert_eq!(extracted.operation(), Ok(OperationKind::CheckQuantity));
        let products = extracted.products.expect("products present");
        assert_eq!(products[0].quantity, Some(40));
    }

    #[test]
    fn accepts_snake_case_keys() {
        let raw = r#"{"intent":"update_order","order_code":"ord-7","update_reason":"moved house"}"#;
        let extracted = parse_extraction(raw).expect("snake case parses");

        assert_eq!(extracted.order_code.as_deref(), Some("ord-7"));
        assert_eq!(extracted.update_reason.as_deref(), Some("moved house"));
    }

    #[test]
    fn empty_output_is_malformed() {
        assert!(matches!(parse_extraction("   "), Err(PayloadError::MalformedExtraction(_))));
    }

    #[test]
    fn non_json_output_is_malformed() {
        assert!(matches!(
            parse_extraction("I could not find an order in that message."),
            Err(PayloadError::MalformedExtraction(_))
        ));
    }

    #[test]
    fn unknown_intent_is_invalid() {
        let extracted = parse_extraction(r#"{"intent":"refund"}"#).expect("valid json");
        assert!(matches!(
            extracted.operation(),
            Err(PayloadError::InvalidField { field: "intent", .. })
        ));
    }

    #[test]
    fn missing_intent_is_reported() {
        let extracted = parse_extraction("{}").expect("valid json");
        assert_eq!(extracted.operation(), Err(PayloadError::MissingField { field: "intent" }));
    }
}
