//! Webhook request bodies and the builder that assembles them from extracted
//! conversation fields.
//!
//! Every body has the shape `{companyId, timestamp, data}`. Optional fields
//! that the customer never mentioned are omitted from `data` entirely; the
//! builder never fills gaps with defaults or dummy values.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::operation::{OperationKind, Route};
use crate::domain::order::{
    clean_text, sanitize_lines, ChannelInfo, CustomerInfo, DeliveryInfo, OrderChanges, OrderCode,
    PaymentInfo, ProductLine, RequestMetadata, Urgency,
};
use crate::errors::PayloadError;
use crate::extraction::ExtractedOrder;

pub const METADATA_SOURCE: &str = "ai_chat";

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub company_id: String,
    pub timestamp: DateTime<Utc>,
    pub data: T,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerInfo>,
    pub products: Vec<ProductLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliveryInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub metadata: RequestMetadata,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderData {
    pub order_code: OrderCode,
    pub changes: OrderChanges,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_reason: Option<String>,
    pub metadata: RequestMetadata,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuantityCheckLine {
    #[serde(rename = "productId", skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub quantity_needed: u32,
}

// The backend reads the check-quantity fields in snake_case, unlike the other bodies.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CheckQuantityData {
    pub products: Vec<QuantityCheckLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency: Option<Urgency>,
    #[serde(rename = "orderCode", skip_serializing_if = "Option::is_none")]
    pub order_code: Option<OrderCode>,
    pub metadata: RequestMetadata,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WebhookRequest {
    CreateOrder(Envelope<CreateOrderData>),
    UpdateOrder(Envelope<UpdateOrderData>),
    CheckQuantity(Envelope<CheckQuantityData>),
}

impl WebhookRequest {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::CreateOrder(_) => OperationKind::CreateOrder,
            Self::UpdateOrder(_) => OperationKind::UpdateOrder,
            Self::CheckQuantity(_) => OperationKind::CheckQuantity,
        }
    }

    pub fn route(&self) -> Route {
        match self {
            Self::CreateOrder(_) => Route::create_order(),
            Self::UpdateOrder(envelope) => Route::update_order(&envelope.data.order_code),
            Self::CheckQuantity(_) => Route::check_quantity(),
        }
    }

    pub fn metadata(&self) -> &RequestMetadata {
        match self {
            Self::CreateOrder(envelope) => &envelope.data.metadata,
            Self::UpdateOrder(envelope) => &envelope.data.metadata,
            Self::CheckQuantity(envelope) => &envelope.data.metadata,
        }
    }

    pub fn order_code(&self) -> Option<&OrderCode> {
        match self {
            Self::CreateOrder(_) => None,
            Self::UpdateOrder(envelope) => Some(&envelope.data.order_code),
            Self::CheckQuantity(envelope) => envelope.data.order_code.as_ref(),
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Caller-supplied correlation for one conversational turn.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TurnContext {
    pub session_id: String,
    pub conversation_id: Option<String>,
    pub channel: Option<ChannelInfo>,
}

impl TurnContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self { session_id: session_id.into(), ..Self::default() }
    }

    fn metadata(&self) -> RequestMetadata {
        RequestMetadata {
            session_id: self.session_id.clone(),
            conversation_id: clean_text(self.conversation_id.clone()),
            source: METADATA_SOURCE.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PayloadBuilder {
    company_id: String,
}

impl PayloadBuilder {
    pub fn new(company_id: impl Into<String>) -> Self {
        Self { company_id: company_id.into() }
    }

    /// Builds the request for the operation named by the extraction's intent.
    pub fn build_from_extraction(
        &self,
        extracted: ExtractedOrder,
        context: &TurnContext,
        timestamp: DateTime<Utc>,
    ) -> Result<WebhookRequest, PayloadError> {
        let kind = extracted.operation()?;
        self.build(kind, extracted, context, timestamp)
    }

    pub fn build(
        &self,
        kind: OperationKind,
        extracted: ExtractedOrder,
        context: &TurnContext,
        timestamp: DateTime<Utc>,
    ) -> Result<WebhookRequest, PayloadError> {
        if let Some(intent) = extracted.intent.as_deref() {
            if OperationKind::parse(intent).is_some_and(|declared| declared != kind) {
                return Err(PayloadError::IntentMismatch {
                    intent: intent.to_string(),
                    expected: kind,
                });
            }
        }

        match kind {
            OperationKind::CreateOrder => {
                let data = self.create_order_data(extracted, context)?;
                Ok(WebhookRequest::CreateOrder(self.envelope(data, timestamp)))
            }
            OperationKind::UpdateOrder => {
                let data = self.update_order_data(extracted, context)?;
                Ok(WebhookRequest::UpdateOrder(self.envelope(data, timestamp)))
            }
            OperationKind::CheckQuantity => {
                let data = self.check_quantity_data(extracted, context)?;
                Ok(WebhookRequest::CheckQuantity(self.envelope(data, timestamp)))
            }
        }
    }

    fn envelope<T>(&self, data: T, timestamp: DateTime<Utc>) -> Envelope<T> {
        Envelope { company_id: self.company_id.clone(), timestamp, data }
    }

    fn create_order_data(
        &self,
        extracted: ExtractedOrder,
        context: &TurnContext,
    ) -> Result<CreateOrderData, PayloadError> {
        let products = sanitize_lines(extracted.products.unwrap_or_default())?;
        if products.is_empty() {
            return Err(PayloadError::MissingField { field: "products" });
        }

        Ok(CreateOrderData {
            customer: extracted.customer.and_then(CustomerInfo::sanitized),
            products,
            payment: extracted.payment.and_then(PaymentInfo::sanitized),
            delivery: extracted.delivery.and_then(DeliveryInfo::sanitized),
            channel: extracted
                .channel
                .or_else(|| context.channel.clone())
                .and_then(ChannelInfo::sanitized),
            notes: clean_text(extracted.notes),
            metadata: context.metadata(),
        })
    }

    fn update_order_data(
        &self,
        extracted: ExtractedOrder,
        context: &TurnContext,
    ) -> Result<UpdateOrderData, PayloadError> {
        let order_code = clean_text(extracted.order_code)
            .ok_or(PayloadError::MissingField { field: "orderCode" })?;
        let order_code = OrderCode::parse(&order_code)?;

        // Extractions sometimes put the changed sections at the top level.
        let changes = extracted.changes.unwrap_or_else(|| OrderChanges {
            customer: extracted.customer,
            products: extracted.products,
            delivery: extracted.delivery,
            payment: extracted.payment,
            notes: extracted.notes,
        });
        let changes = changes.sanitized()?.ok_or(PayloadError::MissingField { field: "changes" })?;

        Ok(UpdateOrderData {
            order_code,
            changes,
            update_reason: clean_text(extracted.update_reason),
            metadata: context.metadata(),
        })
    }

    fn check_quantity_data(
        &self,
        extracted: ExtractedOrder,
        context: &TurnContext,
    ) -> Result<CheckQuantityData, PayloadError> {
        let mut products = Vec::new();
        for line in sanitize_lines(extracted.products.unwrap_or_default())? {
            let quantity_needed =
                line.quantity.ok_or(PayloadError::MissingField { field: "quantity_needed" })?;
            products.push(QuantityCheckLine {
                product_id: line.product_id,
                name: line.name,
                quantity_needed,
            });
        }
        if products.is_empty() {
            return Err(PayloadError::MissingField { field: "products" });
        }

        let order_code = clean_text(extracted.order_code)
            .map(|code| OrderCode::parse(&code))
            .transpose()?;

        let customer = extracted.customer.and_then(CustomerInfo::sanitized);
        let customer_contact = clean_text(extracted.customer_contact).or_else(|| {
            customer.as_ref().and_then(|customer| customer.phone.clone().or(customer.email.clone()))
        });

        Ok(CheckQuantityData {
            products,
            customer_contact,
            contact_method: clean_text(extracted.contact_method),
            urgency: extracted.urgency.as_deref().and_then(Urgency::parse),
            order_code,
            metadata: context.metadata(),
        })
    }
}
