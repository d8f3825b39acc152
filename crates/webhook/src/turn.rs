//! One conversational turn: extracted fields in, customer reply out.

use chatorder_core::errors::PayloadError;
use chatorder_core::response::WebhookResponse;
use chatorder_core::{
    parse_extraction, ApplicationError, ExtractedOrder, OperationKind, PayloadBuilder,
    ReplyFormatter, TurnContext, WebhookRequest,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::dispatcher::OrderWebhook;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    /// Backend accepted the request.
    Confirmed,
    /// Backend answered but refused, e.g. unknown order code or no stock.
    BusinessFailure,
    /// No usable answer after retries.
    DispatchFailed,
    /// Credentials or client setup are wrong; an operator has to act.
    ConfigurationAlarm,
}

impl TurnStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::BusinessFailure => "business_failure",
            Self::DispatchFailed => "dispatch_failed",
            Self::ConfigurationAlarm => "configuration_alarm",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TurnReply {
    pub operation: OperationKind,
    pub status: TurnStatus,
    pub text: String,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<WebhookResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_class: Option<&'static str>,
}

pub struct OrderTurnHandler<W> {
    builder: PayloadBuilder,
    webhook: W,
    formatter: ReplyFormatter,
}

impl<W: OrderWebhook> OrderTurnHandler<W> {
    pub fn new(builder: PayloadBuilder, webhook: W, formatter: ReplyFormatter) -> Self {
        Self { builder, webhook, formatter }
    }

    /// Builds the webhook request without sending it.
    pub fn prepare(
        &self,
        extracted: ExtractedOrder,
        context: &TurnContext,
    ) -> Result<WebhookRequest, PayloadError> {
        self.builder.build_from_extraction(extracted, context, Utc::now()).inspect_err(|error| {
            warn!(
                event_name = "turn.input_rejected",
                correlation_id = %context.session_id,
                error = %error,
                "extracted fields are not enough to build a webhook request"
            );
        })
    }

    /// Input problems come back as `Err` so the caller can ask the customer for
    /// the missing detail; every delivery outcome is a `TurnReply`.
    pub async fn handle(
        &self,
        extracted: ExtractedOrder,
        context: &TurnContext,
    ) -> Result<TurnReply, PayloadError> {
        let request = self.prepare(extracted, context)?;
        Ok(self.complete(&request).await)
    }

    pub async fn handle_raw(
        &self,
        raw: &str,
        context: &TurnContext,
    ) -> Result<TurnReply, PayloadError> {
        let extracted = parse_extraction(raw).inspect_err(|error| {
            warn!(
                event_name = "turn.input_rejected",
                correlation_id = %context.session_id,
                error = %error,
                "extraction output could not be parsed"
            );
        })?;
        self.handle(extracted, context).await
    }

    pub async fn complete(&self, request: &WebhookRequest) -> TurnReply {
        let operation = request.kind();
        let correlation_id = request.metadata().session_id.as_str();

        match self.webhook.dispatch(request).await {
            Ok(delivered) => {
                let status = if delivered.response.success {
                    TurnStatus::Confirmed
                } else {
                    TurnStatus::BusinessFailure
                };
                info!(
                    event_name = "turn.completed",
                    correlation_id,
                    operation = operation.as_str(),
                    status = status.as_str(),
                    attempts = delivered.attempts,
                    "order turn completed"
                );
                TurnReply {
                    operation,
                    status,
                    text: self.formatter.format(operation, &delivered.response),
                    attempts: delivered.attempts,
                    response: Some(delivered.response),
                    error: None,
                    error_class: None,
                }
            }
            Err(dispatch_error) => {
                let attempts = dispatch_error.attempts();
                let alarm = dispatch_error.is_configuration_alarm();
                let error = ApplicationError::from(dispatch_error);
                let status = if alarm {
                    error!(
                        event_name = "turn.configuration_alarm",
                        correlation_id,
                        operation = operation.as_str(),
                        error_class = error.error_class(),
                        error = %error,
                        "webhook configuration needs operator attention"
                    );
                    TurnStatus::ConfigurationAlarm
                } else {
                    warn!(
                        event_name = "turn.dispatch_failed",
                        correlation_id,
                        operation = operation.as_str(),
                        error_class = error.error_class(),
                        error = %error,
                        "order turn ended without a backend answer"
                    );
                    TurnStatus::DispatchFailed
                };

                TurnReply {
                    operation,
                    status,
                    text: self.formatter.delivery_failure(operation),
                    attempts,
                    response: None,
                    error: Some(error.to_string()),
                    error_class: Some(error.error_class()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chatorder_core::errors::PayloadError;
    use chatorder_core::response::{OrderSummary, ResponseData, WebhookResponse};
    use chatorder_core::retry::AttemptFailure;
    use chatorder_core::{OperationKind, PayloadBuilder, ReplyFormatter, TurnContext, WebhookRequest};
    use rust_decimal::Decimal;

    use super::{OrderTurnHandler, TurnStatus};
    use crate::dispatcher::{Delivered, DispatchError, OrderWebhook};

    struct ScriptedWebhook {
        outcome: Result<Delivered, DispatchError>,
        seen: Mutex<Vec<OperationKind>>,
    }

    impl ScriptedWebhook {
        fn new(outcome: Result<Delivered, DispatchError>) -> Self {
            Self { outcome, seen: Mutex::new(Vec::new()) }
        }

        fn calls(&self) -> usize {
            self.seen.lock().expect("lock").len()
        }
    }

    #[async_trait]
    impl OrderWebhook for ScriptedWebhook {
        async fn dispatch(&self, request: &WebhookRequest) -> Result<Delivered, DispatchError> {
            self.seen.lock().expect("lock").push(request.kind());
            self.outcome.clone()
        }
    }

    fn handler(outcome: Result<Delivered, DispatchError>) -> OrderTurnHandler<ScriptedWebhook> {
        OrderTurnHandler::new(
            PayloadBuilder::new("company-1"),
            ScriptedWebhook::new(outcome),
            ReplyFormatter::default(),
        )
    }

    fn created() -> Delivered {
        Delivered {
            status: 201,
            attempts: 2,
            response: WebhookResponse {
                success: true,
                message: "Order created".to_string(),
                data: ResponseData::Order(OrderSummary {
                    order_code: Some("ORD20250818002".to_string()),
                    total_amount: Some(Decimal::from(250_000)),
                    item_count: Some(2),
                    ..OrderSummary::default()
                }),
            },
        }
    }

    const CREATE: &str = r#"{"intent":"create_order","products":[{"name":"Latte","quantity":2}]}"#;

    #[tokio::test]
    async fn confirmed_turn_uses_backend_facts() {
        let handler = handler(Ok(created()));
        let reply = handler
            .handle_raw(CREATE, &TurnContext::new("session-1"))
            .await
            .expect("valid extraction");

        assert_eq!(reply.status, TurnStatus::Confirmed);
        assert_eq!(reply.attempts, 2);
        assert!(reply.text.contains("ORD20250818002"));
        assert!(reply.text.contains("250,000 VND"));
    }

    #[tokio::test]
    async fn missing_order_code_never_reaches_the_webhook() {
        let handler = handler(Ok(created()));
        let error = handler
            .handle_raw(
                r#"{"intent":"update_order","changes":{"notes":"ring twice"}}"#,
                &TurnContext::new("session-2"),
            )
            .await
            .expect_err("update without order code");

        assert_eq!(error, PayloadError::MissingField { field: "orderCode" });
        assert_eq!(handler.webhook.calls(), 0);
    }

    #[tokio::test]
    async fn business_failure_is_reported_plainly() {
        let handler = handler(Ok(Delivered {
            status: 404,
            attempts: 1,
            response: WebhookResponse {
                success: false,
                message: "Order not found".to_string(),
                data: ResponseData::Empty,
            },
        }));
        let reply = handler
            .handle_raw(
                r#"{"intent":"update_order","orderCode":"ORD404","changes":{"notes":"x"}}"#,
                &TurnContext::new("session-3"),
            )
            .await
            .expect("valid extraction");

        assert_eq!(reply.status, TurnStatus::BusinessFailure);
        assert!(reply.text.contains("Order not found"));
    }

    #[tokio::test]
    async fn exhausted_retries_produce_generic_apology() {
        let handler = handler(Err(DispatchError::Exhausted {
            attempts: 4,
            last_failure: AttemptFailure::Timeout,
        }));
        let reply = handler
            .handle_raw(CREATE, &TurnContext::new("session-4"))
            .await
            .expect("valid extraction");

        assert_eq!(reply.status, TurnStatus::DispatchFailed);
        assert_eq!(reply.attempts, 4);
        assert_eq!(reply.error_class, Some("webhook_unavailable"));
        assert!(reply.text.starts_with("Sorry"));
        assert!(!reply.text.contains("ORD"));
    }

    #[tokio::test]
    async fn rejected_secret_raises_configuration_alarm() {
        let handler =
            handler(Err(DispatchError::Authentication { status: 401, attempts: 1 }));
        let reply = handler
            .handle_raw(CREATE, &TurnContext::new("session-5"))
            .await
            .expect("valid extraction");

        assert_eq!(reply.status, TurnStatus::ConfigurationAlarm);
        assert_eq!(reply.error_class, Some("webhook_auth"));
    }
}
