use thiserror::Error;

use crate::domain::operation::OperationKind;

/// Input problems caught before anything is sent to the backend.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("missing required field `{field}`")]
    MissingField { field: &'static str },
    #[error("invalid field `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("extraction output could not be parsed: {0}")]
    MalformedExtraction(String),
    #[error("extraction intent `{intent}` does not match requested operation {expected:?}")]
    IntentMismatch { intent: String, expected: OperationKind },
}

impl PayloadError {
    /// Short prompt asking the customer for whatever the request is missing.
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingField { field: "orderCode" } => {
                "Could you tell me the order code (for example ORD20250818001)?".to_string()
            }
            Self::MissingField { field: "products" } => {
                "Which products, and how many of each, would you like?".to_string()
            }
            Self::MissingField { field: "quantity_needed" } => {
                "How many of each product do you need?".to_string()
            }
            Self::MissingField { field: "changes" } => {
                "What would you like to change on the order?".to_string()
            }
            Self::MissingField { field } => format!("Could you provide the {field}?"),
            Self::InvalidField { reason, .. } => {
                format!("Something in the request doesn't look right: {reason}.")
            }
            Self::MalformedExtraction(_) | Self::IntentMismatch { .. } => {
                "Sorry, I didn't quite get that. Could you rephrase your request?".to_string()
            }
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Input(#[from] PayloadError),
    #[error("webhook authentication rejected with status {status}")]
    Authentication { status: u16 },
    #[error("webhook delivery failed after {attempts} attempt(s): {message}")]
    DeliveryExhausted { attempts: u32, message: String },
    #[error("webhook rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("webhook returned an unreadable response: {0}")]
    InvalidResponse(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Input(_) => "input_validation",
            Self::Authentication { .. } => "webhook_auth",
            Self::DeliveryExhausted { .. } => "webhook_unavailable",
            Self::Rejected { .. } => "webhook_rejected",
            Self::InvalidResponse(_) => "webhook_invalid_response",
            Self::Configuration(_) => "config_validation",
        }
    }

    /// Operator-facing problems that retries or customer input cannot fix.
    pub fn is_configuration_alarm(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::Configuration(_))
    }
}
