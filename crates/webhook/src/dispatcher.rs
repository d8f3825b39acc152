//! HTTP delivery of webhook requests to the order backend.
//!
//! One call to [`OrderWebhook::dispatch`] sends one request, retrying transient
//! failures according to the configured [`RetryPolicy`], and returns the
//! parsed backend body whenever the backend gave a webhook-shaped answer,
//! including business failures such as "order not found".

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chatorder_core::config::WebhookConfig;
use chatorder_core::response::WebhookResponse;
use chatorder_core::retry::{classify_status, AttemptFailure, RetryDecision, RetryPolicy, StatusClass};
use chatorder_core::{ApplicationError, HttpMethod, OperationKind, WebhookRequest};
use reqwest::{Client, Method};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Header carrying the shared secret. The backend matches the name exactly.
pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

const MAX_LOGGED_BODY_CHARS: usize = 256;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Delivered {
    pub status: u16,
    pub attempts: u32,
    pub response: WebhookResponse,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("backend rejected the webhook secret (status {status})")]
    Authentication { status: u16, attempts: u32 },
    #[error("webhook delivery gave up after {attempts} attempt(s): {last_failure}")]
    Exhausted { attempts: u32, last_failure: AttemptFailure },
    #[error("webhook call exceeded its {deadline_ms}ms deadline after {attempts} attempt(s)")]
    DeadlineExceeded { deadline_ms: u64, attempts: u32 },
    #[error("backend rejected the request with status {status}")]
    Rejected { status: u16, body: String, attempts: u32 },
    #[error("backend answered {status} with a body that is not a webhook response: {message}")]
    InvalidResponse { status: u16, message: String, attempts: u32 },
    #[error("webhook request could not be sent: {0}")]
    Transport(String),
    #[error("http client could not be built: {0}")]
    Client(String),
}

impl DispatchError {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Authentication { attempts, .. }
            | Self::Exhausted { attempts, .. }
            | Self::Rejected { attempts, .. }
            | Self::InvalidResponse { attempts, .. }
            | Self::DeadlineExceeded { attempts, .. } => *attempts,
            Self::Transport(_) | Self::Client(_) => 0,
        }
    }

    pub fn is_configuration_alarm(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::Client(_))
    }
}

impl From<DispatchError> for ApplicationError {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::Authentication { status, .. } => Self::Authentication { status },
            DispatchError::Exhausted { attempts, last_failure } => {
                Self::DeliveryExhausted { attempts, message: last_failure.to_string() }
            }
            DispatchError::DeadlineExceeded { deadline_ms, attempts } => Self::DeliveryExhausted {
                attempts,
                message: format!("deadline of {deadline_ms}ms exceeded"),
            },
            DispatchError::Rejected { status, body, .. } => Self::Rejected { status, message: body },
            DispatchError::InvalidResponse { message, .. } => Self::InvalidResponse(message),
            DispatchError::Transport(message) => Self::DeliveryExhausted { attempts: 1, message },
            DispatchError::Client(message) => Self::Configuration(message),
        }
    }
}

#[async_trait]
pub trait OrderWebhook: Send + Sync {
    async fn dispatch(&self, request: &WebhookRequest) -> Result<Delivered, DispatchError>;
}

#[derive(Clone)]
pub struct WebhookDispatcher {
    client: Client,
    base_url: String,
    secret: SecretString,
    policy: RetryPolicy,
}

enum SendError {
    Retryable(AttemptFailure),
    Fatal(String),
}

impl WebhookDispatcher {
    pub fn new(
        base_url: impl Into<String>,
        secret: SecretString,
        policy: RetryPolicy,
    ) -> Result<Self, DispatchError> {
        let client = Client::builder()
            .connect_timeout(policy.attempt_timeout)
            .build()
            .map_err(|error| DispatchError::Client(error.to_string()))?;

        Ok(Self { client, base_url: base_url.into(), secret, policy })
    }

    pub fn from_config(config: &WebhookConfig) -> Result<Self, DispatchError> {
        Self::new(config.base_url.clone(), config.secret.clone(), config.retry_policy())
    }

    /// `attempts_made` outlives this future so the deadline path can report it.
    async fn deliver(
        &self,
        request: &WebhookRequest,
        attempts_made: &AtomicU32,
    ) -> Result<Delivered, DispatchError> {
        let kind = request.kind();
        let route = request.route();
        let url = route.url(&self.base_url);
        let correlation_id = request.metadata().session_id.as_str();
        let started = Instant::now();

        loop {
            let attempts = attempts_made.fetch_add(1, Ordering::Relaxed) + 1;
            let remaining = self.policy.deadline.saturating_sub(started.elapsed());
            let timeout = self.policy.attempt_timeout.min(remaining);

            info!(
                event_name = "webhook.dispatch.attempt",
                correlation_id,
                operation = kind.as_str(),
                method = route.method.as_str(),
                path = %route.path,
                attempt = attempts,
                "sending webhook request"
            );

            let failure = match self.send_once(route.method, &url, request, timeout).await {
                Ok((status, body)) => match classify_status(status) {
                    StatusClass::Unauthorized => {
                        error!(
                            event_name = "webhook.dispatch.auth_rejected",
                            correlation_id,
                            operation = kind.as_str(),
                            status,
                            header = WEBHOOK_SECRET_HEADER,
                            "backend rejected webhook secret; check webhook.secret configuration"
                        );
                        return Err(DispatchError::Authentication { status, attempts });
                    }
                    StatusClass::Transient => AttemptFailure::Status { status, body },
                    StatusClass::Success | StatusClass::Terminal => {
                        return interpret(kind, status, &body, attempts, correlation_id);
                    }
                },
                Err(SendError::Retryable(failure)) => failure,
                Err(SendError::Fatal(message)) => {
                    error!(
                        event_name = "webhook.dispatch.transport_error",
                        correlation_id,
                        operation = kind.as_str(),
                        error = %message,
                        "webhook request could not be built or sent"
                    );
                    return Err(DispatchError::Transport(message));
                }
            };

            match self.policy.decide(&failure, attempts, started.elapsed()) {
                RetryDecision::RetryAfter(delay) => {
                    warn!(
                        event_name = "webhook.dispatch.retry_scheduled",
                        correlation_id,
                        operation = kind.as_str(),
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        failure = %failure,
                        "transient webhook failure; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp => {
                    error!(
                        event_name = "webhook.dispatch.exhausted",
                        correlation_id,
                        operation = kind.as_str(),
                        attempts,
                        failure = %failure,
                        "webhook delivery failed"
                    );
                    return Err(DispatchError::Exhausted { attempts, last_failure: failure });
                }
            }
        }
    }

    async fn send_once(
        &self,
        method: HttpMethod,
        url: &str,
        request: &WebhookRequest,
        timeout: std::time::Duration,
    ) -> Result<(u16, String), SendError> {
        let method = match method {
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
        };

        let response = self
            .client
            .request(method, url)
            .header(WEBHOOK_SECRET_HEADER, self.secret.expose_secret())
            .json(request)
            .timeout(timeout)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|error| {
            if error.is_timeout() {
                SendError::Retryable(AttemptFailure::Timeout)
            } else {
                SendError::Retryable(AttemptFailure::Connect(error.to_string()))
            }
        })?;

        Ok((status, body))
    }
}

#[async_trait]
impl OrderWebhook for WebhookDispatcher {
    async fn dispatch(&self, request: &WebhookRequest) -> Result<Delivered, DispatchError> {
        let deadline = self.policy.deadline;
        let attempts_made = AtomicU32::new(0);
        match tokio::time::timeout(deadline, self.deliver(request, &attempts_made)).await {
            Ok(result) => result,
            Err(_) => {
                let attempts = attempts_made.load(Ordering::Relaxed);
                error!(
                    event_name = "webhook.dispatch.deadline_exceeded",
                    correlation_id = request.metadata().session_id.as_str(),
                    operation = request.kind().as_str(),
                    deadline_ms = deadline.as_millis() as u64,
                    attempts,
                    "webhook call exceeded its deadline"
                );
                Err(DispatchError::DeadlineExceeded {
                    deadline_ms: deadline.as_millis() as u64,
                    attempts,
                })
            }
        }
    }
}

fn classify_send_error(error: reqwest::Error) -> SendError {
    if error.is_timeout() {
        SendError::Retryable(AttemptFailure::Timeout)
    } else if error.is_connect() || error.is_request() {
        SendError::Retryable(AttemptFailure::Connect(error.to_string()))
    } else {
        SendError::Fatal(error.to_string())
    }
}

fn interpret(
    kind: OperationKind,
    status: u16,
    body: &str,
    attempts: u32,
    correlation_id: &str,
) -> Result<Delivered, DispatchError> {
    if status >= 500 {
        return Err(DispatchError::Rejected { status, body: truncate(body), attempts });
    }

    match WebhookResponse::parse(kind, body) {
        Ok(response) => {
            info!(
                event_name = "webhook.dispatch.delivered",
                correlation_id,
                operation = kind.as_str(),
                status,
                attempts,
                success = response.success,
                "webhook response received"
            );
            Ok(Delivered { status, attempts, response })
        }
        Err(parse_error) if (200..300).contains(&status) => {
            warn!(
                event_name = "webhook.dispatch.invalid_response",
                correlation_id,
                operation = kind.as_str(),
                status,
                error = %parse_error,
                "backend success response could not be parsed"
            );
            Err(DispatchError::InvalidResponse {
                status,
                message: parse_error.to_string(),
                attempts,
            })
        }
        Err(_) => Err(DispatchError::Rejected { status, body: truncate(body), attempts }),
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_LOGGED_BODY_CHARS).collect()
}
