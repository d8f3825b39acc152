pub mod config;
pub mod domain;
pub mod errors;
pub mod extraction;
pub mod payload;
pub mod reply;
pub mod response;
pub mod retry;

pub use domain::operation::{HttpMethod, OperationKind, Route};
pub use domain::order::{
    ChannelInfo, CustomerInfo, DeliveryInfo, OrderChanges, OrderCode, PaymentInfo, ProductLine,
    Urgency,
};
pub use errors::{ApplicationError, PayloadError};
pub use extraction::{parse_extraction, ExtractedOrder};
pub use payload::{PayloadBuilder, TurnContext, WebhookRequest};
pub use reply::ReplyFormatter;
pub use response::{ResponseData, WebhookResponse};
pub use retry::{AttemptFailure, RetryDecision, RetryPolicy, StatusClass};
