use serde::{Deserialize, Serialize};

use crate::domain::order::OrderCode;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    CreateOrder,
    UpdateOrder,
    CheckQuantity,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateOrder => "create_order",
            Self::UpdateOrder => "update_order",
            Self::CheckQuantity => "check_quantity",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "create_order" => Some(Self::CreateOrder),
            "update_order" => Some(Self::UpdateOrder),
            "check_quantity" => Some(Self::CheckQuantity),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Post,
    Put,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }
}

/// Fixed backend endpoint for one webhook operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Route {
    pub method: HttpMethod,
    pub path: String,
}

impl Route {
    pub fn create_order() -> Self {
        Self { method: HttpMethod::Post, path: "/api/webhooks/orders/ai".to_string() }
    }

    pub fn update_order(order_code: &OrderCode) -> Self {
        Self {
            method: HttpMethod::Put,
            path: format!("/api/webhooks/orders/{}/ai", order_code.as_str()),
        }
    }

    pub fn check_quantity() -> Self {
        Self {
            method: HttpMethod::Post,
            path: "/api/webhooks/orders/check-quantity/ai".to_string(),
        }
    }

    /// Joins the route path onto a base URL without doubling slashes.
    pub fn url(&self, base_url: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), self.path)
    }
}
