//! Turns backend responses into the text the customer sees.
//!
//! Replies only mention facts the backend returned. When the backend reports a
//! business failure the reply says so plainly; when the call never got a usable
//! answer the reply is a generic apology with no invented details.

use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;

use crate::domain::operation::OperationKind;
use crate::response::{CheckTicket, OrderSummary, ResponseData, UpdateSummary, WebhookResponse};

pub const DEFAULT_CURRENCY: &str = "VND";

#[derive(Clone, Debug)]
pub struct ReplyFormatter {
    currency: String,
}

impl Default for ReplyFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_CURRENCY)
    }
}

impl ReplyFormatter {
    pub fn new(currency: impl Into<String>) -> Self {
        Self { currency: currency.into() }
    }

    pub fn format(&self, kind: OperationKind, response: &WebhookResponse) -> String {
        if !response.success {
            return self.business_failure(kind, response);
        }

        match &response.data {
            ResponseData::Order(summary) => self.order_created(summary),
            ResponseData::Update(summary) => self.order_updated(summary),
            ResponseData::Check(ticket) => self.check_requested(ticket),
            ResponseData::Unstructured(_) | ResponseData::Empty => {
                acknowledged(kind, &response.message)
            }
        }
    }

    /// Reply for a call that never produced a usable backend answer.
    pub fn delivery_failure(&self, kind: OperationKind) -> String {
        let action = match kind {
            OperationKind::CreateOrder => "place your order",
            OperationKind::UpdateOrder => "update your order",
            OperationKind::CheckQuantity => "check stock for you",
        };
        format!(
            "Sorry, I couldn't {action} right now because our order system is not responding. \
             Please try again in a few minutes."
        )
    }

    fn order_created(&self, summary: &OrderSummary) -> String {
        let mut reply = match summary.order_code.as_deref() {
            Some(code) => format!("Your order {code} has been placed."),
            None => "Your order has been placed.".to_string(),
        };
        if let Some(count) = summary.item_count {
            let noun = if count == 1 { "item" } else { "items" };
            reply.push_str(&format!(" It contains {count} {noun}."));
        }
        if let Some(total) = self.total(summary.formatted_total.as_deref(), summary.total_amount) {
            reply.push_str(&format!(" Total: {total}."));
        }
        if let Some(eta) = summary.estimated_delivery.as_deref() {
            reply.push_str(&format!(" Estimated delivery: {eta}."));
        }
        reply
    }

    fn order_updated(&self, summary: &UpdateSummary) -> String {
        let mut reply = match summary.order_code.as_deref() {
            Some(code) => format!("Order {code} has been updated"),
            None => "Your order has been updated".to_string(),
        };

        let changes = describe_changes(summary);
        if changes.is_empty() {
            reply.push('.');
        } else {
            reply.push_str(": ");
            reply.push_str(&changes.join("; "));
            reply.push('.');
        }

        if let Some(total) = self.total(summary.formatted_total.as_deref(), summary.total_amount) {
            reply.push_str(&format!(" New total: {total}."));
        }
        reply
    }

    fn check_requested(&self, ticket: &CheckTicket) -> String {
        let mut reply = match (ticket.check_id.as_deref(), ticket.status.as_deref()) {
            (Some(id), Some(status)) => {
                format!("I've sent a stock check request (ticket {id}, status: {status}).")
            }
            (Some(id), None) => format!("I've sent a stock check request (ticket {id})."),
            (None, Some(status)) => format!("I've sent a stock check request (status: {status})."),
            (None, None) => "I've sent a stock check request.".to_string(),
        };

        let lines = ticket
            .availability
            .iter()
            .filter_map(|item| {
                let name = item.name.as_deref()?;
                match (item.available, item.available_quantity) {
                    (_, Some(quantity)) => Some(format!("{name}: {quantity} available")),
                    (Some(true), None) => Some(format!("{name}: in stock")),
                    (Some(false), None) => Some(format!("{name}: out of stock")),
                    (None, None) => None,
                }
            })
            .collect::<Vec<_>>();
        if !lines.is_empty() {
            reply.push_str(&format!(" Current availability: {}.", lines.join(", ")));
        }

        if let Some(eta) = ticket.estimated_response_time.as_deref() {
            reply.push_str(&format!(" We'll get back to you within {eta}."));
        }
        reply
    }

    fn business_failure(&self, kind: OperationKind, response: &WebhookResponse) -> String {
        let order_code = match &response.data {
            ResponseData::Order(summary) => summary.order_code.as_deref(),
            ResponseData::Update(summary) => summary.order_code.as_deref(),
            _ => None,
        };
        let action = match (kind, order_code) {
            (OperationKind::CreateOrder, _) => "place your order".to_string(),
            (OperationKind::UpdateOrder, Some(code)) => format!("update order {code}"),
            (OperationKind::UpdateOrder, None) => "update your order".to_string(),
            (OperationKind::CheckQuantity, _) => "start the stock check".to_string(),
        };

        let reason = response.message.trim().trim_end_matches('.');
        if reason.is_empty() {
            format!("Sorry, I couldn't {action}. Please check the details and try again.")
        } else {
            format!("Sorry, I couldn't {action}: {reason}. Please check the details and try again.")
        }
    }

    fn total(&self, formatted: Option<&str>, amount: Option<Decimal>) -> Option<String> {
        formatted
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .or_else(|| amount.map(|amount| format_amount(amount, &self.currency)))
    }
}

fn acknowledged(kind: OperationKind, message: &str) -> String {
    let message = message.trim();
    if !message.is_empty() {
        return format!("Done: {message}");
    }
    match kind {
        OperationKind::CreateOrder => "Your order has been placed.".to_string(),
        OperationKind::UpdateOrder => "Your order has been updated.".to_string(),
        OperationKind::CheckQuantity => "I've sent a stock check request.".to_string(),
    }
}

fn describe_changes(summary: &UpdateSummary) -> Vec<String> {
    let changes = summary.changes.as_ref();

    if summary.updated_fields.is_empty() {
        let mut leaves = Vec::new();
        if let Some(value) = changes {
            collect_leaves("", value, &mut leaves);
        }
        return leaves;
    }

    summary
        .updated_fields
        .iter()
        .map(|field| match changes.and_then(|changes| lookup_path(changes, field)) {
            Some(value) => format!("{} is now {}", humanize_path(field), render_value(value)),
            None => format!("{} changed", humanize_path(field)),
        })
        .collect()
}

fn collect_leaves(prefix: &str, value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() { key.clone() } else { format!("{prefix}.{key}") };
                collect_leaves(&path, child, out);
            }
        }
        Value::Null => {}
        leaf => {
            if !prefix.is_empty() {
                out.push(format!("{} is now {}", humanize_path(prefix), render_value(leaf)));
            }
        }
    }
}

fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| current.get(segment))
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(true) => "yes".to_string(),
        Value::Bool(false) => "no".to_string(),
        Value::Null => "empty".to_string(),
        Value::Array(items) => items.iter().map(render_item).collect::<Vec<_>>().join(", "),
        Value::Object(map) => map
            .iter()
            .filter(|(_, child)| !child.is_null())
            .map(|(key, child)| format!("{} {}", humanize_path(key), render_value(child)))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn render_item(item: &Value) -> String {
    let name = item.get("name").and_then(Value::as_str);
    let quantity = item.get("quantity").and_then(Value::as_u64);
    match (name, quantity) {
        (Some(name), Some(quantity)) => format!("{name} x{quantity}"),
        (Some(name), None) => name.to_string(),
        _ => render_value(item),
    }
}

/// `delivery.address` -> `delivery address`, `customerPhone` -> `customer phone`.
fn humanize_path(path: &str) -> String {
    let mut words = Vec::new();
    for segment in path.split(['.', '_']).filter(|segment| !segment.is_empty()) {
        let mut word = String::new();
        for ch in segment.chars() {
            if ch.is_uppercase() && !word.is_empty() {
                words.push(std::mem::take(&mut word));
            }
            word.extend(ch.to_lowercase());
        }
        if !word.is_empty() {
            words.push(word);
        }
    }
    words.join(" ")
}

/// Renders an amount with thousands separators, e.g. `1250000` -> `1,250,000 VND`.
pub fn format_amount(amount: Decimal, currency: &str) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero).normalize();
    let text = rounded.abs().to_string();
    let (integer, fraction) = match text.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (text.as_str(), None),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (index, digit) in integer.chars().enumerate() {
        if index > 0 && (integer.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    let number = match fraction {
        Some(fraction) => format!("{sign}{grouped}.{fraction}"),
        None => format!("{sign}{grouped}"),
    };

    let currency = currency.trim();
    if currency.is_empty() {
        number
    } else {
        format!("{number} {currency}")
    }
}
