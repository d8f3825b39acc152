use std::fs;
use std::io::Read;

use anyhow::{Context, Result};
use chatorder_core::config::{AppConfig, LoadOptions};
use chatorder_core::errors::PayloadError;
use chatorder_core::{parse_extraction, PayloadBuilder, ReplyFormatter, TurnContext};
use chatorder_webhook::{OrderTurnHandler, TurnStatus, WebhookDispatcher};
use serde_json::json;
use uuid::Uuid;

use crate::commands::{
    CommandResult, EXIT_CONFIG, EXIT_CONFIGURATION_ALARM, EXIT_DISPATCH, EXIT_INPUT,
    EXIT_RUNTIME_INIT,
};
use crate::init_logging;

const COMMAND: &str = "send";

#[derive(Clone, Debug)]
pub struct SendArgs {
    /// Path to the extraction output, or `-` for stdin.
    pub input: String,
    pub session_id: Option<String>,
    pub dry_run: bool,
}

pub fn run(args: SendArgs) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                format!("configuration issue: {error}"),
                EXIT_CONFIG,
            );
        }
    };
    init_logging(&config.logging);

    let raw = match read_input(&args.input) {
        Ok(raw) => raw,
        Err(error) => {
            return CommandResult::failure(COMMAND, "input_read", format!("{error:#}"), EXIT_INPUT);
        }
    };

    let dispatcher = match WebhookDispatcher::from_config(&config.webhook) {
        Ok(dispatcher) => dispatcher,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime_init",
                error.to_string(),
                EXIT_RUNTIME_INIT,
            );
        }
    };
    let handler = OrderTurnHandler::new(
        PayloadBuilder::new(config.webhook.company_id.clone()),
        dispatcher,
        ReplyFormatter::new(config.reply.currency.clone()),
    );

    let session_id = args.session_id.unwrap_or_else(|| format!("cli-{}", Uuid::new_v4()));
    let context = TurnContext::new(session_id);

    let request = match parse_extraction(&raw).and_then(|extracted| handler.prepare(extracted, &context))
    {
        Ok(request) => request,
        Err(error) => return input_failure(&error),
    };

    if args.dry_run {
        let route = request.route();
        let payload = match request.to_json() {
            Ok(payload) => payload,
            Err(error) => {
                return CommandResult::failure(COMMAND, "serialization", error.to_string(), EXIT_INPUT);
            }
        };
        let details = json!({
            "operation": request.kind(),
            "method": route.method.as_str(),
            "url": route.url(&config.webhook.base_url),
            "payload": payload,
        });
        return CommandResult::report(
            COMMAND,
            "ok",
            None,
            format!("dry run: {} {}", route.method.as_str(), route.path),
            Some(details),
            0,
        );
    }

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                EXIT_RUNTIME_INIT,
            );
        }
    };

    let reply = runtime.block_on(handler.complete(&request));
    let exit_code = match reply.status {
        TurnStatus::Confirmed | TurnStatus::BusinessFailure => 0,
        TurnStatus::DispatchFailed => EXIT_DISPATCH,
        TurnStatus::ConfigurationAlarm => EXIT_CONFIGURATION_ALARM,
    };
    let status = if exit_code == 0 { "ok" } else { "error" };
    let details = serde_json::to_value(&reply).ok();

    CommandResult::report(COMMAND, status, reply.error_class, reply.text, details, exit_code)
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut raw = String::new();
        std::io::stdin().read_to_string(&mut raw).context("failed to read extraction from stdin")?;
        return Ok(raw);
    }

    fs::read_to_string(input).with_context(|| format!("failed to read extraction from `{input}`"))
}

fn input_failure(error: &PayloadError) -> CommandResult {
    CommandResult::report(
        COMMAND,
        "error",
        Some("input_validation"),
        error.user_message(),
        Some(json!({ "error": error.to_string() })),
        EXIT_INPUT,
    )
}
