use chatorder_core::config::{AppConfig, LoadOptions};
use chatorder_core::{OrderCode, Route};
use secrecy::ExposeSecret;
use serde::Serialize;

use crate::commands::{CommandResult, EXIT_CONFIG};

const MIN_SECRET_CHARS: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Fail { EXIT_CONFIG } else { 0 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_webhook_secret(&config));
            checks.push(check_retry_budget(&config));
            checks.push(check_webhook_routes(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["webhook_secret", "retry_budget", "webhook_routes"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let any_fail = checks
        .iter()
        .any(|check| matches!(check.status, CheckStatus::Fail | CheckStatus::Skipped));
    let any_warn = checks.iter().any(|check| check.status == CheckStatus::Warn);
    let (overall_status, summary) = match (any_fail, any_warn) {
        (true, _) => (CheckStatus::Fail, "doctor: one or more readiness checks failed"),
        (false, true) => (CheckStatus::Warn, "doctor: ready, with warnings"),
        (false, false) => (CheckStatus::Pass, "doctor: all readiness checks passed"),
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

fn check_webhook_secret(config: &AppConfig) -> DoctorCheck {
    let length = config.webhook.secret.expose_secret().trim().chars().count();
    if length < MIN_SECRET_CHARS {
        return DoctorCheck {
            name: "webhook_secret",
            status: CheckStatus::Warn,
            details: format!(
                "secret is set but only {length} chars; use at least {MIN_SECRET_CHARS}"
            ),
        };
    }

    DoctorCheck {
        name: "webhook_secret",
        status: CheckStatus::Pass,
        details: format!("secret is set ({length} chars), sent as `x-webhook-secret`"),
    }
}

fn check_retry_budget(config: &AppConfig) -> DoctorCheck {
    let policy = config.webhook.retry_policy();
    let unbounded = policy.unbounded_worst_case().as_millis();
    let deadline = policy.deadline.as_millis();
    let details = format!(
        "{} attempt(s), {}ms per attempt, waits {:?}ms; worst case {}ms, deadline {}ms",
        policy.max_attempts,
        policy.attempt_timeout.as_millis(),
        config.webhook.retry_delays_ms,
        unbounded,
        deadline
    );

    if unbounded > deadline {
        return DoctorCheck {
            name: "retry_budget",
            status: CheckStatus::Warn,
            details: format!("{details}; later attempts are cut short by the deadline"),
        };
    }

    DoctorCheck { name: "retry_budget", status: CheckStatus::Pass, details }
}

fn check_webhook_routes(config: &AppConfig) -> DoctorCheck {
    let base_url = &config.webhook.base_url;
    let example_code = match OrderCode::parse("ORD20250818001") {
        Ok(code) => code,
        Err(error) => {
            return DoctorCheck {
                name: "webhook_routes",
                status: CheckStatus::Fail,
                details: error.to_string(),
            };
        }
    };

    let routes = [Route::create_order(), Route::update_order(&example_code), Route::check_quantity()]
        .iter()
        .map(|route| format!("{} {}", route.method.as_str(), route.url(base_url)))
        .collect::<Vec<_>>()
        .join(", ");

    let status = if base_url.starts_with("https://") { CheckStatus::Pass } else { CheckStatus::Warn };
    DoctorCheck { name: "webhook_routes", status, details: routes }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
