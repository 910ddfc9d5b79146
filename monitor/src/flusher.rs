//! Single-attempt delivery of a [`LogContext`] to the collector.
//!
//! Transport failures and rejections are logged here and reported as a
//! [`DeliveryOutcome`]; only unexpected failures while reading the error
//! response come back as `Err`.

use std::future::Future;
use std::time::Duration;

use common::env_config::MonitorConfig;
use common::error::{MonitorError, Res};
use model::LogContext;
use model::dtos::error_response::{ErrorResponse, IssueType};
use reqwest::header::{HeaderValue, USER_AGENT};
use url::Url;

pub const CORRELATION_ID_HEADER: &str = "X-Correlation-Id";
pub const FORWARDED_FOR_HEADER: &str = "X-Forwarded-For";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Non-success status with a structured error body.
    Rejected { status: u16, issues: usize },
    /// Non-success status with a body that could not be parsed.
    Unclassified { status: u16 },
    /// The request never produced a response.
    TransportFailed,
}

pub trait Delivery: Send + Sync + 'static {
    fn flush(&self, context: &LogContext) -> impl Future<Output = Res<DeliveryOutcome>> + Send;
}

#[derive(Debug, Clone)]
pub struct Flusher {
    client: reqwest::Client,
    endpoint: Url,
    user_agent: String,
}

impl Flusher {
    pub fn new(config: &MonitorConfig) -> Res<Self> {
        let endpoint = Url::parse(&config.base_address)?.join(&config.path)?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(MonitorError::Config(format!(
                "collector address must be http or https, got {}",
                config.base_address
            )));
        }
        if config.timeout_secs == 0 {
            return Err(MonitorError::Config(
                "collector timeout must be at least one second".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Flusher {
            client,
            endpoint,
            user_agent: config.user_agent.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn report_failure(&self, response: reqwest::Response) -> Res<DeliveryOutcome> {
        let status = response.status().as_u16();
        let body = response.text().await?;

        let parsed = match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(parsed) if !parsed.issues.is_empty() => parsed,
            _ => {
                log::error!(
                    "Monitor delivery failed: POST {} responded with status {}",
                    self.endpoint,
                    status
                );
                return Ok(DeliveryOutcome::Unclassified { status });
            }
        };

        let correlation_id = parsed.correlation_id.as_deref().unwrap_or("-");
        for issue in &parsed.issues {
            let level = match issue.issue_type {
                IssueType::NotFound | IssueType::Validation => log::Level::Warn,
                IssueType::Error | IssueType::Unknown => log::Level::Error,
            };
            log::log!(
                level,
                "Monitor collector rejected payload [{}] status={} type={:?} title={}",
                correlation_id,
                status,
                issue.issue_type,
                issue.title.as_deref().unwrap_or("-")
            );
            if issue.details.is_empty() {
                log::log!(level, "  no details");
            }
            for detail in &issue.details {
                log::log!(
                    level,
                    "  level={} key={} value={}",
                    detail.level,
                    detail.key,
                    detail.value
                );
            }
        }

        Ok(DeliveryOutcome::Rejected {
            status,
            issues: parsed.issues.len(),
        })
    }
}

impl Delivery for Flusher {
    async fn flush(&self, context: &LogContext) -> Res<DeliveryOutcome> {
        let user_agent = if context.request.user_agent.trim().is_empty() {
            self.user_agent.as_str()
        } else {
            context.request.user_agent.as_str()
        };

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header(CORRELATION_ID_HEADER, context.correlation_id.as_str())
            .json(context);
        if let Ok(value) = HeaderValue::from_str(user_agent) {
            request = request.header(USER_AGENT, value);
        }
        if !context.request.ip_address.is_empty() {
            request = request.header(FORWARDED_FOR_HEADER, context.request.ip_address.as_str());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                log::error!(
                    "Monitor delivery to {} failed for {}: {}",
                    self.endpoint,
                    context.correlation_id,
                    e
                );
                return Ok(DeliveryOutcome::TransportFailed);
            }
        };

        if response.status().is_success() {
            log::debug!(
                "Monitor payload {} delivered ({})",
                context.correlation_id,
                response.status()
            );
            return Ok(DeliveryOutcome::Delivered);
        }

        self.report_failure(response).await
    }
}
