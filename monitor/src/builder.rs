//! Assembles the [`LogContext`] shipped for one snapshot.
//!
//! The builder only assembles: which optional sections are included is
//! decided by the caller. Every `with_*` step after [`LogContextBuilder::with_snapshot`]
//! adds one section; [`LogContextBuilder::build`] hands the result out and
//! leaves the builder empty for the next snapshot.

use std::sync::Arc;

use common::error::{MonitorError, Res};
use model::models::log_context::{
    DbQuerySection, ExceptionSection, RequestSection, ResponseSection, UserSection,
};
use model::{HttpRequestLogContext, LogContext, Snapshot};

use crate::exception::ExceptionFormatter;
use crate::masker::Masker;

#[derive(Debug)]
struct Pending {
    snapshot: Snapshot,
    context: LogContext,
}

#[derive(Debug)]
pub struct LogContextBuilder {
    formatter: ExceptionFormatter,
    masker: Option<Arc<Masker>>,
    pending: Option<Pending>,
}

impl LogContextBuilder {
    pub fn new(formatter: ExceptionFormatter, masker: Option<Arc<Masker>>) -> Self {
        Self {
            formatter,
            masker,
            pending: None,
        }
    }

    /// Starts a new payload from `snapshot`, discarding anything accumulated
    /// before.
    pub fn with_snapshot(&mut self, snapshot: Snapshot) -> &mut Self {
        let context = self.base_context(&snapshot);
        self.pending = Some(Pending { snapshot, context });
        self
    }

    pub fn with_exception(&mut self) -> &mut Self {
        if let Some(pending) = self.pending.as_mut() {
            pending.context.exception = pending.snapshot.exception.as_ref().map(|chain| {
                let (type_name, message) = chain
                    .root()
                    .map(|r| (r.type_name.clone(), r.message.clone()))
                    .unwrap_or_default();
                ExceptionSection {
                    type_name,
                    message,
                    details: self.formatter.format(chain),
                }
            });
        }
        self
    }

    pub fn with_notifications(&mut self) -> &mut Self {
        if let Some(pending) = self.pending.as_mut() {
            pending.context.notifications = Some(pending.snapshot.notifications.clone());
        }
        self
    }

    pub fn with_log_entries(&mut self) -> &mut Self {
        if let Some(pending) = self.pending.as_mut() {
            pending.context.log_entries = Some(pending.snapshot.log_entries.clone());
        }
        self
    }

    pub fn with_http_client_logs(&mut self) -> &mut Self {
        let masker = self.masker.as_deref();
        if let Some(pending) = self.pending.as_mut() {
            let logs = pending
                .snapshot
                .http_client_logs
                .iter()
                .map(|log| mask_http_log(masker, log))
                .collect();
            pending.context.http_client_logs = Some(logs);
        }
        self
    }

    pub fn with_db_query_logs(&mut self) -> &mut Self {
        if let Some(pending) = self.pending.as_mut() {
            pending.context.db_query_logs = Some(DbQuerySection {
                query_count: pending.snapshot.db_query_count,
            });
        }
        self
    }

    /// Returns the assembled payload. Fails when no snapshot was given.
    pub fn build(&mut self) -> Res<LogContext> {
        self.pending
            .take()
            .map(|pending| pending.context)
            .ok_or_else(|| MonitorError::Builder("build called without a snapshot".to_string()))
    }

    fn base_context(&self, snapshot: &Snapshot) -> LogContext {
        let request = &snapshot.request;
        let response = &snapshot.response;

        let mut context = LogContext {
            correlation_id: snapshot.correlation_id.clone(),
            request_id: snapshot.request_id.clone(),
            trace_id: snapshot.trace_id.clone(),
            start_time: snapshot.start_time,
            end_time: snapshot.end_time,
            total_milliseconds: snapshot.total_milliseconds(),
            request: RequestSection {
                method: request.method.clone(),
                scheme: request.scheme.clone(),
                host: request.host.clone(),
                path: request.path.clone(),
                path_template: request.path_template.clone(),
                query_string: request.query_string.clone(),
                headers: request.headers.clone(),
                content_type: request.content_type.clone(),
                content_length: request.content_length,
                body: request.body.clone(),
                client_id: request.client_id.clone(),
                user_agent: request.user_agent.clone(),
                ip_address: request.ip_address.clone(),
                remote_port: request.remote_port,
                local_port: request.local_port,
            },
            user: UserSection {
                roles: snapshot.principal.roles.iter().cloned().collect(),
                claims: snapshot.principal.claims.clone(),
            },
            response: ResponseSection {
                status_code: response.status_code,
                headers: response.headers.clone(),
                body: response.body.clone(),
                body_size: response.body_size,
            },
            exception: None,
            notifications: None,
            log_entries: None,
            http_client_logs: None,
            db_query_logs: None,
        };

        if let Some(masker) = &self.masker {
            let req = &mut context.request;
            req.headers = masker.mask_headers(&req.headers);
            req.query_string = masker.mask_query(&req.query_string);
            req.body = req.body.as_deref().map(|b| masker.mask_json(b));
            context.user.claims = masker.mask_claims(&context.user.claims);
            let res = &mut context.response;
            res.headers = masker.mask_headers(&res.headers);
            res.body = res.body.as_deref().map(|b| masker.mask_json(b));
        }
        context
    }
}

fn mask_http_log(masker: Option<&Masker>, log: &HttpRequestLogContext) -> HttpRequestLogContext {
    let Some(masker) = masker else {
        return log.clone();
    };
    HttpRequestLogContext {
        full_url: masker.mask_url(&log.full_url),
        request_headers: masker.mask_headers(&log.request_headers),
        request_body: log.request_body.as_deref().map(|b| masker.mask_json(b)),
        response_headers: masker.mask_headers(&log.response_headers),
        response_body: log.response_body.as_deref().map(|b| masker.mask_json(b)),
        ..log.clone()
    }
}
