use actix_web::body::{self, BoxBody, MessageBody};
use actix_web::dev::Payload;
use actix_web::http::header::{self, HeaderName, HeaderValue};
use actix_web::web::{self, Bytes};
use actix_web::{
    Error,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use actix_web::{HttpMessage, ResponseError};
use chrono::Utc;
use colored::Colorize;
use common::env_config::Config;
use common::error::MonitorError;
use extractor::RequestContext;
use futures::StreamExt;
use futures::future::{LocalBoxFuture, Ready, ready};
use log::info;
use model::{
    ExceptionChain, HeaderMap, Principal, RequestFacts, ResponseFacts, Snapshot, capture_body,
};
use monitor::SnapshotQueue;
use std::pin::Pin;
use std::sync::Arc;
use uuid::Uuid;

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";
const CLIENT_ID_HEADER: &str = "x-client-id";
const TRACEPARENT_HEADER: &str = "traceparent";

/// Captures every request into a [`Snapshot`] and hands it to the monitor
/// queue once the response is ready.
pub struct MonitorMiddleware {}

impl MonitorMiddleware {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for MonitorMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, B> Transform<S, ServiceRequest> for MonitorMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: actix_web::body::MessageBody + 'static,
    <B as MessageBody>::Error: ResponseError,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = MonitorMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(MonitorMiddlewareService {
            service: Arc::new(service),
        }))
    }
}

pub struct MonitorMiddlewareService<S> {
    service: Arc<S>,
}

impl<S, B> Service<ServiceRequest> for MonitorMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: actix_web::body::MessageBody + 'static,
    <B as MessageBody>::Error: ResponseError,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let start_time = Utc::now();

        let config = req
            .app_data::<web::Data<Arc<Config>>>()
            .map(|config| Arc::clone(config.get_ref()));
        let queue = req
            .app_data::<web::Data<SnapshotQueue>>()
            .map(|queue| queue.get_ref().clone());
        let console_logging_enabled = config
            .as_ref()
            .is_some_and(|config| config.console_logging_enabled);

        // snapshots need both the config and a queue to land in
        let monitor = match (config, queue) {
            (Some(config), Some(queue))
                if config.monitor.enable_ned_monitor && !queue.is_closed() =>
            {
                Some((config.monitor.max_response_body_size_in_mb, queue))
            }
            _ => None,
        };

        // Ids
        let correlation_id = header_value(&req, CORRELATION_ID_HEADER)
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let request_id = Uuid::new_v4().to_string();
        let trace_id = header_value(&req, TRACEPARENT_HEADER)
            .as_deref()
            .and_then(trace_id_from_traceparent)
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

        let mut facts = request_facts(&req);
        let srv = Arc::clone(&self.service);

        Box::pin(async move {
            if let Some((max_mb, _)) = &monitor {
                // Copy request body from payload and reconstruct it
                let mut payload = req.take_payload();
                let body_bytes = extract_body(&mut payload).await?;
                if !body_bytes.is_empty() {
                    facts.body = Some(capture_body(&body_bytes, *max_mb));
                }
                let new_stream: Pin<
                    Box<dyn futures::Stream<Item = Result<Bytes, actix_web::error::PayloadError>>>,
                > = futures::stream::once(async move {
                    Ok::<Bytes, actix_web::error::PayloadError>(body_bytes)
                })
                .boxed();
                req.set_payload(Payload::from(new_stream));
            }

            // Call next services
            let res = srv.call(req).await?;
            let end_time = Utc::now();
            let status_code = res.status().as_u16();

            let (http_req, res) = res.into_parts();
            let mut res = match &monitor {
                Some((max_mb, queue)) => {
                    let ctx = http_req.extensions().get::<RequestContext>().cloned();
                    let principal = http_req
                        .extensions()
                        .get::<Principal>()
                        .cloned()
                        .unwrap_or_default();
                    let response_error = res.error().map(exception_chain);

                    // Copy response body and reconstruct response
                    let (res, res_body) = res.into_parts();
                    let response_body_bytes = body::to_bytes(res_body).await?;

                    let captured = ctx.map(|ctx| ctx.take()).unwrap_or_default();
                    facts.path_template = http_req.match_pattern();
                    queue.enqueue(Snapshot {
                        correlation_id: correlation_id.clone(),
                        request_id,
                        trace_id,
                        request: facts,
                        principal,
                        start_time,
                        end_time,
                        response: ResponseFacts {
                            status_code,
                            headers: header_map(res.headers()),
                            body: (!response_body_bytes.is_empty())
                                .then(|| capture_body(&response_body_bytes, *max_mb)),
                            body_size: response_body_bytes.len() as u64,
                        },
                        exception: captured.exception.or(response_error),
                        log_entries: captured.log_entries,
                        http_client_logs: captured.http_client_logs,
                        notifications: captured.notifications,
                        db_query_count: captured.db_query_count,
                    });

                    res.set_body(response_body_bytes).map_into_boxed_body()
                }
                None => res.map_into_boxed_body(),
            };

            if let Ok(value) = HeaderValue::from_str(&correlation_id) {
                res.headers_mut()
                    .insert(HeaderName::from_static(CORRELATION_ID_HEADER), value);
            }

            // Log to console
            if console_logging_enabled {
                let colored_status = match status_code {
                    200..=299 => status_code.to_string().green(),
                    300..=399 => status_code.to_string().yellow(),
                    400..=499 => status_code.to_string().bright_red(),
                    _ => status_code.to_string().red(),
                };

                let method = http_req.method().to_string();
                let colored_method = match method.as_str() {
                    "GET" => method.blue(),
                    "POST" => method.yellow(),
                    "PUT" => method.purple(),
                    "DELETE" => method.red(),
                    _ => method.normal(),
                };

                info!(
                    "[{}] {} {} {} correlation_id={}",
                    colored_status,
                    colored_method,
                    http_req.path().bright_white(),
                    format!("({}ms)", (end_time - start_time).num_milliseconds()).bright_black(),
                    correlation_id.bright_blue(),
                );
            }

            Ok(ServiceResponse::new(http_req, res))
        })
    }
}

fn request_facts(req: &ServiceRequest) -> RequestFacts {
    let info = req.connection_info();
    RequestFacts {
        method: req.method().to_string(),
        scheme: info.scheme().to_string(),
        host: info.host().to_string(),
        path: req.path().to_string(),
        path_template: None,
        query_string: req.query_string().to_string(),
        headers: header_map(req.headers()),
        content_type: header_value(req, header::CONTENT_TYPE.as_str()),
        content_length: header_value(req, header::CONTENT_LENGTH.as_str())
            .and_then(|len| len.parse().ok()),
        body: None,
        client_id: header_value(req, CLIENT_ID_HEADER),
        user_agent: header_value(req, header::USER_AGENT.as_str()).unwrap_or_default(),
        ip_address: info
            .realip_remote_addr()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string()),
        remote_port: req.peer_addr().map(|addr| addr.port()),
        local_port: Some(req.app_config().local_addr().port()),
    }
}

fn header_value(req: &ServiceRequest, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

fn header_map(headers: &header::HeaderMap) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers.iter() {
        map.entry(name.as_str().to_string())
            .or_insert_with(Vec::new)
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    map
}

/// Trace id field of a W3C `traceparent` header.
fn trace_id_from_traceparent(value: &str) -> Option<String> {
    value
        .split('-')
        .nth(1)
        .filter(|id| id.len() == 32 && id.chars().all(|c| c.is_ascii_hexdigit()))
        .map(|id| id.to_string())
}

fn exception_chain(err: &Error) -> ExceptionChain {
    match err.as_error::<MonitorError>() {
        Some(e) => ExceptionChain::from_error(e),
        None => ExceptionChain::new("actix_web::Error", err.to_string()),
    }
}

async fn extract_body(payload: &mut Payload) -> Result<Bytes, Error> {
    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk?;
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::{TestRequest, call_service, init_service, read_body};
    use actix_web::{App, HttpResponse};
    use common::env_config::MonitorConfig;
    use common::error::Res;
    use extractor::ctx_log;
    use model::Notification;
    use monitor::queue;

    fn config(monitor: MonitorConfig) -> web::Data<Arc<Config>> {
        let mut config = (*Config::from_env()).clone();
        config.console_logging_enabled = false;
        config.monitor = monitor;
        web::Data::new(Arc::new(config))
    }

    async fn order(path: web::Path<String>, ctx: RequestContext, body: Bytes) -> Res<HttpResponse> {
        let id = path.into_inner();
        ctx_log!(ctx, log::Level::Info, "orders", "order {} requested", id);
        ctx.db_queries().increment();
        if id == "0" {
            return Err(MonitorError::NotFound(format!("order {}", id)));
        }
        ctx.notify(Notification::new("order", "accepted"));
        Ok(HttpResponse::Ok().body(format!("{}:{}", id, body.len())))
    }

    macro_rules! monitored_app {
        ($monitor:expr) => {{
            let (queue, reader) = queue::channel();
            let app = init_service(
                App::new()
                    .app_data(config($monitor))
                    .app_data(web::Data::new(queue))
                    .wrap(MonitorMiddleware::new())
                    .wrap(extractor::middleware())
                    .route("/orders/{id}", web::post().to(order)),
            )
            .await;
            (app, reader)
        }};
    }

    #[actix_web::test]
    async fn captures_request_into_snapshot() {
        let (app, mut reader) = monitored_app!(MonitorConfig::default());

        let req = TestRequest::post()
            .uri("/orders/7?expand=lines")
            .insert_header(("X-Correlation-Id", "corr-1"))
            .insert_header((
                "traceparent",
                "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01",
            ))
            .insert_header(("X-Client-Id", "shop-web"))
            .set_payload(r#"{"qty":2}"#)
            .to_request();
        let res = call_service(&app, req).await;
        assert_eq!(res.headers().get(CORRELATION_ID_HEADER).unwrap(), "corr-1");
        assert_eq!(read_body(res).await, Bytes::from_static(b"7:9"));

        let snapshot = reader.next().await.unwrap();
        assert_eq!(snapshot.correlation_id, "corr-1");
        assert_eq!(snapshot.trace_id, "0af7651916cd43dd8448eb211c80319c");
        assert_eq!(snapshot.request.method, "POST");
        assert_eq!(snapshot.request.query_string, "expand=lines");
        assert_eq!(snapshot.request.path_template.as_deref(), Some("/orders/{id}"));
        assert_eq!(snapshot.request.client_id.as_deref(), Some("shop-web"));
        assert_eq!(snapshot.request.body.as_deref(), Some(r#"{"qty":2}"#));
        assert_eq!(snapshot.response.status_code, 200);
        assert_eq!(snapshot.response.body.as_deref(), Some("7:9"));
        assert_eq!(snapshot.response.body_size, 3);
        assert_eq!(snapshot.log_entries.len(), 1);
        assert_eq!(snapshot.notifications.len(), 1);
        assert_eq!(snapshot.db_query_count, 1);
        assert!(snapshot.exception.is_none());
    }

    #[actix_web::test]
    async fn handler_error_becomes_exception() {
        let (app, mut reader) = monitored_app!(MonitorConfig::default());

        let req = TestRequest::post().uri("/orders/0").to_request();
        let res = call_service(&app, req).await;
        assert_eq!(res.status().as_u16(), 404);

        let snapshot = reader.next().await.unwrap();
        assert_eq!(snapshot.response.status_code, 404);
        let chain = snapshot.exception.unwrap();
        assert!(chain.root().unwrap().message.contains("order 0"));
        // generated when the caller sent none
        assert!(!snapshot.correlation_id.is_empty());
        assert_eq!(snapshot.trace_id.len(), 32);
    }

    #[actix_web::test]
    async fn disabled_monitor_passes_through() {
        let (app, reader) = monitored_app!(MonitorConfig {
            enable_ned_monitor: false,
            ..Default::default()
        });

        let req = TestRequest::post()
            .uri("/orders/3")
            .set_payload("abc")
            .to_request();
        let res = call_service(&app, req).await;
        assert!(res.headers().contains_key(CORRELATION_ID_HEADER));
        assert_eq!(read_body(res).await, Bytes::from_static(b"3:3"));
        assert!(reader.is_empty());
    }

    #[actix_web::test]
    async fn stopped_worker_passes_through() {
        let (app, reader) = monitored_app!(MonitorConfig::default());
        drop(reader);

        let req = TestRequest::post()
            .uri("/orders/4")
            .set_payload("abcd")
            .to_request();
        let res = call_service(&app, req).await;
        assert!(res.status().is_success());
        assert_eq!(read_body(res).await, Bytes::from_static(b"4:4"));
    }

    #[test]
    fn traceparent_must_carry_hex_trace_id() {
        assert_eq!(
            trace_id_from_traceparent("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01")
                .as_deref(),
            Some("4bf92f3577b34da6a3ce929d0e0e4736")
        );
        assert!(trace_id_from_traceparent("garbage").is_none());
        assert!(trace_id_from_traceparent("00-xyz-00f067aa0ba902b7-01").is_none());
    }
}
