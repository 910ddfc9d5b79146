use actix_web::{Responder, web};
use common::error::{MonitorError, Res};
use common::http::Success;
use extractor::{RequestContext, ctx_log};
use model::Notification;
use serde_json::json;

pub fn mount() -> actix_web::Scope {
    web::scope("/orders").route("/{id}", web::get().to(get_order))
}

async fn get_order(path: web::Path<u64>, ctx: RequestContext) -> Res<impl Responder> {
    let id = path.into_inner();
    let queries = ctx.db_queries();

    ctx_log!(ctx, log::Level::Info, "orders", "loading order {}", id);
    queries.increment();

    if id == 0 {
        ctx.notify(Notification::new("id", "order id must be positive"));
        return Err(MonitorError::NotFound(format!("order {}", id)));
    }
    Success::ok(json!({ "id": id, "status": "shipped" }))
}

pub async fn health() -> Res<impl Responder> {
    Success::ok(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, test};

    #[actix_web::test]
    async fn unknown_order_is_not_found() {
        let app = test::init_service(
            App::new()
                .wrap(extractor::middleware())
                .service(web::scope("/api").service(mount())),
        )
        .await;

        let ok = test::TestRequest::get().uri("/api/orders/5").to_request();
        assert!(test::call_service(&app, ok).await.status().is_success());

        let missing = test::TestRequest::get().uri("/api/orders/0").to_request();
        assert_eq!(test::call_service(&app, missing).await.status().as_u16(), 404);
    }
}
