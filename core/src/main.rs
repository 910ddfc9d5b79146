mod orders;

use std::sync::Arc;

use actix_web::{
    App, HttpServer,
    web::{self},
};
use common::env_config::Config;
use model::ExceptionChain;
use monitor::ExceptionAppendHook;
use tokio_util::sync::CancellationToken;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // get env vars
    let config = Config::from_env();
    let config_data = config.clone();

    // init logger
    logger::setup(&config).map_err(std::io::Error::other)?;

    // init monitor pipeline
    let environment = config.environment.clone();
    let append_hook: ExceptionAppendHook =
        Arc::new(move |_: &ExceptionChain| Some(format!("Environment: {}", environment)));
    let (queue, worker) =
        monitor::setup(&config.monitor, Some(append_hook)).map_err(std::io::Error::other)?;
    let cancel = CancellationToken::new();
    let worker_handle = tokio::spawn(worker.run(cancel.clone()));

    log::info!(
        "Listening on {}:{} ({})",
        config.server_host,
        config.server_port,
        config.environment
    );

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(config_data.clone()))
            .app_data(web::Data::new(queue.clone()))
            .wrap(logger::middleware()) // 2nd
            .wrap(extractor::middleware()) // 1st
            .service(
                web::scope("/api")
                    .route("/health", web::get().to(orders::health))
                    .service(orders::mount()),
            )
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .workers(config.num_workers)
    .run()
    .await?;

    // stop the monitor worker, pending snapshots are dropped
    cancel.cancel();
    if let Err(e) = worker_handle.await {
        log::error!("Monitor worker ended abnormally: {}", e);
    }
    Ok(())
}
