mod broker;
mod config;
mod error;
mod state;
mod utils {
    pub mod sweep;
    pub mod token;
}
mod routes;

use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, Extension, Router};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::broker::SessionBroker;
use crate::config::Config;
use crate::error::CastErr;

const BODY_LIMIT: usize = 64 * 1024;

fn app(broker: SessionBroker, cfg: Arc<Config>) -> Router {
    routes::router()
        .layer(Extension(broker))
        .layer(Extension(cfg))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
}

#[tokio::main]
async fn main() -> Result<(), CastErr> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().init();

    let cfg = Arc::new(Config::from_env());
    let broker = SessionBroker::new(cfg.max_rooms);

    tokio::spawn(utils::sweep::task(
        broker.clone(),
        cfg.room_ttl,
        cfg.sweep_interval,
    ));

    let listener = tokio::net::TcpListener::bind(cfg.bind_addr).await?;
    tracing::info!(addr = %cfg.bind_addr, "cast server listening");
    axum::serve(listener, app(broker, cfg).into_make_service()).await?;
    Ok(())
}
