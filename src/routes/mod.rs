use axum::Router;

pub mod rooms;
pub mod ws;

pub fn router() -> Router {
    Router::new()
        .nest("/api", rooms::router())
        .nest("/ws",  ws::router())
}
