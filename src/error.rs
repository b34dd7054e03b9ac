use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

pub type CastResult<T> = Result<T, CastErr>;

#[derive(thiserror::Error, Debug)]
pub enum CastErr {
    #[error("room not found: {0}")]
    RoomNotFound(String),

    #[error("room {0} already has a sender")]
    RoomOccupied(String),

    #[error("no sender connected to room {0}")]
    NotConnected(String),

    #[error("active room limit reached")]
    Capacity,

    #[error("missing or invalid sender token")]
    Unauthorized,

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for CastErr {
    fn into_response(self) -> axum::response::Response {
        let code = match &self {
            CastErr::RoomNotFound(_) => StatusCode::NOT_FOUND,
            CastErr::RoomOccupied(_) | CastErr::NotConnected(_) => StatusCode::CONFLICT,
            CastErr::Capacity => StatusCode::SERVICE_UNAVAILABLE,
            CastErr::Unauthorized => StatusCode::UNAUTHORIZED,
            CastErr::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (code, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
