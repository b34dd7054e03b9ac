//! routes/rooms.rs — request/response side of the casting protocol.
//!
//! Receiver calls: create, snapshot, stop, teardown. Sender calls: join,
//! cast, leave. Sender calls after join carry the bearer token issued by
//! join; receiver calls are gated by knowledge of the room code alone.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    broker::SessionBroker,
    config::Config,
    error::{CastErr, CastResult},
    state::{normalize_code, RoomSnapshot},
    utils::token,
};

pub fn router() -> Router {
    Router::new()
        .route("/rooms", post(create_room))
        .route("/rooms/:code", get(room_snapshot).delete(teardown_room))
        .route("/rooms/:code/join", post(join_room))
        .route("/rooms/:code/cast", post(cast))
        .route("/rooms/:code/leave", post(leave_room))
        .route("/rooms/:code/stop", post(stop_cast))
}

type MaybeBearer = Option<TypedHeader<Authorization<Bearer>>>;

fn bound_sender(bearer: MaybeBearer, cfg: &Config) -> CastResult<String> {
    bearer
        .and_then(|TypedHeader(auth)| token::sender_id(auth.token(), &cfg.token_secret))
        .ok_or(CastErr::Unauthorized)
}

/* ---------------- receiver side ---------------- */

#[derive(Serialize)]
struct RoomCreated {
    room_code: String,
}

async fn create_room(
    Extension(broker): Extension<SessionBroker>,
) -> CastResult<impl IntoResponse> {
    let room_code = broker.create_room().await?;
    Ok((StatusCode::CREATED, Json(RoomCreated { room_code })))
}

async fn room_snapshot(
    Path(code): Path<String>,
    Extension(broker): Extension<SessionBroker>,
) -> CastResult<Json<RoomSnapshot>> {
    Ok(Json(broker.snapshot(&code).await?))
}

async fn stop_cast(
    Path(code): Path<String>,
    Extension(broker): Extension<SessionBroker>,
) -> CastResult<StatusCode> {
    broker.stop_cast(&code).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn teardown_room(
    Path(code): Path<String>,
    Extension(broker): Extension<SessionBroker>,
) -> CastResult<StatusCode> {
    broker.teardown_room(&code).await?;
    Ok(StatusCode::NO_CONTENT)
}

/* ---------------- sender side ---------------- */

#[derive(Serialize)]
struct JoinReply {
    room_code: String,
    sender_id: String,
    token: String,
    connected_at: DateTime<Utc>,
}

async fn join_room(
    Path(code): Path<String>,
    bearer: MaybeBearer,
    Extension(broker): Extension<SessionBroker>,
    Extension(cfg): Extension<Arc<Config>>,
) -> CastResult<Json<JoinReply>> {
    // A valid token from an earlier join keeps the same identity, which
    // makes retried joins idempotent; otherwise mint a fresh sender.
    let sender_id = bearer
        .and_then(|TypedHeader(auth)| token::sender_id(auth.token(), &cfg.token_secret))
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let session = broker.join_room(&code, &sender_id).await?;
    let token = token::issue(&session.sender_id, &cfg.token_secret);
    Ok(Json(JoinReply {
        room_code: normalize_code(&code),
        sender_id: session.sender_id,
        token,
        connected_at: session.connected_at,
    }))
}

#[derive(Deserialize)]
struct CastBody {
    media_uri: String,
    title: String,
}

async fn cast(
    Path(code): Path<String>,
    bearer: MaybeBearer,
    Extension(broker): Extension<SessionBroker>,
    Extension(cfg): Extension<Arc<Config>>,
    Json(body): Json<CastBody>,
) -> CastResult<StatusCode> {
    let sender_id = bound_sender(bearer, &cfg)?;
    broker
        .cast(&code, &sender_id, body.media_uri, body.title)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn leave_room(
    Path(code): Path<String>,
    bearer: MaybeBearer,
    Extension(broker): Extension<SessionBroker>,
    Extension(cfg): Extension<Arc<Config>>,
) -> CastResult<StatusCode> {
    let sender_id = bound_sender(bearer, &cfg)?;
    broker.leave_room(&code, &sender_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    use crate::{broker::SessionBroker, config::Config};

    fn test_app() -> Router {
        let cfg = Arc::new(Config {
            bind_addr: ([127, 0, 0, 1], 0).into(),
            token_secret: "test-secret".into(),
            max_rooms: 64,
            room_ttl: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(60),
        });
        crate::app(SessionBroker::new(cfg.max_rooms), cfg)
    }

    async fn body_json(body: Body) -> Value {
        let bytes = to_bytes(body, usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post(uri: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn create_room(app: &Router) -> String {
        let resp = app.clone().oneshot(post("/api/rooms")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        body_json(resp.into_body()).await["room_code"]
            .as_str()
            .unwrap()
            .to_owned()
    }

    async fn join(app: &Router, code: &str) -> (String, String) {
        let resp = app
            .clone()
            .oneshot(post(&format!("/api/rooms/{code}/join")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let reply = body_json(resp.into_body()).await;
        (
            reply["token"].as_str().unwrap().to_owned(),
            reply["sender_id"].as_str().unwrap().to_owned(),
        )
    }

    #[tokio::test]
    async fn cast_session_over_http() {
        let app = test_app();
        let code = create_room(&app).await;
        let (token, _) = join(&app, &code.to_lowercase()).await;

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/rooms/{code}/cast"))
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({"media_uri": "https://x/video.mp4", "title": "Demo"}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/rooms/{code}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let snap = body_json(resp.into_body()).await;
        assert_eq!(snap["cast"]["media_uri"], "https://x/video.mp4");
        assert_eq!(snap["cast"]["title"], "Demo");

        let resp = app
            .clone()
            .oneshot(post(&format!("/api/rooms/{code}/stop")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/rooms/{code}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let snap = body_json(resp.into_body()).await;
        assert!(snap["cast"].is_null());
    }

    #[tokio::test]
    async fn join_with_token_keeps_the_sender_identity() {
        let app = test_app();
        let code = create_room(&app).await;
        let (token, sender_id) = join(&app, &code).await;

        // A second anonymous join is a different sender: occupied.
        let resp = app
            .clone()
            .oneshot(post(&format!("/api/rooms/{code}/join")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        // Re-join with the issued token is idempotent.
        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/rooms/{code}/join"))
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let reply = body_json(resp.into_body()).await;
        assert_eq!(reply["sender_id"], sender_id.as_str());
    }

    #[tokio::test]
    async fn cast_without_a_token_is_unauthorized() {
        let app = test_app();
        let code = create_room(&app).await;
        join(&app, &code).await;

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/rooms/{code}/cast"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({"media_uri": "https://x/v.mp4", "title": "V"}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_rooms_are_404_and_teardown_is_idempotent() {
        let app = test_app();

        let resp = app
            .clone()
            .oneshot(post("/api/rooms/ZZZ9/join"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let err = body_json(resp.into_body()).await;
        assert!(err["error"].as_str().unwrap().contains("ZZZ9"));

        let code = create_room(&app).await;
        for _ in 0..2 {
            let resp = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method("DELETE")
                        .uri(format!("/api/rooms/{code}"))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        }

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/rooms/{code}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
