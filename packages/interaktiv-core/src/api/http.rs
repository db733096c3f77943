//! HTTP route handlers.
//!
//! All handlers are thin - they validate input, delegate to the presentation
//! store and notify the audience through the notifier.

use std::net::SocketAddr;

use axum::{
    body::Bytes,
    extract::{connect_info::ConnectInfo, DefaultBodyLimit, Path, Request, State},
    http::{header, HeaderMap, HeaderValue, Response as HttpResponse, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tower_http::services::fs::ServeFileSystemResponseBody;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::set_header::SetResponseHeader;

use crate::api::response::{api_ok, api_success, api_warning};
use crate::api::sse::events_handler;
use crate::api::AppState;
use crate::error::{InteraktivError, InteraktivResult};
use crate::protocol_constants::{MAX_JSON_BODY_SIZE, PING_PAYLOAD, STATIC_CACHE_CONTROL};
use crate::services::LikertValue;

// ─────────────────────────────────────────────────────────────────────────────
// Request Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct NicknameRequest {
    user: String,
    uuid: String,
}

#[derive(Deserialize)]
struct LikertRequest {
    likert: String,
    user: String,
    value: String,
}

#[derive(Deserialize)]
struct AnswerRequest {
    answer: String,
    qid: String,
    user: String,
}

/// Parses a JSON body, mapping every failure to the generic validation error.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> InteraktivResult<T> {
    serde_json::from_slice(body).map_err(|e| {
        log::warn!("[HTTP] Validation error: {}", e);
        InteraktivError::validation()
    })
}

/// Participant ids are uuid-like: hex digits and dashes only.
fn is_valid_uuid(uuid: &str) -> bool {
    !uuid.is_empty() && uuid.chars().all(|c| c.is_ascii_hexdigit() || c == '-')
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

/// Creates the Axum router with all routes.
///
/// Unmatched paths fall through to the static presentation files.
pub fn create_router(state: AppState) -> Router {
    let (static_dir, index_file) = {
        let config = state.config.read();
        (config.static_dir.clone(), config.index_file())
    };

    let assets = SetResponseHeader::overriding(
        ServeDir::new(&static_dir),
        header::CACHE_CONTROL,
        |res: &HttpResponse<ServeFileSystemResponseBody>| {
            res.status()
                .is_success()
                .then(|| HeaderValue::from_static(STATIC_CACHE_CONTROL))
        },
    );

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/events", get(events_handler))
        .route("/ping", get(handle_ping))
        .route("/nickname", post(post_nickname))
        .route("/nickname/{uuid}", get(get_nickname))
        .route("/nicknames", get(get_nicknames))
        .route("/likert", post(post_likert))
        .route("/likerts", get(get_likerts))
        .route("/likert/{id}", get(get_likert))
        .route("/answer", post(post_answer))
        .route("/answer/{qid}", get(get_answer))
        .route("/answers", get(get_answers))
        .route("/counts", get(get_listener_count))
        .route("/stats", get(get_stats))
        .route("/ipsocket", get(get_ipsocket))
        .route_service("/", ServeFile::new(static_dir.join(index_file)))
        .fallback_service(assets)
        .layer(DefaultBodyLimit::max(MAX_JSON_BODY_SIZE))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

/// Logs method, URI and client address of every request.
async fn log_request(request: Request, next: Next) -> Response {
    let client = client_ip(
        request.headers(),
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr),
    );
    log::info!(
        "[HTTP] Request [{}] {} from {}",
        request.method(),
        request.uri(),
        client
    );
    next.run(request).await
}

/// Client address as seen behind a reverse proxy: `X-Forwarded-For` first,
/// then the socket peer.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Health
// ─────────────────────────────────────────────────────────────────────────────

/// Liveness probe: "Is the process running?"
async fn health_check() -> impl IntoResponse {
    api_success(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Readiness probe: "Can the service handle requests?"
///
/// Returns 200 OK only when the HTTP listener is bound and the broadcast
/// service answers.
async fn readiness_check(State(state): State<AppState>) -> Response {
    let port = state.network.get_port();
    let port_ready = state.is_listening() && port > 0;

    let broadcast = state.broadcast.listener_count().await;
    let broadcast_ready = broadcast.is_ok();
    let broadcast_check = match &broadcast {
        Ok(count) => json!({ "ready": true, "listeners": count }),
        Err(e) => json!({ "ready": false, "error": e.to_string() }),
    };

    let ready = port_ready && broadcast_ready;
    let body = json!({
        "status": if ready { "ready" } else { "not_ready" },
        "ready": ready,
        "checks": {
            "port": { "ready": port_ready, "value": port },
            "broadcast": broadcast_check
        }
    });

    if ready {
        api_success(body).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
    }
}

async fn handle_ping(State(state): State<AppState>) -> InteraktivResult<String> {
    state.notifier.ping().await?;
    Ok(format!("{}\n", PING_PAYLOAD))
}

// ─────────────────────────────────────────────────────────────────────────────
// Nicknames
// ─────────────────────────────────────────────────────────────────────────────

/// Anonymous login: binds a nickname to a participant uuid.
async fn post_nickname(State(state): State<AppState>, body: Bytes) -> InteraktivResult<Response> {
    let request: NicknameRequest = parse_body(&body)?;
    if !is_valid_uuid(&request.uuid) {
        log::warn!("[HTTP] Validation error: malformed uuid {:?}", request.uuid);
        return Err(InteraktivError::validation());
    }

    let _order = state.publish_order.nicknames.lock().await;
    let nicknames = state
        .store
        .register_nickname(&request.uuid, &request.user);
    log::info!("[HTTP] Nicknames: {:?}", nicknames);
    state.notifier.nicknames(&nicknames).await?;

    Ok(api_ok("Data received").into_response())
}

async fn get_nickname(State(state): State<AppState>, Path(uuid): Path<String>) -> Response {
    match state.store.nickname(&uuid) {
        Some(nickname) => api_success(json!({ "nickname": nickname })).into_response(),
        None => api_warning(format!("No name found for the given uuid: {}", uuid)).into_response(),
    }
}

async fn get_nicknames(State(state): State<AppState>) -> impl IntoResponse {
    api_success(json!({ "nicknames": state.store.nicknames() }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Likert Scales
// ─────────────────────────────────────────────────────────────────────────────

async fn post_likert(State(state): State<AppState>, body: Bytes) -> InteraktivResult<Response> {
    let request: LikertRequest = parse_body(&body)?;
    let value: LikertValue = request.value.parse()?;

    let _order = state.publish_order.likerts.lock().await;
    let percentage = state
        .store
        .record_likert(&request.likert, &request.user, value)?;
    state.notifier.likert(&request.likert, percentage).await?;

    Ok(api_ok(format!("Data received for key {}", request.likert)).into_response())
}

async fn get_likerts(State(state): State<AppState>) -> impl IntoResponse {
    api_success(json!({ "likert": state.store.likerts() }))
}

async fn get_likert(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.store.likert_percentage(&id) {
        Some(percentage) => api_success(json!({ "likert": percentage })).into_response(),
        None => api_warning(format!(
            "No likert scores found for the given likert id: {}",
            id
        ))
        .into_response(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Free-text Answers
// ─────────────────────────────────────────────────────────────────────────────

async fn post_answer(State(state): State<AppState>, body: Bytes) -> InteraktivResult<Response> {
    let request: AnswerRequest = parse_body(&body)?;

    let _order = state.publish_order.answers.lock().await;
    let answers = state
        .store
        .record_answer(&request.qid, &request.user, &request.answer)?;
    state.notifier.answers(&request.qid, &answers).await?;

    Ok(api_ok("Data received").into_response())
}

async fn get_answer(State(state): State<AppState>, Path(qid): Path<String>) -> Response {
    match state.store.answers_for(&qid) {
        Some(answers) => api_success(json!({ "answers": answers })).into_response(),
        None => {
            api_warning(format!("No answers found for the given question: {}", qid))
                .into_response()
        }
    }
}

async fn get_answers(State(state): State<AppState>) -> impl IntoResponse {
    api_success(json!({ "answers": state.store.answers() }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Diagnostics
// ─────────────────────────────────────────────────────────────────────────────

async fn get_listener_count(State(state): State<AppState>) -> InteraktivResult<Response> {
    let count = state.broadcast.listener_count().await?;
    Ok(api_success(json!({ "listener_count": count })).into_response())
}

/// Delivery statistics. Counters are only available when the announcer runs
/// in this process; otherwise just the listener count is reported.
async fn get_stats(State(state): State<AppState>) -> InteraktivResult<Response> {
    let mode = state.config.read().broadcast.mode;
    let listeners = state.broadcast.listener_count().await?;
    Ok(api_success(json!({
        "mode": mode,
        "listenerCount": listeners,
        "announcer": state.broadcast.stats(),
        "subscriberDrops": state.broadcast.subscriber_drops()
    }))
    .into_response())
}

/// LAN address and port the audience should connect to.
async fn get_ipsocket(State(state): State<AppState>) -> impl IntoResponse {
    api_success(json!({
        "ip": state.network.refresh_local_ip(),
        "socketNr": state.network.get_port()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::Method;
    use futures::StreamExt;
    use parking_lot::RwLock;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::broadcast::{BroadcastService, LocalBroadcastService, RemoteBroadcastService};
    use crate::context::NetworkContext;
    use crate::state::Config;

    struct Harness {
        router: Router,
        state: AppState,
        service: Arc<LocalBroadcastService>,
        _static_dir: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let static_dir = tempfile::tempdir().unwrap();
        std::fs::write(static_dir.path().join("index.html"), "<h1>index</h1>").unwrap();
        std::fs::write(static_dir.path().join("vortrag.html"), "<h1>vortrag</h1>").unwrap();
        std::fs::write(static_dir.path().join("app.js"), "console.log(1)").unwrap();

        let config = Config {
            static_dir: static_dir.path().to_path_buf(),
            presentation_name: Some("vortrag".into()),
            ..Config::default()
        };

        let service = Arc::new(LocalBroadcastService::default());
        let state = AppState::builder()
            .broadcast(service.clone())
            .network(NetworkContext::for_test())
            .config(Arc::new(RwLock::new(config)))
            .build()
            .unwrap();

        Harness {
            router: create_router(state.clone()),
            state,
            service,
            _static_dir: static_dir,
        }
    }

    async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap()
    }

    async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
        let response = send(router, Method::GET, uri, None).await;
        let status = response.status();
        (status, body_json(response).await)
    }

    async fn post_json(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = send(router, Method::POST, uri, Some(body)).await;
        let status = response.status();
        (status, body_json(response).await)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn uuid_validation() {
        assert!(is_valid_uuid("123"));
        assert!(is_valid_uuid("6f1c-AB09-ff"));
        assert!(!is_valid_uuid(""));
        assert!(!is_valid_uuid("xyz"));
        assert!(!is_valid_uuid("12 34"));
    }

    #[test]
    fn client_ip_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        let peer: SocketAddr = "10.0.0.2:4000".parse().unwrap();
        assert_eq!(client_ip(&headers, Some(peer)), "10.0.0.2");
        assert_eq!(client_ip(&headers, None), "unknown");

        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4, 10.0.0.1"));
        assert_eq!(client_ip(&headers, Some(peer)), "1.2.3.4");
    }

    #[tokio::test]
    async fn health_reports_version() {
        let h = harness();
        let (status, body) = get_json(&h.router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn ready_requires_bound_listener() {
        let h = harness();
        let (status, body) = get_json(&h.router, "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["checks"]["broadcast"]["ready"], true);

        h.state.network.set_port(5050);
        h.state.mark_listening();
        let (status, body) = get_json(&h.router, "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ready"], true);
    }

    #[tokio::test]
    async fn nickname_registration_broadcasts_full_list() {
        let h = harness();
        let mut sub = h.service.subscribe().await.unwrap();

        let (status, body) = post_json(
            &h.router,
            "/nickname",
            json!({"user": "Hund", "uuid": "123"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "success", "message": "Data received"}));

        post_json(
            &h.router,
            "/nickname",
            json!({"user": "Katze", "uuid": "abc-def"}),
        )
        .await;

        let first = sub.next_event().await.unwrap();
        assert_eq!(first.name(), Some("NICKNAME"));
        assert_eq!(first.payload(), &json!({"nicknames": ["Hund"]}));
        let second = sub.next_event().await.unwrap();
        assert_eq!(second.payload(), &json!({"nicknames": ["Hund", "Katze"]}));

        let (_, body) = get_json(&h.router, "/nickname/123").await;
        assert_eq!(body, json!({"nickname": "Hund"}));
        let (status, body) = get_json(&h.router, "/nickname/999").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"warning": "No name found for the given uuid: 999"})
        );
        let (_, body) = get_json(&h.router, "/nicknames").await;
        assert_eq!(body, json!({"nicknames": ["Hund", "Katze"]}));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_registrations_publish_growing_lists() {
        let h = harness();
        let mut sub = h.service.subscribe().await.unwrap();

        let requests: Vec<_> = (0..20)
            .map(|n| {
                let router = h.router.clone();
                tokio::spawn(async move {
                    post_json(
                        &router,
                        "/nickname",
                        json!({"user": format!("user{}", n), "uuid": format!("{:x}", n + 1)}),
                    )
                    .await
                })
            })
            .collect();
        for request in requests {
            assert_eq!(request.await.unwrap().0, StatusCode::OK);
        }

        for expected in 1..=20 {
            let event = sub.next_event().await.unwrap();
            let nicknames = event.payload()["nicknames"].as_array().unwrap().len();
            assert_eq!(nicknames, expected);
        }
    }

    #[tokio::test]
    async fn invalid_nickname_payloads_are_rejected() {
        let h = harness();
        for body in [
            json!({"user": "Hund"}),
            json!({"user": "Hund", "uuid": "not-a-uuid!"}),
            json!({"user": 5, "uuid": "123"}),
        ] {
            let (status, body) = post_json(&h.router, "/nickname", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["status"], "error");
            assert_eq!(body["message"], "Validation error");
        }
        assert!(h.state.store.nicknames().is_empty());
    }

    #[tokio::test]
    async fn likert_vote_flow() {
        let h = harness();
        post_json(&h.router, "/nickname", json!({"user": "Hund", "uuid": "1"})).await;
        post_json(&h.router, "/nickname", json!({"user": "Katze", "uuid": "2"})).await;
        let mut sub = h.service.subscribe().await.unwrap();

        let (status, body) = post_json(
            &h.router,
            "/likert",
            json!({"likert": "scale1", "user": "Hund", "value": "0"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Data received for key scale1");

        post_json(
            &h.router,
            "/likert",
            json!({"likert": "scale1", "user": "Katze", "value": "3"}),
        )
        .await;

        let first = sub.next_event().await.unwrap();
        assert_eq!(first.name(), Some("A-scale1"));
        assert_eq!(first.payload(), &json!({"percentage": 100}));
        let second = sub.next_event().await.unwrap();
        assert_eq!(second.payload(), &json!({"percentage": 62}));

        let (_, body) = get_json(&h.router, "/likert/scale1").await;
        assert_eq!(body, json!({"likert": 62}));
        let (_, body) = get_json(&h.router, "/likerts").await;
        assert_eq!(body, json!({"likert": {"scale1": {"Hund": "0", "Katze": "3"}}}));
        let (_, body) = get_json(&h.router, "/likert/nope").await;
        assert_eq!(
            body,
            json!({"warning": "No likert scores found for the given likert id: nope"})
        );
    }

    #[tokio::test]
    async fn likert_rejects_unknown_user_and_bad_value() {
        let h = harness();
        let (status, body) = post_json(
            &h.router,
            "/likert",
            json!({"likert": "s", "user": "Ghost", "value": "1"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Unknown user can not vote");

        post_json(&h.router, "/nickname", json!({"user": "Hund", "uuid": "1"})).await;
        let (status, body) = post_json(
            &h.router,
            "/likert",
            json!({"likert": "s", "user": "Hund", "value": "5"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Validation error");
    }

    #[tokio::test]
    async fn answer_flow() {
        let h = harness();
        let (status, body) = post_json(
            &h.router,
            "/answer",
            json!({"answer": "yes", "qid": "q1", "user": "Ghost"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Unknown uuid");

        post_json(&h.router, "/nickname", json!({"user": "Hund", "uuid": "1"})).await;
        let mut sub = h.service.subscribe().await.unwrap();
        let (status, _) = post_json(
            &h.router,
            "/answer",
            json!({"answer": "I mean yes", "qid": "inputField1", "user": "Hund"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let event = sub.next_event().await.unwrap();
        assert_eq!(event.name(), Some("A-inputField1"));
        assert_eq!(
            event.payload(),
            &json!({"qid": "inputField1", "answers": ["I mean yes"]})
        );

        let (_, body) = get_json(&h.router, "/answer/inputField1").await;
        assert_eq!(body, json!({"answers": ["I mean yes"]}));
        let (_, body) = get_json(&h.router, "/answers").await;
        assert_eq!(body, json!({"answers": {"inputField1": {"Hund": "I mean yes"}}}));
        let (_, body) = get_json(&h.router, "/answer/other").await;
        assert_eq!(
            body,
            json!({"warning": "No answers found for the given question: other"})
        );
    }

    #[tokio::test]
    async fn ping_publishes_and_answers_text() {
        let h = harness();
        let mut sub = h.service.subscribe().await.unwrap();

        let response = send(&h.router, Method::GET, "/ping", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "Pinged\n");

        let event = sub.next_event().await.unwrap();
        assert_eq!(event.name(), Some("PING"));
        assert_eq!(event.payload(), &json!("Pinged"));
    }

    #[tokio::test]
    async fn counts_and_stats() {
        let h = harness();
        let _a = h.service.subscribe().await.unwrap();
        let _b = h.service.subscribe().await.unwrap();
        send(&h.router, Method::GET, "/ping", None).await;

        let (_, body) = get_json(&h.router, "/counts").await;
        assert_eq!(body, json!({"listener_count": 2}));

        let (_, body) = get_json(&h.router, "/stats").await;
        assert_eq!(body["mode"], "local");
        assert_eq!(body["listenerCount"], 2);
        assert_eq!(body["announcer"]["published"], 1);
        assert_eq!(body["announcer"]["delivered"], 2);
        assert_eq!(body["announcer"]["dropped"], 0);
        assert!(body["subscriberDrops"].is_null());
    }

    #[tokio::test]
    async fn ipsocket_reports_address() {
        let h = harness();
        h.state.network.set_port(5050);
        let (_, body) = get_json(&h.router, "/ipsocket").await;
        assert_eq!(body, json!({"ip": "127.0.0.1", "socketNr": 5050}));
    }

    #[tokio::test]
    async fn events_endpoint_streams_sse() {
        let h = harness();
        let response = send(&h.router, Method::GET, "/events", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
        assert_eq!(h.service.listener_count().await.unwrap(), 1);

        send(&h.router, Method::GET, "/ping", None).await;
        let mut frames = response.into_body().into_data_stream();
        let frame = frames.next().await.unwrap().unwrap();
        assert_eq!(&frame[..], b"event: PING\ndata: \"Pinged\"\n\n");

        drop(frames);
        assert_eq!(h.service.listener_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn broadcast_outage_is_service_unavailable() {
        let static_dir = tempfile::tempdir().unwrap();
        let unreachable = RemoteBroadcastService::new(
            crate::broadcast::BroadcastEndpoint::loopback(1, "t"),
        )
        .with_readiness(crate::broadcast::Readiness::new())
        .with_ready_timeout(std::time::Duration::from_millis(10));
        let state = AppState::builder()
            .broadcast(Arc::new(unreachable))
            .network(NetworkContext::for_test())
            .config(Arc::new(RwLock::new(Config {
                static_dir: static_dir.path().to_path_buf(),
                ..Config::default()
            })))
            .build()
            .unwrap();
        let router = create_router(state);

        let response = send(&router, Method::GET, "/ping", None).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["error"], "broadcast_unavailable");

        let (status, _) = get_json(&router, "/events").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn serves_presentation_and_assets() {
        let h = harness();

        let response = send(&h.router, Method::GET, "/", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::CACHE_CONTROL).is_none());
        assert_eq!(body_text(response).await, "<h1>vortrag</h1>");

        let response = send(&h.router, Method::GET, "/app.js", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            STATIC_CACHE_CONTROL
        );

        let response = send(&h.router, Method::GET, "/missing.css", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().get(header::CACHE_CONTROL).is_none());
    }
}
