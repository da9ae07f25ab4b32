//! HTTP binding for the card service.
//!
//! Routes map one to one onto [`CardService`] operations. The caller's
//! identity comes from a header set by the upstream identity provider; a
//! request without it never reaches the service.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Path, Query, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderName, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use policy::Principal;
use serde_json::json;
use service::CardService;
use service::paging::{self, PageParams, PagingLimits, ValidationError};
use storage::{Card, CardDraft, CardStore};
use tower_http::trace::TraceLayer;
use tracing::info_span;
use uuid::Uuid;

/// Shared per-process state handed to every handler.
pub struct AppState<S> {
    cards: Arc<CardService<S>>,
    limits: PagingLimits,
    principal_header: HeaderName,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            cards: Arc::clone(&self.cards),
            limits: self.limits,
            principal_header: self.principal_header.clone(),
        }
    }
}

impl<S: CardStore + 'static> AppState<S> {
    pub fn new(cards: CardService<S>, limits: PagingLimits, principal_header: HeaderName) -> Self {
        Self {
            cards: Arc::new(cards),
            limits,
            principal_header,
        }
    }
}

pub fn router<S: CardStore + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/cards", get(list_cards::<S>).post(create_card::<S>))
        .route(
            "/cards/{id}",
            get(get_card::<S>)
                .put(update_card::<S>)
                .delete(delete_card::<S>),
        )
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            info_span!(
                "request",
                request_id = %Uuid::new_v4(),
                method = %request.method(),
                uri = %request.uri(),
            )
        }))
        .with_state(state)
}

/// The authenticated caller of a request.
pub struct Caller(pub Principal);

impl<S: CardStore + 'static> FromRequestParts<AppState<S>> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(&state.principal_header)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthenticated)?;
        Principal::new(value)
            .map(Caller)
            .map_err(|_| ApiError::Unauthenticated)
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn get_card<S: CardStore + 'static>(
    State(state): State<AppState<S>>,
    Caller(principal): Caller,
    Path(id): Path<i64>,
) -> Result<Json<Card>, ApiError> {
    let card = state.cards.get(id, &principal).await?;
    Ok(Json(card))
}

async fn list_cards<S: CardStore + 'static>(
    State(state): State<AppState<S>>,
    Caller(principal): Caller,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<Card>>, ApiError> {
    let params = PageParams::from_pairs(pairs);
    let cards = if params.is_empty() {
        state.cards.list(&principal).await?
    } else {
        let page = paging::negotiate(&params, &state.limits)?;
        state.cards.list_page(&principal, page).await?
    };
    Ok(Json(cards))
}

async fn create_card<S: CardStore + 'static>(
    State(state): State<AppState<S>>,
    Caller(principal): Caller,
    Json(draft): Json<CardDraft>,
) -> Result<Response, ApiError> {
    let id = state.cards.create(&principal, draft).await?;
    let location = format!("/cards/{id}");
    Ok((StatusCode::CREATED, [(header::LOCATION, location)]).into_response())
}

async fn update_card<S: CardStore + 'static>(
    State(state): State<AppState<S>>,
    Caller(principal): Caller,
    Path(id): Path<i64>,
    Json(draft): Json<CardDraft>,
) -> Result<StatusCode, ApiError> {
    state.cards.update(id, &principal, draft).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_card<S: CardStore + 'static>(
    State(state): State<AppState<S>>,
    Caller(principal): Caller,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.cards.delete(id, &principal).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Failures as seen by HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("missing or invalid credentials")]
    Unauthenticated,

    #[error(transparent)]
    Service(#[from] service::Error),
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Service(e.into())
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Service(e) => match e {
                service::Error::NotFound { .. } => StatusCode::NOT_FOUND,
                service::Error::Forbidden { .. } => StatusCode::FORBIDDEN,
                service::Error::Validation(_) => StatusCode::BAD_REQUEST,
                _ if e.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::SERVICE_UNAVAILABLE {
            "service unavailable".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use policy::Policy;
    use serde_json::Value;
    use storage::{PageRequest, SqliteCardStore};
    use tower::ServiceExt;

    const USER: &str = "x-authenticated-user";

    struct Fixture {
        app: Router,
        sarah: Vec<i64>,
        kumar: i64,
    }

    fn fixture_with(policy: Policy) -> Fixture {
        let store = SqliteCardStore::in_memory().unwrap();
        let sarah = ["Cash Card 1", "Cash Card 2", "Cash Card 3"]
            .iter()
            .map(|name| store.create(&Card::unsaved(*name, "sarah1")).unwrap())
            .collect();
        let kumar = store.create(&Card::unsaved("Kumar's Card", "kumar2")).unwrap();

        let state = AppState::new(
            CardService::new(store, policy),
            PagingLimits::default(),
            HeaderName::from_static(USER),
        );
        Fixture {
            app: router(state),
            sarah,
            kumar,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(Policy::masked())
    }

    fn request(method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> Request {
        let mut builder = axum::http::Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(USER, user);
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request) -> (StatusCode, Option<String>, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, location, body)
    }

    #[tokio::test]
    async fn returns_owned_card() {
        let f = fixture();
        let uri = format!("/cards/{}", f.sarah[0]);
        let (status, _, body) = send(&f.app, request("GET", &uri, Some("sarah1"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], f.sarah[0]);
        assert_eq!(body["name"], "Cash Card 1");
        assert_eq!(body["owner"], "sarah1");
    }

    #[tokio::test]
    async fn unknown_and_foreign_cards_are_404() {
        let f = fixture();
        let (missing, _, missing_body) =
            send(&f.app, request("GET", "/cards/900", Some("sarah1"), None)).await;
        let uri = format!("/cards/{}", f.kumar);
        let (foreign, _, _) = send(&f.app, request("GET", &uri, Some("sarah1"), None)).await;
        assert_eq!(missing, StatusCode::NOT_FOUND);
        assert_eq!(foreign, StatusCode::NOT_FOUND);
        assert!(missing_body["error"].is_string());

        let (owner, _, _) = send(&f.app, request("GET", &uri, Some("kumar2"), None)).await;
        assert_eq!(owner, StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_principal_is_401() {
        let f = fixture();
        let uri = format!("/cards/{}", f.sarah[0]);
        let (status, _, _) = send(&f.app, request("GET", &uri, None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _, _) = send(&f.app, request("GET", "/cards", Some("  "), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn health_needs_no_principal() {
        let f = fixture();
        let response = f
            .app
            .clone()
            .oneshot(request("GET", "/health", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn lists_all_owned_cards() {
        let f = fixture();
        let (status, _, body) = send(&f.app, request("GET", "/cards", Some("sarah1"), None)).await;
        assert_eq!(status, StatusCode::OK);
        let cards = body.as_array().unwrap();
        assert_eq!(cards.len(), 3);
        let ids: Vec<i64> = cards.iter().map(|c| c["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, f.sarah);
        assert!(cards.iter().all(|c| c["owner"] == "sarah1"));
    }

    #[tokio::test]
    async fn returns_sorted_page() {
        let f = fixture();
        let (status, _, body) = send(
            &f.app,
            request("GET", "/cards?page=0&size=1&sort=name,desc", Some("sarah1"), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let cards = body.as_array().unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0]["name"], "Cash Card 3");
    }

    #[tokio::test]
    async fn bad_paging_is_400() {
        let f = fixture();
        for uri in [
            "/cards?sort=balance,desc",
            "/cards?page=-1",
            "/cards?size=0",
            "/cards?size=lots",
        ] {
            let (status, _, body) = send(&f.app, request("GET", uri, Some("sarah1"), None)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert!(body["error"].is_string());
        }
    }

    #[tokio::test]
    async fn creates_card_for_caller() {
        let f = fixture();
        let payload = json!({ "id": 12345, "name": "Cash Card 4", "owner": "kumar2" });
        let (status, location, _) =
            send(&f.app, request("POST", "/cards", Some("sarah1"), Some(payload))).await;
        assert_eq!(status, StatusCode::CREATED);
        let location = location.unwrap();
        assert_ne!(location, "/cards/12345");

        let (status, _, body) = send(&f.app, request("GET", &location, Some("sarah1"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Cash Card 4");
        assert_eq!(body["owner"], "sarah1");

        let (status, _, _) = send(&f.app, request("GET", &location, Some("kumar2"), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn updates_owned_card() {
        let f = fixture();
        let uri = format!("/cards/{}", f.sarah[0]);
        let payload = json!({ "name": "Cash Card Update" });
        let (status, _, _) =
            send(&f.app, request("PUT", &uri, Some("sarah1"), Some(payload))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, _, body) = send(&f.app, request("GET", &uri, Some("sarah1"), None)).await;
        assert_eq!(body["id"], f.sarah[0]);
        assert_eq!(body["name"], "Cash Card Update");
    }

    #[tokio::test]
    async fn update_of_unknown_or_foreign_is_404() {
        let f = fixture();
        let payload = json!({ "name": "" });
        let (status, _, _) = send(
            &f.app,
            request("PUT", "/cards/999999", Some("sarah1"), Some(payload.clone())),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let uri = format!("/cards/{}", f.kumar);
        let (status, _, _) =
            send(&f.app, request("PUT", &uri, Some("sarah1"), Some(payload))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn deletes_owned_card() {
        let f = fixture();
        let uri = format!("/cards/{}", f.sarah[0]);
        let (status, _, _) = send(&f.app, request("DELETE", &uri, Some("sarah1"), None)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _, _) = send(&f.app, request("GET", &uri, Some("sarah1"), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_of_unknown_or_foreign_is_404() {
        let f = fixture();
        let (status, _, _) =
            send(&f.app, request("DELETE", "/cards/9090290", Some("sarah1"), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let uri = format!("/cards/{}", f.kumar);
        let (status, _, _) = send(&f.app, request("DELETE", &uri, Some("sarah1"), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _, _) = send(&f.app, request("GET", &uri, Some("kumar2"), None)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn forbidden_mode_rejects_principal_without_cards() {
        let f = fixture_with(
            Policy::parse("[ownership]\nunowned_principal = \"forbidden\"\n").unwrap(),
        );
        let uri = format!("/cards/{}", f.sarah[0]);
        let (status, _, _) =
            send(&f.app, request("GET", &uri, Some("hank-owns-no-cards"), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _, _) = send(&f.app, request("GET", &uri, Some("kumar2"), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    /// A store whose every call fails.
    struct DownStore;

    impl CardStore for DownStore {
        fn create(&self, _: &Card) -> storage::Result<i64> {
            Err(storage::Error::Poisoned)
        }
        fn get_by_id(&self, _: i64) -> storage::Result<Option<Card>> {
            Err(storage::Error::Poisoned)
        }
        fn get_by_id_and_owner(&self, _: i64, _: &str) -> storage::Result<Option<Card>> {
            Err(storage::Error::Poisoned)
        }
        fn list_by_owner(&self, _: &str) -> storage::Result<Vec<Card>> {
            Err(storage::Error::Poisoned)
        }
        fn list_by_owner_paged(&self, _: &str, _: &PageRequest) -> storage::Result<Vec<Card>> {
            Err(storage::Error::Poisoned)
        }
        fn exists_by_id_and_owner(&self, _: i64, _: &str) -> storage::Result<bool> {
            Err(storage::Error::Poisoned)
        }
        fn count_by_owner(&self, _: &str) -> storage::Result<u64> {
            Err(storage::Error::Poisoned)
        }
        fn delete_by_id(&self, _: i64) -> storage::Result<bool> {
            Err(storage::Error::Poisoned)
        }
        fn save(&self, _: &Card) -> storage::Result<()> {
            Err(storage::Error::Poisoned)
        }
        fn replace_owned(&self, _: &Card) -> storage::Result<bool> {
            Err(storage::Error::Poisoned)
        }
        fn delete_owned(&self, _: i64, _: &str) -> storage::Result<Option<Card>> {
            Err(storage::Error::Poisoned)
        }
    }

    #[tokio::test]
    async fn store_failure_is_503_not_404() {
        let app = router(AppState::new(
            CardService::new(DownStore, Policy::masked()),
            PagingLimits::default(),
            HeaderName::from_static(USER),
        ));
        let renamed = json!({ "name": "renamed" });
        for req in [
            request("GET", "/cards/1", Some("sarah1"), None),
            request("GET", "/cards", Some("sarah1"), None),
            request("GET", "/cards?page=0&size=5", Some("sarah1"), None),
            request("POST", "/cards", Some("sarah1"), Some(renamed.clone())),
            request("PUT", "/cards/1", Some("sarah1"), Some(renamed.clone())),
            request("DELETE", "/cards/1", Some("sarah1"), None),
        ] {
            let what = format!("{} {}", req.method(), req.uri());
            let (status, _, body) = send(&app, req).await;
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{what}");
            assert_eq!(body, json!({ "error": "service unavailable" }), "{what}");
        }
    }

    #[test]
    fn unavailable_errors_map_to_503() {
        for e in [
            service::Error::Store(storage::Error::Poisoned),
            service::Error::Timeout(std::time::Duration::from_millis(10)),
            service::Error::Aborted("task panicked".into()),
        ] {
            assert_eq!(ApiError::from(e).status(), StatusCode::SERVICE_UNAVAILABLE);
        }
    }

    #[tokio::test]
    async fn serves_over_tcp() {
        let f = fixture();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move { axum::serve(listener, f.app).await });

        let client = reqwest::Client::new();
        let response = client
            .post(format!("http://{addr}/cards"))
            .header(USER, "sarah1")
            .json(&json!({ "name": "Cash Card 2" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
        let location = response.headers()[reqwest::header::LOCATION]
            .to_str()
            .unwrap()
            .to_string();

        let card: Card = client
            .get(format!("http://{addr}{location}"))
            .header(USER, "sarah1")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(card.name, "Cash Card 2");
        assert_eq!(card.owner, "sarah1");

        server.abort();
    }
}
