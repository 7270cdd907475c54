use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ledger_core::{BlockSummary, ChainStore, Ledger, LedgerError, MineError, ValidationReport};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub(crate) type SharedLedger = Arc<Mutex<Ledger<dyn ChainStore>>>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) ledger: SharedLedger,
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Serialize)]
struct Head {
    height: u64,
    hash: String,
}

#[derive(Deserialize)]
struct ValidateParams {
    difficulty: Option<u32>,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    LockPoisoned,
    Mining(MineError),
    /// The block made it into the chain but not onto storage.
    NotPersisted { block: BlockSummary, reason: String },
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::LockPoisoned => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "ledger unavailable" }),
            ),
            ApiError::Mining(e @ (MineError::TimedOut { .. } | MineError::Cancelled { .. })) => {
                (StatusCode::SERVICE_UNAVAILABLE, json!({ "error": e.to_string() }))
            }
            ApiError::Mining(e @ MineError::Unreachable { .. }) => {
                (StatusCode::BAD_REQUEST, json!({ "error": e.to_string() }))
            }
            ApiError::Mining(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": e.to_string() }),
            ),
            ApiError::NotPersisted { block, reason } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": format!("block not persisted: {reason}"), "block": block }),
            ),
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg }))
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Run `f` on the blocking pool with the ledger locked. Mining holds the lock
/// for its whole search, so nothing touches the mutex from an async worker.
async fn with_ledger<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&mut Ledger<dyn ChainStore>) -> Result<T, ApiError> + Send + 'static,
{
    let ledger = Arc::clone(&state.ledger);
    tokio::task::spawn_blocking(move || {
        let mut guard = ledger.lock().map_err(|_| ApiError::LockPoisoned)?;
        f(&mut *guard)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?
}

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(Health { status: "ok" }) }))
        .route("/chain/head", get(head))
        .route("/chain/validate", get(validate))
        .route("/history", get(history))
        .route("/tx", post(submit_tx))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn head(State(state): State<AppState>) -> Result<Json<Head>, ApiError> {
    let head = with_ledger(&state, |ledger| {
        let tip = ledger.tip();
        Ok(Head {
            height: tip.index,
            hash: tip.hash.clone(),
        })
    })
    .await?;
    Ok(Json(head))
}

async fn history(State(state): State<AppState>) -> Result<Json<Vec<BlockSummary>>, ApiError> {
    let summaries = with_ledger(&state, |ledger| Ok(ledger.summaries())).await?;
    Ok(Json(summaries))
}

async fn validate(
    State(state): State<AppState>,
    Query(params): Query<ValidateParams>,
) -> Result<Json<ValidationReport>, ApiError> {
    let report = with_ledger(&state, move |ledger| {
        let difficulty = params.difficulty.unwrap_or(ledger.config().difficulty);
        Ok(ledger.validate(difficulty))
    })
    .await?;
    Ok(Json(report))
}

async fn submit_tx(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<BlockSummary>), ApiError> {
    let summary = with_ledger(&state, move |ledger| {
        match ledger.append_transaction(payload) {
            Ok(block) => Ok(block.summary()),
            Err(LedgerError::Persist { source, .. }) => Err(ApiError::NotPersisted {
                block: ledger.tip().summary(),
                reason: source.to_string(),
            }),
            Err(LedgerError::Mining(e)) => Err(ApiError::Mining(e)),
            Err(e) => Err(ApiError::Internal(e.to_string())),
        }
    })
    .await
    .inspect_err(|e| warn!("transaction rejected: {e:?}"))?;
    info!("block {} appended, hash {}", summary.index, summary.hash);
    Ok((StatusCode::CREATED, Json(summary)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use ledger_core::{Block, LedgerConfig, LoadOutcome, MemoryStore, StoreError};
    use std::time::Duration;
    use tower::ServiceExt;

    struct ReadOnlyDisk;

    impl ChainStore for ReadOnlyDisk {
        fn load(&self) -> Result<LoadOutcome, StoreError> {
            Ok(LoadOutcome::NotFound)
        }

        fn save(&self, _blocks: &[Block]) -> Result<(), StoreError> {
            Err(StoreError::Backend("read-only file system".into()))
        }
    }

    fn app_with(store: Arc<dyn ChainStore>, config: LedgerConfig) -> Router {
        let ledger = Ledger::load_or_init(store, config).unwrap();
        router(AppState {
            ledger: Arc::new(Mutex::new(ledger)),
        })
    }

    fn app(difficulty: u32) -> Router {
        app_with(
            Arc::new(MemoryStore::new()),
            LedgerConfig {
                difficulty,
                ..LedgerConfig::default()
            },
        )
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_tx(payload: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/tx")
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (status, body) = send(&app(1), get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn head_starts_at_genesis() {
        let (status, body) = send(&app(1), get_req("/chain/head")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["height"], 0);
    }

    #[tokio::test]
    async fn submitted_transaction_shows_up_in_history() {
        let app = app(2);
        let payload = json!({ "total": 100000, "items": ["Laptop"] });
        let (status, block) = send(&app, post_tx(payload.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(block["index"], 1);
        assert!(block["hash"].as_str().unwrap().starts_with("00"));

        let (_, history) = send(&app, get_req("/history")).await;
        let history = history.as_array().unwrap().clone();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0]["data"], payload);
        assert!(history[0].get("nonce").is_none());
        assert!(history[0].get("previous_hash").is_none());

        let (_, head) = send(&app, get_req("/chain/head")).await;
        assert_eq!(head["height"], 1);
        assert_eq!(head["hash"], block["hash"]);
    }

    #[tokio::test]
    async fn validate_uses_configured_difficulty_by_default() {
        let app = app(1);
        send(&app, post_tx(json!({ "total": 5, "items": ["Tablet"] }))).await;

        let (status, report) = send(&app, get_req("/chain/validate")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["status"], "valid");
        assert_eq!(report["mined"], true);

        let (_, strict) = send(&app, get_req("/chain/validate?difficulty=64")).await;
        assert_eq!(strict["status"], "valid");
        assert_eq!(strict["mined"], false);
    }

    #[tokio::test]
    async fn mining_timeout_is_service_unavailable() {
        let app = app_with(
            Arc::new(MemoryStore::new()),
            LedgerConfig {
                difficulty: 64,
                mining_timeout: Some(Duration::from_millis(20)),
                parallel: false,
            },
        );
        let (status, body) = send(&app, post_tx(json!({ "total": 1 }))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().unwrap().contains("timed out"));

        let (_, history) = send(&app, get_req("/history")).await;
        assert_eq!(history, json!([]));
    }

    #[tokio::test]
    async fn persistence_failure_reports_the_appended_block() {
        let app = app_with(
            Arc::new(ReadOnlyDisk),
            LedgerConfig {
                difficulty: 1,
                ..LedgerConfig::default()
            },
        );
        let payload = json!({ "total": 7, "items": ["Headphones"] });
        let (status, body) = send(&app, post_tx(payload)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["block"]["index"], 1);

        // in-memory chain kept the block
        let (_, history) = send(&app, get_req("/history")).await;
        assert_eq!(history.as_array().unwrap().len(), 1);
    }
}
