use crate::{
    app::{AppContext, AppError},
    question::Metadata,
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::signal;

const DEFAULT_NUM_RESULTS: i64 = 5;

#[derive(Clone)]
struct SharedState {
    ctx: Arc<AppContext>,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                log::error!("failed to install signal handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::warn!("shutting down");
}

fn router(ctx: Arc<AppContext>) -> Router {
    let shared_state = Arc::new(SharedState { ctx });

    Router::new()
        .route("/", get(index))
        .route("/search", post(search))
        .route("/get_answer/:answer_id", get(get_answer))
        .route("/scrape_answer/:question_id", get(scrape_answer))
        .route("/generate_ai_answer", post(generate_ai_answer))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(shared_state)
}

async fn start_app(ctx: Arc<AppContext>, bind: &str) -> anyhow::Result<()> {
    let app = router(ctx);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    log::info!("listening on {bind}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub fn start_daemon(ctx: Arc<AppContext>, bind: &str) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async { start_app(ctx, bind).await })
}

#[derive(Debug)]
struct HttpError(AppError);

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.0 {
            AppError::InvalidInput(_) => axum::http::StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => axum::http::StatusCode::NOT_FOUND,
            AppError::Upstream(_)
            | AppError::Reqwest(_)
            | AppError::Embedding(_)
            | AppError::Collection(_) => {
                log::error!("{self:?}");
                axum::http::StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

fn invalid_json(rejection: JsonRejection) -> HttpError {
    HttpError(AppError::InvalidInput(rejection.body_text()))
}

fn parse_id(raw: &str, what: &str) -> Result<u64, HttpError> {
    raw.parse()
        .map_err(|_| HttpError(AppError::InvalidInput(format!("Invalid {what}: {raw}"))))
}

async fn index() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

#[derive(Debug, Default, Deserialize)]
struct SearchRequest {
    query: Option<String>,
    num_results: Option<i64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SearchResponse {
    ids: Vec<String>,
    titles: Vec<String>,
    distances: Vec<f32>,
    metadatas: Vec<Metadata>,
}

async fn search(
    State(state): State<Arc<SharedState>>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, HttpError> {
    let Json(payload) = payload.map_err(invalid_json)?;
    log::debug!("payload: {payload:?}");

    let query = payload.query.unwrap_or_default();
    let num_results = payload.num_results.unwrap_or(DEFAULT_NUM_RESULTS);
    if num_results < 1 {
        return Err(HttpError(AppError::InvalidInput(
            "num_results must be a positive integer.".to_string(),
        )));
    }

    let ctx = state.ctx.clone();
    let hits = tokio::task::block_in_place(move || ctx.search(&query, num_results as usize))?;

    let mut response = SearchResponse::default();
    for hit in hits {
        response.ids.push(hit.id);
        response.titles.push(hit.document);
        response.distances.push(hit.distance);
        response.metadatas.push(hit.metadata);
    }

    Ok(Json(response))
}

#[derive(Debug, Serialize, Deserialize)]
struct AnswerResponse {
    body: String,
}

async fn get_answer(
    State(state): State<Arc<SharedState>>,
    Path(answer_id): Path<String>,
) -> Result<Json<AnswerResponse>, HttpError> {
    let answer_id = parse_id(&answer_id, "answer id")?;
    let ctx = state.ctx.clone();

    let body = tokio::task::block_in_place(move || ctx.fetch_answer(answer_id))?;
    Ok(Json(AnswerResponse { body }))
}

async fn scrape_answer(
    State(state): State<Arc<SharedState>>,
    Path(question_id): Path<String>,
) -> Result<Json<AnswerResponse>, HttpError> {
    let question_id = parse_id(&question_id, "question id")?;
    let ctx = state.ctx.clone();

    let body = tokio::task::block_in_place(move || ctx.scrape_answer(question_id))?;
    Ok(Json(AnswerResponse { body }))
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    #[serde(default)]
    prompt: String,
}

async fn generate_ai_answer(
    State(state): State<Arc<SharedState>>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<AnswerResponse>, HttpError> {
    let Json(payload) = payload.map_err(invalid_json)?;
    let ctx = state.ctx.clone();

    let body = tokio::task::block_in_place(move || ctx.generate_answer(&payload.prompt))?;
    Ok(Json(AnswerResponse { body }))
}
