use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Flat object served by `/objects`. Every field is a string so the body
/// decodes straight into a key-value map.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Widget {
    pub id: String,
    pub name: String,
}

#[derive(Deserialize)]
pub struct CreateWidget {
    pub name: String,
}

#[derive(Clone, Default)]
pub struct AppState {
    widgets: Arc<RwLock<HashMap<String, Widget>>>,
    history: Arc<RwLock<Vec<String>>>,
}

pub const FIXED_BODY: &str = "testing123";

pub fn app() -> Router {
    let state = AppState::default();
    Router::new()
        .route("/api/v1/foo", get(fixed_body))
        .route("/echo", post(echo))
        .route("/objects", get(list_widgets).post(create_widget))
        .route("/objects/{id}", get(get_widget))
        .route("/slow/{millis}", get(slow))
        .route("/history", get(history))
        .layer(middleware::from_fn_with_state(state.clone(), record))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Records `METHOD /path` for every request except reads of the history
/// itself.
async fn record(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if path != "/history" {
        let entry = format!("{} {path}", request.method());
        state.history.write().await.push(entry);
    }
    next.run(request).await
}

async fn fixed_body() -> &'static str {
    FIXED_BODY
}

async fn echo(body: String) -> String {
    body
}

async fn list_widgets(State(state): State<AppState>) -> Json<Vec<Widget>> {
    let widgets = state.widgets.read().await;
    Json(widgets.values().cloned().collect())
}

async fn create_widget(
    State(state): State<AppState>,
    Json(input): Json<CreateWidget>,
) -> (StatusCode, Json<Widget>) {
    let widget = Widget {
        id: Uuid::new_v4().to_string(),
        name: input.name,
    };
    state.widgets.write().await.insert(widget.id.clone(), widget.clone());
    (StatusCode::CREATED, Json(widget))
}

async fn get_widget(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Widget>, StatusCode> {
    let widgets = state.widgets.read().await;
    widgets.get(&id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn slow(Path(millis): Path<u64>) -> String {
    tokio::time::sleep(Duration::from_millis(millis)).await;
    format!("slept {millis}ms")
}

async fn history(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.history.read().await.clone())
}
