//!
//! identity picker HTTP host
//! -------------------------
//! A small Axum host that plays the role of the authentication pipeline runtime so the
//! picker can be driven end to end over HTTP.
//!
//! Responsibilities:
//! - Run the picker action for a new authentication transaction (`POST /authenticate`).
//! - Park the authentication attributes of paused transactions until the user has picked.
//! - Serve the completion endpoint: `GET /picker/{txn}` renders the choices, `POST /picker/{txn}`
//!   records the pick and resumes the action.
//! - Sweep expired transactions in the background.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::{IdentityPickerConfig, ServerConfig};
use crate::error::{AppError, AppResult};
use crate::identity::{
    representation, ActionResult, AuthenticationAttributes, CompletionOutcome, CompletionRequest,
    IdentityPickerAction, IdentityPickerRequestHandler, SessionStore, TransactionId,
};

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub action: Arc<IdentityPickerAction>,
    pub handler: Arc<IdentityPickerRequestHandler>,
    pub sessions: SessionStore,
    /// Transaction id -> attributes the action is re-run with once the user has picked
    pub parked: Arc<RwLock<HashMap<TransactionId, AuthenticationAttributes>>>,
}

impl AppState {
    pub fn new(picker: IdentityPickerConfig, sessions: SessionStore) -> Self {
        Self {
            action: Arc::new(IdentityPickerAction::new(picker.clone())),
            handler: Arc::new(IdentityPickerRequestHandler::new(picker)),
            sessions,
            parked: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Drop expired transactions together with their parked attributes.
    pub async fn sweep(&self) -> usize {
        let removed = self.sessions.sweep();
        let mut parked = self.parked.write().await;
        parked.retain(|txn, _| self.sessions.contains(txn));
        removed
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "identity picker ok" }))
        .route("/authenticate", post(authenticate))
        .route("/picker/{txn}", get(picker_get).post(picker_post))
        .with_state(state)
}

pub async fn run_with_config(cfg: ServerConfig) -> anyhow::Result<()> {
    let state = AppState::new(cfg.picker.clone(), SessionStore::new(cfg.session_ttl));

    // Background transaction sweeper
    {
        let state_for_sweep = state.clone();
        tokio::spawn(async move {
            use std::time::Duration;
            loop {
                let removed = state_for_sweep.sweep().await;
                if removed > 0 { tracing::debug!(removed = removed, "session_sweep"); }
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        });
    }

    let addr: SocketAddr = format!("0.0.0.0:{}", cfg.http_port).parse()?;
    info!(
        identity_list_attribute = %cfg.picker.identity_list_attribute,
        display_name_attribute = %cfg.picker.display_name_attribute,
        "Starting identity picker on {}", addr
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn picker_location(txn: &str) -> String {
    format!("/picker/{}", txn)
}

fn success_body(attrs: &AuthenticationAttributes) -> Json<serde_json::Value> {
    Json(json!({"status": "success", "attributes": attrs}))
}

fn failed_body(message: &str) -> Json<serde_json::Value> {
    Json(json!({"status": "failed", "message": message}))
}

async fn authenticate(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> AppResult<impl IntoResponse> {
    let attrs = AuthenticationAttributes::try_from(body)?;
    let txn = state.sessions.begin()?;
    let session = state.sessions.scoped(&txn);
    let result = state.action.apply(&attrs, &session);
    match result {
        Ok(ActionResult::Pending(_)) => {
            info!(subject = %attrs.subject, "identity choice required");
            state.parked.write().await.insert(txn.clone(), attrs);
            let location = picker_location(&txn);
            Ok((StatusCode::OK, Json(json!({"status": "pending", "transaction": txn, "location": location}))))
        }
        Ok(ActionResult::Success(resolved)) => {
            state.sessions.end(&txn);
            Ok((StatusCode::OK, success_body(&resolved)))
        }
        Ok(ActionResult::Failed(message)) => {
            state.sessions.end(&txn);
            Ok((StatusCode::UNAUTHORIZED, failed_body(&message)))
        }
        Err(e) => {
            state.sessions.end(&txn);
            Err(e.into())
        }
    }
}

async fn parked_attributes(state: &AppState, txn: &str) -> AppResult<AuthenticationAttributes> {
    if !state.sessions.contains(txn) {
        return Err(AppError::not_found("unknown_transaction", "no such authentication transaction"));
    }
    state.parked.read().await.get(txn).cloned()
        .ok_or_else(|| AppError::not_found("unknown_transaction", "transaction is not awaiting a choice"))
}

async fn picker_get(State(state): State<AppState>, Path(txn): Path<String>) -> AppResult<impl IntoResponse> {
    parked_attributes(&state, &txn).await?;
    let session = state.sessions.scoped(&txn);
    let model = state.handler.pre_process(&CompletionRequest::get(), &session)?;
    let CompletionOutcome::Render(view) = state.handler.handle(model, &session)? else {
        return Err(AppError::internal("internal_error", "GET did not produce a view"));
    };
    let action_url = picker_location(&txn);
    let rep = representation::build(&view.candidates, &action_url, &view.display_name_attribute);
    Ok(Json(json!({
        "template": view.template,
        "viewData": view.view_data(&action_url),
        "representation": rep,
    })))
}

async fn picker_post(
    State(state): State<AppState>,
    Path(txn): Path<String>,
    Form(form): Form<Vec<(String, String)>>,
) -> AppResult<impl IntoResponse> {
    let attrs = parked_attributes(&state, &txn).await?;
    let session = state.sessions.scoped(&txn);
    let model = state.handler.pre_process(&CompletionRequest::post(form), &session)?;
    if state.handler.handle(model, &session)? != CompletionOutcome::Complete {
        return Err(AppError::internal("internal_error", "POST did not complete"));
    }

    // Pipeline resumes: the action now finds the pick in session
    match state.action.apply(&attrs, &session)? {
        ActionResult::Success(resolved) => {
            info!(subject = %resolved.subject, "identity chosen");
            Ok((StatusCode::OK, success_body(&resolved)))
        }
        ActionResult::Failed(message) => Ok((StatusCode::UNAUTHORIZED, failed_body(&message))),
        ActionResult::Pending(_) => Err(AppError::internal("internal_error", "picker still pending after completion")),
    }
}
