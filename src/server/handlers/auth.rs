//! Sign-in handlers.

use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use super::super::state::AppState;
use super::ApiResult;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
}

/// POST /api/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(form): Json<LoginForm>,
) -> ApiResult<Json<Value>> {
    let allowed = state.settings.read().await.authorized_users.clone();
    let mut session = state.session.write().await;
    session.login(&form.email, &allowed)?;
    Ok(Json(json!({"success": true, "user": session.user()})))
}

/// POST /api/logout
pub async fn logout(State(state): State<Arc<AppState>>) -> Json<Value> {
    state.session.write().await.logout();
    Json(json!({"success": true}))
}
