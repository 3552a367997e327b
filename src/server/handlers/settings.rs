//! Settings handlers.

use axum::{Json, extract::State};
use std::sync::Arc;

use crate::config::Settings;
use crate::render::CaptionFont;

use super::super::state::AppState;
use super::{ApiResult, blocking};

/// GET /api/settings - current settings, database password blanked.
pub async fn get(State(state): State<Arc<AppState>>) -> ApiResult<Json<Settings>> {
    state.session.read().await.require_user()?;
    Ok(Json(state.settings.read().await.redacted()))
}

/// PUT /api/settings - validate, save, and reload.
///
/// A blank database password keeps the stored one, so settings read from
/// GET can be sent back unchanged.
pub async fn put(
    State(state): State<Arc<AppState>>,
    Json(mut new_settings): Json<Settings>,
) -> ApiResult<Json<Settings>> {
    state.session.read().await.require_user()?;
    if new_settings.database.password.is_empty() {
        new_settings.database.password = state.settings.read().await.database.password.clone();
    }

    let store = state.store.clone();
    let (saved, font) = blocking(move || {
        store.save(&new_settings)?;
        let saved = store.load();
        let font = CaptionFont::load(saved.font_path.as_deref());
        Ok((saved, font))
    })
    .await?;

    if let Ok(spec) = saved.label_spec() {
        state.session.write().await.apply_label_spec(&spec);
    }
    *state.font.write().await = font;
    let shown = saved.redacted();
    *state.settings.write().await = saved;
    Ok(Json(shown))
}
