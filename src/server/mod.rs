//! # HTTP API for Label Printing
//!
//! JSON endpoints for the browse, generate, print and scan workflow.
//!
//! ## Usage
//!
//! ```bash
//! seatlabel serve --listen 127.0.0.1:8080
//! ```
//!
//! ## Routes
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | POST | `/api/login`, `/api/logout` | sign in against the allow-list |
//! | GET | `/api/semesters` | semesters, most recent first |
//! | GET | `/api/semesters/:semester/dates` | exam dates |
//! | GET | `/api/semesters/:semester/modules?date=` | module codes |
//! | GET | `/api/students?semester=&module=` | load a module's records |
//! | GET | `/api/session/students` | current records with print status |
//! | POST | `/api/labels/generate` | render labels, grid preview PNG |
//! | GET | `/api/labels/preview/:value` | one label PNG |
//! | POST | `/api/labels/print` | print as `commands` or `raster` |
//! | GET | `/api/scan/:code` | verify a barcode or student ID |
//! | POST | `/api/records/test` | check the record source connection |
//! | GET, PUT | `/api/settings` | read or save settings (password blanked) |
//! | GET | `/api/printers` | installed printers |
//! | POST | `/api/printers/test` | test page |

mod handlers;
mod state;

pub use state::{AppState, ServerConfig};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::LabelError;

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Session
        .route("/api/login", post(handlers::auth::login))
        .route("/api/logout", post(handlers::auth::logout))
        // Browse
        .route("/api/semesters", get(handlers::records::semesters))
        .route(
            "/api/semesters/:semester/dates",
            get(handlers::records::dates),
        )
        .route(
            "/api/semesters/:semester/modules",
            get(handlers::records::modules),
        )
        .route("/api/students", get(handlers::records::students))
        .route("/api/session/students", get(handlers::records::current))
        .route("/api/scan/:code", get(handlers::records::scan))
        .route("/api/records/test", post(handlers::records::test_connection))
        // Labels
        .route("/api/labels/generate", post(handlers::labels::generate))
        .route(
            "/api/labels/preview/:value",
            get(handlers::labels::preview),
        )
        .route("/api/labels/print", post(handlers::labels::print))
        // Printers
        .route("/api/printers", get(handlers::labels::printers))
        .route("/api/printers/test", post(handlers::labels::test_page))
        // Settings
        .route(
            "/api/settings",
            get(handlers::settings::get).put(handlers::settings::put),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
///
/// ```no_run
/// use seatlabel::server::{serve, ServerConfig};
///
/// # async fn example() -> Result<(), seatlabel::error::LabelError> {
/// let config = ServerConfig {
///     settings_path: "settings.json".into(),
///     listen_addr: "127.0.0.1:8080".to_string(),
/// };
///
/// serve(config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn serve(config: ServerConfig) -> Result<(), LabelError> {
    let app_state = Arc::new(AppState::new(config.clone()));
    let app = router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|e| {
            LabelError::Connectivity(format!("Failed to bind to {}: {}", config.listen_addr, e))
        })?;

    info!("Listening on http://{}", config.listen_addr);
    info!("Settings: {}", config.settings_path.display());

    axum::serve(listener, app)
        .await
        .map_err(|e| LabelError::Connectivity(format!("Server error: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    const SNAPSHOT: &str = r#"{
        "timetable_semester": [{"EntryID": 1, "SemesterCode": "2024S1"}],
        "exam_timetable": [{"EntryID": 1, "ModuleCode": "CS101", "SemesterCode": "2024S1", "ExamDate": "2024-06-03"}],
        "exam_timetable_hall": [{"EntryID": 5, "ModuleCode": "CS101", "SemesterCode": "2024S1", "VenueID": 10}],
        "timetable_venue": [{"EntryID": 10, "VenueName": "Hall A"}],
        "exam_barcode": [{"StudentID": "S1", "Barcode": "X1", "SeatNo": "1", "ExamHallID": 5}],
        "modules": [{"ModuleCode": "CS101", "ModuleName": "Programming"}]
    }"#;

    fn app(dir: &std::path::Path) -> Router {
        let records = dir.join("records.json");
        std::fs::write(&records, SNAPSHOT).unwrap();
        let settings = crate::config::Settings {
            records_path: records,
            database: crate::config::DatabaseSettings {
                password: "hunter2".to_string(),
                ..Default::default()
            },
            authorized_users: vec!["exams@example.edu".to_string()],
            ..Default::default()
        };
        let settings_path = dir.join("settings.json");
        crate::config::SettingsStore::new(&settings_path)
            .save(&settings)
            .unwrap();
        router(Arc::new(AppState::new(ServerConfig {
            settings_path,
            listen_addr: "127.0.0.1:0".to_string(),
        })))
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_requires_login() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .oneshot(Request::get("/api/semesters").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_then_browse() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let response = app
            .clone()
            .oneshot(post_json("/api/login", r#"{"email": "Exams@Example.edu"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(
                Request::get("/api/students?semester=2024S1&module=CS101")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["module_name"], "Programming");
        assert_eq!(json["students"][0]["Barcode"], "X1");
        assert_eq!(json["students"][0]["status"], "pending");

        let response = app
            .oneshot(post_json("/api/labels/generate", "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "image/png");
    }

    #[tokio::test]
    async fn test_login_refused() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .oneshot(post_json("/api/login", r#"{"email": "nobody@example.edu"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_settings_require_login() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .oneshot(Request::get("/api/settings").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert!(json.get("authorized_users").is_none());
    }

    #[tokio::test]
    async fn test_settings_hide_database_password() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        app.clone()
            .oneshot(post_json("/api/login", r#"{"email": "exams@example.edu"}"#))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(Request::get("/api/settings").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let mut json = body_json(response).await;
        assert_eq!(json["database"]["password"], "");

        // Sending the redacted settings back keeps the stored password.
        json["printer_name"] = "Zebra".into();
        let request = Request::put("/api/settings")
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["database"]["password"], "");

        let saved = crate::config::SettingsStore::new(dir.path().join("settings.json")).load();
        assert_eq!(saved.printer_name, "Zebra");
        assert_eq!(saved.database.password, "hunter2");
    }

    #[tokio::test]
    async fn test_record_source_connection() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        app.clone()
            .oneshot(post_json("/api/login", r#"{"email": "exams@example.edu"}"#))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(post_json("/api/records/test", "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        std::fs::remove_file(dir.path().join("records.json")).unwrap();
        let response = app
            .oneshot(post_json("/api/records/test", "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_label_preview_png() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .oneshot(
                Request::get("/api/labels/preview/ABC123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let image = image::load_from_memory(&body).unwrap();
        assert_eq!((image.width(), image.height()), (480, 320));
    }
}
