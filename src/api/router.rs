use axum::http::Uri;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::error::ApiError;
use super::handlers::{attendance, classes, students, subjects, teachers};
use super::types::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(service_info))
        .route("/api/health", get(health))
        .route(
            "/api/attendance",
            get(attendance::get_attendance).post(attendance::mark_attendance),
        )
        .route("/api/attendance/trend", get(attendance::get_attendance_trend))
        .route("/api/classes", get(classes::list).post(classes::create))
        .route(
            "/api/classes/:id",
            get(classes::get_one).put(classes::update).delete(classes::remove),
        )
        .route("/api/subjects", get(subjects::list).post(subjects::create))
        .route(
            "/api/subjects/:id",
            get(subjects::get_one).put(subjects::update).delete(subjects::remove),
        )
        .route("/api/teachers", get(teachers::list).post(teachers::create))
        .route(
            "/api/teachers/:id",
            get(teachers::get_one).put(teachers::update).delete(teachers::remove),
        )
        .route("/api/students", get(students::list).post(students::create))
        .route(
            "/api/students/:id",
            get(students::get_one).put(students::update).delete(students::remove),
        )
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn service_info() -> Json<serde_json::Value> {
    Json(json!({
        "name": "School Management API",
        "status": "online",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "timestamp": Utc::now().to_rfc3339() }))
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("Not Found - {uri}"))
}
