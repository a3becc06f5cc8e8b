use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRequest, Request};
use axum::Json;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use crate::config::Config;

use super::error::ApiError;

/// Shared per-request state. The single SQLite connection sits behind an async
/// mutex; handlers lock it, run their synchronous SQL, and release it before
/// responding.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(conn: Connection, config: Config) -> AppState {
        AppState {
            db: Arc::new(Mutex::new(conn)),
            config: Arc::new(config),
        }
    }
}

/// `Json<T>` with rejections mapped onto the API's 400 envelope.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiError::validation(format!(
                "Invalid request body: {}",
                rejection.body_text()
            ))),
        }
    }
}
