//! HTTP interface
//!
//! Everything is served under `/api/v1`. Signup, login and health check are public, the rest
//! requires a valid session cookie.

use actix_web::error::{JsonPayloadError, PathError};
use actix_web::http::StatusCode;
use actix_web::web::{self, Data, ServiceConfig};
use actix_web::{HttpRequest, HttpResponse, ResponseError, get, middleware};
use chrono::{SecondsFormat, Utc};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, warn};


mod auth;
mod cors;
mod session;
mod workspaces;

use crate::config::Config;
use crate::model::{self, Model};
use session::Identity;

/// HTTP related settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Adds `Secure` flag to session cookies
    pub secure_cookie: bool,
    /// Origin allowed for credentialed cross-origin requests
    pub allowed_origin: String,
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            secure_cookie: config.auth.secure_cookie,
            allowed_origin: config.cors.allowed_origin.clone(),
        }
    }
}

/// Error reported to the API client
///
/// Serialized as `{"error": "<message>"}`. Internal failures are logged where they are
/// converted and reported without any detail.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("invalid username or password")]
    Authentication,
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("internal server error")]
    Internal,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Authentication | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

impl From<model::auth::Error> for ApiError {
    fn from(err: model::auth::Error) -> Self {
        use model::auth::Error::*;

        match err {
            Authentication => Self::Authentication,
            Conflict => Self::Conflict(err.to_string()),
            Validation(msg) => Self::Validation(msg.to_owned()),
            Storage(err) => {
                error!(error = %err, "Storage failure during authentication");
                Self::Internal
            }
        }
    }
}

impl From<model::workspaces::Error> for ApiError {
    fn from(err: model::workspaces::Error) -> Self {
        use model::workspaces::Error::*;

        match err {
            NotFound => Self::NotFound(err.to_string()),
            Conflict => Self::Conflict(err.to_string()),
            Validation(msg) => Self::Validation(msg.to_owned()),
            Storage(err) => {
                error!(error = %err, "Storage failure on workspaces");
                Self::Internal
            }
        }
    }
}

impl From<model::session::Error> for ApiError {
    fn from(err: model::session::Error) -> Self {
        use model::session::Error::*;

        match err {
            InvalidToken => Self::Unauthorized("Invalid or expired token"),
            err @ (MissingSecret | Signing(_)) => {
                error!(error = %err, "Cannot issue session token");
                Self::Internal
            }
        }
    }
}

/// Reports malformed request bodies as validation errors
fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    debug!(error = %err, "Malformed request body");
    ApiError::Validation(format!("invalid request body: {err}")).into()
}

/// Path segments not parsing as an id can't name any existing resource
fn path_error(err: PathError, _req: &HttpRequest) -> actix_web::Error {
    debug!(error = %err, "Malformed resource id");
    ApiError::NotFound("workspace not found".to_owned()).into()
}

/// Service liveness together with the database reachability
#[get("/healthz")]
async fn healthz(model: Data<Model>) -> HttpResponse {
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

    match model.store().ping().await {
        Ok(()) => HttpResponse::Ok().json(json!({
            "status": "healthy",
            "timestamp": timestamp,
        })),
        Err(err) => {
            warn!(error = %err, "Health check failed");
            HttpResponse::ServiceUnavailable().json(json!({
                "status": "unhealthy",
                "timestamp": timestamp,
                "error": "database unreachable",
            }))
        }
    }
}

/// Currently logged user
#[get("/me")]
async fn me(identity: Identity) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "user_id": identity.user_id,
        "username": identity.username,
    }))
}

/// Returns configuration function for the ActixWeb services
pub fn configure(settings: Settings, model: Model) -> impl Fn(&mut ServiceConfig) + Clone {
    move |cfg: &mut ServiceConfig| {
        let session_aware = web::scope("")
            .wrap(middleware::from_fn(session::middleware))
            .service(auth::logout)
            .service(me)
            .service(workspaces::list_workspaces)
            .service(workspaces::create_workspace)
            .service(workspaces::workspace)
            .service(workspaces::update_workspace)
            .service(workspaces::delete_workspace);

        let api = web::scope("/api/v1")
            .wrap(middleware::from_fn(cors::middleware))
            .service(auth::signup)
            .service(auth::login)
            .service(healthz)
            .service(session_aware);

        cfg.app_data(Data::new(model.clone()))
            .app_data(Data::new(settings.clone()))
            .app_data(web::JsonConfig::default().error_handler(json_error))
            .app_data(web::PathConfig::default().error_handler(path_error))
            .service(api);
    }
}
