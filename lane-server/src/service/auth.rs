//! Signup, login and logout endpoints

use actix_web::cookie::{Cookie, SameSite};
use actix_web::web::{Data, Json};
use actix_web::{HttpRequest, HttpResponse, post};
use serde_json::json;
use tracing::{info, instrument};

use crate::model::Model;
use crate::model::users::{Credentials, User};
use crate::service::session::{self, SESSION_COOKIE};
use crate::service::{ApiError, Settings};

/// Session cookie with the given value
fn session_cookie(value: String, settings: &Settings) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, value)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(settings.secure_cookie)
        .finish()
}

/// Response opening a new session for the user
fn open_session(
    model: &Model,
    settings: &Settings,
    user: &User,
    message: &str,
) -> Result<HttpResponse, ApiError> {
    let token = model.tokens().issue(user.id, &user.username)?;

    Ok(HttpResponse::Ok()
        .cookie(session_cookie(token.as_str().to_owned(), settings))
        .json(json!({
            "message": message,
            "user_id": user.id,
            "username": user.username,
        })))
}

#[post("/signup")]
#[instrument(skip_all, fields(username = %credentials.username))]
async fn signup(
    model: Data<Model>,
    settings: Data<Settings>,
    credentials: Json<Credentials>,
) -> Result<HttpResponse, ApiError> {
    let user = model
        .auth()
        .signup(&credentials.username, &credentials.password)
        .await?;

    open_session(&model, &settings, &user, "signed up successfully")
}

#[post("/login")]
#[instrument(skip_all, fields(username = %credentials.username))]
async fn login(
    model: Data<Model>,
    settings: Data<Settings>,
    credentials: Json<Credentials>,
) -> Result<HttpResponse, ApiError> {
    let user = model
        .auth()
        .login(&credentials.username, &credentials.password)
        .await?;

    open_session(&model, &settings, &user, "logged in successfully")
}

/// Tells the client to drop the session cookie
///
/// The token itself stays valid until it expires.
#[post("/logout")]
async fn logout(req: HttpRequest, settings: Data<Settings>) -> HttpResponse {
    info!(
        user_id = session::current_user_id(&req),
        username = %session::current_username(&req),
        "User logged out"
    );

    let mut cookie = session_cookie(String::new(), &settings);
    cookie.make_removal();

    HttpResponse::Ok()
        .cookie(cookie)
        .json(json!({ "message": "logged out" }))
}
