//! Cross-origin requests policy
//!
//! A single configured origin is allowed to make credentialed requests. Preflight requests are
//! answered here and never reach the handlers.

use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::error::ErrorInternalServerError;
use actix_web::http::Method;
use actix_web::http::header::{self, HeaderMap, HeaderValue};
use actix_web::middleware::Next;
use actix_web::web::Data;
use actix_web::{Error, HttpResponse};

use crate::service::Settings;

const ALLOWED_HEADERS: &str = "Content-Type, Authorization";
const ALLOWED_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";

/// Adds CORS headers granting access to the origin
fn allow(headers: &mut HeaderMap, origin: HeaderValue) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
}

pub async fn middleware<B>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, Error>
where
    B: MessageBody + 'static,
{
    let settings: Data<Settings> = req
        .app_data()
        .cloned()
        .ok_or_else(|| ErrorInternalServerError("Missing settings"))?;

    let origin = req
        .headers()
        .get(header::ORIGIN)
        .filter(|origin| origin.as_bytes() == settings.allowed_origin.as_bytes())
        .cloned();

    if *req.method() == Method::OPTIONS {
        let mut response = HttpResponse::NoContent().finish();
        if let Some(origin) = origin {
            allow(response.headers_mut(), origin);
        }
        return Ok(req.into_response(response).map_into_right_body());
    }

    let mut response = next.call(req).await?;
    if let Some(origin) = origin {
        allow(response.headers_mut(), origin);
    }
    Ok(response.map_into_left_body())
}
