//! Session management
//!
//! The session lives entirely in the `token` cookie. The middleware verifies it and stores the
//! [`Identity`] in request extensions, where handlers pick it up as an extractor.

use std::future::{Ready, ready};

use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{Payload, ServiceRequest, ServiceResponse};
use actix_web::error::ErrorInternalServerError;
use actix_web::middleware::Next;
use actix_web::web::Data;
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest};
use tracing::debug;

use crate::model::Model;
use crate::model::session::SessionClaims;
use crate::model::users::UserId;
use crate::service::ApiError;

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "token";

/// Verified identity of the requesting user
///
/// Only present on requests that passed the session middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
}

impl From<SessionClaims> for Identity {
    fn from(claims: SessionClaims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.username,
        }
    }
}

impl Identity {
    /// Identity attached to the request, if any
    pub fn of(req: &HttpRequest) -> Option<Self> {
        req.extensions().get::<Self>().cloned()
    }
}

impl FromRequest for Identity {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Self::of(req).ok_or(ApiError::Unauthorized("Missing session")))
    }
}

/// Id of the logged user, `0` on unauthenticated requests
pub fn current_user_id(req: &HttpRequest) -> i64 {
    Identity::of(req).map_or(0, |identity| identity.user_id.get())
}

/// Name of the logged user, empty on unauthenticated requests
pub fn current_username(req: &HttpRequest) -> String {
    Identity::of(req)
        .map(|identity| identity.username)
        .unwrap_or_default()
}

pub async fn middleware<B>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, Error>
where
    B: MessageBody + 'static,
{
    let model: Data<Model> = req
        .app_data()
        .cloned()
        .ok_or_else(|| ErrorInternalServerError("Missing model"))?;

    let token = match req.cookie(SESSION_COOKIE) {
        Some(cookie) if !cookie.value().is_empty() => cookie.value().to_owned(),
        _ => {
            debug!(path = req.path(), "Request without session cookie");
            let err = ApiError::Unauthorized("Missing auth cookie");
            return Ok(req.error_response(err).map_into_right_body());
        }
    };

    let claims = match model.tokens().verify(&token) {
        Ok(claims) => claims,
        Err(err) => {
            debug!(path = req.path(), error = %err, "Session token rejected");
            return Ok(req.error_response(ApiError::from(err)).map_into_right_body());
        }
    };

    req.extensions_mut().insert(Identity::from(claims));
    Ok(next.call(req).await?.map_into_left_body())
}

#[cfg(test)]
mod tests {
    use actix_web::test::TestRequest;

    use super::*;

    #[test]
    fn identity_accessors() {
        let req = TestRequest::default().to_http_request();
        assert_eq!(Identity::of(&req), None);
        assert_eq!(current_user_id(&req), 0);
        assert_eq!(current_username(&req), "");

        let identity = Identity {
            user_id: UserId::new(5),
            username: "user1".to_owned(),
        };
        req.extensions_mut().insert(identity.clone());

        assert_eq!(Identity::of(&req), Some(identity));
        assert_eq!(current_user_id(&req), 5);
        assert_eq!(current_username(&req), "user1");
    }
}
