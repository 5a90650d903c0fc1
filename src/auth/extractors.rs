use actix_web::dev::Payload;
use actix_web::{Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};

use crate::auth::SessionClaims;
use crate::error::AppError;

/// The identity embedded in a verified session token.
///
/// Intended for routes behind `AuthMiddleware`, which inserts the verified
/// `SessionClaims` into the request extensions. If they are missing the
/// extractor fails with `AppError::Unauthorized`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: i32,
    pub email: String,
}

impl FromRequest for AuthenticatedUser {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<SessionClaims>() {
            Some(claims) => ready(Ok(AuthenticatedUser {
                id: claims.sub,
                email: claims.email.clone(),
            })),
            None => {
                let err = AppError::Unauthorized("Access token required".to_string());
                ready(Err(err.into()))
            }
        }
    }
}
