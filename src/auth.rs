use std::future::{ready, Ready};

use actix_web::{dev::Payload, http::header::Header, web::Data, FromRequest, HttpRequest};
use actix_web_httpauth::headers::authorization::{Authorization, Basic};

use crate::{errors::AppError, AppState};

/// Proof that the caller presented the configured Basic credentials.
///
/// Put it first in a handler's arguments so the check runs before the body
/// is read and before the store is touched.
#[derive(Debug)]
pub struct Authorized;

impl FromRequest for Authorized {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authorize(req))
    }
}

fn authorize(req: &HttpRequest) -> Result<Authorized, AppError> {
    let state = req.app_data::<Data<AppState>>().ok_or_else(|| {
        log::error!("Application state is not registered");
        AppError::InternalServerError
    })?;

    let (username, password) = basic_credentials(req).ok_or(AppError::Unauthorized)?;

    if state.credentials.verify(&username, &password) {
        Ok(Authorized)
    } else {
        log::warn!("Rejected credentials for {} on {}", username, req.path());
        Err(AppError::Unauthorized)
    }
}

/// Username and password of an `Authorization: Basic ...` header.
fn basic_credentials(req: &HttpRequest) -> Option<(String, String)> {
    let header = Authorization::<Basic>::parse(req).ok()?;
    let basic = header.as_ref();
    let password = basic.password()?;
    Some((basic.user_id().to_string(), password.to_string()))
}
