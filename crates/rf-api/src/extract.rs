//! Resolves the acting `Viewer` from the `Authorization: Bearer` header.

use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use rf_core::models::Viewer;

use crate::AppState;

/// Never fails: requests without a valid token act as `Viewer::Anonymous`.
pub struct CurrentViewer(pub Viewer);

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

impl FromRequest for CurrentViewer {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let viewer = match req.app_data::<web::Data<AppState>>() {
            Some(state) => state.auth.authenticate(bearer_token(req)),
            None => {
                log::warn!("AppState missing, treating request as anonymous");
                Viewer::Anonymous
            }
        };
        ready(Ok(CurrentViewer(viewer)))
    }
}
