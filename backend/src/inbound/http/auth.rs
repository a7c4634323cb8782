//! Bearer token authentication.
//!
//! [`RequestActor`] turns the `Authorization` header into the [`Actor`] passed
//! to every service call. A request without the header acts as the guest;
//! a token the directory does not know is rejected with `UNAUTHORIZED`.

use std::sync::Arc;

use actix_web::http::header::AUTHORIZATION;
use actix_web::{FromRequest, HttpRequest, dev::Payload, web};
use futures_util::future::LocalBoxFuture;
use tracing::{error, warn};

use crate::domain::ports::ActorDirectory;
use crate::domain::{Actor, Error};

use super::state::HttpState;

/// The authenticated caller of the current request.
#[derive(Debug, Clone)]
pub struct RequestActor(pub Actor);

impl RequestActor {
    /// Borrow the actor.
    pub fn actor(&self) -> &Actor {
        &self.0
    }
}

/// Extract the bearer token from a raw header value.
///
/// # Errors
///
/// Returns `UNAUTHORIZED` for any scheme other than a non-empty `Bearer`.
fn bearer_token(raw: &str) -> Result<&str, Error> {
    let (scheme, token) = raw
        .trim()
        .split_once(' ')
        .ok_or_else(|| Error::unauthorized("malformed authorization header"))?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(Error::unauthorized("malformed authorization header"));
    }
    Ok(token)
}

async fn resolve(directory: Arc<dyn ActorDirectory>, token: String) -> Result<Actor, Error> {
    match directory.resolve(&token).await {
        Ok(Some(actor)) => Ok(actor),
        Ok(None) => {
            warn!("unknown bearer token presented");
            Err(Error::unauthorized("unknown bearer token"))
        }
        Err(err) => {
            error!(error = %err, "actor directory lookup failed");
            Err(Error::internal("actor directory lookup failed"))
        }
    }
}

impl FromRequest for RequestActor {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let header = req
            .headers()
            .get(AUTHORIZATION)
            .map(|value| value.to_str().map(str::to_owned));
        let directory = req
            .app_data::<web::Data<HttpState>>()
            .map(|state| Arc::clone(&state.actors));

        Box::pin(async move {
            let raw = match header {
                None => return Ok(Self(Actor::guest())),
                Some(Ok(raw)) => raw,
                Some(Err(_)) => {
                    return Err(Error::unauthorized("malformed authorization header").into());
                }
            };
            let token = bearer_token(&raw)?.to_owned();
            let directory = directory.ok_or_else(|| {
                error!("HTTP state missing from application data");
                Error::internal("authentication is not configured")
            })?;
            Ok(Self(resolve(directory, token).await?))
        })
    }
}
