//! Guard Middleware
//!
//! Runs the guard chain for every routed request and attaches the caller
//! identity the handlers extract.

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::auth::authenticate_session;
use super::rate_limit::enforce_application_limit;
use crate::application::services::GuardOutcome;
use crate::presentation::http::extractors::{bearer_token, CallerIdentity};
use crate::startup::AppState;

pub async fn guard_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let template = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| request.uri().path().to_owned());
    let meta = state.route_policy.lookup(request.method(), &template);
    let bearer = bearer_token(request.headers());

    let outcome = match state
        .guard
        .evaluate(&meta, request.method(), request.uri().path(), bearer.as_deref())
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => return e.into_response(),
    };

    match outcome {
        GuardOutcome::Public => {}
        GuardOutcome::Session => {
            match authenticate_session(request.headers(), &state.settings.jwt.secret) {
                Ok(user) => {
                    request.extensions_mut().insert(CallerIdentity::Session(user));
                }
                Err(e) => return e.into_response(),
            }
        }
        GuardOutcome::Bearer(context) => {
            if let Some(limited) = enforce_application_limit(&state, &context).await {
                return limited;
            }
            request.extensions_mut().insert(CallerIdentity::OAuth(context));
        }
    }

    next.run(request).await
}
