//! Per-browser session identity
//!
//! Every request gets an opaque session token from the `quizzzone_session`
//! cookie, minted on first contact. Handlers read it from request extensions;
//! nothing a client puts in a request body is ever trusted as identity.

use crate::state::AppState;
use crate::types::SessionToken;
use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;

pub const SESSION_COOKIE: &str = "quizzzone_session";

fn session_cookie(token: &SessionToken, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token.as_str().to_string()))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .permanent()
        .build()
}

/// Attach the caller's session token, issuing a cookie when there is none yet
pub async fn session_middleware(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let existing = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value().trim().to_string())
        .filter(|v| !v.is_empty())
        .map(SessionToken);

    match existing {
        Some(token) => {
            request.extensions_mut().insert(token);
            next.run(request).await
        }
        None => {
            let token = SessionToken::new();
            tracing::debug!("Issuing new session {}", token.as_str());
            request.extensions_mut().insert(token.clone());
            let response = next.run(request).await;
            let jar = jar.add(session_cookie(&token, state.config.secure_cookie));
            (jar, response).into_response()
        }
    }
}
