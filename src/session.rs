// session.rs
// Session middleware to protect routes and extractor to access session data.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, StatusCode, header::COOKIE, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use tracing::{debug, error};

use crate::models::User;
use crate::state::{AppState, find_user_by_session};

pub const SESSION_COOKIE_NAME: &str = "session";

#[derive(Clone)]
pub struct SessionData {
    pub user: User,
    pub token: String,
}

pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let tokens = extract_cookies(request.headers(), SESSION_COOKIE_NAME);
    if tokens.is_empty() {
        debug!(path = %request.uri().path(), "request without session cookie");
        return Err(unauthorized_response());
    }

    // Try all cookies with the session name until one is valid
    for token in tokens {
        match find_user_by_session(&state, &token).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(SessionData { user, token });
                return Ok(next.run(request).await);
            }
            Ok(None) => continue,
            Err(e) => {
                error!(error = %e, "session lookup failed");
                return Err(
                    (StatusCode::INTERNAL_SERVER_ERROR, "session lookup failed").into_response(),
                );
            }
        }
    }
    Err(unauthorized_response())
}

pub struct SessionUser(pub SessionData);

impl SessionUser {
    pub fn email(&self) -> &str {
        &self.0.user.email
    }

    pub fn token(&self) -> &str {
        &self.0.token
    }
}

#[allow(refining_impl_trait)]
impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> BoxFuture<'static, Result<Self, Self::Rejection>> {
        let data = parts
            .extensions
            .get::<SessionData>()
            .cloned()
            .ok_or_else(unauthorized_response);

        Box::pin(async move { data.map(SessionUser) })
    }
}

fn unauthorized_response() -> Response {
    (StatusCode::UNAUTHORIZED, "unauthorized").into_response()
}

fn extract_cookies(headers: &HeaderMap, name: &str) -> Vec<String> {
    headers
        .get_all(COOKIE)
        .into_iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let mut split = pair.trim().splitn(2, '=');
            let key = split.next()?.trim();
            let value = split.next()?.trim();
            if key == name && !value.is_empty() {
                Some(value.to_owned())
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn collects_every_session_cookie() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark; session=AAA"));
        headers.append(COOKIE, HeaderValue::from_static("session=BBB;session="));
        assert_eq!(extract_cookies(&headers, SESSION_COOKIE_NAME), vec!["AAA", "BBB"]);
    }

    #[test]
    fn ignores_other_cookie_names() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("sessionx=1; xsession=2"));
        assert!(extract_cookies(&headers, SESSION_COOKIE_NAME).is_empty());
    }
}
