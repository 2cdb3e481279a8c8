//! Session resolution.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::http::server::AppState;
use crate::session::session_id_from_headers;

/// Attach the caller's session, if the cookie names a live one, and refresh
/// its last access time. Expired sessions are not attached.
///
/// Never creates a session; see `GET /session` for that.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let session = session_id_from_headers(request.headers(), &state.session_cookie)
        .and_then(|id| state.sessions.get(&id));

    if let Some(session) = session {
        session.touch();
        request.extensions_mut().insert(session);
    }

    next.run(request).await
}
