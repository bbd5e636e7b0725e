use crate::{client::PublicOrigin, handlers::pages::HomeTemplate, AppState};
use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// GET /:code
///
/// Counts the visit and answers 302 with the original URL. The snapshot is
/// saved later by the flusher, never on this path. Unknown codes get the
/// home page with a 404.
pub async fn redirect(
    State(state): State<Arc<AppState>>,
    origin: PublicOrigin,
    Path(code): Path<String>,
) -> Response {
    let Some(original_url) = state.store.resolve(&code).await else {
        return (
            StatusCode::NOT_FOUND,
            HomeTemplate::new(&state, &origin)
                .with_notice(format!("Short link '{code}' does not exist.")),
        )
            .into_response();
    };

    match HeaderValue::from_str(&original_url) {
        Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
        Err(e) => {
            tracing::error!("Link '{}' has an unusable target URL: {}", code, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Stored URL cannot be redirected to").into_response()
        }
    }
}
