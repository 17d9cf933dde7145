use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post},
    Router,
};
use axum_session::{Session, SessionNullPool};
use html_state::HtmlState;
use tower_http::compression::CompressionLayer;

pub mod error;
pub mod html_state;
mod routes;
mod templates;

/// Browser sessions live in the in-process store; all durable state is in
/// the external record store.
pub type HtmlSession = Session<SessionNullPool>;

pub fn html_routes<S>(state: &HtmlState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    HtmlState: FromRef<S>,
{
    Router::new()
        .route("/", get(routes::index::show_index))
        .route("/login", get(routes::auth::show_login))
        .route("/auth/send-code", post(routes::auth::send_code))
        .route(
            "/auth/verify",
            get(routes::auth::show_verify).post(routes::auth::verify_code),
        )
        .route("/logout", get(routes::auth::logout))
        .route(
            "/upload",
            post(routes::upload::upload_file)
                .layer(DefaultBodyLimit::max(state.config.upload_max_bytes)),
        )
        .route("/upload_text", post(routes::upload::upload_text))
        .route("/result/{uuid}", get(routes::result::show_result))
        .route("/result_ajax", get(routes::result::result_ajax))
        .route("/check_status", get(routes::result::check_status))
        .route("/download/text/{job_id}", get(routes::export::download_text))
        .route(
            "/download/original/{job_id}",
            get(routes::export::download_original),
        )
        .layer(CompressionLayer::new())
}
