use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use common::error::{error_id, AppError};
use minijinja::context;
use tracing::error;

use crate::templates;

#[derive(Debug)]
pub enum HtmlError {
    App(AppError),
    Template(String),
}

impl From<AppError> for HtmlError {
    fn from(err: AppError) -> Self {
        Self::App(err)
    }
}

impl IntoResponse for HtmlError {
    fn into_response(self) -> Response {
        let (status, title, description) = match self {
            Self::App(AppError::NotFound(_)) => (
                StatusCode::NOT_FOUND,
                "Not Found".to_string(),
                "The job you are looking for does not exist.".to_string(),
            ),
            Self::App(AppError::Auth(_)) => (
                StatusCode::UNAUTHORIZED,
                "Unauthorized".to_string(),
                "You do not have permission to view this job.".to_string(),
            ),
            Self::App(AppError::Validation(message)) => {
                (StatusCode::BAD_REQUEST, "Bad Request".to_string(), message)
            }
            Self::App(err) => {
                let id = error_id();
                error!(error_id = %id, error = ?err, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                    format!("Something went wrong on our end. Reference: {id}"),
                )
            }
            Self::Template(message) => {
                let id = error_id();
                error!(error_id = %id, error = %message, "template error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                    format!("Something went wrong on our end. Reference: {id}"),
                )
            }
        };

        let page = templates::render(
            "errors/error.html",
            context! {
                status_code => status.as_u16(),
                title => title,
                description => description,
            },
        )
        .unwrap_or_else(|_| fallback_error());
        (status, Html(page)).into_response()
    }
}

fn fallback_error() -> String {
    r#"
    <html>
        <body>
            <h1>Error</h1>
            <p>Sorry, something went wrong displaying this page.</p>
        </body>
    </html>
    "#
    .to_string()
}
