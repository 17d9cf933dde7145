use axum::response::{Html, IntoResponse, Redirect};
use minijinja::context;

use crate::{error::HtmlError, routes::auth, templates, HtmlSession};

pub async fn show_index(session: HtmlSession) -> Result<impl IntoResponse, HtmlError> {
    if auth::session_user(&session).is_none() {
        return Ok(Redirect::to("/login").into_response());
    }
    let page = templates::render(
        "index.html",
        context! {
            user_email => auth::session_email(&session).unwrap_or_default(),
        },
    )?;
    Ok(Html(page).into_response())
}
