use std::time::Duration;

use axum::{
    extract::State,
    response::{Html, IntoResponse, Redirect},
    Form,
};
use chrono::{DateTime, Utc};
use job_pipeline::dispatch::WebhookClient;
use minijinja::context;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::{error::HtmlError, html_state::HtmlState, templates, HtmlSession};

const SESSION_USER_ID: &str = "user_id";
const SESSION_USER_EMAIL: &str = "user_email";
const SESSION_AUTH_EMAIL: &str = "auth_email";
const SESSION_LAST_ACTIVITY: &str = "last_activity";

/// Sessions have no absolute lifetime but expire after this much inactivity.
const INACTIVITY_TIMEOUT_HOURS: i64 = 4;

const AUTH_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Signed-in user id, if the session is live. Expired sessions are cleared;
/// active ones get their activity timestamp refreshed.
pub fn session_user(session: &HtmlSession) -> Option<i64> {
    let user_id = session.get::<i64>(SESSION_USER_ID)?;

    let last_activity = session
        .get::<String>(SESSION_LAST_ACTIVITY)
        .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
        .map(|parsed| parsed.with_timezone(&Utc));
    if let Some(last_activity) = last_activity {
        if Utc::now() - last_activity > chrono::Duration::hours(INACTIVITY_TIMEOUT_HOURS) {
            info!(user_id, "session expired due to inactivity");
            clear_session(session);
            return None;
        }
    }

    session.set(SESSION_LAST_ACTIVITY, Utc::now().to_rfc3339());
    Some(user_id)
}

fn clear_session(session: &HtmlSession) {
    session.remove(SESSION_USER_ID);
    session.remove(SESSION_USER_EMAIL);
    session.remove(SESSION_AUTH_EMAIL);
    session.remove(SESSION_LAST_ACTIVITY);
}

pub fn session_email(session: &HtmlSession) -> Option<String> {
    session.get::<String>(SESSION_USER_EMAIL)
}

pub async fn show_login(session: HtmlSession) -> Result<impl IntoResponse, HtmlError> {
    if session_user(&session).is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    let page = templates::render("login.html", context! { error => "" })?;
    Ok(Html(page).into_response())
}

#[derive(Debug, Deserialize)]
pub struct SendCodeParams {
    #[serde(default)]
    pub email: String,
}

/// Forward the email to the auth webhook; the external workflow generates
/// the verification code and stores it on the user row.
pub async fn send_code(
    State(state): State<HtmlState>,
    session: HtmlSession,
    Form(params): Form<SendCodeParams>,
) -> Result<impl IntoResponse, HtmlError> {
    let email = params.email.trim().to_string();
    if !email.contains('@') || !email.contains('.') {
        let page = templates::render(
            "login.html",
            context! { error => "Please enter a valid email address." },
        )?;
        return Ok(Html(page).into_response());
    }

    match state
        .webhook
        .post_json(
            &state.config.auth_email_webhook_url,
            json!({ "email": email }),
            AUTH_WEBHOOK_TIMEOUT,
        )
        .await
    {
        Ok(response) if response.is_success() => {
            info!(email = %email, "verification code requested");
            session.set(SESSION_AUTH_EMAIL, email);
            Ok(Redirect::to("/auth/verify").into_response())
        }
        Ok(response) => {
            warn!(email = %email, status = response.status, "auth webhook rejected request");
            let page = templates::render(
                "login.html",
                context! { error => "There was a problem sending the email. Please try again." },
            )?;
            Ok(Html(page).into_response())
        }
        Err(err) => {
            warn!(email = %email, error = %err, "auth webhook unreachable");
            let page = templates::render(
                "login.html",
                context! { error => "There was a problem sending the email. Please try again." },
            )?;
            Ok(Html(page).into_response())
        }
    }
}

pub async fn show_verify(session: HtmlSession) -> Result<impl IntoResponse, HtmlError> {
    let Some(email) = session.get::<String>(SESSION_AUTH_EMAIL) else {
        return Ok(Redirect::to("/login").into_response());
    };
    let page = templates::render("verify.html", context! { email => email, error => "" })?;
    Ok(Html(page).into_response())
}

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(default)]
    pub code: String,
}

/// Compare the submitted code against the user row. The store column is
/// numeric, so the comparison runs on the zero-padded form.
pub async fn verify_code(
    State(state): State<HtmlState>,
    session: HtmlSession,
    Form(params): Form<VerifyParams>,
) -> Result<impl IntoResponse, HtmlError> {
    let Some(email) = session.get::<String>(SESSION_AUTH_EMAIL) else {
        return Ok(Redirect::to("/login").into_response());
    };

    let user = state.gateway.find_user_by_email(&email).await?;
    let verified = user
        .as_ref()
        .is_some_and(|user| user.code_matches(&params.code));

    match (verified, user) {
        (true, Some(user)) => {
            info!(user_id = user.record_id, "user signed in");
            session.set(SESSION_USER_ID, user.record_id);
            session.set(SESSION_USER_EMAIL, user.email);
            session.set(SESSION_LAST_ACTIVITY, Utc::now().to_rfc3339());
            session.remove(SESSION_AUTH_EMAIL);
            Ok(Redirect::to("/").into_response())
        }
        _ => {
            warn!(email = %email, "verification code mismatch");
            let page = templates::render(
                "verify.html",
                context! { email => email, error => "Invalid code. Please try again." },
            )?;
            Ok(Html(page).into_response())
        }
    }
}

pub async fn logout(session: HtmlSession) -> impl IntoResponse {
    clear_session(&session);
    Redirect::to("/login")
}
