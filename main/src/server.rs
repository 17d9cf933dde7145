use std::sync::Arc;

use api_router::{api_routes_v1, api_state::ApiState};
use axum::{extract::FromRef, Router};
use axum_session::{SessionConfig, SessionLayer, SessionNullPool, SessionStore};
use common::{
    store::client::{HttpRecordStore, RecordStore},
    utils::config::get_config,
};
use html_router::{html_routes, html_state::HtmlState};
use job_pipeline::{
    controller::JobLifecycleController,
    dispatch::{DispatchClient, HttpWebhookClient, WebhookClient},
    gateway::JobStoreGateway,
};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    // Get config
    let config = get_config()?;

    // Wire the job pipeline: store gateway, webhook dispatch, lifecycle
    // controller. All durable state lives in the external record store.
    let store: Arc<dyn RecordStore> = Arc::new(HttpRecordStore::new(&config)?);
    let gateway = Arc::new(JobStoreGateway::new(store, &config));
    let webhook: Arc<dyn WebhookClient> = Arc::new(HttpWebhookClient::new());
    let dispatch = DispatchClient::new(Arc::clone(&webhook), Arc::clone(&gateway), &config);
    let controller = Arc::new(JobLifecycleController::new(
        Arc::clone(&gateway),
        dispatch.clone(),
    ));

    // Browser sessions are in-process; signing in again after a restart is
    // acceptable for this surface.
    let session_store = SessionStore::<SessionNullPool>::new(
        None,
        SessionConfig::default().with_table_name("session"),
    )
    .await?;

    let api_state = ApiState::new(Arc::clone(&controller), dispatch.clone(), config.clone());
    let html_state = HtmlState::new(gateway, controller, dispatch, webhook, config.clone());

    // Create Axum router
    let app = Router::new()
        .nest("/api/v1", api_routes_v1(&api_state))
        .merge(html_routes(&html_state))
        .layer(SessionLayer::new(session_store))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState {
            api_state,
            html_state,
        });

    let serve_address = format!("0.0.0.0:{}", config.http_port);
    info!("Starting server listening on {serve_address}");
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Clone, FromRef)]
struct AppState {
    api_state: ApiState,
    html_state: HtmlState,
}
