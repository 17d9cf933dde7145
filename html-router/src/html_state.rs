use std::sync::Arc;

use common::utils::config::AppConfig;
use job_pipeline::{
    controller::JobLifecycleController,
    dispatch::{DispatchClient, WebhookClient},
    gateway::JobStoreGateway,
};

#[derive(Clone)]
pub struct HtmlState {
    pub gateway: Arc<JobStoreGateway>,
    pub controller: Arc<JobLifecycleController>,
    pub dispatch: DispatchClient,
    /// Used directly for the auth email webhook, which is outside the job
    /// dispatch targets.
    pub webhook: Arc<dyn WebhookClient>,
    pub config: AppConfig,
}

impl HtmlState {
    pub fn new(
        gateway: Arc<JobStoreGateway>,
        controller: Arc<JobLifecycleController>,
        dispatch: DispatchClient,
        webhook: Arc<dyn WebhookClient>,
        config: AppConfig,
    ) -> Self {
        Self {
            gateway,
            controller,
            dispatch,
            webhook,
            config,
        }
    }
}
