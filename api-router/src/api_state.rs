use std::sync::Arc;

use common::utils::config::AppConfig;
use job_pipeline::{controller::JobLifecycleController, dispatch::DispatchClient};

#[derive(Clone)]
pub struct ApiState {
    pub controller: Arc<JobLifecycleController>,
    pub dispatch: DispatchClient,
    pub config: AppConfig,
}

impl ApiState {
    pub fn new(
        controller: Arc<JobLifecycleController>,
        dispatch: DispatchClient,
        config: AppConfig,
    ) -> Self {
        Self {
            controller,
            dispatch,
            config,
        }
    }
}
