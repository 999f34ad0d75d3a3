use std::sync::Arc;

use releasekeeper_core::{AcquisitionJob, Config, DiscoveryJob, SanitizedConfig, Supervisor};

/// Shared application state
pub struct AppState {
    config: Config,
    discovery: Arc<DiscoveryJob>,
    acquisition: Arc<AcquisitionJob>,
    supervisor: Supervisor,
}

impl AppState {
    pub fn new(
        config: Config,
        discovery: Arc<DiscoveryJob>,
        acquisition: Arc<AcquisitionJob>,
        supervisor: Supervisor,
    ) -> Self {
        Self {
            config,
            discovery,
            acquisition,
            supervisor,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn discovery(&self) -> &DiscoveryJob {
        &self.discovery
    }

    pub fn acquisition(&self) -> &AcquisitionJob {
        &self.acquisition
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }
}
