use std::sync::Arc;

use cohort_orchestrator::{CohortService, JsonFileGateway};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::{build_permissive_router, build_router};

/// HTTP host for one [`CohortService`].
pub struct CohortServer {
    config: ServerConfig,
    service: Arc<CohortService>,
}

impl CohortServer {
    /// A server over in-memory state, reading cohort files from disk.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let service = CohortService::in_memory(
            Arc::new(JsonFileGateway::new()),
            config.pipeline.clone(),
            config.reference(),
        )?;
        Ok(Self::with_service(config, Arc::new(service)))
    }

    pub fn with_service(config: ServerConfig, service: Arc<CohortService>) -> Self {
        Self { config, service }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn service(&self) -> &Arc<CohortService> {
        &self.service
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        let service = Arc::clone(&self.service);
        if self.config.permissive_cors {
            build_permissive_router(service)
        } else {
            build_router(service)
        }
    }

    /// Start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        info!(addr = %self.config.bind_addr, "cohort server listening");
        axum::serve(listener, app)
            .await
            .map_err(ServerError::Io)
    }
}
