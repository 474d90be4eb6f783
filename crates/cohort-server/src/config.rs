use std::net::SocketAddr;
use std::path::Path;

use cohort_orchestrator::PipelineConfig;
use cohort_types::{GpPractice, ReferenceData};
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Server configuration, loadable from TOML.
///
/// ```toml
/// bind_addr = "0.0.0.0:8080"
/// gp_practices = ["Q12345"]
///
/// [pipeline]
/// max_concurrent_records = 64
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Start from the standard test practices.
    pub seed_reference: bool,
    /// Extra practice codes registered at startup.
    pub gp_practices: Vec<String>,
    /// Answer cross-origin requests from any origin.
    pub permissive_cors: bool,
    pub pipeline: PipelineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            seed_reference: true,
            gp_practices: Vec::new(),
            permissive_cors: false,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))?;
        config
            .pipeline
            .check()
            .map_err(|e| ServerError::Config(e.to_string()))?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path.as_ref())?)
    }

    /// Reference data the service starts with.
    pub fn reference(&self) -> ReferenceData {
        let mut reference = if self.seed_reference {
            ReferenceData::seeded()
        } else {
            ReferenceData::new()
        };
        reference.extend(self.gp_practices.iter().map(GpPractice::new));
        reference
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert!(c.seed_reference);
        assert!(!c.permissive_cors);
        assert!(c.reference().has_practice("GP001"));
    }

    #[test]
    fn toml_overrides() {
        let c = ServerConfig::from_toml_str(
            r#"
            bind_addr = "0.0.0.0:9000"
            seed_reference = false
            gp_practices = ["Q12345"]

            [pipeline]
            max_concurrent_records = 4
            "#,
        )
        .unwrap();
        assert_eq!(c.bind_addr.port(), 9000);
        assert_eq!(c.pipeline.max_concurrent_records, 4);
        let reference = c.reference();
        assert!(reference.has_practice("Q12345"));
        assert!(!reference.has_practice("GP001"));
    }

    #[test]
    fn invalid_pipeline_is_rejected() {
        assert!(matches!(
            ServerConfig::from_toml_str("[pipeline]\nmax_concurrent_records = 0"),
            Err(ServerError::Config(_))
        ));
        assert!(matches!(
            ServerConfig::from_toml_str("bind_addr = \"nowhere\""),
            Err(ServerError::Config(_))
        ));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");
        std::fs::write(&path, "permissive_cors = true\n").unwrap();
        assert!(ServerConfig::load(&path).unwrap().permissive_cors);
    }
}
