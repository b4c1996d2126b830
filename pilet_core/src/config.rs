//! Loader configuration and load plans.
//!
//! A load plan is a TOML document describing how the host activates pilets
//! and which pilets it registers:
//!
//! ```toml
//! [loader]
//! lazy = false
//! capabilities = ["load", "language"]
//!
//! [[pilets]]
//! name = "shell"
//! priority = 10
//! references = ["https://cdn/shell/_framework/Shell.dll"]
//! ```

use crate::dependency_manager::PiletManifest;
use crate::host::{HostBootstrap, HostCapabilities};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),
}

/// How the host activates pilets and what it supports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Defer every load until the host asks for it
    #[serde(default)]
    pub lazy: bool,

    /// Capability flags the host reports once ready
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl LoaderConfig {
    pub fn host_capabilities(&self) -> HostCapabilities {
        self.capabilities.iter().cloned().collect()
    }

    /// A bootstrap that is already complete.
    pub fn bootstrap(&self) -> HostBootstrap {
        HostBootstrap::ready(self.lazy, self.host_capabilities())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadPlan {
    #[serde(default)]
    pub loader: LoaderConfig,

    #[serde(default)]
    pub pilets: Vec<PiletManifest>,
}

impl LoadPlan {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let plan: LoadPlan = toml::from_str(content)?;
        plan.validate()?;
        Ok(plan)
    }

    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).await?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pilets.is_empty() {
            return Err(ConfigError::InvalidPlan("plan declares no pilets".to_string()));
        }

        let isolated = self.loader.host_capabilities().isolated_load();
        for pilet in &self.pilets {
            pilet.validate().map_err(ConfigError::InvalidPlan)?;

            if isolated && !pilet.has_module_reference() {
                return Err(ConfigError::InvalidPlan(format!(
                    "Pilet {} has no module reference to load as a bundle",
                    pilet.name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const PLAN: &str = r#"
        [loader]
        lazy = true
        capabilities = ["load", "dependency-symbols"]

        [[pilets]]
        name = "shell"
        version = "1.0.0"
        priority = 10
        references = [
            "https://cdn/shell/_framework/Shell.dll",
            "https://cdn/shell/_framework/Shell.pdb",
        ]

        [[pilets]]
        name = "catalog"
        references = ["https://cdn/catalog/_framework/Catalog.dll"]
        config = { pageSize = 20 }
    "#;

    #[test]
    fn test_parse_plan() {
        let plan = LoadPlan::from_toml_str(PLAN).unwrap();
        assert!(plan.loader.lazy);
        assert!(plan.loader.host_capabilities().dependency_symbols());
        assert_eq!(plan.pilets.len(), 2);
        assert_eq!(plan.pilets[0].clamped_priority(), 10);
        assert_eq!(plan.pilets[1].config.as_ref().unwrap()["pageSize"], 20);
    }

    #[test]
    fn test_bundle_plan_requires_modules() {
        let result = LoadPlan::from_toml_str(
            r#"
            [loader]
            capabilities = ["load"]

            [[pilets]]
            name = "docs"
            references = ["docs.pdb"]
            "#,
        );
        assert!(matches!(result, Err(ConfigError::InvalidPlan(_))));
    }

    #[test]
    fn test_empty_plan() {
        let result = LoadPlan::from_toml_str("[loader]\nlazy = false\n");
        assert!(matches!(result, Err(ConfigError::InvalidPlan(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let result = LoadPlan::from_toml_str("[[pilets]\nname = ");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[tokio::test]
    async fn test_plan_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", PLAN).unwrap();

        let plan = LoadPlan::from_file(file.path()).await.unwrap();
        assert_eq!(plan.pilets[0].name, "shell");

        let missing = LoadPlan::from_file(file.path().with_extension("missing")).await;
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
