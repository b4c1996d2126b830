use super::{clamp_priority, references::is_module_reference, DEFAULT_PILET_NAME};
use crate::host::Satellites;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Partial pilet metadata handed to the load coordinator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PiletMetadata {
    /// The name of the pilet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// The version of the pilet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Configuration forwarded to isolated bundles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,

    /// Explicit base url, overriding the one derived from the module url
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
}

impl PiletMetadata {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    /// Name used in logs and descriptors
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_PILET_NAME)
    }
}

/// A pilet as declared in a load plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PiletManifest {
    /// The name of the pilet
    pub name: String,

    /// The version of the pilet
    #[serde(default)]
    pub version: Option<String>,

    /// Load priority; higher priorities finish first
    #[serde(default)]
    pub priority: i64,

    /// Module, symbol and other resource urls shipped by the pilet
    #[serde(default)]
    pub references: Vec<String>,

    #[serde(default)]
    pub base_path: Option<String>,

    #[serde(default)]
    pub config: Option<Value>,

    /// Locale resources
    #[serde(default)]
    pub satellites: Option<Satellites>,
}

impl PiletManifest {
    pub fn new(name: impl Into<String>, references: Vec<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            priority: 0,
            references,
            base_path: None,
            config: None,
            satellites: None,
        }
    }

    /// Validate the manifest
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("Pilet name cannot be empty".to_string());
        }
        if self.references.is_empty() {
            return Err(format!("Pilet {} declares no references", self.name));
        }
        if self.references.iter().any(|r| r.trim().is_empty()) {
            return Err(format!("Pilet {} declares an empty reference", self.name));
        }
        Ok(())
    }

    pub fn has_module_reference(&self) -> bool {
        self.references.iter().any(|r| is_module_reference(r))
    }

    pub fn clamped_priority(&self) -> u32 {
        clamp_priority(self.priority)
    }

    pub fn metadata(&self) -> PiletMetadata {
        PiletMetadata {
            name: Some(self.name.clone()),
            version: self.version.clone(),
            config: self.config.clone(),
            base_path: self.base_path.clone(),
        }
    }
}
