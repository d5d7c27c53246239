//! Accessor aliases loaded from a YAML file and installed into the capability registry.
//!
//! ```yaml
//! image:
//!   getStain: stainName
//! ```
//!
//! registers `getStain` on `image`, reading the object's `stainName` field.

use std::collections::BTreeMap;
use std::path::Path;

use omerotag_core::{CapabilityExtension, CapabilityRegistry, Error, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AliasExtension {
    label: String,
    aliases: BTreeMap<String, BTreeMap<String, String>>,
}

impl AliasExtension {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut ext = Self::parse(&content)
            .map_err(|e| Error::compile(format!("extension file {}: {}", path.display(), e)))?;
        ext.label = path.display().to_string();
        Ok(ext)
    }

    pub fn parse(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        let aliases = serde_yaml::from_str(yaml)?;
        Ok(Self {
            label: "inline".into(),
            aliases,
        })
    }

    pub fn len(&self) -> usize {
        self.aliases.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CapabilityExtension for AliasExtension {
    fn name(&self) -> &str {
        &self.label
    }

    fn install(&self, registry: &mut CapabilityRegistry) -> Result<()> {
        for (kind, methods) in &self.aliases {
            for (method, field) in methods {
                if !method.starts_with("get") && !method.starts_with("list") {
                    return Err(Error::compile(format!(
                        "accessor alias {}.{} must start with get or list",
                        kind, method
                    )));
                }
                registry.register_field(kind, method, field);
            }
        }
        Ok(())
    }
}
