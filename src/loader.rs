//! Rule file loading. YAML and JSON both parse, JSON being a subset of YAML.

use std::path::Path;

use omerotag_core::{Error, Result};
use omerotag_rules::RuleRecord;

pub fn load_rule_records(path: &Path) -> Result<Vec<RuleRecord>> {
    let content = std::fs::read_to_string(path)?;
    let records = parse_rule_records(&content)
        .map_err(|e| Error::compile(format!("rule file {}: {}", path.display(), e)))?;
    if records.is_empty() {
        tracing::warn!("Rule file {} holds no rules", path.display());
    } else {
        tracing::info!("Loaded {} rule records from {}", records.len(), path.display());
    }
    Ok(records)
}

/// An empty document is an empty rule set.
pub fn parse_rule_records(content: &str) -> std::result::Result<Vec<RuleRecord>, serde_yaml::Error> {
    let records: Option<Vec<RuleRecord>> = serde_yaml::from_str(content)?;
    Ok(records.unwrap_or_default())
}
