//! Name rules: capture values from an object's display name and format them into tags.

use omerotag_core::GraphObject;
use omerotag_rules::NameRule;

/// Everything before the first `.`.
pub fn strip_extension(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

/// Tags produced by `rules` for `obj`, in rule order. Duplicates from different rules
/// are kept.
pub fn match_name<'a>(obj: &dyn GraphObject, rules: impl IntoIterator<Item = &'a NameRule>) -> Vec<String> {
    let name = obj.name();
    let mut tags = Vec::new();
    for rule in rules {
        tags.extend(apply_rule(&name, rule));
    }
    tags
}

/// Every non-overlapping match of the capture pattern yields one tag, unless any value it
/// captured is blacklisted. Groups that did not participate capture an empty string.
fn apply_rule(name: &str, rule: &NameRule) -> Vec<String> {
    let subject = if rule.include_extension {
        name
    } else {
        strip_extension(name)
    };
    let groups = rule.groups();
    let mut tags = Vec::new();
    for caps in rule.capture.captures_iter(subject) {
        let values: Vec<&str> = (1..=groups)
            .map(|i| caps.get(i).map_or("", |m| m.as_str()))
            .collect();
        if let Some(hit) = values.iter().find(|v| rule.blacklist.contains(**v)) {
            tracing::debug!("{:?} in {:?} is blacklisted", hit, name);
            continue;
        }
        match rule.format.render(&values) {
            Ok(tag) => tags.push(tag),
            Err(e) => tracing::warn!("Name rule {} skipped for {:?}: {}", rule.capture, name, e),
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use omerotag_core::{ObjectId, Value};

    #[derive(Debug)]
    struct Named(&'static str);

    impl GraphObject for Named {
        fn id(&self) -> ObjectId {
            1
        }
        fn kind(&self) -> &str {
            "image"
        }
        fn name(&self) -> String {
            self.0.to_string()
        }
        fn field(&self, _name: &str) -> Option<Value> {
            None
        }
    }

    #[test]
    fn extension_stripped_by_default() {
        let rule = NameRule::builder(r"^(\d+)_(\w+)").format("{}-{}").build().unwrap();
        assert_eq!(match_name(&Named("42_cortex.tiff"), [&rule]), vec!["42-cortex"]);
    }

    #[test]
    fn extension_kept_on_request() {
        let rule = NameRule::builder(r"\.(\w+)$")
            .format("ext-{}")
            .include_extension(true)
            .build()
            .unwrap();
        assert_eq!(match_name(&Named("scan.ome.tiff"), [&rule]), vec!["ext-tiff"]);
        let stripped = NameRule::builder(r"\.(\w+)$").format("ext-{}").build().unwrap();
        assert!(match_name(&Named("scan.ome.tiff"), [&stripped]).is_empty());
    }

    #[test]
    fn every_match_yields_a_tag() {
        let rule = NameRule::builder(r"([A-Z]\d)").build().unwrap();
        assert_eq!(match_name(&Named("A1_B2_C3"), [&rule]), vec!["A1", "B2", "C3"]);
    }

    #[test]
    fn blacklist_is_per_match() {
        let rule = NameRule::builder(r"([a-z]+)")
            .blacklist(["skip"])
            .build()
            .unwrap();
        assert_eq!(match_name(&Named("skip-ok"), [&rule]), vec!["ok"]);
    }

    #[test]
    fn blacklisted_value_rejects_whole_tuple() {
        let rule = NameRule::builder(r"(\w)(\d)")
            .format("{}{}")
            .blacklist(["1"])
            .build()
            .unwrap();
        assert_eq!(match_name(&Named("a1 b2"), [&rule]), vec!["b2"]);
    }

    #[test]
    fn no_match_no_tags() {
        let rule = NameRule::builder(r"^(P\d+)_").build().unwrap();
        assert!(match_name(&Named("sample.svs"), [&rule]).is_empty());
    }

    #[test]
    fn duplicates_from_distinct_rules_survive() {
        let a = NameRule::builder(r"^(\w+)_").build().unwrap();
        let b = NameRule::builder(r"^(\w+?)_").build().unwrap();
        assert_eq!(match_name(&Named("P7_x"), [&a, &b]), vec!["P7", "P7"]);
    }

    #[test]
    fn optional_group_captures_empty() {
        let rule = NameRule::builder(r"(x)?(\d)").format("[{}{}]").build().unwrap();
        assert_eq!(match_name(&Named("x1 2"), [&rule]), vec!["[x1]", "[2]"]);
    }
}
