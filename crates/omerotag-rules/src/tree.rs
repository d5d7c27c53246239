//! Path tree: the merged trie of every attribute path and name-rule object type.

use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathTree {
    children: BTreeMap<String, PathTree>,
}

impl PathTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a path in segment by segment, reusing existing branches.
    pub fn insert_path<S: AsRef<str>>(&mut self, path: &[S]) {
        let mut node = self;
        for segment in path {
            node = node.children.entry(segment.as_ref().to_string()).or_default();
        }
    }

    /// Make sure a root exists for `kind`.
    pub fn ensure_root(&mut self, kind: &str) {
        self.children.entry(kind.to_string()).or_default();
    }

    pub fn get(&self, segment: &str) -> Option<&PathTree> {
        self.children.get(segment)
    }

    pub fn contains_path<S: AsRef<str>>(&self, path: &[S]) -> bool {
        let mut node = self;
        for segment in path {
            match node.children.get(segment.as_ref()) {
                Some(next) => node = next,
                None => return false,
            }
        }
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PathTree)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(|k| k.as_str())
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Nodes below this one, at every depth.
    pub fn node_count(&self) -> usize {
        self.children.values().map(|c| 1 + c.node_count()).sum()
    }

    /// Indented outline, one segment per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out, 0);
        out
    }

    fn render_into(&self, out: &mut String, depth: usize) {
        for (segment, child) in &self.children {
            out.push_str(&"  ".repeat(depth));
            out.push_str(segment);
            out.push('\n');
            child.render_into(out, depth + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_prefixes_share_nodes() {
        let mut tree = PathTree::new();
        tree.insert_path(&["slide", "image", "sizeX"]);
        tree.insert_path(&["slide", "image", "sizeY"]);
        assert_eq!(tree.node_count(), 4);
        assert_eq!(tree.segments().collect::<Vec<_>>(), vec!["slide"]);
    }

    #[test]
    fn ensure_root_does_not_clobber() {
        let mut tree = PathTree::new();
        tree.insert_path(&["slide", "image", "sizeX"]);
        tree.ensure_root("slide");
        tree.ensure_root("dataset");
        assert!(tree.contains_path(&["slide", "image", "sizeX"]));
        assert!(tree.get("dataset").unwrap().is_leaf());
        assert_eq!(tree.node_count(), 4);
    }

    #[test]
    fn render_indents_by_depth() {
        let mut tree = PathTree::new();
        tree.insert_path(&["slide", "image", "sizeX"]);
        assert_eq!(tree.render(), "slide\n  image\n    sizeX\n");
    }
}
