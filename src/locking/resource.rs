use std::fmt;

/// The name of a resource in the `database -> table -> page -> row`
/// hierarchy (or any depth callers choose — the manager itself is agnostic
/// to what a segment represents). Segments are ordered root-first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceName {
    segments: Vec<String>,
}

impl ResourceName {
    /// The single database-level root resource.
    pub fn root() -> Self {
        ResourceName {
            segments: vec!["database".to_string()],
        }
    }

    /// Builds a resource name from an explicit, root-first segment list.
    /// Panics if `segments` is empty — every resource has at least a root.
    pub fn from_segments(segments: Vec<String>) -> Self {
        assert!(!segments.is_empty(), "resource name must have at least one segment");
        ResourceName { segments }
    }

    /// A child resource one level below `self`.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        ResourceName { segments }
    }

    /// The parent resource, or `None` if this is the root.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() <= 1 {
            return None;
        }
        Some(ResourceName {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Ancestors from the immediate parent up to (and including) the root,
    /// nearest first.
    pub fn ancestors(&self) -> Vec<ResourceName> {
        let mut out = Vec::new();
        let mut cur = self.parent();
        while let Some(name) = cur {
            cur = name.parent();
            out.push(name);
        }
        out
    }

    /// Whether `self` is a (strict or non-strict) descendant of `other`.
    pub fn is_descendant_of(&self, other: &ResourceName) -> bool {
        self.segments.len() >= other.segments.len()
            && self.segments[..other.segments.len()] == other.segments[..]
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn last_segment(&self) -> &str {
        self.segments.last().expect("resource name is never empty")
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(parts: &[&str]) -> ResourceName {
        ResourceName::from_segments(parts.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn parent_of_root_is_none() {
        assert_eq!(ResourceName::root().parent(), None);
    }

    #[test]
    fn child_then_parent_roundtrips() {
        let db = ResourceName::root();
        let table = db.child("orders");
        assert_eq!(table.parent().unwrap(), db);
    }

    #[test]
    fn ancestors_are_nearest_first() {
        let db = ResourceName::root();
        let table = db.child("orders");
        let page = table.child("page-3");
        let row = page.child("row-12");

        assert_eq!(row.ancestors(), vec![page.clone(), table.clone(), db.clone()]);
    }

    #[test]
    fn descendant_check() {
        let db = ResourceName::root();
        let table = db.child("orders");
        let row = table.child("page-1").child("row-1");

        assert!(row.is_descendant_of(&table));
        assert!(row.is_descendant_of(&db));
        assert!(!table.is_descendant_of(&row));
        assert!(name(&["database"]).is_descendant_of(&name(&["database"])));
    }
}
