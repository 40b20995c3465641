//! Group reconcile target.

use crate::error::{ArgumentError, KanidmResult};

/// Declarative description of a group.
#[derive(Debug, Clone)]
pub struct GroupSpec {
    /// Group name.
    pub name: String,
    /// Optional managing group, written as the entry's managed-by
    /// back-reference at creation time.
    pub parent: Option<String>,
    /// Full member list; membership is set wholesale, not incrementally.
    pub users: Vec<String>,
}

impl GroupSpec {
    /// Create a group spec.
    pub fn new(name: impl Into<String>) -> KanidmResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(ArgumentError::MissingRequired { field: "name" }.into());
        }
        Ok(Self {
            name,
            parent: None,
            users: Vec::new(),
        })
    }

    /// Set the managing parent group.
    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Set the member list.
    pub fn users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.users = users.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_parent_and_users() {
        let spec = GroupSpec::new("team")
            .unwrap()
            .parent("idm_admins")
            .users(["u1", "u2"]);
        assert_eq!(spec.name, "team");
        assert_eq!(spec.parent.as_deref(), Some("idm_admins"));
        assert_eq!(spec.users, vec!["u1", "u2"]);
    }

    #[test]
    fn empty_name_rejected() {
        assert!(GroupSpec::new("").is_err());
    }
}
