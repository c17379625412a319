//! Dot-namespaced staff permissions.
//!
//! Permission names look like `orders.edit`: a namespace followed by an
//! action. A set can also hold wildcards, either `orders.*` for every action
//! in a namespace or the bare `*` which grants everything.

use core::fmt;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Every permission the application checks, in catalog order.
pub const CATALOG: &[&str] = &[
    "leads.view",
    "leads.create",
    "leads.edit",
    "leads.delete",
    "orders.view",
    "orders.create",
    "orders.edit",
    "orders.delete",
    "products.view",
    "products.create",
    "products.edit",
    "products.delete",
    "products.import",
    "products.export",
    "invoices.print",
    "users.view",
    "users.manage",
    "roles.manage",
];

/// Errors from [`PermissionName::parse`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PermissionError {
    #[error("permission name cannot be empty")]
    Empty,
    #[error("permission must look like namespace.action")]
    MissingNamespace,
    #[error("permission segments may only contain a-z, 0-9 and _")]
    InvalidSegment,
    #[error("only the last permission segment may be a wildcard")]
    MisplacedWildcard,
}

/// A validated permission name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionName(String);

impl PermissionName {
    /// The wildcard granting every permission.
    pub const ALL: &'static str = "*";

    /// Parse a permission name.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionError`] when the name is empty, has a single
    /// segment, or contains characters other than lowercase ASCII letters,
    /// digits and underscores.
    pub fn parse(s: &str) -> Result<Self, PermissionError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PermissionError::Empty);
        }
        if s == Self::ALL {
            return Ok(Self(s.to_owned()));
        }

        let segments: Vec<&str> = s.split('.').collect();
        if segments.len() < 2 {
            return Err(PermissionError::MissingNamespace);
        }

        let last = segments.len() - 1;
        for (i, segment) in segments.iter().enumerate() {
            if *segment == "*" {
                if i != last {
                    return Err(PermissionError::MisplacedWildcard);
                }
                continue;
            }
            let valid = !segment.is_empty()
                && segment
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
            if !valid {
                return Err(PermissionError::InvalidSegment);
            }
        }

        Ok(Self(s.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Everything before the last dot (`orders` for `orders.edit`).
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.0.rsplit_once('.').map_or("", |(ns, _)| ns)
    }

    /// The last segment (`edit` for `orders.edit`, `*` for the global wildcard).
    #[must_use]
    pub fn action(&self) -> &str {
        self.0.rsplit_once('.').map_or(self.0.as_str(), |(_, action)| action)
    }

    /// Whether this name grants more than one permission.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.action() == "*"
    }

    /// Whether holding this permission grants `required`.
    #[must_use]
    pub fn grants(&self, required: &str) -> bool {
        if self.0 == Self::ALL || self.0 == required {
            return true;
        }
        self.is_wildcard()
            && required
                .strip_prefix(self.namespace())
                .is_some_and(|rest| rest.starts_with('.'))
    }
}

impl fmt::Display for PermissionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for PermissionName {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PermissionName {
    type Error = PermissionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PermissionName> for String {
    fn from(name: PermissionName) -> Self {
        name.0
    }
}

/// The set of permissions a staff user effectively holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<PermissionName>);

impl PermissionSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from raw strings, skipping anything that does not parse.
    ///
    /// Names come from the database, where they were validated on insert.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            names
                .into_iter()
                .filter_map(|n| PermissionName::parse(n.as_ref()).ok())
                .collect(),
        )
    }

    /// Union of the permissions granted through roles and those assigned
    /// directly to the user.
    #[must_use]
    pub fn effective(role_permissions: &Self, direct_permissions: &Self) -> Self {
        Self(
            role_permissions
                .0
                .union(&direct_permissions.0)
                .cloned()
                .collect(),
        )
    }

    pub fn insert(&mut self, name: PermissionName) -> bool {
        self.0.insert(name)
    }

    /// Whether any held permission grants `required`.
    #[must_use]
    pub fn allows(&self, required: &str) -> bool {
        self.0.iter().any(|held| held.grants(required))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|held| held.as_str() == name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PermissionName> {
        self.0.iter()
    }

    /// Names as plain strings, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }

    /// Permissions grouped by namespace, for rendering a checkbox matrix.
    #[must_use]
    pub fn grouped(&self) -> BTreeMap<String, Vec<String>> {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for name in &self.0 {
            groups
                .entry(name.namespace().to_owned())
                .or_default()
                .push(name.to_string());
        }
        groups
    }
}

impl FromIterator<PermissionName> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = PermissionName>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> PermissionSet {
        PermissionSet::from_names(names)
    }

    #[test]
    fn test_parse_valid_names() {
        assert!(PermissionName::parse("orders.edit").is_ok());
        assert!(PermissionName::parse("products.import").is_ok());
        assert!(PermissionName::parse("reports.sales_2024.view").is_ok());
        assert!(PermissionName::parse("orders.*").is_ok());
        assert!(PermissionName::parse("*").is_ok());
    }

    #[test]
    fn test_parse_invalid_names() {
        assert_eq!(PermissionName::parse(""), Err(PermissionError::Empty));
        assert_eq!(
            PermissionName::parse("orders"),
            Err(PermissionError::MissingNamespace)
        );
        assert_eq!(
            PermissionName::parse("Orders.Edit"),
            Err(PermissionError::InvalidSegment)
        );
        assert_eq!(
            PermissionName::parse("orders..edit"),
            Err(PermissionError::InvalidSegment)
        );
        assert_eq!(
            PermissionName::parse("orders.edit-all"),
            Err(PermissionError::InvalidSegment)
        );
        assert_eq!(
            PermissionName::parse("*.edit"),
            Err(PermissionError::MisplacedWildcard)
        );
    }

    #[test]
    fn test_namespace_and_action() {
        let name = PermissionName::parse("orders.edit").unwrap();
        assert_eq!(name.namespace(), "orders");
        assert_eq!(name.action(), "edit");

        let all = PermissionName::parse("*").unwrap();
        assert_eq!(all.namespace(), "");
        assert_eq!(all.action(), "*");
    }

    #[test]
    fn test_catalog_entries_are_valid() {
        for name in CATALOG {
            assert!(PermissionName::parse(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn test_allows_exact_match() {
        let perms = set(&["orders.view", "orders.edit"]);
        assert!(perms.allows("orders.edit"));
        assert!(!perms.allows("orders.delete"));
        assert!(!perms.allows("leads.edit"));
    }

    #[test]
    fn test_allows_namespace_wildcard() {
        let perms = set(&["products.*"]);
        assert!(perms.allows("products.import"));
        assert!(perms.allows("products.view"));
        assert!(!perms.allows("productsx.view"));
        assert!(!perms.allows("orders.view"));
    }

    #[test]
    fn test_allows_global_wildcard() {
        let perms = set(&["*"]);
        assert!(perms.allows("roles.manage"));
        assert!(perms.allows("anything.at.all"));
    }

    #[test]
    fn test_empty_set_allows_nothing() {
        assert!(!PermissionSet::new().allows("leads.view"));
    }

    #[test]
    fn test_effective_is_union() {
        let from_roles = set(&["leads.view", "leads.edit"]);
        let direct = set(&["orders.view", "leads.view"]);
        let effective = PermissionSet::effective(&from_roles, &direct);

        assert_eq!(effective.len(), 3);
        assert!(effective.allows("orders.view"));
        assert!(effective.allows("leads.edit"));
    }

    #[test]
    fn test_grouped_by_namespace() {
        let groups = set(&["orders.view", "leads.view", "orders.edit"]).grouped();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["orders"], vec!["orders.edit", "orders.view"]);
        assert_eq!(groups["leads"], vec!["leads.view"]);
    }

    #[test]
    fn test_from_names_skips_invalid() {
        let perms = set(&["orders.view", "NOT VALID"]);
        assert_eq!(perms.names(), vec!["orders.view"]);
    }
}
