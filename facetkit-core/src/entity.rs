//! Entity hierarchy and primary-key sizing
//!
//! Entities may be nested (a containing entity holds sub-entities). Each
//! entity that defines a key contributes one segment to a facet's `pkeys`.
//! The hierarchy itself is owned by the caller; facets only hold
//! `Arc<Entity>` references.

use crate::error::{FacetError, FacetResult};
use std::sync::Arc;

/// Ordered group of facets shown together as tabs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetGroup {
    pub name: String,
    /// Label template; `${primary_key}` is substituted at load time
    pub label: Option<String>,
    facets: Vec<String>,
}

impl FacetGroup {
    pub fn new(name: impl Into<String>, label: Option<String>) -> Self {
        Self {
            name: name.into(),
            label,
            facets: Vec::new(),
        }
    }

    /// Add a facet; re-adding an existing name keeps its position
    pub fn add_facet(&mut self, facet: impl Into<String>) {
        let facet = facet.into();
        if !self.facets.contains(&facet) {
            self.facets.push(facet);
        }
    }

    pub fn with_facet(mut self, facet: impl Into<String>) -> Self {
        self.add_facet(facet);
        self
    }

    pub fn facets(&self) -> &[String] {
        &self.facets
    }

    pub fn get_facet(&self, name: &str) -> Option<&str> {
        self.facets.iter().find(|f| *f == name).map(String::as_str)
    }

    pub fn get_facet_index(&self, name: &str) -> Option<usize> {
        self.facets.iter().position(|f| f == name)
    }

    pub fn get_facet_by_index(&self, index: usize) -> Option<&str> {
        self.facets.get(index).map(String::as_str)
    }

    pub fn get_facet_count(&self) -> usize {
        self.facets.len()
    }
}

/// A resource type in the console, possibly nested in another entity
#[derive(Debug, Clone)]
pub struct Entity {
    pub name: String,
    /// Whether this entity contributes one pkey segment
    pub defines_key: bool,
    /// Attribute holding the primary key in records
    pub primary_key: String,
    /// Facet to fall back to when this entity becomes unusable
    pub redirect_facet: Option<String>,
    /// Whether records carry membership attributes
    pub has_members: bool,
    pub facet_groups: Vec<FacetGroup>,
    containing: Option<Arc<Entity>>,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            defines_key: true,
            primary_key: "cn".to_string(),
            redirect_facet: Some("search".to_string()),
            has_members: false,
            facet_groups: Vec::new(),
            containing: None,
        }
    }

    pub fn contained_in(mut self, parent: Arc<Entity>) -> Self {
        self.containing = Some(parent);
        self
    }

    pub fn with_defines_key(mut self, defines_key: bool) -> Self {
        self.defines_key = defines_key;
        self
    }

    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    pub fn with_redirect_facet(mut self, facet: Option<String>) -> Self {
        self.redirect_facet = facet;
        self
    }

    pub fn with_members(mut self, has_members: bool) -> Self {
        self.has_members = has_members;
        self
    }

    pub fn with_facet_group(mut self, group: FacetGroup) -> Self {
        self.facet_groups.push(group);
        self
    }

    pub fn containing_entity(&self) -> Option<&Arc<Entity>> {
        self.containing.as_ref()
    }

    /// This entity followed by each containing entity, innermost first
    pub fn ancestors(&self) -> impl Iterator<Item = &Entity> {
        std::iter::successors(Some(self), |e| e.containing.as_deref())
    }

    /// The outermost containing entity (self when top-level)
    pub fn top_level(&self) -> &Entity {
        self.ancestors().last().unwrap_or(self)
    }

    /// Number of pkey segments this entity's path carries
    pub fn key_capacity(&self) -> usize {
        self.ancestors().filter(|e| e.defines_key).count()
    }

    pub fn facet_group(&self, name: &str) -> Option<&FacetGroup> {
        self.facet_groups.iter().find(|g| g.name == name)
    }
}

/// Key capacity for an optional owning entity
pub fn key_capacity(entity: Option<&Entity>) -> usize {
    entity.map(Entity::key_capacity).unwrap_or(0)
}

/// Merge supplied pkeys over current ones into a list of exactly `capacity` keys
///
/// Both lists are right-aligned against the capacity: supplied keys win,
/// current keys fill the remaining leading slots, and anything still
/// missing is an empty string.
pub fn merge_pkeys(capacity: usize, current: &[String], supplied: &[String]) -> FacetResult<Vec<String>> {
    let too_many = supplied.len().max(current.len());
    if too_many > capacity {
        return Err(FacetError::TooManyKeys {
            supplied: too_many,
            capacity,
        });
    }

    let supplied_from = capacity - supplied.len();
    let current_from = capacity - current.len();

    let keys = (0..capacity)
        .map(|i| {
            if i >= supplied_from {
                supplied[i - supplied_from].clone()
            } else if i >= current_from {
                current[i - current_from].clone()
            } else {
                String::new()
            }
        })
        .collect();

    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn nested() -> Entity {
        let zone = Arc::new(Entity::new("dnszone").with_primary_key("idnsname"));
        Entity::new("dnsrecord").contained_in(zone)
    }

    #[test]
    fn test_key_capacity_counts_defining_ancestors() {
        assert_eq!(Entity::new("user").key_capacity(), 1);
        assert_eq!(nested().key_capacity(), 2);

        let keyless = Arc::new(Entity::new("config").with_defines_key(false));
        assert_eq!(Entity::new("item").contained_in(keyless).key_capacity(), 1);
        assert_eq!(key_capacity(None), 0);
    }

    #[test]
    fn test_top_level() {
        assert_eq!(nested().top_level().name, "dnszone");
        assert_eq!(Entity::new("user").top_level().name, "user");
    }

    #[test]
    fn test_merge_pads_front() {
        assert_eq!(merge_pkeys(2, &[], &keys(&["www"])).unwrap(), keys(&["", "www"]));
        assert_eq!(merge_pkeys(3, &[], &[]).unwrap(), keys(&["", "", ""]));
    }

    #[test]
    fn test_merge_keeps_current_prefix() {
        let current = keys(&["example.com", "www"]);
        assert_eq!(
            merge_pkeys(2, &current, &keys(&["mail"])).unwrap(),
            keys(&["example.com", "mail"])
        );
        assert_eq!(merge_pkeys(2, &current, &[]).unwrap(), current);
    }

    #[test]
    fn test_merge_rejects_too_many() {
        let err = merge_pkeys(1, &[], &keys(&["a", "b"])).unwrap_err();
        assert_eq!(
            err,
            FacetError::TooManyKeys {
                supplied: 2,
                capacity: 1
            }
        );
        assert!(merge_pkeys(0, &[], &keys(&["a"])).is_err());
    }

    #[test]
    fn test_facet_group_lookup() {
        let group = FacetGroup::new("member", Some("${primary_key} members".into()))
            .with_facet("member_user")
            .with_facet("member_group")
            .with_facet("member_user");

        assert_eq!(group.get_facet_count(), 2);
        assert_eq!(group.get_facet_index("member_group"), Some(1));
        assert_eq!(group.get_facet_by_index(0), Some("member_user"));
        assert!(group.get_facet("memberof").is_none());
    }
}
