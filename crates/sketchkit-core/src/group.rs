//! Named element groups.
//!
//! A [`Group`] owns its membership list; an element's `group_id` is only a weak
//! back-reference. Stale member ids are tolerated and filtered on read.

use crate::element::{Element, ElementId, ElementPatch};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for groups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A persistent, named set of elements that move and transform together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    /// Ordered, duplicate-free member ids.
    pub element_ids: Vec<ElementId>,
    pub name: String,
}

impl Group {
    /// Create a group; duplicate member ids are dropped.
    pub fn new(
        id: GroupId,
        name: impl Into<String>,
        element_ids: impl IntoIterator<Item = ElementId>,
    ) -> Self {
        let mut seen = HashSet::new();
        let element_ids = element_ids.into_iter().filter(|id| seen.insert(id.clone())).collect();
        Self {
            id,
            element_ids,
            name: name.into(),
        }
    }

    /// Whether `id` is listed as a member.
    pub fn contains(&self, id: &ElementId) -> bool {
        self.element_ids.contains(id)
    }
}

/// Registry of all groups in a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupRegistry {
    groups: Vec<Group>,
}

impl GroupRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether no groups are registered.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Look up a group by id.
    pub fn get(&self, id: &GroupId) -> Option<&Group> {
        self.groups.iter().find(|g| &g.id == id)
    }

    /// Iterate groups in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter()
    }

    /// Register a group and return the patches that point its members at it.
    ///
    /// Members are removed from any group they previously belonged to.
    pub fn create(&mut self, group: Group) -> Vec<ElementPatch> {
        for existing in &mut self.groups {
            existing.element_ids.retain(|id| !group.element_ids.contains(id));
        }
        self.groups.retain(|g| !g.element_ids.is_empty());

        let patches = group
            .element_ids
            .iter()
            .map(|id| ElementPatch::new(id.clone()).with_group(Some(group.id.clone())))
            .collect();
        log::debug!("Created group {} with {} members", group.id, group.element_ids.len());
        self.groups.push(group);
        patches
    }

    /// Remove a group, returning it together with the patches that clear
    /// `group_id` on its members.
    pub fn delete(&mut self, id: &GroupId) -> Option<(Group, Vec<ElementPatch>)> {
        let index = self.groups.iter().position(|g| &g.id == id)?;
        let group = self.groups.remove(index);
        let patches = group
            .element_ids
            .iter()
            .map(|member| ElementPatch::new(member.clone()).with_group(None))
            .collect();
        log::debug!("Deleted group {}", group.id);
        Some((group, patches))
    }

    /// Members of a group that still exist in `elements`, in membership order.
    pub fn members<'a>(&self, id: &GroupId, elements: &'a [Element]) -> Vec<&'a Element> {
        let Some(group) = self.get(id) else {
            return Vec::new();
        };
        group
            .element_ids
            .iter()
            .filter_map(|member| elements.iter().find(|e| &e.id == member))
            .collect()
    }

    /// The group listing `element` as a member, if any.
    pub fn group_of(&self, element: &ElementId) -> Option<&Group> {
        self.groups.iter().find(|g| g.contains(element))
    }

    /// Drop member ids that no longer exist and groups left empty.
    pub fn prune(&mut self, elements: &[Element]) {
        let live: HashSet<&ElementId> = elements.iter().map(|e| &e.id).collect();
        for group in &mut self.groups {
            group.element_ids.retain(|id| live.contains(id));
        }
        let before = self.groups.len();
        self.groups.retain(|g| !g.element_ids.is_empty());
        if self.groups.len() != before {
            log::debug!("Pruned {} empty groups", before - self.groups.len());
        }
    }

    /// Rebuild membership from the elements' `group_id` back-references.
    ///
    /// Members are listed in element order. Groups already known keep their
    /// name; unknown ids get a group named after the id. Groups no element
    /// points at are dropped.
    pub fn rebuild_from_elements(&mut self, elements: &[Element]) {
        let mut rebuilt: Vec<Group> = Vec::new();
        for element in elements {
            let Some(group_id) = &element.group_id else {
                continue;
            };
            match rebuilt.iter_mut().find(|g| &g.id == group_id) {
                Some(group) => {
                    if !group.contains(&element.id) {
                        group.element_ids.push(element.id.clone());
                    }
                }
                None => {
                    let name = self
                        .get(group_id)
                        .map_or_else(|| group_id.to_string(), |g| g.name.clone());
                    rebuilt.push(Group::new(group_id.clone(), name, [element.id.clone()]));
                }
            }
        }
        log::debug!("Rebuilt {} groups from element back-references", rebuilt.len());
        self.groups = rebuilt;
    }

    /// Patches that make every element's `group_id` agree with this registry.
    ///
    /// Elements already consistent get no patch.
    pub fn back_reference_patches(&self, elements: &[Element]) -> Vec<ElementPatch> {
        elements
            .iter()
            .filter_map(|element| {
                let expected = self.group_of(&element.id).map(|g| g.id.clone());
                (element.group_id != expected)
                    .then(|| ElementPatch::new(element.id.clone()).with_group(expected))
            })
            .collect()
    }
}
