use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Result;
use itertools::Itertools;
use parking_lot::{Mutex, RwLock};

use crate::error::ServiceError;
use crate::logic::code_allocator::{AllocatedCode, SequenceCursor};
use crate::model::{now, CatalogItem, Group, Id, ItemFilter, Subgroup};
use crate::store::traits::{CatalogItemStore, GroupStore, SequenceStore, Store, SubgroupStore};

#[derive(Debug, Default)]
struct State {
    groups: HashMap<Id, Group>,
    subgroups: HashMap<Id, Subgroup>,
    items: HashMap<Id, CatalogItem>,
    /// Item code -> item id; the in-memory stand-in for the unique index
    item_codes: HashMap<String, Id>,
}

impl State {
    /// Foreign-key check for an item's group and subgroup
    fn check_item_references(&self, item: &CatalogItem) -> Result<()> {
        let subgroup_missing = item
            .subgroup_id
            .as_ref()
            .is_some_and(|id| !self.subgroups.contains_key(id));
        if !self.groups.contains_key(&item.group_id) || subgroup_missing {
            return Err(ServiceError::InvalidInput(
                "Item references a missing group or subgroup".to_string(),
            )
            .into());
        }
        Ok(())
    }
}

/// Process-local store for development and tests.
///
/// Mirrors the PostgreSQL constraints: unique codes, item references to an
/// existing group and subgroup, subgroup cascade on group delete. Code
/// allocation takes one lock per subgroup so different subgroups never wait
/// on each other.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    sequence_locks: Mutex<HashMap<Id, Arc<Mutex<()>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sequence_lock(&self, subgroup_id: &Id) -> Arc<Mutex<()>> {
        self.sequence_locks
            .lock()
            .entry(subgroup_id.clone())
            .or_default()
            .clone()
    }
}

#[async_trait::async_trait]
impl GroupStore for MemoryStore {
    async fn get_group(&self, id: &Id) -> Result<Option<Group>> {
        Ok(self.state.read().groups.get(id).cloned())
    }

    async fn get_group_by_code(&self, code: &str) -> Result<Option<Group>> {
        Ok(self
            .state
            .read()
            .groups
            .values()
            .find(|g| g.code == code)
            .cloned())
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        Ok(self
            .state
            .read()
            .groups
            .values()
            .sorted_by(|a, b| a.code.cmp(&b.code))
            .cloned()
            .collect())
    }

    async fn insert_group(&self, group: Group) -> Result<()> {
        let mut state = self.state.write();
        if state.groups.values().any(|g| g.code == group.code) {
            return Err(ServiceError::Conflict(format!(
                "Group code '{}' already exists",
                group.code
            ))
            .into());
        }
        state.groups.insert(group.id.clone(), group);
        Ok(())
    }

    async fn delete_group(&self, id: &Id) -> Result<bool> {
        let mut state = self.state.write();
        if !state.groups.contains_key(id) {
            return Ok(false);
        }
        if state.items.values().any(|item| &item.group_id == id) {
            return Err(ServiceError::Conflict(format!(
                "Group '{}' still has catalog items",
                id
            ))
            .into());
        }

        state.groups.remove(id);
        let orphaned: Vec<Id> = state
            .subgroups
            .values()
            .filter(|s| &s.group_id == id)
            .map(|s| s.id.clone())
            .collect();
        for subgroup_id in &orphaned {
            state.subgroups.remove(subgroup_id);
        }
        drop(state);

        let mut locks = self.sequence_locks.lock();
        for subgroup_id in &orphaned {
            locks.remove(subgroup_id);
        }
        Ok(true)
    }
}

#[async_trait::async_trait]
impl SubgroupStore for MemoryStore {
    async fn get_subgroup(&self, id: &Id) -> Result<Option<Subgroup>> {
        Ok(self.state.read().subgroups.get(id).cloned())
    }

    async fn list_subgroups_for_group(&self, group_id: &Id) -> Result<Vec<Subgroup>> {
        Ok(self
            .state
            .read()
            .subgroups
            .values()
            .filter(|s| &s.group_id == group_id)
            .sorted_by(|a, b| a.code.cmp(&b.code))
            .cloned()
            .collect())
    }

    async fn insert_subgroup(&self, subgroup: Subgroup) -> Result<()> {
        let mut state = self.state.write();
        if !state.groups.contains_key(&subgroup.group_id) {
            return Err(ServiceError::InvalidInput(format!(
                "Group '{}' not found",
                subgroup.group_id
            ))
            .into());
        }
        if state
            .subgroups
            .values()
            .any(|s| s.group_id == subgroup.group_id && s.code == subgroup.code)
        {
            return Err(ServiceError::Conflict(format!(
                "Subgroup code '{}' already exists in this group",
                subgroup.code
            ))
            .into());
        }
        state.subgroups.insert(subgroup.id.clone(), subgroup);
        Ok(())
    }
}

#[async_trait::async_trait]
impl CatalogItemStore for MemoryStore {
    async fn get_item(&self, id: &Id) -> Result<Option<CatalogItem>> {
        Ok(self.state.read().items.get(id).cloned())
    }

    async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<CatalogItem>> {
        Ok(self
            .state
            .read()
            .items
            .values()
            .filter(|item| filter.matches(item))
            .sorted_by(|a, b| a.code.cmp(&b.code))
            .cloned()
            .collect())
    }

    async fn item_code_exists(&self, code: &str) -> Result<bool> {
        Ok(self.state.read().item_codes.contains_key(code))
    }

    async fn list_codes_with_prefix(&self, prefix: &str) -> Result<HashSet<String>> {
        Ok(self
            .state
            .read()
            .item_codes
            .keys()
            .filter(|code| code.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn insert_item(&self, item: CatalogItem) -> Result<()> {
        let mut state = self.state.write();
        if state.item_codes.contains_key(&item.code) {
            return Err(ServiceError::Conflict(format!(
                "Item code '{}' already exists",
                item.code
            ))
            .into());
        }
        state.check_item_references(&item)?;
        state.item_codes.insert(item.code.clone(), item.id.clone());
        state.items.insert(item.id.clone(), item);
        Ok(())
    }

    async fn update_item(&self, item: CatalogItem) -> Result<()> {
        let mut state = self.state.write();
        let Some(existing) = state.items.get(&item.id) else {
            return Err(ServiceError::NotFound(format!("Item '{}' not found", item.id)).into());
        };
        if existing.code != item.code {
            return Err(
                ServiceError::InvalidInput("Item codes cannot be changed".to_string()).into(),
            );
        }
        state.check_item_references(&item)?;
        state.items.insert(item.id.clone(), item);
        Ok(())
    }

    async fn delete_item(&self, id: &Id) -> Result<bool> {
        let mut state = self.state.write();
        match state.items.remove(id) {
            Some(item) => {
                state.item_codes.remove(&item.code);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait::async_trait]
impl SequenceStore for MemoryStore {
    async fn allocate_code(&self, subgroup_id: &Id) -> Result<AllocatedCode> {
        let lock = self.sequence_lock(subgroup_id);
        let _guard = lock.lock();

        let mut cursor = {
            let state = self.state.read();
            let subgroup = state.subgroups.get(subgroup_id).ok_or_else(|| {
                ServiceError::InvalidInput(format!("Subgroup '{}' not found", subgroup_id))
            })?;
            let group = state.groups.get(&subgroup.group_id).ok_or_else(|| {
                ServiceError::InvalidInput(format!(
                    "Subgroup '{}' references missing group '{}'",
                    subgroup_id, subgroup.group_id
                ))
            })?;
            SequenceCursor::for_subgroup(group, subgroup)
        };

        let code = {
            let state = self.state.read();
            cursor.next_free(|candidate| state.item_codes.contains_key(candidate))?
        };

        let mut state = self.state.write();
        let subgroup = state.subgroups.get_mut(subgroup_id).ok_or_else(|| {
            ServiceError::InvalidInput(format!("Subgroup '{}' was removed", subgroup_id))
        })?;
        subgroup.last_sequence = cursor.counter();
        subgroup.updated_at = now();

        Ok(cursor.into_allocated(subgroup_id, code))
    }
}

impl Store for MemoryStore {}
