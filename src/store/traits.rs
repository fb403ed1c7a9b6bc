use std::collections::HashSet;

use crate::logic::code_allocator::AllocatedCode;
use crate::model::{CatalogItem, Group, Id, ItemFilter, Subgroup};
use anyhow::Result;

// Uniqueness and referential failures are raised as `ServiceError` values
// wrapped in `anyhow::Error` so callers can recover them with a downcast.

#[async_trait::async_trait]
pub trait GroupStore: Send + Sync {
    async fn get_group(&self, id: &Id) -> Result<Option<Group>>;
    async fn get_group_by_code(&self, code: &str) -> Result<Option<Group>>;
    async fn list_groups(&self) -> Result<Vec<Group>>;
    /// Fails with `Conflict` when the code is taken
    async fn insert_group(&self, group: Group) -> Result<()>;
    /// Removes the group and its subgroups. Fails with `Conflict` while items
    /// are still filed under the group.
    async fn delete_group(&self, id: &Id) -> Result<bool>;
}

#[async_trait::async_trait]
pub trait SubgroupStore: Send + Sync {
    async fn get_subgroup(&self, id: &Id) -> Result<Option<Subgroup>>;
    async fn list_subgroups_for_group(&self, group_id: &Id) -> Result<Vec<Subgroup>>;
    /// Fails with `Conflict` when the code is taken within the group
    async fn insert_subgroup(&self, subgroup: Subgroup) -> Result<()>;
}

#[async_trait::async_trait]
pub trait CatalogItemStore: Send + Sync {
    async fn get_item(&self, id: &Id) -> Result<Option<CatalogItem>>;
    async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<CatalogItem>>;
    async fn item_code_exists(&self, code: &str) -> Result<bool>;
    /// Item codes starting with `prefix`
    async fn list_codes_with_prefix(&self, prefix: &str) -> Result<HashSet<String>>;
    /// Fails with `Conflict` when the code is taken
    async fn insert_item(&self, item: CatalogItem) -> Result<()>;
    async fn update_item(&self, item: CatalogItem) -> Result<()>;
    async fn delete_item(&self, id: &Id) -> Result<bool>;
}

#[async_trait::async_trait]
pub trait SequenceStore: Send + Sync {
    /// Issue the next free code of a subgroup.
    ///
    /// Runs read-increment-verify-write under an exclusive lock on that one
    /// subgroup and persists the counter before returning. On any failure
    /// the stored counter is unchanged.
    async fn allocate_code(&self, subgroup_id: &Id) -> Result<AllocatedCode>;
}

pub trait Store: GroupStore + SubgroupStore + CatalogItemStore + SequenceStore + Send + Sync {}
