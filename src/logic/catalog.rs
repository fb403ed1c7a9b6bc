use log::{debug, info};

use crate::error::ServiceError;
use crate::logic::code_allocator::{CodeAllocator, SEQUENCE_MAX};
use crate::model::{
    generate_id, normalize_classification_code, now, validate_stock_thresholds, CatalogItem,
    CatalogItemUpdate, Group, Id, ItemFilter, NewCatalogItem, NewGroup, NewSubgroup, Subgroup,
    UserContext,
};
use crate::store::traits::Store;

fn required_name(name: &str, what: &str) -> Result<String, ServiceError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidInput(format!("{} name is required", what)));
    }
    Ok(trimmed.to_string())
}

fn classification_code(raw: &str, what: &str) -> Result<String, ServiceError> {
    normalize_classification_code(raw).ok_or_else(|| {
        ServiceError::InvalidInput(format!(
            "{} code must be one or two digits (got '{}')",
            what, raw
        ))
    })
}

/// Catalog operations: groups, subgroups and items.
///
/// Enforces the cross-record rules the stores cannot see on their own: an
/// item's category always matches its group, its subgroup belongs to that
/// group, and items without an explicit code get one from the subgroup
/// sequence.
pub struct CatalogService;

impl CatalogService {
    pub async fn create_group<S: Store>(
        store: &S,
        new_group: NewGroup,
        user: &UserContext,
    ) -> Result<Group, ServiceError> {
        let code = classification_code(&new_group.code, "Group")?;
        let name = required_name(&new_group.name, "Group")?;

        let group = NewGroup { name, ..new_group }.into_group(code, user);
        store.insert_group(group.clone()).await?;
        info!("Created group {} '{}'", group.code, group.name);
        Ok(group)
    }

    pub async fn get_group<S: Store>(store: &S, id: &Id) -> Result<Group, ServiceError> {
        store
            .get_group(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Group '{}' not found", id)))
    }

    pub async fn list_groups<S: Store>(store: &S) -> Result<Vec<Group>, ServiceError> {
        Ok(store.list_groups().await?)
    }

    /// Delete a group together with its subgroups
    pub async fn delete_group<S: Store>(store: &S, id: &Id) -> Result<(), ServiceError> {
        if !store.delete_group(id).await? {
            return Err(ServiceError::NotFound(format!("Group '{}' not found", id)));
        }
        info!("Deleted group {}", id);
        Ok(())
    }

    pub async fn create_subgroup<S: Store>(
        store: &S,
        group_id: &Id,
        new_subgroup: NewSubgroup,
        user: &UserContext,
    ) -> Result<Subgroup, ServiceError> {
        let group = Self::get_group(store, group_id).await?;
        let code = classification_code(&new_subgroup.code, "Subgroup")?;
        let name = required_name(&new_subgroup.name, "Subgroup")?;

        if let Some(start) = new_subgroup.starting_sequence {
            if !(0..=SEQUENCE_MAX).contains(&start) {
                return Err(ServiceError::InvalidInput(format!(
                    "starting_sequence must be between 0 and {} (got {})",
                    SEQUENCE_MAX, start
                )));
            }
        }

        let subgroup = NewSubgroup {
            name,
            ..new_subgroup
        }
        .into_subgroup(group.id.clone(), code, user);
        store.insert_subgroup(subgroup.clone()).await?;
        info!(
            "Created subgroup {}.{} '{}'",
            group.code, subgroup.code, subgroup.name
        );
        Ok(subgroup)
    }

    pub async fn get_subgroup<S: Store>(store: &S, id: &Id) -> Result<Subgroup, ServiceError> {
        store
            .get_subgroup(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Subgroup '{}' not found", id)))
    }

    pub async fn list_subgroups<S: Store>(
        store: &S,
        group_id: &Id,
    ) -> Result<Vec<Subgroup>, ServiceError> {
        Self::get_group(store, group_id).await?;
        Ok(store.list_subgroups_for_group(group_id).await?)
    }

    /// Resolve the group and optional subgroup an item points at.
    ///
    /// Dangling references are invalid input here, not "not found": the item
    /// itself is the resource being addressed.
    async fn resolve_classification<S: Store>(
        store: &S,
        group_id: &Id,
        subgroup_id: Option<&Id>,
    ) -> Result<(Group, Option<Subgroup>), ServiceError> {
        let group = store
            .get_group(group_id)
            .await?
            .ok_or_else(|| ServiceError::InvalidInput(format!("Group '{}' not found", group_id)))?;

        let subgroup = match subgroup_id {
            Some(subgroup_id) => {
                let subgroup = store.get_subgroup(subgroup_id).await?.ok_or_else(|| {
                    ServiceError::InvalidInput(format!("Subgroup '{}' not found", subgroup_id))
                })?;
                if subgroup.group_id != group.id {
                    return Err(ServiceError::InvalidInput(format!(
                        "Subgroup {} does not belong to group {}",
                        subgroup.code, group.code
                    )));
                }
                Some(subgroup)
            }
            None => None,
        };

        Ok((group, subgroup))
    }

    /// Create a catalog item, allocating its code when none is given.
    ///
    /// The allocation commits before the insert; if the insert then fails the
    /// sequence number stays consumed.
    pub async fn create_item<S: Store>(
        store: &S,
        new_item: NewCatalogItem,
        user: &UserContext,
    ) -> Result<CatalogItem, ServiceError> {
        let name = required_name(&new_item.name, "Item")?;
        validate_stock_thresholds(new_item.min_stock, new_item.max_stock)
            .map_err(ServiceError::InvalidInput)?;

        let (group, subgroup) =
            Self::resolve_classification(store, &new_item.group_id, new_item.subgroup_id.as_ref())
                .await?;

        let explicit_code = new_item
            .code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(str::to_string);

        let code = match (explicit_code, &subgroup) {
            (Some(code), _) => {
                if store.item_code_exists(&code).await? {
                    return Err(ServiceError::Conflict(format!(
                        "Item code '{}' already exists",
                        code
                    )));
                }
                code
            }
            (None, Some(subgroup)) => CodeAllocator::allocate(store, &subgroup.id).await?.code,
            (None, None) => {
                return Err(ServiceError::InvalidInput(
                    "A subgroup is required to generate an item code".to_string(),
                ))
            }
        };

        let timestamp = now();
        let item = CatalogItem {
            id: generate_id(),
            code,
            name,
            group_id: group.id.clone(),
            subgroup_id: subgroup.map(|s| s.id),
            category: group.category,
            specification: new_item.specification,
            unit: new_item.unit,
            min_stock: new_item.min_stock,
            max_stock: new_item.max_stock,
            status: new_item.status,
            created_by: user.user_id.clone(),
            created_at: timestamp,
            updated_by: user.user_id.clone(),
            updated_at: timestamp,
        };

        // The unique index is the final word if a concurrent insert won the code
        store.insert_item(item.clone()).await?;
        info!("Created catalog item {} '{}'", item.code, item.name);
        Ok(item)
    }

    pub async fn get_item<S: Store>(store: &S, id: &Id) -> Result<CatalogItem, ServiceError> {
        store
            .get_item(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Item '{}' not found", id)))
    }

    pub async fn list_items<S: Store>(
        store: &S,
        filter: &ItemFilter,
    ) -> Result<Vec<CatalogItem>, ServiceError> {
        Ok(store.list_items(filter).await?)
    }

    /// Apply a partial update. Moving an item to another group re-syncs its
    /// category; the subgroup must still belong to the resulting group.
    pub async fn update_item<S: Store>(
        store: &S,
        id: &Id,
        update: CatalogItemUpdate,
        user: &UserContext,
    ) -> Result<CatalogItem, ServiceError> {
        let mut item = Self::get_item(store, id).await?;

        if let Some(name) = &update.name {
            item.name = required_name(name, "Item")?;
        }
        if let Some(group_id) = update.group_id {
            if group_id != item.group_id {
                // A subgroup of the old group cannot follow the item across
                if update.subgroup_id.is_none() {
                    item.subgroup_id = None;
                }
                item.group_id = group_id;
            }
        }
        if let Some(subgroup_id) = update.subgroup_id {
            item.subgroup_id = subgroup_id;
        }
        if let Some(specification) = update.specification {
            item.specification = specification;
        }
        if let Some(unit) = update.unit {
            item.unit = unit;
        }
        if let Some(min_stock) = update.min_stock {
            item.min_stock = min_stock;
        }
        if let Some(max_stock) = update.max_stock {
            item.max_stock = max_stock;
        }
        if let Some(status) = update.status {
            item.status = status;
        }

        validate_stock_thresholds(item.min_stock, item.max_stock)
            .map_err(ServiceError::InvalidInput)?;

        let (group, _) =
            Self::resolve_classification(store, &item.group_id, item.subgroup_id.as_ref()).await?;
        if item.category != group.category {
            debug!(
                "Re-syncing category of {} from {} to {}",
                item.code, item.category, group.category
            );
        }
        item.category = group.category;
        item.updated_by = user.user_id.clone();
        item.updated_at = now();

        store.update_item(item.clone()).await?;
        info!("Updated catalog item {}", item.code);
        Ok(item)
    }

    pub async fn delete_item<S: Store>(store: &S, id: &Id) -> Result<(), ServiceError> {
        if !store.delete_item(id).await? {
            return Err(ServiceError::NotFound(format!("Item '{}' not found", id)));
        }
        info!("Deleted catalog item {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, ItemStatus};
    use crate::store::MemoryStore;
    use rust_decimal_macros::dec;

    fn user() -> UserContext {
        UserContext::new("tester".to_string())
    }

    fn new_item(group_id: &Id, subgroup_id: Option<&Id>) -> NewCatalogItem {
        NewCatalogItem {
            code: None,
            name: "Door operator".to_string(),
            group_id: group_id.clone(),
            subgroup_id: subgroup_id.cloned(),
            specification: serde_json::json!({"width_mm": 800}),
            unit: "un".to_string(),
            min_stock: None,
            max_stock: None,
            status: ItemStatus::Active,
        }
    }

    async fn file_item(
        store: &MemoryStore,
        group: &Group,
        subgroup: &Subgroup,
    ) -> Result<CatalogItem, ServiceError> {
        CatalogService::create_item(store, new_item(&group.id, Some(&subgroup.id)), &user()).await
    }

    async fn catalog(store: &MemoryStore) -> (Group, Subgroup) {
        let group = CatalogService::create_group(
            store,
            NewGroup {
                code: "5".to_string(),
                name: "Doors".to_string(),
                category: Category::FinishedProduct,
                active: true,
            },
            &user(),
        )
        .await
        .unwrap();
        let subgroup = CatalogService::create_subgroup(
            store,
            &group.id,
            NewSubgroup {
                code: "01".to_string(),
                name: "Operators".to_string(),
                active: true,
                starting_sequence: None,
            },
            &user(),
        )
        .await
        .unwrap();
        (group, subgroup)
    }

    #[tokio::test]
    async fn test_codes_are_normalized() {
        let store = MemoryStore::new();
        let (group, subgroup) = catalog(&store).await;
        assert_eq!(group.code, "05");
        assert_eq!(subgroup.code, "01");
        assert_eq!(subgroup.last_sequence, 0);
        assert_eq!(group.created_by, "tester");
    }

    #[tokio::test]
    async fn test_invalid_codes_are_rejected() {
        let store = MemoryStore::new();
        let err = CatalogService::create_group(
            &store,
            NewGroup {
                code: "ABC".to_string(),
                name: "Bad".to_string(),
                category: Category::RawMaterial,
                active: true,
            },
            &user(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_starting_sequence_is_bounded() {
        let store = MemoryStore::new();
        let (group, _) = catalog(&store).await;
        let err = CatalogService::create_subgroup(
            &store,
            &group.id,
            NewSubgroup {
                code: "02".to_string(),
                name: "Legacy".to_string(),
                active: true,
                starting_sequence: Some(SEQUENCE_MAX + 1),
            },
            &user(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_create_item_allocates_code_and_copies_category() {
        let store = MemoryStore::new();
        let (group, subgroup) = catalog(&store).await;

        let first = file_item(&store, &group, &subgroup).await.unwrap();
        let second = file_item(&store, &group, &subgroup).await.unwrap();

        assert_eq!(first.code, "05.01.00001");
        assert_eq!(second.code, "05.01.00002");
        assert_eq!(first.category, Category::FinishedProduct);
        assert_eq!(
            CatalogService::get_subgroup(&store, &subgroup.id)
                .await
                .unwrap()
                .last_sequence,
            2
        );
    }

    #[tokio::test]
    async fn test_explicit_code_is_kept_and_later_skipped() {
        let store = MemoryStore::new();
        let (group, subgroup) = catalog(&store).await;

        let mut manual = new_item(&group.id, Some(&subgroup.id));
        manual.code = Some("05.01.00001".to_string());
        CatalogService::create_item(&store, manual.clone(), &user()).await.unwrap();

        let err = CatalogService::create_item(&store, manual, &user()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let generated = file_item(&store, &group, &subgroup).await.unwrap();
        assert_eq!(generated.code, "05.01.00002");
    }

    #[tokio::test]
    async fn test_item_without_code_or_subgroup_is_rejected() {
        let store = MemoryStore::new();
        let (group, _) = catalog(&store).await;
        let err = CatalogService::create_item(&store, new_item(&group.id, None), &user())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_subgroup_must_belong_to_group() {
        let store = MemoryStore::new();
        let (_, subgroup) = catalog(&store).await;
        let other = CatalogService::create_group(
            &store,
            NewGroup {
                code: "07".to_string(),
                name: "Cables".to_string(),
                category: Category::RawMaterial,
                active: true,
            },
            &user(),
        )
        .await
        .unwrap();

        let err = file_item(&store, &other, &subgroup).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert_eq!(
            CatalogService::get_subgroup(&store, &subgroup.id)
                .await
                .unwrap()
                .last_sequence,
            0
        );
    }

    #[tokio::test]
    async fn test_moving_item_resyncs_category() {
        let store = MemoryStore::new();
        let (group, subgroup) = catalog(&store).await;
        let other = CatalogService::create_group(
            &store,
            NewGroup {
                code: "07".to_string(),
                name: "Cables".to_string(),
                category: Category::RawMaterial,
                active: true,
            },
            &user(),
        )
        .await
        .unwrap();

        let item = file_item(&store, &group, &subgroup).await.unwrap();

        let updated = CatalogService::update_item(
            &store,
            &item.id,
            CatalogItemUpdate {
                group_id: Some(other.id.clone()),
                ..Default::default()
            },
            &UserContext::new("editor".to_string()),
        )
        .await
        .unwrap();

        assert_eq!(updated.group_id, other.id);
        assert_eq!(updated.subgroup_id, None);
        assert_eq!(updated.category, Category::RawMaterial);
        assert_eq!(updated.code, item.code);
        assert_eq!(updated.updated_by, "editor");
    }

    #[tokio::test]
    async fn test_update_rejects_foreign_subgroup_and_bad_thresholds() {
        let store = MemoryStore::new();
        let (group, subgroup) = catalog(&store).await;
        let other = CatalogService::create_group(
            &store,
            NewGroup {
                code: "07".to_string(),
                name: "Cables".to_string(),
                category: Category::RawMaterial,
                active: true,
            },
            &user(),
        )
        .await
        .unwrap();
        let item = file_item(&store, &group, &subgroup).await.unwrap();

        let err = CatalogService::update_item(
            &store,
            &item.id,
            CatalogItemUpdate {
                group_id: Some(other.id.clone()),
                subgroup_id: Some(Some(subgroup.id.clone())),
                ..Default::default()
            },
            &user(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        let err = CatalogService::update_item(
            &store,
            &item.id,
            CatalogItemUpdate {
                min_stock: Some(Some(dec!(10))),
                max_stock: Some(Some(dec!(2))),
                ..Default::default()
            },
            &user(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        let unchanged = CatalogService::get_item(&store, &item.id).await.unwrap();
        assert_eq!(unchanged.group_id, group.id);
    }

    #[tokio::test]
    async fn test_delete_group_cascades_subgroups() {
        let store = MemoryStore::new();
        let (group, subgroup) = catalog(&store).await;

        CatalogService::delete_group(&store, &group.id).await.unwrap();
        assert!(matches!(
            CatalogService::get_subgroup(&store, &subgroup.id).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            CatalogService::delete_group(&store, &group.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_and_delete_items() {
        let store = MemoryStore::new();
        let (group, subgroup) = catalog(&store).await;
        let item = file_item(&store, &group, &subgroup).await.unwrap();
        CatalogService::update_item(
            &store,
            &item.id,
            CatalogItemUpdate {
                status: Some(ItemStatus::Discontinued),
                ..Default::default()
            },
            &user(),
        )
        .await
        .unwrap();

        let active = CatalogService::list_items(
            &store,
            &ItemFilter {
                status: Some(ItemStatus::Active),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(active.is_empty());

        CatalogService::delete_item(&store, &item.id).await.unwrap();
        assert!(CatalogService::list_items(&store, &ItemFilter::default())
            .await
            .unwrap()
            .is_empty());
    }
}
