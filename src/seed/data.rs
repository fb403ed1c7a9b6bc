use crate::logic::CatalogService;
use crate::model::{
    Category, Group, Id, ItemFilter, ItemStatus, NewCatalogItem, NewGroup, NewSubgroup, Subgroup,
    UserContext,
};
use crate::store::traits::Store;
use anyhow::Result;
use log::info;
use rust_decimal_macros::dec;
use serde_json::json;
use std::collections::HashSet;

struct SeedGroup {
    code: &'static str,
    name: &'static str,
    category: Category,
    subgroups: &'static [(&'static str, &'static str)],
}

const GROUPS: &[SeedGroup] = &[
    SeedGroup {
        code: "01",
        name: "Steel and profiles",
        category: Category::RawMaterial,
        subgroups: &[("01", "Guide rails"), ("02", "Sheet metal")],
    },
    SeedGroup {
        code: "02",
        name: "Wire ropes and cables",
        category: Category::RawMaterial,
        subgroups: &[("01", "Traction ropes"), ("02", "Travelling cables")],
    },
    SeedGroup {
        code: "04",
        name: "Cabin assemblies",
        category: Category::IntermediateProduct,
        subgroups: &[("01", "Cabin frames"), ("02", "Cabin panels")],
    },
    SeedGroup {
        code: "05",
        name: "Doors",
        category: Category::FinishedProduct,
        subgroups: &[("01", "Door operators"), ("02", "Landing doors")],
    },
    SeedGroup {
        code: "07",
        name: "Traction machines",
        category: Category::FinishedProduct,
        subgroups: &[("01", "Gearless machines")],
    },
];

/// Load a small elevator catalog for demonstration.
///
/// Safe to run repeatedly: groups and subgroups that already exist are left
/// alone, and demo items are only added to subgroups that have none.
pub async fn load_seed_data<S: Store>(store: &S) -> Result<()> {
    let user = UserContext::system();

    for seed in GROUPS {
        let group = ensure_group(store, seed, &user).await?;
        for (code, name) in seed.subgroups {
            ensure_subgroup(store, &group, code, name, &user).await?;
        }
    }

    load_demo_items(store, &user).await?;
    Ok(())
}

async fn ensure_group<S: Store>(store: &S, seed: &SeedGroup, user: &UserContext) -> Result<Group> {
    if let Some(existing) = store.get_group_by_code(seed.code).await? {
        return Ok(existing);
    }

    let group = CatalogService::create_group(
        store,
        NewGroup {
            code: seed.code.to_string(),
            name: seed.name.to_string(),
            category: seed.category,
            active: true,
        },
        user,
    )
    .await?;
    Ok(group)
}

async fn ensure_subgroup<S: Store>(
    store: &S,
    group: &Group,
    code: &str,
    name: &str,
    user: &UserContext,
) -> Result<Subgroup> {
    let existing = store.list_subgroups_for_group(&group.id).await?;
    if let Some(subgroup) = existing.into_iter().find(|s| s.code == code) {
        return Ok(subgroup);
    }

    let subgroup = CatalogService::create_subgroup(
        store,
        &group.id,
        NewSubgroup {
            code: code.to_string(),
            name: name.to_string(),
            active: true,
            starting_sequence: None,
        },
        user,
    )
    .await?;
    Ok(subgroup)
}

async fn load_demo_items<S: Store>(store: &S, user: &UserContext) -> Result<()> {
    let demo_items = [
        (
            "01",
            "01",
            "T89/B guide rail 5m",
            json!({"profile": "T89/B", "length_mm": 5000}),
            "m",
        ),
        (
            "05",
            "01",
            "VVVF door operator 800mm",
            json!({"clear_opening_mm": 800, "drive": "VVVF"}),
            "un",
        ),
        (
            "05",
            "01",
            "VVVF door operator 900mm",
            json!({"clear_opening_mm": 900, "drive": "VVVF"}),
            "un",
        ),
        (
            "07",
            "01",
            "Gearless machine 630kg 1.0m/s",
            json!({"rated_load_kg": 630, "speed_mps": 1.0}),
            "un",
        ),
    ];

    // Only seed subgroups nobody has filed items under yet
    let populated: HashSet<Id> = store
        .list_items(&ItemFilter::default())
        .await?
        .into_iter()
        .filter_map(|item| item.subgroup_id)
        .collect();

    let mut created = 0;
    for (group_code, subgroup_code, name, specification, unit) in demo_items {
        let Some(group) = store.get_group_by_code(group_code).await? else {
            continue;
        };
        let Some(subgroup) = store
            .list_subgroups_for_group(&group.id)
            .await?
            .into_iter()
            .find(|s| s.code == subgroup_code)
        else {
            continue;
        };

        if populated.contains(&subgroup.id) {
            continue;
        }

        CatalogService::create_item(
            store,
            NewCatalogItem {
                code: None,
                name: name.to_string(),
                group_id: group.id.clone(),
                subgroup_id: Some(subgroup.id.clone()),
                specification,
                unit: unit.to_string(),
                min_stock: Some(dec!(2)),
                max_stock: Some(dec!(20)),
                status: ItemStatus::Active,
            },
            user,
        )
        .await?;
        created += 1;
    }

    info!("Seed data loaded: {} groups, {} demo items", GROUPS.len(), created);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::traits::{CatalogItemStore, GroupStore};
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_seed_loads_catalog() {
        let store = MemoryStore::new();
        load_seed_data(&store).await.unwrap();

        let groups = store.list_groups().await.unwrap();
        assert_eq!(groups.len(), GROUPS.len());

        let items = store.list_items(&ItemFilter::default()).await.unwrap();
        let codes: Vec<&str> = items.iter().map(|i| i.code.as_str()).collect();
        assert!(codes.contains(&"05.01.00001"));
        assert!(codes.contains(&"05.01.00002"));
        assert!(codes.contains(&"07.01.00001"));

        // Second run adds nothing
        load_seed_data(&store).await.unwrap();
        assert_eq!(
            store.list_items(&ItemFilter::default()).await.unwrap().len(),
            items.len()
        );
        assert_eq!(store.list_groups().await.unwrap().len(), GROUPS.len());
    }
}
