use std::collections::HashSet;

use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, PgPool, Row};

use crate::error::ServiceError;
use crate::logic::code_allocator::{code_prefix, AllocatedCode, SequenceCursor};
use crate::model::{CatalogItem, Category, Group, Id, ItemFilter, ItemStatus, Subgroup};
use crate::store::traits::{CatalogItemStore, GroupStore, SequenceStore, Store, SubgroupStore};

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Run the embedded schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Turn constraint violations into `ServiceError`s; everything else keeps its
/// sqlx error with the given context.
fn classify(
    err: sqlx::Error,
    on_unique: impl FnOnce() -> ServiceError,
    on_foreign_key: impl FnOnce() -> ServiceError,
    context: &'static str,
) -> anyhow::Error {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return on_unique().into();
        }
        if db_err.is_foreign_key_violation() {
            return on_foreign_key().into();
        }
    }
    anyhow::Error::new(err).context(context)
}

fn parse_column<T: std::str::FromStr<Err = String>>(row: &PgRow, column: &str) -> Result<T> {
    let raw: String = row.try_get(column)?;
    raw.parse::<T>().map_err(|e| anyhow::anyhow!(e))
}

fn group_from_row(row: &PgRow) -> Result<Group> {
    Ok(Group {
        id: row.try_get("id")?,
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        category: parse_column::<Category>(row, "category")?,
        active: row.try_get("active")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        updated_by: row.try_get("updated_by")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn subgroup_from_row(row: &PgRow) -> Result<Subgroup> {
    Ok(Subgroup {
        id: row.try_get("id")?,
        group_id: row.try_get("group_id")?,
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        last_sequence: row.try_get("last_sequence")?,
        active: row.try_get("active")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        updated_by: row.try_get("updated_by")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn item_from_row(row: &PgRow) -> Result<CatalogItem> {
    Ok(CatalogItem {
        id: row.try_get("id")?,
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        group_id: row.try_get("group_id")?,
        subgroup_id: row.try_get("subgroup_id")?,
        category: parse_column::<Category>(row, "category")?,
        specification: row.try_get("specification")?,
        unit: row.try_get("unit")?,
        min_stock: row.try_get("min_stock")?,
        max_stock: row.try_get("max_stock")?,
        status: parse_column::<ItemStatus>(row, "status")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        updated_by: row.try_get("updated_by")?,
        updated_at: row.try_get("updated_at")?,
    })
}

const GROUP_COLUMNS: &str =
    "id, code, name, category, active, created_by, created_at, updated_by, updated_at";

const SUBGROUP_COLUMNS: &str = "id, group_id, code, name, last_sequence, active, created_by, created_at, updated_by, updated_at";

const ITEM_COLUMNS: &str = "id, code, name, group_id, subgroup_id, category, specification, unit, min_stock, max_stock, status, created_by, created_at, updated_by, updated_at";

#[async_trait::async_trait]
impl GroupStore for PostgresStore {
    async fn get_group(&self, id: &Id) -> Result<Option<Group>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM catalog_groups WHERE id = $1",
            GROUP_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch group")?;

        row.as_ref().map(group_from_row).transpose()
    }

    async fn get_group_by_code(&self, code: &str) -> Result<Option<Group>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM catalog_groups WHERE code = $1",
            GROUP_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch group by code")?;

        row.as_ref().map(group_from_row).transpose()
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM catalog_groups ORDER BY code",
            GROUP_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list groups")?;

        rows.iter().map(group_from_row).collect()
    }

    async fn insert_group(&self, group: Group) -> Result<()> {
        let code = group.code.clone();
        sqlx::query(
            r#"
            INSERT INTO catalog_groups (id, code, name, category, active, created_by, created_at, updated_by, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&group.id)
        .bind(&group.code)
        .bind(&group.name)
        .bind(group.category.as_str())
        .bind(group.active)
        .bind(&group.created_by)
        .bind(group.created_at)
        .bind(&group.updated_by)
        .bind(group.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            classify(
                e,
                || ServiceError::Conflict(format!("Group code '{}' already exists", code)),
                || ServiceError::InvalidInput("Invalid group reference".to_string()),
                "Failed to insert group",
            )
        })?;

        Ok(())
    }

    async fn delete_group(&self, id: &Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM catalog_groups WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                classify(
                    e,
                    || ServiceError::Conflict(format!("Group '{}' cannot be deleted", id)),
                    || ServiceError::Conflict(format!("Group '{}' still has catalog items", id)),
                    "Failed to delete group",
                )
            })?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl SubgroupStore for PostgresStore {
    async fn get_subgroup(&self, id: &Id) -> Result<Option<Subgroup>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM catalog_subgroups WHERE id = $1",
            SUBGROUP_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch subgroup")?;

        row.as_ref().map(subgroup_from_row).transpose()
    }

    async fn list_subgroups_for_group(&self, group_id: &Id) -> Result<Vec<Subgroup>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM catalog_subgroups WHERE group_id = $1 ORDER BY code",
            SUBGROUP_COLUMNS
        ))
        .bind(group_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list subgroups")?;

        rows.iter().map(subgroup_from_row).collect()
    }

    async fn insert_subgroup(&self, subgroup: Subgroup) -> Result<()> {
        let code = subgroup.code.clone();
        let group_id = subgroup.group_id.clone();
        sqlx::query(
            r#"
            INSERT INTO catalog_subgroups (id, group_id, code, name, last_sequence, active, created_by, created_at, updated_by, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&subgroup.id)
        .bind(&subgroup.group_id)
        .bind(&subgroup.code)
        .bind(&subgroup.name)
        .bind(subgroup.last_sequence)
        .bind(subgroup.active)
        .bind(&subgroup.created_by)
        .bind(subgroup.created_at)
        .bind(&subgroup.updated_by)
        .bind(subgroup.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            classify(
                e,
                || {
                    ServiceError::Conflict(format!(
                        "Subgroup code '{}' already exists in this group",
                        code
                    ))
                },
                || ServiceError::InvalidInput(format!("Group '{}' not found", group_id)),
                "Failed to insert subgroup",
            )
        })?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl CatalogItemStore for PostgresStore {
    async fn get_item(&self, id: &Id) -> Result<Option<CatalogItem>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM catalog_items WHERE id = $1",
            ITEM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch catalog item")?;

        row.as_ref().map(item_from_row).transpose()
    }

    async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<CatalogItem>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM catalog_items
            WHERE ($1::text IS NULL OR group_id = $1)
              AND ($2::text IS NULL OR subgroup_id = $2)
              AND ($3::text IS NULL OR status = $3)
            ORDER BY code
            "#,
            ITEM_COLUMNS
        ))
        .bind(&filter.group_id)
        .bind(&filter.subgroup_id)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list catalog items")?;

        rows.iter().map(item_from_row).collect()
    }

    async fn item_code_exists(&self, code: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM catalog_items WHERE code = $1)")
                .bind(code)
                .fetch_one(&self.pool)
                .await
                .context("Failed to check item code")?;

        Ok(exists)
    }

    async fn list_codes_with_prefix(&self, prefix: &str) -> Result<HashSet<String>> {
        let codes: Vec<String> =
            sqlx::query_scalar("SELECT code FROM catalog_items WHERE code LIKE $1")
                .bind(format!("{}%", prefix))
                .fetch_all(&self.pool)
                .await
                .context("Failed to list item codes")?;

        Ok(codes.into_iter().collect())
    }

    async fn insert_item(&self, item: CatalogItem) -> Result<()> {
        let code = item.code.clone();
        sqlx::query(
            r#"
            INSERT INTO catalog_items (id, code, name, group_id, subgroup_id, category, specification, unit,
                                       min_stock, max_stock, status, created_by, created_at, updated_by, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(&item.id)
        .bind(&item.code)
        .bind(&item.name)
        .bind(&item.group_id)
        .bind(&item.subgroup_id)
        .bind(item.category.as_str())
        .bind(&item.specification)
        .bind(&item.unit)
        .bind(item.min_stock)
        .bind(item.max_stock)
        .bind(item.status.as_str())
        .bind(&item.created_by)
        .bind(item.created_at)
        .bind(&item.updated_by)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            classify(
                e,
                || ServiceError::Conflict(format!("Item code '{}' already exists", code)),
                || {
                    ServiceError::InvalidInput(
                        "Item references a missing group or subgroup".to_string(),
                    )
                },
                "Failed to insert catalog item",
            )
        })?;

        Ok(())
    }

    async fn update_item(&self, item: CatalogItem) -> Result<()> {
        // `code` is immutable and never part of the SET list
        let result = sqlx::query(
            r#"
            UPDATE catalog_items SET
                name = $2,
                group_id = $3,
                subgroup_id = $4,
                category = $5,
                specification = $6,
                unit = $7,
                min_stock = $8,
                max_stock = $9,
                status = $10,
                updated_by = $11,
                updated_at = $12
            WHERE id = $1
            "#,
        )
        .bind(&item.id)
        .bind(&item.name)
        .bind(&item.group_id)
        .bind(&item.subgroup_id)
        .bind(item.category.as_str())
        .bind(&item.specification)
        .bind(&item.unit)
        .bind(item.min_stock)
        .bind(item.max_stock)
        .bind(item.status.as_str())
        .bind(&item.updated_by)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            classify(
                e,
                || ServiceError::Conflict("Item update violates a unique constraint".to_string()),
                || {
                    ServiceError::InvalidInput(
                        "Item references a missing group or subgroup".to_string(),
                    )
                },
                "Failed to update catalog item",
            )
        })?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound(format!("Item '{}' not found", item.id)).into());
        }
        Ok(())
    }

    async fn delete_item(&self, id: &Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM catalog_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete catalog item")?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl SequenceStore for PostgresStore {
    async fn allocate_code(&self, subgroup_id: &Id) -> Result<AllocatedCode> {
        // Dropping `tx` without commit rolls back, so every early return below
        // leaves the counter untouched.
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin allocation transaction")?;

        let row = sqlx::query(
            r#"
            SELECT s.code AS subgroup_code, s.last_sequence, g.code AS group_code
            FROM catalog_subgroups s
            JOIN catalog_groups g ON g.id = s.group_id
            WHERE s.id = $1
            FOR UPDATE OF s
            "#,
        )
        .bind(subgroup_id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to lock subgroup")?;

        let Some(row) = row else {
            return Err(
                ServiceError::InvalidInput(format!("Subgroup '{}' not found", subgroup_id)).into(),
            );
        };

        let group_code: String = row.try_get("group_code")?;
        let subgroup_code: String = row.try_get("subgroup_code")?;
        let last_sequence: i32 = row.try_get("last_sequence")?;

        let taken: HashSet<String> =
            sqlx::query_scalar::<_, String>("SELECT code FROM catalog_items WHERE code LIKE $1")
                .bind(format!("{}%", code_prefix(&group_code, &subgroup_code)))
                .fetch_all(&mut *tx)
                .await
                .context("Failed to check existing item codes")?
                .into_iter()
                .collect();

        let mut cursor = SequenceCursor::new(&group_code, &subgroup_code, last_sequence);
        let code = cursor.next_free(|candidate| taken.contains(candidate))?;

        sqlx::query(
            "UPDATE catalog_subgroups SET last_sequence = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(subgroup_id)
        .bind(cursor.counter())
        .execute(&mut *tx)
        .await
        .context("Failed to persist subgroup sequence")?;

        tx.commit()
            .await
            .context("Failed to commit allocation transaction")?;

        Ok(cursor.into_allocated(subgroup_id, code))
    }
}

impl Store for PostgresStore {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_columns_cover_the_model() {
        // One column per CatalogItem field, in the order item_from_row reads them
        let columns: Vec<&str> = ITEM_COLUMNS.split(", ").collect();
        assert_eq!(columns.len(), 15);
        assert_eq!(columns.first(), Some(&"id"));
        assert!(columns.contains(&"specification"));
        assert!(!SUBGROUP_COLUMNS.contains("group_code"));
        assert!(GROUP_COLUMNS.starts_with("id, code"));
    }

    #[test]
    fn test_non_constraint_errors_keep_context() {
        let err = classify(
            sqlx::Error::RowNotFound,
            || ServiceError::Conflict("dup".into()),
            || ServiceError::InvalidInput("fk".into()),
            "Failed to insert group",
        );
        match ServiceError::from(err) {
            ServiceError::Storage(message) => {
                assert!(message.starts_with("Failed to insert group: "))
            }
            other => panic!("expected storage error, got {:?}", other),
        }
    }
}
