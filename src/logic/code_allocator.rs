use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::model::{Group, Id, Subgroup};
use crate::store::traits::Store;

/// Highest sequence number a subgroup can issue (five decimal digits).
pub const SEQUENCE_MAX: i32 = 99_999;

/// Digits of the sequence part of an item code.
pub const SEQUENCE_WIDTH: usize = 5;

/// Format `GG.SS.NNNNN`.
pub fn format_item_code(group_code: &str, subgroup_code: &str, sequence: i32) -> String {
    format!(
        "{}.{}.{:0width$}",
        group_code,
        subgroup_code,
        sequence,
        width = SEQUENCE_WIDTH
    )
}

/// Prefix shared by every code a subgroup can issue, e.g. `05.01.`
pub fn code_prefix(group_code: &str, subgroup_code: &str) -> String {
    format!("{}.{}.", group_code, subgroup_code)
}

/// Result of a successful allocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatedCode {
    pub subgroup_id: Id,
    pub code: String,
    /// Counter value persisted on the subgroup
    pub sequence: i32,
    /// Sequence numbers passed over because their code was already in use
    pub skipped: i32,
}

/// Walks a subgroup's sequence while the caller holds the subgroup lock.
///
/// The cursor never touches storage. The store reads the counter, lets the
/// cursor find the next free code, and writes `counter()` back only on success;
/// on `CapacityExceeded` nothing is written.
#[derive(Debug, Clone)]
pub struct SequenceCursor {
    group_code: String,
    subgroup_code: String,
    start: i32,
    counter: i32,
}

impl SequenceCursor {
    pub fn new(group_code: &str, subgroup_code: &str, last_sequence: i32) -> Self {
        Self {
            group_code: group_code.to_string(),
            subgroup_code: subgroup_code.to_string(),
            start: last_sequence,
            counter: last_sequence,
        }
    }

    pub fn for_subgroup(group: &Group, subgroup: &Subgroup) -> Self {
        Self::new(&group.code, &subgroup.code, subgroup.last_sequence)
    }

    pub fn counter(&self) -> i32 {
        self.counter
    }

    /// Sequence numbers consumed since the cursor was created
    pub fn consumed(&self) -> i32 {
        self.counter - self.start
    }

    fn capacity_exceeded(&self) -> ServiceError {
        ServiceError::CapacityExceeded {
            group_code: self.group_code.clone(),
            subgroup_code: self.subgroup_code.clone(),
        }
    }

    /// Step to the next sequence number and return its code.
    pub fn advance(&mut self) -> Result<String, ServiceError> {
        if self.counter >= SEQUENCE_MAX {
            return Err(self.capacity_exceeded());
        }
        self.counter += 1;
        Ok(format_item_code(
            &self.group_code,
            &self.subgroup_code,
            self.counter,
        ))
    }

    /// Advance until a code not reported as taken is found.
    ///
    /// Logs nothing; allocating callers report skips from `into_allocated`.
    pub fn next_free<F>(&mut self, is_taken: F) -> Result<String, ServiceError>
    where
        F: Fn(&str) -> bool,
    {
        loop {
            let candidate = self.advance()?;
            if !is_taken(&candidate) {
                return Ok(candidate);
            }
        }
    }

    pub fn into_allocated(self, subgroup_id: &Id, code: String) -> AllocatedCode {
        AllocatedCode {
            subgroup_id: subgroup_id.clone(),
            code,
            sequence: self.counter,
            skipped: self.consumed() - 1,
        }
    }
}

/// Issues hierarchical item codes from subgroup sequences.
///
/// Locking and persistence belong to the store (`SequenceStore::allocate_code`);
/// this type adds the logging and error shaping shared by every caller.
pub struct CodeAllocator;

impl CodeAllocator {
    /// Consume the next free sequence number of a subgroup.
    ///
    /// Not idempotent: every success consumes one number even if the caller
    /// never stores an item under the returned code.
    pub async fn allocate<S: Store>(
        store: &S,
        subgroup_id: &Id,
    ) -> Result<AllocatedCode, ServiceError> {
        match store.allocate_code(subgroup_id).await {
            Ok(allocated) => {
                if allocated.skipped > 0 {
                    warn!(
                        "Allocated {} after skipping {} taken code(s)",
                        allocated.code, allocated.skipped
                    );
                } else {
                    info!("Allocated item code {}", allocated.code);
                }
                Ok(allocated)
            }
            Err(e) => {
                let err = ServiceError::from(e);
                if let ServiceError::CapacityExceeded { .. } = err {
                    warn!("Code allocation refused for subgroup {}: {}", subgroup_id, err);
                }
                Err(err)
            }
        }
    }

    /// Code the next allocation would most likely return.
    ///
    /// Advisory: takes no lock and reserves nothing.
    pub async fn preview<S: Store>(store: &S, subgroup_id: &Id) -> Result<String, ServiceError> {
        let subgroup = store.get_subgroup(subgroup_id).await?.ok_or_else(|| {
            ServiceError::NotFound(format!("Subgroup '{}' not found", subgroup_id))
        })?;
        let group = store.get_group(&subgroup.group_id).await?.ok_or_else(|| {
            ServiceError::InvalidInput(format!(
                "Subgroup '{}' references missing group '{}'",
                subgroup_id, subgroup.group_id
            ))
        })?;

        let taken = store
            .list_codes_with_prefix(&code_prefix(&group.code, &subgroup.code))
            .await?;
        let mut cursor = SequenceCursor::for_subgroup(&group, &subgroup);
        cursor.next_free(|code| taken.contains(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_format_item_code() {
        assert_eq!(format_item_code("05", "01", 1), "05.01.00001");
        assert_eq!(format_item_code("12", "34", 99_999), "12.34.99999");
        assert_eq!(code_prefix("05", "01"), "05.01.");
    }

    #[test]
    fn test_cursor_issues_consecutive_codes() {
        let mut cursor = SequenceCursor::new("05", "01", 0);
        assert_eq!(cursor.advance().unwrap(), "05.01.00001");
        assert_eq!(cursor.advance().unwrap(), "05.01.00002");
        assert_eq!(cursor.counter(), 2);
        assert_eq!(cursor.consumed(), 2);
    }

    #[test]
    fn test_cursor_skips_taken_codes() {
        let taken: HashSet<String> = ["05.01.00001", "05.01.00002", "05.01.00004"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let mut cursor = SequenceCursor::new("05", "01", 0);
        let code = cursor.next_free(|c| taken.contains(c)).unwrap();
        assert_eq!(code, "05.01.00003");

        let allocated = cursor.into_allocated(&"sg-1".to_string(), code);
        assert_eq!(allocated.sequence, 3);
        assert_eq!(allocated.skipped, 2);
    }

    #[test]
    fn test_cursor_at_ceiling_fails_without_moving() {
        let mut cursor = SequenceCursor::new("05", "01", SEQUENCE_MAX);
        let err = cursor.advance().unwrap_err();
        assert!(matches!(err, ServiceError::CapacityExceeded { .. }));
        assert_eq!(cursor.counter(), SEQUENCE_MAX);
    }

    #[test]
    fn test_cursor_collisions_up_to_ceiling() {
        let mut cursor = SequenceCursor::new("05", "01", SEQUENCE_MAX - 3);
        let err = cursor.next_free(|_| true).unwrap_err();
        assert_eq!(
            err,
            ServiceError::CapacityExceeded {
                group_code: "05".to_string(),
                subgroup_code: "01".to_string(),
            }
        );
    }

    #[test]
    fn test_last_code_is_issuable() {
        let mut cursor = SequenceCursor::new("05", "01", SEQUENCE_MAX - 1);
        assert_eq!(cursor.advance().unwrap(), "05.01.99999");
        assert!(cursor.advance().is_err());
    }

    #[tokio::test]
    async fn test_preview_is_read_only() {
        use crate::model::{now, Category, CatalogItem, ItemStatus};
        use crate::store::traits::{CatalogItemStore, GroupStore, SubgroupStore};
        use crate::store::MemoryStore;

        let store = MemoryStore::new();
        let group = Group {
            id: "g-05".to_string(),
            code: "05".to_string(),
            name: "Doors".to_string(),
            category: Category::FinishedProduct,
            active: true,
            created_by: "test".to_string(),
            created_at: now(),
            updated_by: "test".to_string(),
            updated_at: now(),
        };
        let subgroup = Subgroup {
            id: "sg-0501".to_string(),
            group_id: group.id.clone(),
            code: "01".to_string(),
            name: "Operators".to_string(),
            last_sequence: 0,
            active: true,
            created_by: "test".to_string(),
            created_at: now(),
            updated_by: "test".to_string(),
            updated_at: now(),
        };
        store.insert_group(group.clone()).await.unwrap();
        store.insert_subgroup(subgroup.clone()).await.unwrap();
        store
            .insert_item(CatalogItem {
                id: "item-1".to_string(),
                code: "05.01.00001".to_string(),
                name: "Manual operator".to_string(),
                group_id: group.id.clone(),
                subgroup_id: Some(subgroup.id.clone()),
                category: Category::FinishedProduct,
                specification: serde_json::Value::Null,
                unit: "un".to_string(),
                min_stock: None,
                max_stock: None,
                status: ItemStatus::Active,
                created_by: "test".to_string(),
                created_at: now(),
                updated_by: "test".to_string(),
                updated_at: now(),
            })
            .await
            .unwrap();

        for _ in 0..3 {
            let next = CodeAllocator::preview(&store, &subgroup.id).await.unwrap();
            assert_eq!(next, "05.01.00002");
        }
        let stored = store.get_subgroup(&subgroup.id).await.unwrap().unwrap();
        assert_eq!(stored.last_sequence, 0);

        let allocated = CodeAllocator::allocate(&store, &subgroup.id).await.unwrap();
        assert_eq!(allocated.code, "05.01.00002");
        assert_eq!(allocated.skipped, 1);
    }
}
