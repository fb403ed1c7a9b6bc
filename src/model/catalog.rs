use crate::model::{generate_id, now, Id, UserContext};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Catalog classification shared by a group and every item filed under it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    RawMaterial,
    IntermediateProduct,
    FinishedProduct,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::RawMaterial => "raw_material",
            Category::IntermediateProduct => "intermediate_product",
            Category::FinishedProduct => "finished_product",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw_material" => Ok(Category::RawMaterial),
            "intermediate_product" => Ok(Category::IntermediateProduct),
            "finished_product" => Ok(Category::FinishedProduct),
            other => Err(format!("Unknown category '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Active,
    Inactive,
    Discontinued,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Active => "active",
            ItemStatus::Inactive => "inactive",
            ItemStatus::Discontinued => "discontinued",
        }
    }
}

impl FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ItemStatus::Active),
            "inactive" => Ok(ItemStatus::Inactive),
            "discontinued" => Ok(ItemStatus::Discontinued),
            other => Err(format!("Unknown item status '{}'", other)),
        }
    }
}

/// Top-level catalog classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: Id,
    pub code: String,
    pub name: String,
    pub category: Category,
    pub active: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

/// Second-level classification. Owns the sequence counter used for item codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subgroup {
    pub id: Id,
    pub group_id: Id,
    pub code: String,
    pub name: String,
    /// Last sequence number handed out by the code allocator
    pub last_sequence: i32,
    pub active: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: Id,
    pub code: String,
    pub name: String,
    pub group_id: Id,
    pub subgroup_id: Option<Id>,
    /// Always mirrors the owning group's category
    pub category: Category,
    /// Free-form technical data (dimensions, load ratings, finishes...)
    #[serde(default)]
    pub specification: serde_json::Value,
    pub unit: String,
    pub min_stock: Option<Decimal>,
    pub max_stock: Option<Decimal>,
    pub status: ItemStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

fn default_unit() -> String {
    "un".to_string()
}

/// Input model for creating a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewGroup {
    pub code: String,
    pub name: String,
    pub category: Category,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl NewGroup {
    /// Build the stored group. `code` must already be normalized.
    pub fn into_group(self, code: String, user: &UserContext) -> Group {
        let timestamp = now();
        Group {
            id: generate_id(),
            code,
            name: self.name,
            category: self.category,
            active: self.active,
            created_by: user.user_id.clone(),
            created_at: timestamp,
            updated_by: user.user_id.clone(),
            updated_at: timestamp,
        }
    }
}

/// Input model for creating a subgroup under an existing group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSubgroup {
    pub code: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub active: bool,
    /// Counter value to start from, for subgroups carried over from older records
    #[serde(default)]
    pub starting_sequence: Option<i32>,
}

impl NewSubgroup {
    pub fn into_subgroup(self, group_id: Id, code: String, user: &UserContext) -> Subgroup {
        let timestamp = now();
        Subgroup {
            id: generate_id(),
            group_id,
            code,
            name: self.name,
            last_sequence: self.starting_sequence.unwrap_or(0),
            active: self.active,
            created_by: user.user_id.clone(),
            created_at: timestamp,
            updated_by: user.user_id.clone(),
            updated_at: timestamp,
        }
    }
}

/// Input model for creating a catalog item.
///
/// When `code` is absent a `subgroup_id` is required and the code is allocated
/// from that subgroup's sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCatalogItem {
    #[serde(default)]
    pub code: Option<String>,
    pub name: String,
    pub group_id: Id,
    #[serde(default)]
    pub subgroup_id: Option<Id>,
    #[serde(default)]
    pub specification: serde_json::Value,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default)]
    pub min_stock: Option<Decimal>,
    #[serde(default)]
    pub max_stock: Option<Decimal>,
    #[serde(default)]
    pub status: ItemStatus,
}

/// Partial update of a catalog item. The code is immutable once issued.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogItemUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub group_id: Option<Id>,
    /// `Some(None)` detaches the item from its subgroup
    #[serde(default, deserialize_with = "double_option")]
    pub subgroup_id: Option<Option<Id>>,
    #[serde(default)]
    pub specification: Option<serde_json::Value>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub min_stock: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "double_option")]
    pub max_stock: Option<Option<Decimal>>,
    #[serde(default)]
    pub status: Option<ItemStatus>,
}

// Distinguishes an absent field (outer None) from an explicit null (Some(None)).
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemFilter {
    #[serde(default)]
    pub group_id: Option<Id>,
    #[serde(default)]
    pub subgroup_id: Option<Id>,
    #[serde(default)]
    pub status: Option<ItemStatus>,
}

impl ItemFilter {
    pub fn matches(&self, item: &CatalogItem) -> bool {
        self.group_id.as_ref().map_or(true, |g| &item.group_id == g)
            && self
                .subgroup_id
                .as_ref()
                .map_or(true, |s| item.subgroup_id.as_ref() == Some(s))
            && self.status.map_or(true, |s| item.status == s)
    }
}

/// Check that stock thresholds are non-negative and ordered
pub fn validate_stock_thresholds(
    min_stock: Option<Decimal>,
    max_stock: Option<Decimal>,
) -> Result<(), String> {
    if let Some(min) = min_stock {
        if min < Decimal::ZERO {
            return Err("min_stock must not be negative".to_string());
        }
    }
    if let Some(max) = max_stock {
        if max < Decimal::ZERO {
            return Err("max_stock must not be negative".to_string());
        }
    }
    if let (Some(min), Some(max)) = (min_stock, max_stock) {
        if min > max {
            return Err(format!(
                "min_stock ({}) must not exceed max_stock ({})",
                min, max
            ));
        }
    }
    Ok(())
}
