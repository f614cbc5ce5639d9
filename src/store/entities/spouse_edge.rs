//! Spouse Edge entity — an unordered pairing, canonicalized with `person1_id < person2_id`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "spouse_edge")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub person1_id: String,
    pub person2_id: String,
    pub source: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Canonicalizes a spouse pair so `person1_id < person2_id` lexicographically.
pub fn canonical_pair(a: &str, b: &str) -> (String, String) {
    if a < b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}
