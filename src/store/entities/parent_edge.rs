//! Parent Edge entity — a directed child→parent link.
//!
//! Cycles are possible (mis-linked provider data) and must be tolerated by every
//! traversal; this entity makes no attempt to prevent them.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum ParentRole {
    #[sea_orm(string_value = "father")]
    Father,
    #[sea_orm(string_value = "mother")]
    Mother,
    #[sea_orm(string_value = "parent")]
    Parent,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "parent_edge")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub child_id: String,
    pub parent_id: String,
    pub parent_role: ParentRole,
    pub source: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
