//! Favorite entity — a person marked interesting within a specific database.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "favorite")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub db_id: String,
    pub person_id: String,
    pub why_interesting: Option<String>,
    /// Ordered list of tags, stored as a JSON array.
    pub tags: Json,
    pub added_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::database_info::Entity",
        from = "Column::DbId",
        to = "super::database_info::Column::DbId"
    )]
    DatabaseInfo,
}

impl Related<super::database_info::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DatabaseInfo.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
