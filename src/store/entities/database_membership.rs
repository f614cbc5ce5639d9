//! Database Membership entity — records a person's generation within a database.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "database_membership")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub db_id: String,
    pub person_id: String,
    pub is_root: bool,
    pub generation: i32,
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
