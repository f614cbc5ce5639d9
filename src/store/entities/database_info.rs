//! Database Info entity — a named rooted subgraph ("database" in spec terms).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "database_info")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub db_id: String,
    pub name: String,
    pub root_id: String,
    pub max_generations: Option<i32>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::database_membership::Entity")]
    Membership,
    #[sea_orm(has_many = "super::favorite::Entity")]
    Favorite,
}

impl Related<super::database_membership::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Membership.def()
    }
}

impl Related<super::favorite::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Favorite.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
