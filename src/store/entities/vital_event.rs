//! Vital Event entity — birth/death/burial and other dated facts about a person.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vital_event")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub person_id: String,
    /// Open-vocabulary event type: "birth", "death", "burial", or a provider extension.
    pub event_type: String,
    pub date_original: Option<String>,
    /// Signed year, BC negative; absent when unparseable.
    pub date_year: Option<i32>,
    pub place: Option<String>,
    pub place_id: Option<String>,
    pub source: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::person::Entity",
        from = "Column::PersonId",
        to = "super::person::Column::PersonId"
    )]
    Person,
}

impl Related<super::person::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Person.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
