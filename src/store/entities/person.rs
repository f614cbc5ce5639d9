//! Person entity — the canonical record for an individual in the graph.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum Gender {
    #[sea_orm(string_value = "male")]
    Male,
    #[sea_orm(string_value = "female")]
    Female,
    #[sea_orm(string_value = "unknown")]
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "person")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub person_id: String,
    pub display_name: String,
    pub birth_name: Option<String>,
    pub gender: Gender,
    pub living: bool,
    pub biography: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::external_identity::Entity")]
    ExternalIdentity,
    #[sea_orm(has_many = "super::vital_event::Entity")]
    VitalEvent,
    #[sea_orm(has_many = "super::claim::Entity")]
    Claim,
    #[sea_orm(has_many = "super::media::Entity")]
    Media,
}

impl Related<super::external_identity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExternalIdentity.def()
    }
}

impl Related<super::vital_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VitalEvent.def()
    }
}

impl Related<super::claim::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Claim.def()
    }
}

impl Related<super::media::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Media.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
