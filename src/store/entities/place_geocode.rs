//! Place Geocode entity — the geocoder's cache, keyed by normalized place text.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum GeocodeStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "resolved")]
    Resolved,
    #[sea_orm(string_value = "not_found")]
    NotFound,
    #[sea_orm(string_value = "error")]
    Error,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "place_geocode")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub place_text: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub display_name: Option<String>,
    pub geocode_status: GeocodeStatus,
    pub geocoded_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
