use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "revenue")]
pub struct Model {
    /// Three-letter month label, e.g. "Jan"
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub month: String,

    /// Revenue in major currency units
    pub revenue: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
