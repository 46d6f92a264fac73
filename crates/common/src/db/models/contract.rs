//! Contract entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "contracts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    pub vendor_id: Option<Uuid>,

    /// Licensor named in the uploaded document, when it could be read
    #[sea_orm(column_type = "Text", nullable)]
    pub licensor: Option<String>,

    pub start_date: Option<Date>,

    pub end_date: Option<Date>,

    /// Last day the contract can be cancelled before it renews
    pub cancel_by: Option<Date>,

    pub signed_on: Option<Date>,

    pub auto_renew: Option<bool>,

    #[sea_orm(column_type = "Text", nullable)]
    pub payment_terms: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::vendor::Entity",
        from = "Column::VendorId",
        to = "super::vendor::Column::Id"
    )]
    Vendor,

    #[sea_orm(has_many = "super::contract_document::Entity")]
    Documents,
}

impl Related<super::vendor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vendor.def()
    }
}

impl Related<super::contract_document::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Documents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
