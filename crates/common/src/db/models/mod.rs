//! SeaORM entity models
//!
//! Database entities for ContractDesk

mod contract;
mod contract_document;
mod customer;
mod invoice;
mod revenue;
mod user;
mod vendor;

pub use contract::{
    Entity as ContractEntity,
    Model as Contract,
    ActiveModel as ContractActiveModel,
    Column as ContractColumn,
};

pub use contract_document::{
    Entity as ContractDocumentEntity,
    Model as ContractDocument,
    ActiveModel as ContractDocumentActiveModel,
    Column as ContractDocumentColumn,
};

pub use vendor::{
    Entity as VendorEntity,
    Model as Vendor,
    ActiveModel as VendorActiveModel,
    Column as VendorColumn,
};

pub use invoice::{
    Entity as InvoiceEntity,
    Model as Invoice,
    ActiveModel as InvoiceActiveModel,
    Column as InvoiceColumn,
    InvoiceStatus,
};

pub use customer::{
    Entity as CustomerEntity,
    Model as Customer,
    ActiveModel as CustomerActiveModel,
    Column as CustomerColumn,
};

pub use user::{
    Entity as UserEntity,
    Model as User,
    Column as UserColumn,
};

pub use revenue::{
    Entity as RevenueEntity,
    Model as Revenue,
    Column as RevenueColumn,
};
