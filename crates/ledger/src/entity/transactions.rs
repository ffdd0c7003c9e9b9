//! transactions entity
//!
//! The row id is the caller-supplied idempotency key; the primary key is what
//! makes a duplicate submission fail. `balance` is the signed sum applied to
//! the target wallet and a null `from_wallet_id` marks an external deposit or
//! withdrawal. Rows are immutable once written.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub from_wallet_id: Option<Uuid>,
    pub to_wallet_id: Uuid,
    pub currency: String,
    pub balance: Decimal,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::wallets::Entity",
        from = "Column::FromWalletId",
        to = "super::wallets::Column::Id"
    )]
    SourceWallet,
    #[sea_orm(
        belongs_to = "super::wallets::Entity",
        from = "Column::ToWalletId",
        to = "super::wallets::Column::Id"
    )]
    TargetWallet,
}

impl ActiveModelBehavior for ActiveModel {}
