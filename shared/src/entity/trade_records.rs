//! `SeaORM` Entity, @generated manually

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "trade_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub trade_id: String,
    pub time: DateTimeUtc,
    pub instrument: String,
    pub strategy: String,
    pub units: i64,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub pnl: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub cum_pnl: Decimal,
    pub created_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
