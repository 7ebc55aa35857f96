use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TradeRecords::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(TradeRecords::TradeId).string_len(36).not_null().primary_key())
                    .col(ColumnDef::new(TradeRecords::Time).timestamp().not_null())
                    .col(ColumnDef::new(TradeRecords::Instrument).string().not_null())
                    .col(ColumnDef::new(TradeRecords::Strategy).string().not_null())
                    .col(ColumnDef::new(TradeRecords::Units).big_integer().not_null())
                    .col(ColumnDef::new(TradeRecords::Price).decimal_len(20, 8).not_null())
                    .col(ColumnDef::new(TradeRecords::Pnl).decimal_len(20, 8).not_null())
                    .col(ColumnDef::new(TradeRecords::CumPnl).decimal_len(20, 8).not_null())
                    .col(ColumnDef::new(TradeRecords::CreatedAt).timestamp().default(Expr::cust("CURRENT_TIMESTAMP")))
                    .index(
                        Index::create()
                            .name("idx_trade_records_instrument_strategy_time")
                            .table(TradeRecords::Table)
                            .col(TradeRecords::Instrument)
                            .col(TradeRecords::Strategy)
                            .col(TradeRecords::Time),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TradeRecords::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TradeRecords {
    Table,
    TradeId,
    Time,
    Instrument,
    Strategy,
    Units,
    Price,
    Pnl,
    CumPnl,
    CreatedAt,
}
