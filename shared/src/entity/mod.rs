pub mod trade_records;
