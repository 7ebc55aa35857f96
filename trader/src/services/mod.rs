pub mod ledger_service;
pub mod oanda;
