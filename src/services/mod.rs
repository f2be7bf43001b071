pub mod items;
pub mod numbering;
pub mod purchase_orders;
pub mod stock_ledger;
pub mod work_orders;
