pub mod common;
pub mod health;
pub mod inventory;
pub mod items;
pub mod purchase_orders;
pub mod work_orders;
