pub mod item;
pub mod purchase_order;
pub mod purchase_order_item;
pub mod stock_adjustment;
pub mod work_order;
pub mod work_order_item;

pub use item::Entity as Item;
pub use purchase_order::Entity as PurchaseOrder;
pub use purchase_order_item::Entity as PurchaseOrderItem;
pub use stock_adjustment::Entity as StockAdjustment;
pub use work_order::Entity as WorkOrder;
pub use work_order_item::Entity as WorkOrderItem;
