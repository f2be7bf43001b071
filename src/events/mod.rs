use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::entities::stock_adjustment::AdjustmentType;

/// Domain events emitted after state changes commit. The processor is
/// observe-only; event delivery never feeds back into stock state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    ItemCreated(i64),
    ItemUpdated(i64),
    StockAdjusted {
        item_id: i64,
        adjustment_type: AdjustmentType,
        quantity_change: i32,
        new_stock: i32,
    },
    WorkOrderCreated(i64),
    WorkOrderStarted(i64),
    WorkOrderCompleted(i64),
    WorkOrderCancelled(i64),
    PurchaseOrderCreated(i64),
    PurchaseOrderStatusChanged {
        purchase_order_id: i64,
        old_status: String,
        new_status: String,
    },
    PurchaseOrderReceived(i64),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Background consumer for the event channel. Runs until every sender is
/// dropped.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::StockAdjusted {
                item_id,
                adjustment_type,
                quantity_change,
                new_stock,
            } => {
                info!(
                    item_id,
                    %adjustment_type,
                    quantity_change,
                    new_stock,
                    "stock adjusted"
                );
            }
            other => info!(event = ?other, "event processed"),
        }
    }
    warn!("event channel closed, processor shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);
        sender
            .send(Event::ItemCreated(42))
            .await
            .expect("send failed");
        match rx.recv().await {
            Some(Event::ItemCreated(id)) => assert_eq!(id, 42),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_fails_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        assert!(sender.send(Event::ItemCreated(1)).await.is_err());
    }
}
