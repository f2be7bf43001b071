use chrono::Utc;
use uuid::Uuid;

/// External collaborator supplying human-readable document numbers. The
/// format is a presentation detail; the core only relies on uniqueness.
pub trait NumberingService: Send + Sync {
    fn next_work_order_number(&self) -> String;
    fn next_purchase_order_number(&self) -> String;
}

/// Default generator: date plus a random suffix.
#[derive(Debug, Default, Clone)]
pub struct DocumentNumbering;

impl DocumentNumbering {
    fn generate(prefix: &str) -> String {
        let timestamp = Utc::now().format("%Y%m%d");
        let random = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
        format!("{}-{}-{}", prefix, timestamp, random)
    }
}

impl NumberingService for DocumentNumbering {
    fn next_work_order_number(&self) -> String {
        Self::generate("WO")
    }

    fn next_purchase_order_number(&self) -> String {
        Self::generate("PO")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_carry_the_document_prefix() {
        let numbering = DocumentNumbering;
        assert!(numbering.next_work_order_number().starts_with("WO-"));
        assert!(numbering.next_purchase_order_number().starts_with("PO-"));
    }

    #[test]
    fn numbers_are_unique_across_calls() {
        let numbering = DocumentNumbering;
        let a = numbering.next_purchase_order_number();
        let b = numbering.next_purchase_order_number();
        assert_ne!(a, b);
    }
}
