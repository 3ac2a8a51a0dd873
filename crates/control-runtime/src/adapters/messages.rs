//! Operator alert texts: English primary, Swahili localized.

use shared_types::LocalizedMessage;

pub fn fraud_critical(identity_id: &str, score: u8) -> LocalizedMessage {
    LocalizedMessage::new(
        format!("Critical fraud risk (score {score}) for identity {identity_id}"),
        format!("Hatari kubwa ya udanganyifu (alama {score}) kwa kitambulisho {identity_id}"),
    )
}

pub fn transaction_denied(identity_id: &str, policy: &str) -> LocalizedMessage {
    LocalizedMessage::new(
        format!("Transaction for identity {identity_id} denied by policy '{policy}'"),
        format!("Muamala wa kitambulisho {identity_id} umekataliwa na sera '{policy}'"),
    )
}

pub fn transaction_review(identity_id: &str, policy: &str) -> LocalizedMessage {
    LocalizedMessage::new(
        format!("Transaction for identity {identity_id} held for review by policy '{policy}'"),
        format!("Muamala wa kitambulisho {identity_id} umesimamishwa kwa ukaguzi na sera '{policy}'"),
    )
}

pub fn circuit_opened(service_id: &str, failures: u32) -> LocalizedMessage {
    LocalizedMessage::new(
        format!("Circuit opened for {service_id} after {failures} failures"),
        format!("Saketi ya {service_id} imefunguliwa baada ya hitilafu {failures}"),
    )
}

pub fn partition_overloaded(partition: u32, capacity: usize) -> LocalizedMessage {
    LocalizedMessage::new(
        format!("Partition {partition} overloaded (capacity {capacity})"),
        format!("Sehemu {partition} imejaa (uwezo {capacity})"),
    )
}

pub fn dead_letter_watermark(count: usize, watermark: usize) -> LocalizedMessage {
    LocalizedMessage::new(
        format!("{count} dead letters pending (watermark {watermark})"),
        format!("Barua {count} zisizowasilishwa zinasubiri (kikomo {watermark})"),
    )
}
