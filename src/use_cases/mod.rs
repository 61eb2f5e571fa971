pub mod record_payment;

pub use record_payment::{PaymentDecision, RecordPayment};
