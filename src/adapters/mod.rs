pub mod memory_payment_store;
pub mod postgres_payment_store;

pub use memory_payment_store::MemoryPaymentStore;
pub use postgres_payment_store::PostgresPaymentStore;
