//! Infrastructure implementations of the ports.

pub mod fake_gateway;
pub mod memory_payment_store;
pub mod postgres_payment_store;

pub use fake_gateway::FakeGateway;
pub use memory_payment_store::MemoryPaymentStore;
pub use postgres_payment_store::PostgresPaymentStore;
