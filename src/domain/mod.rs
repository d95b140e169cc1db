pub mod order;
pub mod payment;

pub use order::{Order, OrderSide, OrderStatus};
pub use payment::{
    LedgerEffect, LedgerEntry, LedgerEntryType, PaymentRequest, PaymentStatus, PaymentType,
    ProviderUpdate, UserBalance,
};
