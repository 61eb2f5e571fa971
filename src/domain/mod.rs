pub mod payment;

pub use payment::{Buyer, CompletionSignal, NewPayment, Payment, Product};
