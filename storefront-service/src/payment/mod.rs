pub mod checkout;
pub mod provider;

pub use checkout::HttpCheckoutProvider;
pub use provider::{CheckoutSession, PaymentNotification, PaymentOutcome, PaymentProvider};
