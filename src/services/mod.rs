pub mod credentials;
pub mod fulfillment;
pub mod orders;
