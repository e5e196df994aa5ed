pub mod address_validator;
pub mod amount;
pub mod time_utils;

// Re-export commonly used functions
pub use address_validator::AddressValidator;
pub use amount::{ether_to_wei, parse_positive_amount, wei_to_ether};
pub use time_utils::*;
