//! Core building blocks shared by the providers and the CLI

pub mod cache;
pub mod config;
pub mod currency;
pub mod log;
pub mod session;

// Re-export main types for cleaner imports
pub use cache::TtlCache;
pub use currency::CurrencyRateProvider;
pub use session::{AuthState, Session, UserInfo};
