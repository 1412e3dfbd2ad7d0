//! Adapters between the Hydra API and the rest of the crate.

pub mod access_control;
pub mod auth_provider;
pub mod currency_rates;
pub mod data_provider;
pub mod filter_mapping;
pub mod http_client;
pub mod normalizers;

pub use auth_provider::AuthProvider;
pub use currency_rates::CurrencyRates;
pub use data_provider::{DataProvider, ListParams, ListResult, Pagination};
pub use http_client::{HttpClient, HttpError};
