use crate::core::cache::{DEFAULT_TTL, TtlCache};
use crate::core::currency::CurrencyRateProvider;
use crate::providers::http_client::HttpClient;
use crate::providers::normalizers::extract_items_from_hydra_response;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, instrument, warn};

pub const BASE_CURRENCY: &str = "EUR";
pub const RATES_CACHE_KEY: &str = "currency-rates";
const RATES_ENDPOINT: &str = "/currency-rates?currency=EUR";

/// Units of EUR per unit of each currency.
pub type RateTable = HashMap<String, f64>;

#[derive(Debug)]
struct RatesState {
    rates: RateTable,
    loading: bool,
    error: Option<String>,
}

impl Default for RatesState {
    /// Loading until the first fetch settles.
    fn default() -> Self {
        RatesState {
            rates: RateTable::new(),
            loading: true,
            error: None,
        }
    }
}

fn fallback_rates() -> RateTable {
    HashMap::from([(BASE_CURRENCY.to_string(), 1.0)])
}

fn rate_value(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

/// Turns "1 EUR = rate x target" pairs into "1 target = 1/rate EUR".
fn invert_rates(data: &Value) -> RateTable {
    let mut table = fallback_rates();
    for item in extract_items_from_hydra_response(data) {
        let Some(currency) = item.get("targetCurrency").and_then(Value::as_str) else {
            continue;
        };
        match item.get("rate").and_then(rate_value) {
            Some(rate) if rate > 0.0 => {
                table.insert(currency.to_string(), 1.0 / rate);
            }
            other => warn!(currency, rate = ?other, "Skipping non-positive currency rate"),
        }
    }
    table.insert(BASE_CURRENCY.to_string(), 1.0);
    table
}

/// Currency conversion table fetched once and memoized in the shared cache.
///
/// Failures never surface to callers: the table degrades to `{EUR: 1.0}`
/// and the message is kept in `error()`.
pub struct CurrencyRates {
    http: Arc<HttpClient>,
    cache: Arc<TtlCache<RateTable>>,
    state: RwLock<RatesState>,
}

impl CurrencyRates {
    pub fn new(http: Arc<HttpClient>, cache: Arc<TtlCache<RateTable>>) -> Self {
        CurrencyRates {
            http,
            cache,
            state: RwLock::new(RatesState::default()),
        }
    }

    fn update(&self, f: impl FnOnce(&mut RatesState)) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        f(&mut state);
    }

    fn read<T>(&self, f: impl FnOnce(&RatesState) -> T) -> T {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        f(&state)
    }

    #[instrument(name = "CurrencyRatesFetch", skip(self))]
    pub async fn fetch(&self) -> RateTable {
        if let Some(cached) = self.cache.get(RATES_CACHE_KEY).await {
            self.update(|state| {
                state.rates = cached.clone();
                state.loading = false;
                state.error = None;
            });
            return cached;
        }

        self.update(|state| {
            state.loading = true;
            state.error = None;
        });

        let rates = match self.http.get(RATES_ENDPOINT).await {
            Ok(response) => {
                let table = invert_rates(&response.data.into_json());
                debug!(currencies = table.len(), "Fetched currency rates");
                self.cache
                    .set(RATES_CACHE_KEY, table.clone(), Some(DEFAULT_TTL))
                    .await;
                self.update(|state| state.rates = table.clone());
                table
            }
            Err(e) => {
                warn!(error = %e, "Currency rate fetch failed, using identity rates");
                let table = fallback_rates();
                self.update(|state| {
                    state.rates = table.clone();
                    state.error = Some(e.to_string());
                });
                table
            }
        };

        self.update(|state| state.loading = false);
        rates
    }

    pub async fn refetch(&self) -> RateTable {
        self.fetch().await
    }

    pub fn rates(&self) -> RateTable {
        self.read(|state| state.rates.clone())
    }

    pub fn loading(&self) -> bool {
        self.read(|state| state.loading)
    }

    pub fn error(&self) -> Option<String> {
        self.read(|state| state.error.clone())
    }

    /// EUR value of one unit of `currency`. Unknown or missing codes give 1.0.
    pub fn get_rate(&self, currency: Option<&str>) -> f64 {
        match currency {
            None | Some("") | Some(BASE_CURRENCY) => 1.0,
            Some(code) => self.read(|state| state.rates.get(code).copied().unwrap_or(1.0)),
        }
    }
}

#[async_trait]
impl CurrencyRateProvider for CurrencyRates {
    async fn get_rate(&self, from: &str, to: &str) -> Result<f64> {
        if from == to {
            return Ok(1.0);
        }
        if self.read(|state| state.rates.is_empty()) {
            self.fetch().await;
        }
        Ok(CurrencyRates::get_rate(self, Some(from)) / CurrencyRates::get_rate(self, Some(to)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::Session;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn rates_server(body: Value, expected_calls: u64) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/currency-rates"))
            .and(query_param("currency", "EUR"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(expected_calls)
            .mount(&server)
            .await;
        server
    }

    fn rates_for(server: &MockServer) -> CurrencyRates {
        let http = HttpClient::new(&server.uri(), Arc::new(Session::in_memory())).unwrap();
        CurrencyRates::new(Arc::new(http), Arc::new(TtlCache::new()))
    }

    fn usd_gbp() -> Value {
        json!({"member": [
            {"baseCurrency": "EUR", "targetCurrency": "USD", "rate": 1.25},
            {"baseCurrency": "EUR", "targetCurrency": "GBP", "rate": "0.8"}
        ]})
    }

    #[test]
    fn test_invert_rates() {
        let table = invert_rates(&usd_gbp());
        assert_eq!(table["EUR"], 1.0);
        assert!((table["USD"] - 0.8).abs() < 1e-9);
        assert!((table["GBP"] - 1.25).abs() < 1e-9);
    }

    #[test]
    fn test_invert_rates_skips_bad_entries() {
        let table = invert_rates(&json!({"member": [
            {"targetCurrency": "JPY", "rate": 0},
            {"targetCurrency": "CHF", "rate": -2.0},
            {"rate": 2.0},
            {"targetCurrency": "EUR", "rate": 4.0}
        ]}));
        assert_eq!(table, fallback_rates());
    }

    #[tokio::test]
    async fn test_get_rate_before_fetch_is_identity() {
        let server = MockServer::start().await;
        let rates = rates_for(&server);
        assert_eq!(rates.get_rate(Some("USD")), 1.0);
        assert_eq!(rates.get_rate(None), 1.0);
        assert_eq!(rates.get_rate(Some("")), 1.0);
        assert!(rates.loading());
    }

    #[tokio::test]
    async fn test_fetch_is_cached() {
        let server = rates_server(usd_gbp(), 1).await;
        let http = HttpClient::new(&server.uri(), Arc::new(Session::in_memory())).unwrap();
        let cache = Arc::new(TtlCache::new());

        let first = CurrencyRates::new(Arc::new(http), Arc::clone(&cache));
        assert!(first.loading());
        first.fetch().await;
        assert!(!first.loading());
        assert!((first.get_rate(Some("USD")) - 0.8).abs() < 1e-9);
        assert_eq!(first.get_rate(Some("XYZ")), 1.0);
        assert_eq!(first.get_rate(Some("EUR")), 1.0);
        assert!(first.error().is_none());

        first.refetch().await;
        assert!(cache.has(RATES_CACHE_KEY).await);

        let http = HttpClient::new(&server.uri(), Arc::new(Session::in_memory())).unwrap();
        let second = CurrencyRates::new(Arc::new(http), Arc::clone(&cache));
        assert!(second.loading());
        second.fetch().await;
        assert!(!second.loading());
        assert!((second.get_rate(Some("GBP")) - 1.25).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_fetch_failure_falls_back_to_identity() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/currency-rates"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let rates = rates_for(&server);
        let table = rates.fetch().await;
        assert_eq!(table, fallback_rates());
        assert_eq!(rates.get_rate(Some("USD")), 1.0);
        assert!(rates.error().is_some());
        assert!(!rates.loading());
    }

    #[tokio::test]
    async fn test_provider_converts_through_eur() {
        let server = rates_server(usd_gbp(), 1).await;
        let rates = rates_for(&server);

        let provider: &dyn CurrencyRateProvider = &rates;
        let usd_to_gbp = provider.get_rate("USD", "GBP").await.unwrap();
        assert!((usd_to_gbp - 0.64).abs() < 1e-9);
        assert_eq!(provider.get_rate("GBP", "GBP").await.unwrap(), 1.0);
        let usd_to_eur = provider.get_rate("USD", "EUR").await.unwrap();
        assert!((usd_to_eur - 0.8).abs() < 1e-9);
    }
}
