//! Currency normalization through an exchange-rate service.
//!
//! The service is the open.er-api.com `latest` endpoint:
//! `GET {endpoint}/{BASE}` answers
//! `{ "result": "success", "base_code": "EUR", "rates": { "USD": 1.08, ... } }`.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::currency::Currency;
use crate::error::RateError;
use crate::models::RateConfig;

/// Payload of a rate lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    /// `"success"` or `"error"`.
    pub result: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_code: Option<String>,

    /// Units of each currency per one unit of the base.
    #[serde(default)]
    pub rates: HashMap<String, f64>,
}

impl RateTable {
    pub fn is_success(&self) -> bool {
        self.result == "success"
    }

    /// Rate for a target currency.
    pub fn rate(&self, target: Currency) -> Option<f64> {
        self.rates.get(target.code()).copied()
    }
}

/// Source of exchange rates.
///
/// Futures are not required to be `Send` so the browser fetch backend can
/// implement this.
#[async_trait(?Send)]
pub trait RateSource {
    /// Latest rates with `base` as the base currency.
    async fn latest_rates(&self, base: Currency) -> Result<RateTable, RateError>;
}

/// Rate source backed by an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpRateSource {
    client: Client,
    endpoint: String,
}

impl HttpRateSource {
    /// Build a source from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RateError::Http`] if the HTTP client cannot be constructed.
    pub fn new(config: &RateConfig) -> Result<Self, RateError> {
        let builder = Client::builder();

        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(std::time::Duration::from_secs(config.timeout_secs));

        Ok(Self {
            client: builder.build()?,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// Use an existing client.
    pub fn with_client(client: Client, endpoint: impl Into<String>) -> Self {
        let endpoint: String = endpoint.into();
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait(?Send)]
impl RateSource for HttpRateSource {
    async fn latest_rates(&self, base: Currency) -> Result<RateTable, RateError> {
        let url = format!("{}/{}", self.endpoint, base.code());
        debug!("Fetching rates from {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RateError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| RateError::Malformed(e.to_string()))
    }
}

/// `amount * rate` rounded half away from zero to cents, or `None` on overflow.
pub fn apply_rate(amount: Decimal, rate: Decimal) -> Option<Decimal> {
    amount
        .checked_mul(rate)
        .map(|v| v.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

/// Converts amounts into the reference currency.
#[derive(Debug, Clone)]
pub struct CurrencyConverter<R> {
    source: R,
    reference: Currency,
}

impl<R: RateSource> CurrencyConverter<R> {
    /// Converter into US Dollars.
    pub fn new(source: R) -> Self {
        Self::with_reference(source, Currency::Usd)
    }

    pub fn with_reference(source: R, reference: Currency) -> Self {
        Self { source, reference }
    }

    pub fn reference(&self) -> Currency {
        self.reference
    }

    pub fn source(&self) -> &R {
        &self.source
    }

    /// Rate from `from` to the reference currency.
    pub async fn rate(&self, from: Currency) -> Result<Decimal, RateError> {
        let table = self.source.latest_rates(from).await?;
        if !table.is_success() {
            return Err(RateError::Unsuccessful {
                base: from.code().to_string(),
                result: table.result,
            });
        }

        let rate = table.rate(self.reference).ok_or_else(|| RateError::MissingRate {
            base: from.code().to_string(),
            target: self.reference.code().to_string(),
        })?;

        Decimal::try_from(rate)
            .ok()
            .filter(|r| *r > Decimal::ZERO)
            .ok_or_else(|| RateError::Malformed(format!("rate {} is not a positive number", rate)))
    }

    /// Convert into the reference currency, rounded to cents.
    ///
    /// The reference currency is returned untouched without a lookup. Any
    /// lookup failure is logged and the amount is returned unchanged.
    pub async fn convert_to_usd(&self, amount: Decimal, from: Currency) -> Decimal {
        if from == self.reference {
            return amount;
        }

        match self.rate(from).await {
            Ok(rate) => match apply_rate(amount, rate) {
                Some(converted) => {
                    info!(
                        "Converted {} {} to {} {}",
                        amount, from, converted, self.reference
                    );
                    converted
                }
                None => {
                    warn!(
                        "Converting {} {} at {} overflows, using original amount",
                        amount, from, rate
                    );
                    amount
                }
            },
            Err(e) => {
                warn!(
                    "Currency conversion from {} failed, using original amount: {}",
                    from, e
                );
                amount
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::cell::Cell;
    use std::str::FromStr;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    /// Counts lookups and answers with a fixed table.
    struct CountingSource {
        table: RateTable,
        calls: Cell<u32>,
    }

    impl CountingSource {
        fn with_usd_rate(rate: f64) -> Self {
            Self {
                table: RateTable {
                    result: "success".to_string(),
                    base_code: None,
                    rates: HashMap::from([("USD".to_string(), rate)]),
                },
                calls: Cell::new(0),
            }
        }
    }

    #[async_trait(?Send)]
    impl RateSource for CountingSource {
        async fn latest_rates(&self, _base: Currency) -> Result<RateTable, RateError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.table.clone())
        }
    }

    fn http_converter(server: &MockServer) -> CurrencyConverter<HttpRateSource> {
        let config = RateConfig {
            endpoint: format!("{}/v6/latest/", server.uri()),
            timeout_secs: 5,
        };
        CurrencyConverter::new(HttpRateSource::new(&config).unwrap())
    }

    #[tokio::test]
    async fn test_usd_needs_no_lookup() {
        let converter = CurrencyConverter::new(CountingSource::with_usd_rate(2.0));
        let amount = converter.convert_to_usd(dec("44.50"), Currency::Usd).await;
        assert_eq!(amount, dec("44.50"));
        assert_eq!(converter.source().calls.get(), 0);
    }

    #[tokio::test]
    async fn test_converts_and_rounds() {
        let converter = CurrencyConverter::new(CountingSource::with_usd_rate(0.012));
        let amount = converter.convert_to_usd(dec("1250"), Currency::Inr).await;
        assert_eq!(amount, dec("15.00"));
        assert_eq!(converter.source().calls.get(), 1);

        let converter = CurrencyConverter::new(CountingSource::with_usd_rate(1.0833));
        let amount = converter.convert_to_usd(dec("99.99"), Currency::Eur).await;
        assert_eq!(amount, dec("108.32"));
    }

    #[test]
    fn test_apply_rate() {
        assert_eq!(apply_rate(dec("99.99"), dec("1.0833")), Some(dec("108.32")));
        assert_eq!(apply_rate(dec("0.125"), dec("1")), Some(dec("0.13")));
        assert_eq!(apply_rate(Decimal::MAX, dec("2")), None);
    }

    #[tokio::test]
    async fn test_overflowing_total_keeps_amount() {
        let converter = CurrencyConverter::new(CountingSource::with_usd_rate(1.1));
        let huge = dec("79000000000000000000000000000");
        assert_eq!(converter.convert_to_usd(huge, Currency::Eur).await, huge);
        assert_eq!(converter.source().calls.get(), 1);
    }

    #[tokio::test]
    async fn test_http_source_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v6/latest/EUR"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "success",
                "base_code": "EUR",
                "rates": { "EUR": 1.0, "USD": 1.1 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let amount = http_converter(&server)
            .convert_to_usd(dec("20.00"), Currency::Eur)
            .await;
        assert_eq!(amount, dec("22.00"));
    }

    #[tokio::test]
    async fn test_unsuccessful_result_keeps_amount() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v6/latest/GBP"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "error",
                "error-type": "unsupported-code"
            })))
            .mount(&server)
            .await;

        let converter = http_converter(&server);
        let err = converter.rate(Currency::Gbp).await.unwrap_err();
        assert!(matches!(err, RateError::Unsuccessful { .. }), "{err:?}");
        assert_eq!(
            converter.convert_to_usd(dec("10"), Currency::Gbp).await,
            dec("10")
        );
    }

    #[tokio::test]
    async fn test_missing_rate_keeps_amount() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v6/latest/JPY"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "success",
                "rates": { "EUR": 0.006 }
            })))
            .mount(&server)
            .await;

        let converter = http_converter(&server);
        let err = converter.rate(Currency::Jpy).await.unwrap_err();
        assert!(matches!(err, RateError::MissingRate { .. }), "{err:?}");
        assert_eq!(
            converter.convert_to_usd(dec("5000"), Currency::Jpy).await,
            dec("5000")
        );
    }

    #[tokio::test]
    async fn test_server_error_keeps_amount() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let converter = http_converter(&server);
        let err = converter.rate(Currency::Cad).await.unwrap_err();
        assert!(
            matches!(err, RateError::UnexpectedStatus { status: 503, .. }),
            "{err:?}"
        );
        assert_eq!(
            converter.convert_to_usd(dec("7.25"), Currency::Cad).await,
            dec("7.25")
        );
    }

    #[tokio::test]
    async fn test_malformed_body_keeps_amount() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let converter = http_converter(&server);
        let err = converter.rate(Currency::Chf).await.unwrap_err();
        assert!(matches!(err, RateError::Malformed(_)), "{err:?}");
        assert_eq!(
            converter.convert_to_usd(dec("3"), Currency::Chf).await,
            dec("3")
        );
    }
}
