//! USD to BRL conversion for cost reporting, with a cached exchange rate.

use std::sync::Mutex;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::CurrencyError;

/// Source of the current USD/BRL exchange rate.
pub trait RateSource: Send + Sync {
    /// Fetch the current rate (BRL per USD).
    fn fetch_usd_brl(&self) -> Result<Decimal, CurrencyError>;
}

/// AwesomeAPI `last/USD-BRL` endpoint.
pub struct AwesomeApiSource {
    endpoint: String,
    timeout: StdDuration,
}

impl AwesomeApiSource {
    /// Create a source for the given endpoint URL.
    pub fn new(endpoint: impl Into<String>, timeout: StdDuration) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
        }
    }
}

impl Default for AwesomeApiSource {
    fn default() -> Self {
        Self::new(
            "https://economia.awesomeapi.com.br/last/USD-BRL",
            StdDuration::from_secs(5),
        )
    }
}

impl RateSource for AwesomeApiSource {
    fn fetch_usd_brl(&self) -> Result<Decimal, CurrencyError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;

        // Response format: {"USDBRL": {"bid": "5.02", ...}}
        let body: serde_json::Value = client
            .get(&self.endpoint)
            .send()?
            .error_for_status()?
            .json()?;

        let bid = body
            .pointer("/USDBRL/bid")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| CurrencyError::MalformedResponse("missing USDBRL.bid".to_string()))?;

        bid.parse::<Decimal>()
            .map_err(|e| CurrencyError::MalformedResponse(format!("bid {bid:?}: {e}")))
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedRate {
    rate: Decimal,
    fetched_at: DateTime<Utc>,
}

/// Current exchange state, for reporting endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ExchangeInfo {
    /// Rate currently in effect (BRL per USD).
    pub rate: Decimal,

    /// Whether the rate came from a prior successful fetch.
    pub is_cached: bool,

    /// Age of the cached rate in seconds, zero when nothing is cached.
    pub cache_age_seconds: i64,

    /// When the rate was fetched, absent before the first success.
    pub fetched_at: Option<DateTime<Utc>>,
}

/// USD to BRL converter that fetches at most once per cache window.
///
/// Rate lookup never fails: a fetch error falls back to the last good rate,
/// and before any fetch has succeeded, to a configured default.
pub struct CurrencyConverter {
    source: Box<dyn RateSource>,
    cache_for: Duration,
    fallback_rate: Decimal,
    cached: Mutex<Option<CachedRate>>,
}

impl CurrencyConverter {
    /// Create a converter with a 1-hour cache window and a 5.00 fallback.
    pub fn new(source: impl RateSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            cache_for: Duration::hours(1),
            fallback_rate: Decimal::new(500, 2),
            cached: Mutex::new(None),
        }
    }

    /// Set how long a fetched rate stays fresh.
    pub fn with_cache_duration(mut self, cache_for: Duration) -> Self {
        self.cache_for = cache_for;
        self
    }

    /// Set the rate used before any fetch has succeeded.
    pub fn with_fallback_rate(mut self, rate: Decimal) -> Self {
        self.fallback_rate = rate;
        self
    }

    /// The USD/BRL rate currently in effect.
    pub fn usd_brl_rate(&self) -> Decimal {
        let mut cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(entry) = *cached {
            if Utc::now() - entry.fetched_at <= self.cache_for {
                return entry.rate;
            }
        }

        match self.source.fetch_usd_brl() {
            Ok(rate) => {
                debug!(%rate, "fetched USD/BRL rate");
                *cached = Some(CachedRate {
                    rate,
                    fetched_at: Utc::now(),
                });
                rate
            }
            Err(e) => {
                warn!(error = %e, "rate fetch failed, using last known rate");
                match *cached {
                    Some(entry) => entry.rate,
                    None => self.fallback_rate,
                }
            }
        }
    }

    /// Convert a USD amount to BRL at the current rate.
    pub fn usd_to_brl(&self, usd: Decimal) -> Decimal {
        usd * self.usd_brl_rate()
    }

    /// Format an amount in both currencies: `$0.002499 (R$ 0.0125)`.
    pub fn format_dual_currency(&self, usd: Decimal) -> String {
        let brl = self.usd_to_brl(usd);
        format!("${usd:.6} (R$ {brl:.4})")
    }

    /// Snapshot of the rate cache for reporting.
    pub fn exchange_info(&self) -> ExchangeInfo {
        let rate = self.usd_brl_rate();
        let cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());

        match *cached {
            Some(entry) => ExchangeInfo {
                rate,
                is_cached: Utc::now() - entry.fetched_at <= self.cache_for,
                cache_age_seconds: (Utc::now() - entry.fetched_at).num_seconds(),
                fetched_at: Some(entry.fetched_at),
            },
            None => ExchangeInfo {
                rate,
                is_cached: false,
                cache_age_seconds: 0,
                fetched_at: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use pretty_assertions::assert_eq;

    struct FixedSource(Decimal);

    impl RateSource for FixedSource {
        fn fetch_usd_brl(&self) -> Result<Decimal, CurrencyError> {
            Ok(self.0)
        }
    }

    struct FailingSource;

    impl RateSource for FailingSource {
        fn fetch_usd_brl(&self) -> Result<Decimal, CurrencyError> {
            Err(CurrencyError::MalformedResponse("simulated".to_string()))
        }
    }

    /// Succeeds on the first call, fails afterwards.
    struct FlakySource {
        calls: Arc<AtomicUsize>,
        rate: Decimal,
    }

    impl RateSource for FlakySource {
        fn fetch_usd_brl(&self) -> Result<Decimal, CurrencyError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(self.rate)
            } else {
                Err(CurrencyError::MalformedResponse("simulated".to_string()))
            }
        }
    }

    #[test]
    fn conversion_uses_the_fetched_rate() {
        let converter = CurrencyConverter::new(FixedSource(Decimal::new(525, 2)));
        assert_eq!(
            converter.usd_to_brl(Decimal::new(2, 0)),
            Decimal::new(1050, 2)
        );
    }

    #[test]
    fn fetch_failure_falls_back_to_default() {
        let converter =
            CurrencyConverter::new(FailingSource).with_fallback_rate(Decimal::new(480, 2));
        assert_eq!(converter.usd_brl_rate(), Decimal::new(480, 2));
    }

    #[test]
    fn rate_is_cached_within_the_window() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        struct CountingSource(Arc<AtomicUsize>);
        impl RateSource for CountingSource {
            fn fetch_usd_brl(&self) -> Result<Decimal, CurrencyError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(Decimal::new(510, 2))
            }
        }

        let converter = CurrencyConverter::new(CountingSource(counter));
        converter.usd_brl_rate();
        converter.usd_brl_rate();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stale_rate_survives_later_fetch_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let converter = CurrencyConverter::new(FlakySource {
            calls: Arc::clone(&calls),
            rate: Decimal::new(512, 2),
        })
        .with_cache_duration(Duration::zero());

        assert_eq!(converter.usd_brl_rate(), Decimal::new(512, 2));
        // Cache window of zero forces a refetch, which now fails.
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(converter.usd_brl_rate(), Decimal::new(512, 2));
        assert!(calls.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn dual_currency_formatting() {
        let converter = CurrencyConverter::new(FixedSource(Decimal::new(500, 2)));
        assert_eq!(
            converter.format_dual_currency(Decimal::new(1, 0)),
            "$1.000000 (R$ 5.0000)"
        );
    }

    #[test]
    fn exchange_info_reports_cache_state() {
        let converter = CurrencyConverter::new(FixedSource(Decimal::new(502, 2)));
        let info = converter.exchange_info();
        assert_eq!(info.rate, Decimal::new(502, 2));
        assert!(info.is_cached);
        assert!(info.fetched_at.is_some());
        assert!(info.cache_age_seconds >= 0);

        let never = CurrencyConverter::new(FailingSource);
        let info = never.exchange_info();
        assert!(!info.is_cached);
        assert!(info.fetched_at.is_none());
    }
}
