// src/currency.rs
//! Currency normalization.
//!
//! Listings are priced in GBP (occasionally USD). Amounts are brought to a GBP
//! base with a fixed approximation, then into the user's display currency
//! through a units-per-GBP rate table. The table starts from hardcoded
//! fallbacks and is refreshed from a remote provider at most once per
//! [`RATE_TTL_HOURS`]; a failed refresh keeps whatever was known before.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::consts::{EXCHANGE_RATES, HTTP_TIMEOUT_SECS, LAST_RATE_UPDATE, RATE_TTL_HOURS, RATES_URL};
use crate::core::money::{Money, parse_amount};
use crate::error::{RateError, StoreError};
use crate::store::{self, KvStore};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usd,
    Cad,
    Gbp,
    Eur,
    Aud,
    Nzd,
}

impl Currency {
    pub const ALL: [Currency; 6] = [
        Currency::Usd,
        Currency::Cad,
        Currency::Gbp,
        Currency::Eur,
        Currency::Aud,
        Currency::Nzd,
    ];

    /// Base currency of source listings.
    pub const BASE: Currency = Currency::Gbp;

    pub fn code(self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Cad => "CAD",
            Currency::Gbp => "GBP",
            Currency::Eur => "EUR",
            Currency::Aud => "AUD",
            Currency::Nzd => "NZD",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Currency::Usd => "$",
            Currency::Cad => "CA$",
            Currency::Gbp => "£",
            Currency::Eur => "€",
            Currency::Aud => "A$",
            Currency::Nzd => "NZ$",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Currency::Usd => "US Dollar",
            Currency::Cad => "Canadian Dollar",
            Currency::Gbp => "British Pound",
            Currency::Eur => "Euro",
            Currency::Aud => "Australian Dollar",
            Currency::Nzd => "New Zealand Dollar",
        }
    }

    /// Units per GBP used when no live rate is known.
    pub fn fallback_rate(self) -> f64 {
        match self {
            Currency::Usd => 1.27,
            Currency::Cad => 1.73,
            Currency::Gbp => 1.00,
            Currency::Eur => 1.16,
            Currency::Aud => 1.93,
            Currency::Nzd => 2.08,
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code().eq_ignore_ascii_case(code.trim()))
    }

    /// Split a leading currency symbol off `s`. Longer symbols win (`CA$` before `$`).
    pub fn strip_symbol(s: &str) -> Option<(Currency, &str)> {
        const BY_LENGTH: [Currency; 6] = [
            Currency::Cad,
            Currency::Nzd,
            Currency::Aud,
            Currency::Gbp,
            Currency::Eur,
            Currency::Usd,
        ];
        BY_LENGTH
            .into_iter()
            .find_map(|c| s.strip_prefix(c.symbol()).map(|rest| (c, rest)))
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| format!("unsupported currency: {s}"))
    }
}

/// `format(1.5, USD)` → `"$1.50"`.
pub fn format(amount: f64, currency: Currency) -> String {
    format!("{}{:.2}", currency.symbol(), amount)
}

/// Bring a source display string to the GBP base: `$` ×0.8, `€` ×0.85,
/// anything else (including unprefixed) taken as GBP. `None` when the text
/// holds no number at all.
pub fn to_base(text: &str) -> Option<f64> {
    let (amount, currency) = parse_amount(text)?;
    Some(match currency {
        Some(Currency::Usd) => amount * 0.8,
        Some(Currency::Eur) => amount * 0.85,
        _ => amount,
    })
}

/* ---------- rate table ---------- */

/// Units of each currency per 1 GBP.
#[derive(Clone, Debug, PartialEq)]
pub struct RateTable {
    rates: HashMap<Currency, f64>,
}

impl Default for RateTable {
    fn default() -> Self {
        Self::fallback()
    }
}

impl RateTable {
    pub fn fallback() -> Self {
        Self { rates: Currency::ALL.into_iter().map(|c| (c, c.fallback_rate())).collect() }
    }

    /// Fallback table overlaid with whatever supported codes `raw` carries.
    pub fn from_codes(raw: &HashMap<String, f64>) -> Self {
        let mut table = Self::fallback();
        for (code, rate) in raw {
            if let Some(c) = Currency::from_code(code) {
                if rate.is_finite() && *rate > 0.0 {
                    table.rates.insert(c, *rate);
                }
            }
        }
        table
    }

    pub fn to_codes(&self) -> HashMap<String, f64> {
        self.rates.iter().map(|(c, r)| (s!(c.code()), *r)).collect()
    }

    pub fn rate(&self, currency: Currency) -> f64 {
        self.rates.get(&currency).copied().unwrap_or_else(|| currency.fallback_rate())
    }

    pub fn from_base(&self, amount_gbp: f64, target: Currency) -> f64 {
        amount_gbp * self.rate(target)
    }

    /// Exact inverse of [`from_base`](Self::from_base) for an already-converted amount.
    /// Unprefixed amounts are taken as GBP.
    pub fn to_gbp(&self, money: Money) -> f64 {
        match money.currency {
            Some(c) => money.amount / self.rate(c),
            None => money.amount,
        }
    }

    /// Re-express a source display string in `target`. `None` when there is no number to convert.
    pub fn convert_display(&self, text: &str, target: Currency) -> Option<String> {
        to_base(text).map(|gbp| format(self.from_base(gbp, target), target))
    }
}

/* ---------- provider ---------- */

/// Source of live rates, quoted as units per one `base`.
pub trait RateProvider: Send + Sync + 'static {
    fn fetch_rates(
        &self,
        base: Currency,
    ) -> impl Future<Output = Result<HashMap<String, f64>, RateError>> + Send;
}

/// open.er-api.com, free tier, no key.
pub struct OpenErApi {
    client: reqwest::Client,
    url: String,
}

#[derive(Deserialize)]
struct ErApiResponse {
    result: String,
    #[serde(default)]
    rates: HashMap<String, f64>,
}

impl OpenErApi {
    pub fn new(url: impl Into<String>) -> Result<Self, RateError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .user_agent(concat!("study_watch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, url: url.into() })
    }
}

impl Default for OpenErApi {
    fn default() -> Self {
        Self { client: reqwest::Client::new(), url: s!(RATES_URL) }
    }
}

impl RateProvider for OpenErApi {
    async fn fetch_rates(&self, base: Currency) -> Result<HashMap<String, f64>, RateError> {
        // The configured URL already names its base; only GBP is ever requested.
        debug_assert_eq!(base, Currency::BASE);
        let resp = self.client.get(&self.url).send().await?;
        if !resp.status().is_success() {
            return Err(RateError::Status(resp.status()));
        }
        let body: ErApiResponse = resp.json().await?;
        if body.result != "success" {
            return Err(RateError::Provider(body.result));
        }
        Ok(body.rates)
    }
}

/* ---------- normalizer ---------- */

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Cached rates are younger than the TTL; nothing fetched.
    Fresh,
    Refreshed,
    /// Fetch failed; last known rates stay in effect.
    Failed,
}

impl RefreshOutcome {
    pub fn is_ok(self) -> bool {
        self != RefreshOutcome::Failed
    }
}

struct RateState {
    table: RateTable,
    updated: Option<DateTime<Utc>>,
}

/// Rate table shared between the pipeline (reads) and the refresh task (writes).
pub struct CurrencyNormalizer {
    store: Arc<dyn KvStore>,
    state: RwLock<RateState>,
}

impl CurrencyNormalizer {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store, state: RwLock::new(RateState { table: RateTable::fallback(), updated: None }) }
    }

    /// Snapshot of the rates currently in effect.
    pub fn table(&self) -> RateTable {
        self.read_state(|s| s.table.clone())
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.read_state(|s| s.updated)
    }

    /// Adopt previously persisted rates, if any.
    pub fn load_cached(&self) -> Result<bool, StoreError> {
        let rates: Option<HashMap<String, f64>> = store::read_key(&*self.store, EXCHANGE_RATES)?;
        let updated: Option<DateTime<Utc>> = store::read_key(&*self.store, LAST_RATE_UPDATE)?;
        let Some(rates) = rates else { return Ok(false) };

        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.table = RateTable::from_codes(&rates);
        state.updated = updated;
        Ok(true)
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match self.last_update() {
            Some(t) => now.signed_duration_since(t) > chrono::Duration::hours(RATE_TTL_HOURS),
            None => true,
        }
    }

    /// Fetch only when the persisted timestamp is older than the TTL.
    pub async fn refresh_if_stale<P: RateProvider>(&self, provider: &P, now: DateTime<Utc>) -> RefreshOutcome {
        if let Err(e) = self.load_cached() {
            warn!(error = %e, "cached exchange rates unreadable");
        }
        if !self.is_stale(now) {
            debug!(updated = ?self.last_update(), "exchange rates fresh");
            return RefreshOutcome::Fresh;
        }
        self.refresh(provider, now).await
    }

    /// Unconditional fetch. Failures are logged and swallowed.
    pub async fn refresh<P: RateProvider>(&self, provider: &P, now: DateTime<Utc>) -> RefreshOutcome {
        let raw = match provider.fetch_rates(Currency::BASE).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "exchange rate refresh failed, keeping last known rates");
                if let Err(e) = self.load_cached() {
                    warn!(error = %e, "cached exchange rates unreadable");
                }
                return RefreshOutcome::Failed;
            }
        };

        let table = RateTable::from_codes(&raw);
        let mut items = store::Items::new();
        items.insert(s!(EXCHANGE_RATES), serde_json::json!(table.to_codes()));
        items.insert(s!(LAST_RATE_UPDATE), serde_json::json!(now));
        if let Err(e) = self.store.set(items) {
            warn!(error = %e, "could not persist exchange rates");
        }

        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.table = table;
        state.updated = Some(now);
        info!(usd = state.table.rate(Currency::Usd), "exchange rates updated");
        RefreshOutcome::Refreshed
    }

    fn read_state<T>(&self, f: impl FnOnce(&RateState) -> T) -> T {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        f(&state)
    }
}

/// Sum of rewards, normalized to GBP, expressed in `target`.
pub fn earnings_total<'a, I>(rewards: I, table: &RateTable, target: Currency) -> f64
where
    I: IntoIterator<Item = &'a str>,
{
    let gbp: f64 = rewards
        .into_iter()
        .filter_map(parse_amount)
        .map(|(amount, currency)| table.to_gbp(Money { amount, currency }))
        .sum();
    table.from_base(gbp, target)
}
