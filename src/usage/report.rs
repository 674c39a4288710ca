//! Token cost accounting over persisted usage records

use crate::core::types::UsageInfo;
use crate::usage::records::UsageLog;
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

const TOKENS_PER_UNIT: f64 = 1_000_000.0;

/// USD per one million tokens
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input: f64,
    /// Price of input tokens served from the prompt cache
    pub cached: f64,
    pub output: f64,
}

impl Default for ModelPricing {
    fn default() -> Self {
        Self {
            input: 0.25,
            cached: 0.025,
            output: 2.00,
        }
    }
}

/// Per-model prices with a default for unknown models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingTable {
    #[serde(default)]
    pub default: ModelPricing,
    #[serde(default)]
    pub models: HashMap<String, ModelPricing>,
}

impl Default for PricingTable {
    fn default() -> Self {
        let mini = ModelPricing::default();
        Self {
            default: mini,
            models: [("gpt-5-mini".to_string(), mini), ("gpt-5".to_string(), mini)]
                .into_iter()
                .collect(),
        }
    }
}

impl PricingTable {
    pub fn for_model(&self, model: &str) -> ModelPricing {
        self.models.get(model).copied().unwrap_or(self.default)
    }

    pub fn validate(&self) -> Result<(), String> {
        let all = std::iter::once(("default", &self.default))
            .chain(self.models.iter().map(|(k, v)| (k.as_str(), v)));
        for (model, price) in all {
            let finite = [price.input, price.cached, price.output]
                .iter()
                .all(|p| p.is_finite() && *p >= 0.0);
            if !finite {
                return Err(format!("prices for '{}' must be non-negative", model));
            }
        }
        Ok(())
    }
}

/// Cost in USD; cached tokens are part of `input_tokens` and billed separately
pub fn calculate_cost(usage: UsageInfo, pricing: ModelPricing) -> f64 {
    let regular_input = usage.input_tokens.saturating_sub(usage.cached_tokens);
    (regular_input as f64 / TOKENS_PER_UNIT) * pricing.input
        + (usage.cached_tokens as f64 / TOKENS_PER_UNIT) * pricing.cached
        + (usage.output_tokens as f64 / TOKENS_PER_UNIT) * pricing.output
}

/// Reporting window, in UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsagePeriod {
    Today,
    Month,
    All,
}

impl UsagePeriod {
    /// Inclusive start of the window, `None` for all time
    pub fn start(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let date = match self {
            Self::Today => now.date_naive(),
            Self::Month => NaiveDate::from_ymd_opt(now.year(), now.month(), 1)?,
            Self::All => return None,
        };
        date.and_hms_opt(0, 0, 0)
            .map(|midnight| Utc.from_utc_datetime(&midnight))
    }
}

impl fmt::Display for UsagePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Today => "today",
            Self::Month => "month",
            Self::All => "all",
        })
    }
}

impl FromStr for UsagePeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "today" => Ok(Self::Today),
            "month" => Ok(Self::Month),
            "all" => Ok(Self::All),
            other => Err(format!("unknown period '{}' (expected today, month or all)", other)),
        }
    }
}

/// Aggregated usage for one period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageStats {
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_cached_tokens: u64,
    pub total_cost_usd: f64,
    pub request_count: u64,
    pub period: UsagePeriod,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
}

/// Sum the records that fall into `period`, each priced by its own model
pub fn summarize(
    logs: &[UsageLog],
    period: UsagePeriod,
    now: DateTime<Utc>,
    pricing: &PricingTable,
) -> UsageStats {
    let period_start = period.start(now);
    let period_end = period_start.map(|_| now);

    let mut stats = UsageStats {
        total_input_tokens: 0,
        total_output_tokens: 0,
        total_cached_tokens: 0,
        total_cost_usd: 0.0,
        request_count: 0,
        period,
        period_start,
        period_end,
    };

    for log in logs
        .iter()
        .filter(|log| period_start.map_or(true, |start| log.created_at >= start))
    {
        let usage = log.usage();
        stats.total_input_tokens += usage.input_tokens;
        stats.total_output_tokens += usage.output_tokens;
        stats.total_cached_tokens += usage.cached_tokens;
        stats.total_cost_usd += calculate_cost(usage, pricing.for_model(&log.model));
        stats.request_count += 1;
    }

    stats
}
