//! Usage data types
//!
//! Values produced by a fetch. A payload is never mutated once received;
//! every poll produces a fresh one.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Categories
// ============================================================================

/// A named usage allowance reported by the provider
///
/// The ordering of the variants is the display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageCategory {
    /// 5-hour rolling window (the rate-limited one)
    FiveHour,
    /// 7-day rolling window (all models)
    SevenDay,
    /// 7-day rolling window for Sonnet models
    SevenDaySonnet,
    /// 7-day rolling window for Opus models
    SevenDayOpus,
    /// Pay-as-you-go extra usage
    Extra,
}

impl UsageCategory {
    /// All categories in display order
    pub const ALL: [UsageCategory; 5] = [
        UsageCategory::FiveHour,
        UsageCategory::SevenDay,
        UsageCategory::SevenDaySonnet,
        UsageCategory::SevenDayOpus,
        UsageCategory::Extra,
    ];

    /// The category tracked by the rate estimator, cycle detector and scheduler
    pub const PRIMARY: UsageCategory = UsageCategory::FiveHour;

    /// Short label for compact display
    pub fn label(&self) -> &'static str {
        match self {
            UsageCategory::FiveHour => "5h",
            UsageCategory::SevenDay => "7d",
            UsageCategory::SevenDaySonnet => "7d sonnet",
            UsageCategory::SevenDayOpus => "7d opus",
            UsageCategory::Extra => "extra",
        }
    }

    /// Human-readable name used in notifications
    pub fn display_name(&self) -> &'static str {
        match self {
            UsageCategory::FiveHour => "5-hour limit",
            UsageCategory::SevenDay => "Weekly limit",
            UsageCategory::SevenDaySonnet => "Weekly Sonnet limit",
            UsageCategory::SevenDayOpus => "Weekly Opus limit",
            UsageCategory::Extra => "Extra usage",
        }
    }
}

impl std::fmt::Display for UsageCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UsageCategory::FiveHour => write!(f, "5_hour"),
            UsageCategory::SevenDay => write!(f, "7_day"),
            UsageCategory::SevenDaySonnet => write!(f, "7_day_sonnet"),
            UsageCategory::SevenDayOpus => write!(f, "7_day_opus"),
            UsageCategory::Extra => write!(f, "extra"),
        }
    }
}

impl std::str::FromStr for UsageCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "5_hour" | "five_hour" | "5h" => Ok(UsageCategory::FiveHour),
            "7_day" | "seven_day" | "7d" | "weekly" => Ok(UsageCategory::SevenDay),
            "7_day_sonnet" | "seven_day_sonnet" | "sonnet" => Ok(UsageCategory::SevenDaySonnet),
            "7_day_opus" | "seven_day_opus" | "opus" => Ok(UsageCategory::SevenDayOpus),
            "extra" | "extra_usage" => Ok(UsageCategory::Extra),
            _ => Err(format!("Unknown usage category: {}", s)),
        }
    }
}

// ============================================================================
// Usage Points
// ============================================================================

/// Utilization of one category at fetch time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsagePoint {
    /// Percentage of the allowance consumed (0.0 - 100.0)
    pub utilization: f64,
    /// Reset instant exactly as the provider sent it
    pub resets_at: Option<String>,
}

impl UsagePoint {
    pub fn new(utilization: f64) -> Self {
        Self {
            utilization,
            resets_at: None,
        }
    }

    pub fn with_resets_at(mut self, resets_at: impl Into<String>) -> Self {
        self.resets_at = Some(resets_at.into());
        self
    }

    /// Whole percentage, truncated toward zero
    pub fn percent(&self) -> u32 {
        whole_percent(self.utilization)
    }

    /// Parsed reset instant, if present and well-formed
    pub fn resets_at_time(&self) -> Option<DateTime<Utc>> {
        self.resets_at.as_deref().and_then(parse_datetime)
    }
}

/// Truncate a utilization value to a whole percentage
///
/// Negative and NaN inputs map to 0.
pub fn whole_percent(utilization: f64) -> u32 {
    if utilization.is_nan() || utilization <= 0.0 {
        0
    } else {
        utilization.trunc() as u32
    }
}

/// Parse a provider timestamp (RFC 3339, with or without fractional seconds)
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }

    log::warn!("[usage:types] Failed to parse datetime: {}", s);
    None
}

/// Extra credits information (pay-as-you-go overflow)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraCredits {
    /// Credits used this month
    pub used: f64,
    /// Monthly credit limit
    pub limit: f64,
}

// ============================================================================
// Payload
// ============================================================================

/// Everything a single successful fetch returned
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsagePayload {
    /// Reported categories; absent ones are simply missing
    pub points: BTreeMap<UsageCategory, UsagePoint>,
    /// Extra credits, when the account has them enabled
    pub extra_credits: Option<ExtraCredits>,
}

impl UsagePayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a category
    pub fn with_point(mut self, category: UsageCategory, point: UsagePoint) -> Self {
        self.points.insert(category, point);
        self
    }

    /// Set extra credits info
    pub fn with_extra_credits(mut self, used: f64, limit: f64) -> Self {
        self.extra_credits = Some(ExtraCredits { used, limit });
        self
    }

    pub fn get(&self, category: UsageCategory) -> Option<&UsagePoint> {
        self.points.get(&category)
    }

    /// The primary (rate-limited) category, if reported
    pub fn primary(&self) -> Option<&UsagePoint> {
        self.get(UsageCategory::PRIMARY)
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_category_display_roundtrip() {
        for category in UsageCategory::ALL {
            let parsed: UsageCategory = category.to_string().parse().unwrap();
            assert_eq!(parsed, category);
        }
    }

    #[test]
    fn test_category_aliases() {
        assert_eq!("5h".parse::<UsageCategory>().unwrap(), UsageCategory::FiveHour);
        assert_eq!("weekly".parse::<UsageCategory>().unwrap(), UsageCategory::SevenDay);
        assert_eq!("Sonnet".parse::<UsageCategory>().unwrap(), UsageCategory::SevenDaySonnet);
        assert!("monthly".parse::<UsageCategory>().is_err());
    }

    #[test]
    fn test_whole_percent_truncates() {
        assert_eq!(whole_percent(79.99), 79);
        assert_eq!(whole_percent(80.0), 80);
        assert_eq!(whole_percent(0.4), 0);
        assert_eq!(whole_percent(-3.0), 0);
        assert_eq!(whole_percent(f64::NAN), 0);
    }

    #[test]
    fn test_parse_datetime_formats() {
        let dt = parse_datetime("2025-01-08T00:00:00Z").unwrap();
        assert_eq!(dt.year(), 2025);
        assert_eq!(dt.day(), 8);

        let dt = parse_datetime("2025-09-12T14:59:59.661633+00:00").unwrap();
        assert_eq!(dt.hour(), 14);
        assert_eq!(dt.minute(), 59);

        let dt = parse_datetime("2025-09-12T14:00:00.5").unwrap();
        assert_eq!(dt.hour(), 14);

        assert!(parse_datetime("soon").is_none());
    }

    #[test]
    fn test_payload_builder() {
        let payload = UsagePayload::new()
            .with_point(
                UsageCategory::FiveHour,
                UsagePoint::new(42.7).with_resets_at("2025-01-01T05:00:00Z"),
            )
            .with_point(UsageCategory::SevenDay, UsagePoint::new(12.0))
            .with_extra_credits(3.5, 50.0);

        assert_eq!(payload.primary().unwrap().percent(), 42);
        assert!(payload.primary().unwrap().resets_at_time().is_some());
        assert!(payload.get(UsageCategory::SevenDayOpus).is_none());
        assert_eq!(payload.extra_credits.as_ref().unwrap().limit, 50.0);

        let keys: Vec<_> = payload.points.keys().copied().collect();
        assert_eq!(keys, vec![UsageCategory::FiveHour, UsageCategory::SevenDay]);
    }
}
