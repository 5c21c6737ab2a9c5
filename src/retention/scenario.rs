//! Retention scenarios: named, immutable tier tables.
//!
//! A scenario is data, not code. The built-in `standard` scenario mirrors the
//! classic hourly/daily/weekly/monthly/yearly rollup; more scenarios come
//! from the `[scenarios.<name>]` tables of the config file (see
//! [`ScenarioSpec`]).
//!
//! Tier windows are expressed relative to a horizon (`now - grace_period`):
//! offset `k` of a tier covers `[horizon - (k+1)*unit, horizon - k*unit]`.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Error;

pub const STANDARD: &str = "standard";

/// Longest grace period or tier reach a scenario may describe: 100 years.
pub const MAX_SPAN_SECONDS: i64 = 100 * 31_557_600;

/// Tier-native time unit. Months are 4 weeks, years are 365.25 days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierUnit {
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

impl TierUnit {
    pub const ALL: [TierUnit; 5] = [
        TierUnit::Hours,
        TierUnit::Days,
        TierUnit::Weeks,
        TierUnit::Months,
        TierUnit::Years,
    ];

    pub fn duration(self) -> Duration {
        match self {
            TierUnit::Hours => Duration::hours(1),
            TierUnit::Days => Duration::days(1),
            TierUnit::Weeks => Duration::weeks(1),
            TierUnit::Months => Duration::weeks(4),
            // 365.25 days
            TierUnit::Years => Duration::seconds(31_557_600),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TierUnit::Hours => "hourly",
            TierUnit::Days => "daily",
            TierUnit::Weeks => "weekly",
            TierUnit::Months => "monthly",
            TierUnit::Years => "yearly",
        }
    }
}

/// One retention rule: keep at most one snapshot per `unit` for offsets in `start..end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tier {
    pub unit: TierUnit,
    pub start: u32,
    pub end: u32,
}

impl Tier {
    pub fn new(unit: TierUnit, start: u32, end: u32) -> Self {
        Self { unit, start, end }
    }

    pub fn label(&self) -> &'static str {
        self.unit.label()
    }

    /// Inclusive window `[lo, hi]` for offset `k`, or `None` once it falls
    /// outside the representable time range.
    pub fn window(
        &self,
        horizon: DateTime<Utc>,
        k: u32,
    ) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let unit = self.unit.duration();
        let back = unit.checked_mul(i32::try_from(k).ok()?)?;
        let hi = horizon.checked_sub_signed(back)?;
        let lo = hi.checked_sub_signed(unit)?;
        Some((lo, hi))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub name: String,
    pub grace_period: Duration,
    pub tiers: Vec<Tier>,
}

impl Scenario {
    pub fn standard() -> Self {
        Self {
            name: STANDARD.to_string(),
            grace_period: Duration::days(2),
            tiers: vec![
                Tier::new(TierUnit::Hours, 1, 24 * 7),
                Tier::new(TierUnit::Days, 7, 31),
                Tier::new(TierUnit::Weeks, 4, 52),
                Tier::new(TierUnit::Months, 12, 60),
                Tier::new(TierUnit::Years, 5, 100),
            ],
        }
    }

    /// Newest instant eligible for pruning.
    pub fn horizon(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.grace_period)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn to_spec(&self) -> ScenarioSpec {
        let mut spec = ScenarioSpec {
            grace_hours: self.grace_period.num_hours().max(0) as u64,
            ..ScenarioSpec::default()
        };
        for t in &self.tiers {
            let slot = spec.slot_mut(t.unit);
            *slot = Some([t.start, t.end]);
        }
        spec
    }
}

/// Serialized form of a scenario, as written in the config file:
///
/// ```toml
/// [scenarios.short]
/// grace_hours = 12
/// hourly = [1, 48]
/// daily = [2, 14]
/// ```
///
/// Absent tiers are skipped. Tiers always run from hourly to yearly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioSpec {
    pub grace_hours: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hourly: Option<[u32; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily: Option<[u32; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekly: Option<[u32; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly: Option<[u32; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yearly: Option<[u32; 2]>,
}

impl ScenarioSpec {
    fn slot(&self, unit: TierUnit) -> Option<[u32; 2]> {
        match unit {
            TierUnit::Hours => self.hourly,
            TierUnit::Days => self.daily,
            TierUnit::Weeks => self.weekly,
            TierUnit::Months => self.monthly,
            TierUnit::Years => self.yearly,
        }
    }

    fn slot_mut(&mut self, unit: TierUnit) -> &mut Option<[u32; 2]> {
        match unit {
            TierUnit::Hours => &mut self.hourly,
            TierUnit::Days => &mut self.daily,
            TierUnit::Weeks => &mut self.weekly,
            TierUnit::Months => &mut self.monthly,
            TierUnit::Years => &mut self.yearly,
        }
    }

    pub fn into_scenario(self, name: &str) -> Result<Scenario> {
        let grace_hours = i64::try_from(self.grace_hours)
            .ok()
            .filter(|h| *h <= MAX_SPAN_SECONDS / 3600)
            .ok_or_else(|| anyhow!("scenario '{}': grace_hours out of range", name))?;

        let mut tiers = Vec::new();
        for unit in TierUnit::ALL {
            if let Some([start, end]) = self.slot(unit) {
                if start > end {
                    return Err(anyhow!(
                        "scenario '{}': {} range [{}, {}) is reversed",
                        name,
                        unit.label(),
                        start,
                        end
                    ));
                }
                if unit.duration().num_seconds() * i64::from(end) > MAX_SPAN_SECONDS {
                    return Err(anyhow!(
                        "scenario '{}': {} range [{}, {}) reaches past 100 years",
                        name,
                        unit.label(),
                        start,
                        end
                    ));
                }
                tiers.push(Tier::new(unit, start, end));
            }
        }
        Ok(Scenario {
            name: name.to_string(),
            grace_period: Duration::hours(grace_hours),
            tiers,
        })
    }
}

/// Scenarios by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioTable {
    by_name: BTreeMap<String, Scenario>,
}

impl Default for ScenarioTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ScenarioTable {
    pub fn builtin() -> Self {
        let mut by_name = BTreeMap::new();
        let standard = Scenario::standard();
        by_name.insert(standard.name.clone(), standard);
        Self { by_name }
    }

    /// Add or replace a scenario.
    pub fn insert(&mut self, scenario: Scenario) {
        self.by_name.insert(scenario.name.clone(), scenario);
    }

    pub fn get(&self, name: &str) -> Result<&Scenario, Error> {
        self.by_name
            .get(name)
            .ok_or_else(|| Error::UnknownScenario(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scenario> {
        self.by_name.values()
    }
}
