//! Market reference tables (§3, §5 "shared state"): market shares, market
//! caps, and the service→enterprise lookup. Constructor-injected into the
//! engine as a single immutable value — no module-level state (§9).

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct MarketShareEntry {
    #[serde(default)]
    pub market_share: Option<f64>,
    #[serde(default)]
    pub gmv: Option<f64>,
    #[serde(default)]
    pub users: Option<f64>,
    #[serde(default)]
    pub utilization_rate: Option<f64>,
    pub enterprise: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareDataType {
    Ratio,
    Monetary,
    UserCount,
    Other,
}

impl MarketShareEntry {
    /// Field-priority scan: `market_share` > `gmv` > `users` >
    /// `utilization_rate` (§4.7, resolved per Open Question in SPEC_FULL.md
    /// §C: prefer `market_share` over `gmv` when both present).
    pub fn raw_share(&self) -> Option<f64> {
        self.market_share
            .or(self.gmv)
            .or(self.users)
            .or(self.utilization_rate)
    }

    pub fn data_type(&self) -> ShareDataType {
        if self.market_share.is_some() {
            ShareDataType::Ratio
        } else if self.gmv.is_some() {
            ShareDataType::Monetary
        } else if self.users.is_some() {
            ShareDataType::UserCount
        } else {
            ShareDataType::Other
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct MarketReference {
    #[serde(default)]
    pub market_shares: BTreeMap<String, BTreeMap<String, MarketShareEntry>>,
    #[serde(default)]
    pub market_caps: BTreeMap<String, BTreeMap<String, f64>>,
}

impl MarketReference {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load_from_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("parsing market reference table")
    }

    pub fn services_in(&self, category: &str) -> Option<&BTreeMap<String, MarketShareEntry>> {
        self.market_shares.get(category)
    }

    pub fn enterprise_of(&self, category: &str, service: &str) -> Option<&str> {
        self.market_shares
            .get(category)
            .and_then(|services| services.get(service))
            .map(|entry| entry.enterprise.as_str())
    }

    pub fn market_cap_of(&self, category: &str, enterprise: &str) -> Option<f64> {
        self.market_caps
            .get(category)
            .and_then(|caps| caps.get(enterprise))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_market_share_over_gmv() {
        let entry = MarketShareEntry {
            market_share: Some(0.4),
            gmv: Some(900.0),
            enterprise: "Acme".into(),
            ..Default::default()
        };
        assert_eq!(entry.raw_share(), Some(0.4));
        assert_eq!(entry.data_type(), ShareDataType::Ratio);
    }

    #[test]
    fn falls_back_through_priority_chain() {
        let entry = MarketShareEntry {
            users: Some(500.0),
            enterprise: "Acme".into(),
            ..Default::default()
        };
        assert_eq!(entry.raw_share(), Some(500.0));
        assert_eq!(entry.data_type(), ShareDataType::UserCount);
    }
}
