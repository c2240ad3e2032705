use async_trait::async_trait;
use log::info;
use serde::{ Deserialize, Serialize };
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tokio::sync::RwLock;

pub const DEFAULT_DAILY_LIMIT: u32 = 10;
pub const ELITE_DAILY_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Pro,
    Elite,
    Max,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TierError {
    #[error("unknown tier '{0}' (expected free, pro, elite or max)")]
    UnknownTier(String),
    #[error("malformed beta tester entry '{0}' (expected email:tier)")]
    MalformedEntry(String),
}

impl FromStr for Tier {
    type Err = TierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(Tier::Free),
            "pro" => Ok(Tier::Pro),
            "elite" => Ok(Tier::Elite),
            "max" => Ok(Tier::Max),
            _ => Err(TierError::UnknownTier(s.to_string())),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::Free => "free",
            Tier::Pro => "pro",
            Tier::Elite => "elite",
            Tier::Max => "max",
        };
        f.write_str(name)
    }
}

impl Tier {
    /// Advisory daily message allowance. Only elite gets the large allowance.
    pub fn daily_limit(&self) -> u32 {
        match self {
            Tier::Elite => ELITE_DAILY_LIMIT,
            _ => DEFAULT_DAILY_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierInfo {
    pub tier: Tier,
    pub is_beta: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageInfo {
    pub current: u32,
    pub limit: u32,
    pub percentage: f64,
}

/// Usage against the tier allowance. Reported to clients, never enforced.
pub fn usage_for(tier: Tier, current: u32) -> UsageInfo {
    let limit = tier.daily_limit();
    let percentage = ((current as f64 / limit as f64) * 1000.0).round() / 10.0;
    UsageInfo { current, limit, percentage }
}

#[async_trait]
pub trait TierResolver: Send + Sync {
    /// Tier for an email. Unknown emails are free and not beta testers.
    async fn resolve(&self, email: &str) -> TierInfo;

    async fn grant(&self, email: &str, tier: Tier);

    async fn revoke(&self, email: &str) -> bool;

    async fn beta_testers(&self) -> Vec<(String, Tier)>;
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Default)]
pub struct MemoryTierTable {
    entries: RwLock<BTreeMap<String, Tier>>,
}

impl MemoryTierTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<(String, Tier)>) -> Self {
        let map = entries
            .into_iter()
            .map(|(email, tier)| (normalize(&email), tier))
            .collect();
        Self { entries: RwLock::new(map) }
    }
}

#[async_trait]
impl TierResolver for MemoryTierTable {
    async fn resolve(&self, email: &str) -> TierInfo {
        match self.entries.read().await.get(&normalize(email)) {
            Some(tier) => TierInfo { tier: *tier, is_beta: true },
            None => TierInfo { tier: Tier::Free, is_beta: false },
        }
    }

    async fn grant(&self, email: &str, tier: Tier) {
        info!("Granting {} tier to beta tester", tier);
        self.entries.write().await.insert(normalize(email), tier);
    }

    async fn revoke(&self, email: &str) -> bool {
        self.entries.write().await.remove(&normalize(email)).is_some()
    }

    async fn beta_testers(&self) -> Vec<(String, Tier)> {
        self.entries
            .read().await
            .iter()
            .map(|(email, tier)| (email.clone(), *tier))
            .collect()
    }
}

/// Parses `email:tier` seed entries from configuration.
pub fn parse_seed(entries: &[String]) -> Result<Vec<(String, Tier)>, TierError> {
    entries
        .iter()
        .map(|e| e.trim())
        .filter(|e| !e.is_empty())
        .map(|entry| {
            let (email, tier) = entry
                .rsplit_once(':')
                .ok_or_else(|| TierError::MalformedEntry(entry.to_string()))?;
            if email.trim().is_empty() {
                return Err(TierError::MalformedEntry(entry.to_string()));
            }
            Ok((normalize(email), tier.parse()?))
        })
        .collect()
}
