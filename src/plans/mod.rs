//! Plan policy: the editable table of feature tiers.
//!
//! Events copy a plan's [`FeatureBundle`] by value when created (or when
//! their plan changes), so edits here never reach existing events.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("{0}")]
    Invalid(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PlanId {
    #[serde(rename = "Básico", alias = "Basico")]
    Basico,
    Premium,
    Deluxe,
}

impl PlanId {
    pub const ALL: [PlanId; 3] = [PlanId::Basico, PlanId::Premium, PlanId::Deluxe];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanId::Basico => "Básico",
            PlanId::Premium => "Premium",
            PlanId::Deluxe => "Deluxe",
        }
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanId {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "básico" | "basico" | "basic" => Ok(PlanId::Basico),
            "premium" => Ok(PlanId::Premium),
            "deluxe" => Ok(PlanId::Deluxe),
            other => Err(PlanError::Invalid(format!("Unknown plan: {}", other))),
        }
    }
}

/// Capabilities an event's guests get. Value type, copied into each event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureBundle {
    pub allow_filters: bool,
    /// GIF and video uploads.
    pub allow_gifs: bool,
    pub tv_carousel: bool,
    pub allow_download: bool,
    /// 0 means unlimited.
    pub access_duration_days: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: i64,
    pub max: i64,
}

impl PriceRange {
    pub fn contains(&self, price: i64) -> bool {
        (self.min..=self.max).contains(&price)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub name: PlanId,
    pub description: String,
    pub price: PriceRange,
    pub features: FeatureBundle,
    pub support: String,
}

/// A century; anything longer is a typo.
pub const MAX_ACCESS_DURATION_DAYS: u32 = 36_500;

pub fn default_plans() -> BTreeMap<PlanId, Plan> {
    let plans = [
        Plan {
            name: PlanId::Basico,
            description: "The essentials to capture and share your event's moments.".into(),
            price: PriceRange { min: 1000, max: 1500 },
            features: FeatureBundle {
                allow_filters: false,
                allow_gifs: false,
                tv_carousel: false,
                allow_download: false,
                access_duration_days: 90,
            },
            support: "Basic support during the event.".into(),
        },
        Plan {
            name: PlanId::Premium,
            description: "A richer experience with personalisation and interactive features."
                .into(),
            price: PriceRange { min: 2000, max: 3000 },
            features: FeatureBundle {
                allow_filters: true,
                allow_gifs: false,
                tv_carousel: true,
                allow_download: false,
                access_duration_days: 365,
            },
            support: "Premium support and follow-up.".into(),
        },
        Plan {
            name: PlanId::Deluxe,
            description: "Every feature, maximum engagement.".into(),
            price: PriceRange { min: 4000, max: 5000 },
            features: FeatureBundle {
                allow_filters: true,
                allow_gifs: true,
                tv_carousel: true,
                allow_download: true,
                access_duration_days: 0,
            },
            support: "Full support with an on-site team.".into(),
        },
    ];
    plans.into_iter().map(|p| (p.name, p)).collect()
}

/// The plan table, persisted as a JSON document and edited wholesale.
pub struct PlanPolicy {
    path: PathBuf,
    plans: RwLock<BTreeMap<PlanId, Plan>>,
}

impl PlanPolicy {
    /// Load the table from `path`. A missing or unreadable document falls back
    /// to the defaults, which are written out for the next start.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let plans = match read_table(&path).await {
            Ok(plans) => plans,
            Err(e) => {
                tracing::info!(
                    "Plan table {} not usable ({}), writing defaults",
                    path.display(),
                    e
                );
                let defaults = default_plans();
                if let Err(e) = write_table(&path, &defaults).await {
                    tracing::warn!("Could not write default plan table: {}", e);
                }
                defaults
            }
        };

        Self {
            path,
            plans: RwLock::new(plans),
        }
    }

    pub async fn resolve(&self, id: PlanId) -> FeatureBundle {
        self.get(id).await.features
    }

    pub async fn get(&self, id: PlanId) -> Plan {
        let plans = self.plans.read().await;
        match plans.get(&id) {
            Some(plan) => plan.clone(),
            // `replace_all` and `read_table` only ever store complete tables.
            None => default_plans()[&id].clone(),
        }
    }

    pub async fn list(&self) -> Vec<Plan> {
        self.plans.read().await.values().cloned().collect()
    }

    /// Replace the whole table and persist it.
    pub async fn replace_all(&self, plans: Vec<Plan>) -> Result<Vec<Plan>, PlanError> {
        let table = validate_table(plans)?;
        let mut guard = self.plans.write().await;
        write_table(&self.path, &table).await?;
        *guard = table;
        tracing::info!("Plan table saved to {}", self.path.display());
        Ok(guard.values().cloned().collect())
    }
}

fn validate_table(plans: Vec<Plan>) -> Result<BTreeMap<PlanId, Plan>, PlanError> {
    let mut table = BTreeMap::new();
    for plan in plans {
        if plan.price.min < 0 || plan.price.min > plan.price.max {
            return Err(PlanError::Invalid(format!(
                "Invalid price range for {}",
                plan.name
            )));
        }
        if plan.features.access_duration_days > MAX_ACCESS_DURATION_DAYS {
            return Err(PlanError::Invalid(format!(
                "Access duration for {} must be at most {} days (0 = unlimited)",
                plan.name, MAX_ACCESS_DURATION_DAYS
            )));
        }
        if table.insert(plan.name, plan.clone()).is_some() {
            return Err(PlanError::Invalid(format!(
                "Plan {} listed more than once",
                plan.name
            )));
        }
    }
    if let Some(missing) = PlanId::ALL.iter().find(|id| !table.contains_key(id)) {
        return Err(PlanError::Invalid(format!("Plan {} is missing", missing)));
    }
    Ok(table)
}

async fn read_table(path: &Path) -> Result<BTreeMap<PlanId, Plan>, PlanError> {
    let content = tokio::fs::read_to_string(path).await?;
    let table: BTreeMap<PlanId, Plan> = serde_json::from_str(&content)?;
    validate_table(table.into_values().collect())
}

async fn write_table(path: &Path, table: &BTreeMap<PlanId, Plan>) -> Result<(), PlanError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(table)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
