//! Application configuration: API settings, cache, fetch mode and the
//! region → series maps the dashboard offers.
//!
//! Everything has a built-in default, so the TOML file is optional and may
//! specify any subset of sections.

use chrono::NaiveDate;
use fredscope_core::data::fred::DEFAULT_BASE_URL;
use fredscope_core::data::FredConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "fredscope.toml";

/// Environment variable carrying the FRED API key.
pub const API_KEY_ENV: &str = "FRED_API_KEY";

/// Start of the default request window.
pub const DEFAULT_START: (i32, u32, u32) = (2000, 1, 1);

/// Number of labels preselected when a request names none.
pub const DEFAULT_SELECTION: usize = 2;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("unknown region '{name}' (available: {available})")]
    UnknownRegion { name: String, available: String },
    #[error("region '{region}' has no series labelled '{label}'")]
    UnknownSeries { region: String, label: String },
    #[error("invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
    #[error("no FRED API key: set {API_KEY_ENV} or pass --api-key")]
    MissingApiKey,
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl ApiSettings {
    /// Client settings for this section with the given key.
    pub fn client_config(&self, api_key: impl Into<String>) -> FredConfig {
        FredConfig {
            base_url: self.base_url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            ..FredConfig::new(api_key)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub dir: PathBuf,
    pub ttl_secs: u64,
    pub enabled: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/cache"),
            ttl_secs: 3600,
            enabled: true,
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// How per-series fetches are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Sequential,
    Parallel { max_workers: usize },
}

impl FetchMode {
    /// Parallel mode with `max_workers` clamped to at least one.
    pub fn parallel(max_workers: usize) -> Self {
        FetchMode::Parallel {
            max_workers: max_workers.max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchModeKind {
    #[default]
    Sequential,
    Parallel,
}

/// One selectable series: display label and remote id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesEntry {
    pub label: String,
    pub id: String,
}

impl SeriesEntry {
    pub fn new(label: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            id: id.into(),
        }
    }
}

/// A named region and its ordered label → id map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub series: Vec<SeriesEntry>,
}

impl Region {
    pub fn new(name: impl Into<String>, series: &[(&str, &str)]) -> Self {
        Self {
            name: name.into(),
            series: series
                .iter()
                .map(|(label, id)| SeriesEntry::new(*label, *id))
                .collect(),
        }
    }

    pub fn labels(&self) -> Vec<&str> {
        self.series.iter().map(|s| s.label.as_str()).collect()
    }

    pub fn lookup(&self, label: &str) -> Option<&SeriesEntry> {
        self.series.iter().find(|s| s.label == label)
    }

    /// Entries for the requested labels, in request order. An empty request
    /// selects the first [`DEFAULT_SELECTION`] entries.
    pub fn select(&self, labels: &[String]) -> Result<Vec<SeriesEntry>, ConfigError> {
        if labels.is_empty() {
            return Ok(self.series.iter().take(DEFAULT_SELECTION).cloned().collect());
        }
        labels
            .iter()
            .map(|label| {
                self.lookup(label)
                    .cloned()
                    .ok_or_else(|| ConfigError::UnknownSeries {
                        region: self.name.clone(),
                        label: label.clone(),
                    })
            })
            .collect()
    }
}

/// The three regions offered out of the box.
pub fn default_regions() -> Vec<Region> {
    vec![
        Region::new(
            "National",
            &[
                ("Federal Funds Rate", "FEDFUNDS"),
                ("Unemployment Rate", "UNRATE"),
                ("GDP Growth %", "GDPC1"),
                ("Inflation %", "CPIAUCNS"),
            ],
        ),
        Region::new(
            "Missouri",
            &[
                ("Unemployment Rate", "MOUR"),
                ("State Minimum Wage Rate", "STTMINWGMO"),
                ("Resident Population in Thousands", "MOPOP"),
                ("Gross Domestic Product: All Industry Total", "MONQGSP"),
                ("Real Median Household Income", "MEHOINUSMOA672N"),
                ("Per Capita Personal Income", "MOPCPI"),
                ("Median Household Income", "MEHOINUSMOA646N"),
                ("Labor Force Participation Rate", "LBSSA29"),
                ("SNAP Benefits Recipients", "BR29000MOA647NCEN"),
                ("Housing Inventory: Median Listing Price", "MEDLISPRIMO"),
                ("Homeownership Rate", "MOHOWN"),
            ],
        ),
        Region::new(
            "Kansas",
            &[
                ("Unemployment Rate", "KSUR"),
                ("State Minimum Wage Rate", "STTMINWGKS"),
                ("Resident Population in Thousands", "KSPOP"),
                (
                    "Gross Domestic Product: All Industry Total (Quarterly, SAAR)",
                    "KSNQGSP",
                ),
                ("Real Median Household Income", "MEHOINUSKSA672N"),
                ("Per Capita Personal Income", "KSPCPI"),
                ("Median Household Income", "MEHOINUSKSA646N"),
                ("Labor Force Participation Rate", "LBSSA20"),
                ("SNAP Benefits Recipients", "BRKS20M647NCEN"),
                ("Housing Inventory: Median Listing Price", "MEDLISPRIKS"),
                ("Homeownership Rate", "KSHOWN"),
            ],
        ),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub mode: FetchModeKind,
    /// Worker cap for parallel mode.
    pub max_workers: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            mode: FetchModeKind::Sequential,
            max_workers: 4,
        }
    }
}

/// Top-level configuration, as read from `fredscope.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiSettings,
    pub cache: CacheSettings,
    pub fetch: FetchSettings,
    pub regions: Vec<Region>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiSettings::default(),
            cache: CacheSettings::default(),
            fetch: FetchSettings::default(),
            regions: default_regions(),
        }
    }
}

impl AppConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Load `path` if given, else `fredscope.toml` if present, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let default_path = Path::new(CONFIG_FILE);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Invalid("api.timeout_secs must be positive".into()));
        }
        for region in &self.regions {
            if region.series.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "region '{}' lists no series",
                    region.name
                )));
            }
            let mut seen = std::collections::HashSet::new();
            for entry in &region.series {
                if !seen.insert(entry.label.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "region '{}' lists '{}' twice",
                        region.name, entry.label
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn fetch_mode(&self) -> FetchMode {
        match self.fetch.mode {
            FetchModeKind::Sequential => FetchMode::Sequential,
            FetchModeKind::Parallel => FetchMode::parallel(self.fetch.max_workers),
        }
    }

    pub fn region_names(&self) -> Vec<&str> {
        self.regions.iter().map(|r| r.name.as_str()).collect()
    }

    /// Case-insensitive region lookup.
    pub fn region(&self, name: &str) -> Result<&Region, ConfigError> {
        self.regions
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| ConfigError::UnknownRegion {
                name: name.to_string(),
                available: self.region_names().join(", "),
            })
    }
}

/// Fill in the default window and check ordering.
///
/// `start` defaults to 2000-01-01 and `end` to `today`.
pub fn resolve_date_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), ConfigError> {
    let (y, m, d) = DEFAULT_START;
    let default_start = NaiveDate::from_ymd_opt(y, m, d)
        .ok_or_else(|| ConfigError::Invalid("bad default start date".into()))?;
    let start = start.unwrap_or(default_start);
    let end = end.unwrap_or(today);
    if start > end {
        return Err(ConfigError::InvalidDateRange { start, end });
    }
    Ok((start, end))
}

/// Explicit key wins over the environment. Blank keys count as missing.
pub fn resolve_api_key(explicit: Option<&str>, env: Option<String>) -> Result<String, ConfigError> {
    explicit
        .map(str::to_string)
        .or(env)
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .ok_or(ConfigError::MissingApiKey)
}
