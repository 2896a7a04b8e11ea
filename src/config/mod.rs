use anyhow::{anyhow, bail, Context, Result};
use chrono_tz::Tz;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::models::Venue;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default = "default_venues")]
    pub venues: BTreeMap<String, Venue>,
}

/// Scraper configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub request_delay_ms: u64,
    pub jitter_ms: u64,
    pub user_agent: String,
}

/// Calendar generation settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// IANA zone every fixture time is read in, regardless of the host zone.
    pub timezone: String,
    pub event_minutes: i64,
    pub extension: String,
    pub age_group_pattern: String,
}

/// Output locations
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub root: PathBuf,
    pub index_file: String,
    pub site_title: String,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scraper: ScraperConfig::default(),
            calendar: CalendarConfig::default(),
            output: OutputConfig::default(),
            venues: default_venues(),
        }
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.waverleybasketball.com/fixtures.aspx".to_string(),
            timeout_secs: 30,
            request_delay_ms: 250,
            jitter_ms: 250,
            user_agent: "fixture-calendars/0.1 (team calendar generator)".to_string(),
        }
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            timezone: "Australia/Melbourne".to_string(),
            event_minutes: 60,
            extension: "ics".to_string(),
            age_group_pattern: r"^U\d{2}".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("public"),
            index_file: "index.html".to_string(),
            site_title: "Waverley Basketball Fixture Calendars".to_string(),
        }
    }
}

fn venue(name: &str, address: &str, latitude: f64, longitude: f64) -> Venue {
    Venue {
        name: name.to_string(),
        address: Some(address.to_string()),
        latitude: Some(latitude),
        longitude: Some(longitude),
    }
}

/// Built-in venue table; `[venues.XXX]` entries in config files replace it.
pub fn default_venues() -> BTreeMap<String, Venue> {
    BTreeMap::from([
        (
            "WAV".to_string(),
            venue(
                "Waverley Basketball Stadium",
                "Waverley Road, Glen Waverley VIC 3150",
                -37.8861,
                145.1650,
            ),
        ),
        (
            "GWS".to_string(),
            venue(
                "Glen Waverley Secondary College",
                "O'Sullivan Road, Glen Waverley VIC 3150",
                -37.8806,
                145.1713,
            ),
        ),
        (
            "MWS".to_string(),
            venue(
                "Mount Waverley Secondary College",
                "Stephensons Road, Mount Waverley VIC 3149",
                -37.8787,
                145.1290,
            ),
        ),
        (
            "HSC".to_string(),
            venue(
                "Highvale Secondary College",
                "Capital Avenue, Glen Waverley VIC 3150",
                -37.8900,
                145.1980,
            ),
        ),
    ])
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::load_with(Self::environment())
    }

    /// `FIXTURES_<SECTION>__<KEY>`, e.g. `FIXTURES_SCRAPER__TIMEOUT_SECS=10`
    fn environment() -> config::Environment {
        config::Environment::with_prefix("FIXTURES")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn load_with(env: config::Environment) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(env)
            .build()?;

        let app_cfg: AppConfig = cfg
            .try_deserialize()
            .context("Invalid configuration")?;
        app_cfg.validate()?;
        Ok(app_cfg)
    }

    /// Reject settings that would make every fixture unusable.
    pub fn validate(&self) -> Result<()> {
        self.timezone()?;
        self.age_group_regex()?;
        if self.calendar.event_minutes <= 0 {
            bail!(
                "calendar.event_minutes must be positive, got {}",
                self.calendar.event_minutes
            );
        }
        if self.calendar.extension.trim().is_empty() {
            bail!("calendar.extension must not be empty");
        }
        Ok(())
    }

    pub fn timezone(&self) -> Result<Tz> {
        self.calendar
            .timezone
            .parse::<Tz>()
            .map_err(|e| anyhow!("unknown timezone {:?}: {}", self.calendar.timezone, e))
    }

    pub fn age_group_regex(&self) -> Result<Regex> {
        Regex::new(&self.calendar.age_group_pattern).with_context(|| {
            format!(
                "invalid age_group_pattern {:?}",
                self.calendar.age_group_pattern
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = AppConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.timezone().unwrap(), chrono_tz::Australia::Melbourne);
        assert_eq!(cfg.calendar.event_minutes, 60);
        assert!(cfg.venues.contains_key("WAV"));
    }

    #[test]
    fn rejects_bad_settings() {
        let mut cfg = AppConfig::default();
        cfg.calendar.timezone = "Mars/Olympus".into();
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.calendar.event_minutes = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.calendar.age_group_pattern = "^U(".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn env_overrides_file_values() {
        let vars = std::collections::HashMap::from([
            ("FIXTURES_SCRAPER__TIMEOUT_SECS".to_string(), "9".to_string()),
            ("FIXTURES_CALENDAR__EVENT_MINUTES".to_string(), "45".to_string()),
        ]);
        let cfg = AppConfig::load_with(AppConfig::environment().source(Some(vars))).unwrap();

        assert_eq!(cfg.scraper.timeout_secs, 9);
        assert_eq!(cfg.calendar.event_minutes, 45);
        assert_eq!(cfg.calendar.timezone, "Australia/Melbourne");
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let cfg: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(
                "[calendar]\nevent_minutes = 45\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.calendar.event_minutes, 45);
        assert_eq!(cfg.calendar.timezone, "Australia/Melbourne");
        assert_eq!(cfg.output.root, PathBuf::from("public"));
        assert!(!cfg.venues.is_empty());
    }
}
