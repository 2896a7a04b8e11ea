use chrono::DateTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::utils::sanitize_filename;

// ── Site hierarchy ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Season {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Division {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    pub id: String,
    pub name: String,
}

/// Hidden ASP.NET state fields echoed back on a season postback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormTokens {
    pub view_state: String,
    pub view_state_generator: String,
    pub event_validation: String,
}

// ── Fixtures ──────────────────────────────────────────────────────────────────

/// One fixture table row before any interpretation of its values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFixtureRow {
    pub date: String,
    pub venue: String,
    pub time: String,
    pub opponent: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub title: String,
    pub address: Option<String>,
    pub coordinates: Option<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFixture {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    pub summary: String,
    pub location: Location,
    pub court: Option<String>,
}

/// Venue reference entry, keyed by its 3-character code.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Venue {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

// ── Index ─────────────────────────────────────────────────────────────────────

/// Where one team's calendar sits in the season/division/team hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureMeta {
    pub season: String,
    pub division: String,
    pub team: String,
}

impl FixtureMeta {
    pub fn new(season: &str, division: &str, team: &str) -> Self {
        Self {
            season: season.to_string(),
            division: division.to_string(),
            team: team.to_string(),
        }
    }

    /// Output path relative to the output root, `/`-separated.
    /// Both the calendar writer and the index use this, so links always resolve.
    pub fn relative_path(&self, extension: &str) -> String {
        format!(
            "{}/{}/{}.{}",
            sanitize_filename(&self.season),
            sanitize_filename(&self.division),
            sanitize_filename(&self.team),
            extension
        )
    }
}

/// season → division → team → relative calendar path
pub type NestedIndex = BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>;
