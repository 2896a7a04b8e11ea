use crate::models::{Location, NormalizedFixture, RawFixtureRow, Venue};
use chrono::{DateTime, NaiveDateTime, TimeDelta, TimeZone};
use chrono_tz::Tz;
use std::collections::BTreeMap;
use tracing::warn;

/// `day month-abbrev year hour:minute`, 24-hour clock. "15 Mar 2024 18:30"
const DATE_TIME_FORMAT: &str = "%d %b %Y %H:%M";

const VENUE_CODE_LEN: usize = 3;

// ── Parsers ───────────────────────────────────────────────────────────────────

/// Read a fixture's date and time as wall-clock time in `zone`.
/// `None` when the strings do not match the expected format or name a local
/// time that does not exist (DST gap). Ambiguous times take the earlier instant.
pub fn resolve_date_time(date: &str, time: &str, zone: Tz) -> Option<DateTime<Tz>> {
    let joined = format!("{} {}", date.trim(), time.trim());
    let joined = joined.split_whitespace().collect::<Vec<_>>().join(" ");

    let naive = NaiveDateTime::parse_from_str(&joined, DATE_TIME_FORMAT).ok()?;
    zone.from_local_datetime(&naive).earliest()
}

/// Season label up to the first "(".
/// "U12 Boys (Winter 2024)" → "U12 Boys"
pub fn age_group_label(season: &str) -> &str {
    season.split('(').next().unwrap_or(season).trim()
}

/// Result of looking up a raw venue token such as "WAV3".
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedVenue {
    pub location: Location,
    /// Court or sub-location after the 3-character code; empty when absent.
    pub court_suffix: String,
    pub known: bool,
}

// ── Venue table ───────────────────────────────────────────────────────────────

/// Venue codes → reference entries. Codes match case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct VenueTable {
    venues: BTreeMap<String, Venue>,
}

impl VenueTable {
    pub fn new(venues: &BTreeMap<String, Venue>) -> Self {
        Self {
            venues: venues
                .iter()
                .map(|(code, v)| (code.trim().to_uppercase(), v.clone()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.venues.len()
    }

    /// Unknown codes keep the raw token as the title, with no address.
    pub fn resolve(&self, raw: &str) -> ResolvedVenue {
        let raw = raw.trim();
        let split_at = raw
            .char_indices()
            .nth(VENUE_CODE_LEN)
            .map(|(i, _)| i)
            .unwrap_or(raw.len());
        let (code, suffix) = raw.split_at(split_at);

        match self.venues.get(&code.to_uppercase()) {
            Some(venue) if code.chars().count() == VENUE_CODE_LEN => ResolvedVenue {
                location: Location {
                    title: venue.name.clone(),
                    address: venue.address.clone(),
                    coordinates: venue.latitude.zip(venue.longitude),
                },
                court_suffix: suffix.trim().to_string(),
                known: true,
            },
            _ => ResolvedVenue {
                location: Location {
                    title: raw.to_string(),
                    address: None,
                    coordinates: None,
                },
                court_suffix: suffix.trim().to_string(),
                known: false,
            },
        }
    }
}

// ── Raw row → NormalizedFixture ───────────────────────────────────────────────

/// Turns raw table rows into calendar-ready fixtures for one team.
#[derive(Debug, Clone)]
pub struct Normaliser {
    pub zone: Tz,
    pub duration: TimeDelta,
    pub venues: VenueTable,
}

impl Normaliser {
    pub fn new(zone: Tz, event_minutes: i64, venues: VenueTable) -> Self {
        Self {
            zone,
            duration: TimeDelta::minutes(event_minutes),
            venues,
        }
    }

    /// `None` (with a warning) when the date cannot be read; the fixture is dropped.
    pub fn normalise(&self, row: &RawFixtureRow, season: &str, team: &str) -> Option<NormalizedFixture> {
        let Some(start) = resolve_date_time(&row.date, &row.time, self.zone) else {
            warn!(
                "Skipping invalid date: {:?} {:?} for {} vs {}",
                row.date, row.time, team, row.opponent
            );
            return None;
        };

        let venue = self.venues.resolve(&row.venue);
        let court = (venue.known && !venue.court_suffix.is_empty()).then(|| venue.court_suffix.clone());

        Some(NormalizedFixture {
            start,
            end: start + self.duration,
            summary: format!("🏀 {}: {} vs {}", age_group_label(season), team, row.opponent),
            location: venue.location,
            court,
        })
    }

    pub fn normalise_all(&self, rows: &[RawFixtureRow], season: &str, team: &str) -> Vec<NormalizedFixture> {
        rows.iter()
            .filter_map(|row| self.normalise(row, season, team))
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
