//! Calendar emitter: one iCalendar document per team.
//!
//! Output is a pure function of the fixtures. UIDs and DTSTAMPs are derived
//! from the team's path and the event start, so a re-run over the same source
//! data rewrites every file byte-for-byte.

use crate::models::{FixtureMeta, NormalizedFixture};
use anyhow::{Context, Result};
use chrono::Utc;
use icalendar::{Calendar, Component, Event, EventLike};
use std::path::{Path, PathBuf};

pub struct CalendarEmitter {
    root: PathBuf,
    extension: String,
    tzid: String,
}

impl CalendarEmitter {
    pub fn new(root: impl Into<PathBuf>, extension: &str, tzid: &str) -> Self {
        Self {
            root: root.into(),
            extension: extension.trim_start_matches('.').to_string(),
            tzid: tzid.to_string(),
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// `<root>/<season>/<division>/<team>.<ext>`, every component sanitized.
    pub fn output_path(&self, meta: &FixtureMeta) -> PathBuf {
        meta.relative_path(&self.extension)
            .split('/')
            .fold(self.root.clone(), |path, part| path.join(part))
    }

    /// Render one team's fixtures as an iCalendar document.
    /// Event times are written in UTC; the zone name only goes into
    /// `X-WR-TIMEZONE` as a display hint, so no VTIMEZONE block is needed.
    pub fn render(&self, meta: &FixtureMeta, fixtures: &[NormalizedFixture]) -> String {
        let mut calendar = Calendar::new();
        calendar
            .name(&format!("{} Fixtures", meta.team))
            .timezone(&self.tzid);

        let uid_base = meta.relative_path(&self.extension);
        for fixture in fixtures {
            calendar.push(self.event(&uid_base, fixture));
        }

        calendar.done().to_string()
    }

    fn event(&self, uid_base: &str, fixture: &NormalizedFixture) -> Event {
        let mut event = Event::new();
        event
            .uid(&format!("{}#{}", uid_base, fixture.start.format("%Y%m%dT%H%M")))
            .timestamp(fixture.start.with_timezone(&Utc))
            .summary(&fixture.summary)
            .starts(fixture.start.with_timezone(&Utc))
            .ends(fixture.end.with_timezone(&Utc));

        let location = &fixture.location;
        match &location.address {
            Some(address) => event.location(&format!("{}, {}", location.title, address)),
            None => event.location(&location.title),
        };

        if let Some((lat, lon)) = location.coordinates {
            event.add_property("GEO", format!("{:.6};{:.6}", lat, lon));
        }

        if let Some(court) = &fixture.court {
            event.description(&format!("Court {}", court));
        }

        event.done()
    }
}

/// Write (or overwrite) one file, creating parent directories.
pub async fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {:?}", dir))?;
    }
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("Failed to write {:?}", path))
}
