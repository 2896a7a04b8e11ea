//! Pipeline orchestrator: ties form driver → parser → normaliser → emitters together.
//!
//! ## Stages
//!
//!   1. Landing page → hidden form tokens + season list (fatal on failure)
//!   2. Seasons filtered by the age-group pattern
//!   3. Per season: postback → divisions; per division: GET → teams
//!   4. Per team: GET fixtures → parse → normalise → render calendar → spawn write
//!   5. After the full traversal: aggregate every written team → index page
//!
//! A failure inside stage 3 or 4 skips that season, division or team only.
//! Requests run one at a time through a single session, because the site
//! tracks the selected season per session. File writes are independent and
//! run as spawned tasks.
//!
//! Idempotent: every run rewrites all output files from scratch.

use crate::calendar::{write_file, CalendarEmitter};
use crate::config::AppConfig;
use crate::index;
use crate::models::{Division, FixtureMeta, FormTokens, Season, Team};
use crate::scraper::cleaner::{Normaliser, VenueTable};
use crate::scraper::parsers::parse_fixtures;
use crate::scraper::{FixtureSource, FixturesSite};
use anyhow::{Context, Result};
use regex::Regex;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub struct Pipeline {
    config: AppConfig,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub seasons_processed: usize,
    pub seasons_skipped: usize,
    pub teams_written: usize,
    pub events_written: usize,
    pub errors: usize,
}

/// Per-run state shared by the traversal stages.
struct Run<'a, S: FixtureSource + ?Sized> {
    source: &'a S,
    normaliser: Normaliser,
    emitter: CalendarEmitter,
    stats: PipelineStats,
    written: Vec<FixtureMeta>,
    writes: Vec<(PathBuf, JoinHandle<Result<()>>)>,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub async fn run(&self) -> Result<PipelineStats> {
        let site = FixturesSite::new(&self.config.scraper).context("Failed to build scraper")?;
        self.run_with(&site).await
    }

    pub async fn run_with<S: FixtureSource + ?Sized>(&self, source: &S) -> Result<PipelineStats> {
        let zone = self.config.timezone()?;
        let age_group = self.config.age_group_regex()?;
        let venues = VenueTable::new(&self.config.venues);
        debug!("{} venues in lookup table", venues.len());

        let mut run = Run {
            source,
            normaliser: Normaliser::new(zone, self.config.calendar.event_minutes, venues),
            emitter: CalendarEmitter::new(
                &self.config.output.root,
                &self.config.calendar.extension,
                &self.config.calendar.timezone,
            ),
            stats: PipelineStats::default(),
            written: Vec::new(),
            writes: Vec::new(),
        };

        // ── 1. Landing page ───────────────────────────────────────────────────
        info!("=== Step 1: Fetching seasons ===");
        let (tokens, seasons) = source
            .fetch_seasons()
            .await
            .context("Initial season/token fetch failed")?;

        // ── 2. Age-group filter ───────────────────────────────────────────────
        let seasons = select_seasons(seasons, &age_group, &mut run.stats);
        info!("{} seasons to crawl", seasons.len());

        // ── 3/4. Divisions → teams → fixtures ─────────────────────────────────
        info!("=== Step 2: Crawling divisions and teams ===");
        for season in &seasons {
            run.season(season, &tokens).await;
        }

        // Calendar writes must land before the index points at them.
        let Run { emitter, mut stats, written, writes, .. } = run;
        for (path, handle) in writes {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => { warn!("{:?}: {:#}", path, e); stats.errors += 1; }
                Err(e) => { error!("Write task panic for {:?}: {}", path, e); stats.errors += 1; }
            }
        }

        // ── 5. Index page ─────────────────────────────────────────────────────
        info!("=== Step 3: Writing index ({} teams) ===", written.len());
        let nested = index::aggregate(&written, emitter.extension());
        let page = index::render(&nested, &self.config.output.site_title)?;
        let index_path = self.config.output.root.join(&self.config.output.index_file);
        write_file(&index_path, &page).await?;

        info!(
            "=== Done: {} seasons ({} skipped) | {} teams | {} events | {} errors ===",
            stats.seasons_processed, stats.seasons_skipped,
            stats.teams_written, stats.events_written, stats.errors,
        );

        Ok(stats)
    }
}

/// Keep seasons whose name starts with an age group ("U10 ...", "U12 ...").
fn select_seasons(seasons: Vec<Season>, pattern: &Regex, stats: &mut PipelineStats) -> Vec<Season> {
    seasons
        .into_iter()
        .filter(|season| {
            let keep = pattern.is_match(&season.name);
            if !keep {
                info!("Skipping season {:?} (does not start with age group)", season.name);
                stats.seasons_skipped += 1;
            }
            keep
        })
        .collect()
}

impl<S: FixtureSource + ?Sized> Run<'_, S> {
    async fn season(&mut self, season: &Season, tokens: &FormTokens) {
        let divisions = match self.source.fetch_divisions(&season.id, tokens).await {
            Ok(divisions) => divisions,
            Err(e) => {
                warn!("Season {:?}: skipping, {:#}", season.name, e);
                self.stats.errors += 1;
                return;
            }
        };

        self.stats.seasons_processed += 1;
        for division in &divisions {
            self.division(season, division).await;
        }
    }

    async fn division(&mut self, season: &Season, division: &Division) {
        let teams = match self.source.fetch_teams(&division.id).await {
            Ok(teams) => teams,
            Err(e) => {
                warn!("{} / {}: skipping division, {:#}", season.name, division.name, e);
                self.stats.errors += 1;
                return;
            }
        };

        for team in &teams {
            if let Err(e) = self.team(season, division, team).await {
                warn!("{} / {} / {}: skipping team, {:#}", season.name, division.name, team.name, e);
                self.stats.errors += 1;
            }
        }
    }

    async fn team(&mut self, season: &Season, division: &Division, team: &Team) -> Result<()> {
        info!("Fetching: {} / {} / {}", season.name, division.name, team.name);

        let html = self.source.fetch_fixture_html(&division.id, &team.id).await?;
        let rows = parse_fixtures(&html, &team.name)?;
        let fixtures = self.normaliser.normalise_all(&rows, &season.name, &team.name);

        let meta = FixtureMeta::new(&season.name, &division.name, &team.name);
        let path = self.emitter.output_path(&meta);
        let contents = self.emitter.render(&meta, &fixtures);
        debug!("{}: {} events → {:?}", team.name, fixtures.len(), path);

        let write_path = path.clone();
        let handle = tokio::spawn(async move { write_file(&write_path, &contents).await });
        self.writes.push((path, handle));

        self.stats.teams_written += 1;
        self.stats.events_written += fixtures.len();
        self.written.push(meta);
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::ScrapeError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::Path;

    /// In-memory site: seasons, divisions per season, teams per division,
    /// fixture tables per team. Unknown ids behave like a changed layout.
    #[derive(Default)]
    struct FakeSite {
        seasons: Vec<Season>,
        divisions: HashMap<String, Vec<Division>>,
        teams: HashMap<String, Vec<Team>>,
        fixtures: HashMap<String, String>,
    }

    fn season(id: &str, name: &str) -> Season {
        Season { id: id.into(), name: name.into() }
    }
    fn division(id: &str, name: &str) -> Division {
        Division { id: id.into(), name: name.into() }
    }
    fn team(id: &str, name: &str) -> Team {
        Team { id: id.into(), name: name.into() }
    }

    fn table(rows: &[(&str, &str)]) -> String {
        let body: String = rows
            .iter()
            .map(|(cell, opp)| format!("<tr><td>{}</td><td>{}</td></tr>", cell, opp))
            .collect();
        format!("<table><tr><td>Date</td><td>Opponent</td></tr>{}</table>", body)
    }

    fn league() -> FakeSite {
        let mut site = FakeSite {
            seasons: vec![season("1", "U12 Boys (Winter 2024)"), season("2", "Senior Men A")],
            ..Default::default()
        };
        site.divisions.insert("1".into(), vec![division("10", "Div 1"), division("11", "Div 2")]);
        site.divisions.insert("2".into(), vec![division("20", "Open")]);
        site.teams.insert("10".into(), vec![team("100", "Eagles"), team("101", "Hawks")]);
        site.teams.insert("11".into(), vec![team("110", "Eagles")]);
        site.teams.insert("20".into(), vec![team("200", "Vets")]);

        site.fixtures.insert(
            "100".into(),
            table(&[
                ("15 Mar 2024<br>WAV3, 18:30", "Hawks"),
                ("22 Mar 2024<br>ZZZ, 09:00", "Bye"),
                ("29 Mar 2024", "No separator"),
                ("5 Apr 2024<br>GWS, TBC", "Owls"),
                ("12 Apr 2024<br>HSC2, 10:15", "Owls"),
            ]),
        );
        site.fixtures.insert("101".into(), table(&[("15 Mar 2024<br>WAV3, 18:30", "Eagles")]));
        site.fixtures.insert("110".into(), table(&[("16 Mar 2024<br>MWS, 08:00", "Ravens")]));
        site.fixtures.insert("200".into(), table(&[("16 Mar 2024<br>MWS, 20:00", "Old Boys")]));
        site
    }

    #[async_trait]
    impl FixtureSource for FakeSite {
        async fn fetch_seasons(&self) -> Result<(FormTokens, Vec<Season>)> {
            if self.seasons.is_empty() {
                return Err(ScrapeError::MissingElement("select#season".into()).into());
            }
            Ok((FormTokens::default(), self.seasons.clone()))
        }

        async fn fetch_divisions(&self, season_id: &str, _tokens: &FormTokens) -> Result<Vec<Division>> {
            self.divisions
                .get(season_id)
                .cloned()
                .ok_or_else(|| ScrapeError::MissingElement("select#grades".into()).into())
        }

        async fn fetch_teams(&self, division_id: &str) -> Result<Vec<Team>> {
            self.teams
                .get(division_id)
                .cloned()
                .ok_or_else(|| ScrapeError::MissingElement("select#teams".into()).into())
        }

        async fn fetch_fixture_html(&self, _division_id: &str, team_id: &str) -> Result<String> {
            self.fixtures.get(team_id).cloned().ok_or_else(|| {
                ScrapeError::HttpStatus { status: 500, url: format!("tid={}", team_id) }.into()
            })
        }
    }

    fn config_for(name: &str) -> AppConfig {
        let root = std::env::temp_dir().join(format!(
            "fixture-calendars-{}-{}",
            name,
            std::process::id()
        ));
        std::fs::remove_dir_all(&root).ok();

        let mut config = AppConfig::default();
        config.output.root = root;
        config
    }

    fn read(root: &Path, rel: &str) -> String {
        std::fs::read_to_string(root.join(rel)).unwrap()
    }

    #[tokio::test]
    async fn test_full_run() {
        let config = config_for("full");
        let root = config.output.root.clone();

        let stats = Pipeline::new(config).run_with(&league()).await.unwrap();
        assert_eq!(
            stats,
            PipelineStats {
                seasons_processed: 1,
                seasons_skipped: 1,
                teams_written: 3,
                events_written: 4,
                errors: 0,
            }
        );

        let eagles = read(&root, "U12_Boys_(Winter_2024)/Div_1/Eagles.ics");
        assert_eq!(eagles.matches("BEGIN:VEVENT").count(), 2);
        assert!(!eagles.contains("Bye"));
        assert!(!eagles.contains("No separator"));
        assert!(eagles.contains("DESCRIPTION:Court 3"));

        // Same team name in another division gets its own file.
        let other = read(&root, "U12_Boys_(Winter_2024)/Div_2/Eagles.ics");
        assert!(other.contains("Ravens"));

        let page = read(&root, "index.html");
        assert!(page.contains("\"U12_Boys_(Winter_2024)/Div_1/Hawks.ics\""));
        assert!(!page.contains("Senior Men A"));

        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn test_non_age_group_season_creates_nothing() {
        let config = config_for("filter");
        let root = config.output.root.clone();

        Pipeline::new(config).run_with(&league()).await.unwrap();

        assert!(!root.join("Senior_Men_A").exists());
        assert!(root.join("U12_Boys_(Winter_2024)").is_dir());
        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn test_rerun_is_byte_identical() {
        let config = config_for("idempotent");
        let root = config.output.root.clone();
        let pipeline = Pipeline::new(config);
        let files = [
            "index.html",
            "U12_Boys_(Winter_2024)/Div_1/Eagles.ics",
            "U12_Boys_(Winter_2024)/Div_1/Hawks.ics",
            "U12_Boys_(Winter_2024)/Div_2/Eagles.ics",
        ];

        pipeline.run_with(&league()).await.unwrap();
        let first: Vec<String> = files.iter().map(|f| read(&root, f)).collect();

        pipeline.run_with(&league()).await.unwrap();
        let second: Vec<String> = files.iter().map(|f| read(&root, f)).collect();

        assert_eq!(first, second);
        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn test_failed_branches_are_skipped() {
        let config = config_for("branches");
        let root = config.output.root.clone();

        let mut site = league();
        site.teams.remove("11");
        site.fixtures.remove("101");

        let stats = Pipeline::new(config).run_with(&site).await.unwrap();
        assert_eq!(stats.errors, 2);
        assert_eq!(stats.teams_written, 1);
        assert!(root.join("U12_Boys_(Winter_2024)/Div_1/Eagles.ics").exists());
        assert!(!root.join("U12_Boys_(Winter_2024)/Div_1/Hawks.ics").exists());

        let page = read(&root, "index.html");
        assert!(!page.contains("Hawks.ics"));
        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn test_missing_landing_page_is_fatal() {
        let config = config_for("fatal");
        let root = config.output.root.clone();

        let result = Pipeline::new(config).run_with(&FakeSite::default()).await;
        assert!(result.is_err());
        assert!(!root.join("index.html").exists());
    }

    #[test]
    fn test_select_seasons() {
        let pattern = AppConfig::default().age_group_regex().unwrap();
        let mut stats = PipelineStats::default();
        let kept = select_seasons(
            vec![season("1", "U08 Mixed"), season("2", "Senior Men A"), season("3", "Under 10"), season("4", "U16 Girls")],
            &pattern,
            &mut stats,
        );
        let names: Vec<&str> = kept.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["U08 Mixed", "U16 Girls"]);
        assert_eq!(stats.seasons_skipped, 2);
    }
}
