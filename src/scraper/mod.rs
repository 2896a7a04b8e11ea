pub mod cleaner;
pub mod http_client;
pub mod parsers;

use crate::config::ScraperConfig;
use crate::models::{Division, FormTokens, Season, Team};
use anyhow::{Context, Result};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use self::http_client::HttpClient;
use self::parsers::{parse_divisions, parse_form_tokens, parse_seasons, parse_teams};

/// Failures that mean the site did not look the way the parsers expect.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("expected element {0} not found (site layout changed?)")]
    MissingElement(String),

    #[error("hidden form field {0} missing from page")]
    MissingToken(&'static str),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },
}

// ── Source trait ──────────────────────────────────────────────────────────────

/// The season → division → team form driver.
///
/// Season selection is a postback that must echo the hidden tokens from the
/// landing page; division and team selection are plain query-string GETs.
#[async_trait]
pub trait FixtureSource: Send + Sync {
    async fn fetch_seasons(&self) -> Result<(FormTokens, Vec<Season>)>;
    async fn fetch_divisions(&self, season_id: &str, tokens: &FormTokens) -> Result<Vec<Division>>;
    async fn fetch_teams(&self, division_id: &str) -> Result<Vec<Team>>;
    async fn fetch_fixture_html(&self, division_id: &str, team_id: &str) -> Result<String>;
}

// ── Live site ─────────────────────────────────────────────────────────────────

pub struct FixturesSite {
    client: HttpClient,
    base_url: Url,
}

impl FixturesSite {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(config)?,
            base_url: Url::parse(&config.base_url)
                .with_context(|| format!("Invalid base_url {:?}", config.base_url))?,
        })
    }

    /// e.g. fixtures.aspx?sgid2=123 or fixtures.aspx?sgid2=123&tid=456
    fn division_url(&self, division_id: &str, team_id: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("sgid2", division_id);
            if let Some(team_id) = team_id {
                query.append_pair("tid", team_id);
            }
        }
        url
    }
}

#[async_trait]
impl FixtureSource for FixturesSite {
    async fn fetch_seasons(&self) -> Result<(FormTokens, Vec<Season>)> {
        info!("Fetching landing page {}", self.base_url);
        let html = self
            .client
            .get_text(self.base_url.as_str())
            .await
            .context("Failed to fetch landing page")?;

        let tokens = parse_form_tokens(&html)?;
        let seasons = parse_seasons(&html)?;
        info!("{} seasons listed", seasons.len());
        Ok((tokens, seasons))
    }

    async fn fetch_divisions(&self, season_id: &str, tokens: &FormTokens) -> Result<Vec<Division>> {
        let fields = [
            ("__VIEWSTATE", tokens.view_state.as_str()),
            ("__VIEWSTATEGENERATOR", tokens.view_state_generator.as_str()),
            ("__EVENTVALIDATION", tokens.event_validation.as_str()),
            ("__EVENTTARGET", "season"),
            ("season", season_id),
        ];

        let html = self
            .client
            .post_form(self.base_url.as_str(), &fields)
            .await
            .with_context(|| format!("Season postback failed for season {}", season_id))?;

        let divisions = parse_divisions(&html)?;
        debug!("season {}: {} divisions", season_id, divisions.len());
        Ok(divisions)
    }

    async fn fetch_teams(&self, division_id: &str) -> Result<Vec<Team>> {
        let url = self.division_url(division_id, None);
        let html = self
            .client
            .get_text(url.as_str())
            .await
            .with_context(|| format!("Failed to fetch division {}", division_id))?;

        let teams = parse_teams(&html)?;
        debug!("division {}: {} teams", division_id, teams.len());
        Ok(teams)
    }

    async fn fetch_fixture_html(&self, division_id: &str, team_id: &str) -> Result<String> {
        let url = self.division_url(division_id, Some(team_id));
        self.client
            .get_text(url.as_str())
            .await
            .with_context(|| format!("Failed to fetch fixtures for team {}", team_id))
    }
}
