use crate::models::{Division, FormTokens, RawFixtureRow, Season, Team};
use crate::scraper::ScrapeError;
use anyhow::Result;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, trace};

/// Placeholder entry the site puts at the top of its team list.
const PLACEHOLDER_NAME: &str = "Select...";
const PLACEHOLDER_ID: &str = "0";

/// Line break between date and "venue, time" in a fixture's first cell.
const DATE_VENUE_SEPARATOR: &str = "<br>";

fn selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| anyhow::anyhow!("selector {:?}: {:?}", s, e))
}

/// Visible text of an element or markup fragment, whitespace collapsed.
fn clean_text<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn fragment_text(markup: &str) -> String {
    let frag = Html::parse_fragment(markup);
    clean_text(frag.root_element().text())
}

// ── Form state ────────────────────────────────────────────────────────────────

pub fn parse_form_tokens(html: &str) -> Result<FormTokens> {
    let doc = Html::parse_document(html);

    let field = |name: &'static str| -> Result<String> {
        let sel = selector(&format!("input#{}", name))?;
        doc.select(&sel)
            .next()
            .and_then(|el| el.value().attr("value"))
            .map(|v| v.to_string())
            .ok_or_else(|| ScrapeError::MissingToken(name).into())
    };

    Ok(FormTokens {
        view_state: field("__VIEWSTATE")?,
        view_state_generator: field("__VIEWSTATEGENERATOR")?,
        event_validation: field("__EVENTVALIDATION")?,
    })
}

// ── Selector lists ────────────────────────────────────────────────────────────

/// `(value, label)` pairs of a `<select id=..>`, minus placeholder entries.
/// An absent select means the page layout is not what we expect.
pub fn parse_select_options(html: &str, select_id: &str) -> Result<Vec<(String, String)>> {
    let doc = Html::parse_document(html);

    let select_sel = selector(&format!("select#{}", select_id))?;
    let option_sel = selector("option")?;

    let select = doc
        .select(&select_sel)
        .next()
        .ok_or_else(|| ScrapeError::MissingElement(format!("select#{}", select_id)))?;

    let options = select
        .select(&option_sel)
        .filter_map(|opt| {
            let id = opt.value().attr("value")?.trim().to_string();
            let name = clean_text(opt.text());
            if id.is_empty() || id == PLACEHOLDER_ID || name == PLACEHOLDER_NAME {
                trace!("#{}: skipping placeholder option {:?}", select_id, name);
                return None;
            }
            Some((id, name))
        })
        .collect();

    Ok(options)
}

pub fn parse_seasons(html: &str) -> Result<Vec<Season>> {
    Ok(parse_select_options(html, "season")?
        .into_iter()
        .map(|(id, name)| Season { id, name })
        .collect())
}

pub fn parse_divisions(html: &str) -> Result<Vec<Division>> {
    Ok(parse_select_options(html, "grades")?
        .into_iter()
        .map(|(id, name)| Division { id, name })
        .collect())
}

pub fn parse_teams(html: &str) -> Result<Vec<Team>> {
    Ok(parse_select_options(html, "teams")?
        .into_iter()
        .map(|(id, name)| Team { id, name })
        .collect())
}

// ── Fixture table ─────────────────────────────────────────────────────────────

/// Extract fixture rows from a team page.
///
/// Layout: header row, then one row per round with
/// `<td>date<br>venue, time</td><td>opponent</td>...`. Rows that do not match
/// (blank rows, bye markers without a date cell, short rows) are dropped
/// quietly, and so are rounds against "Bye".
pub fn parse_fixtures(html: &str, team: &str) -> Result<Vec<RawFixtureRow>> {
    let doc = Html::parse_document(html);
    let tr_sel = selector("table tr")?;
    let td_sel = selector("td")?;

    let mut rows = Vec::new();

    for tr in doc.select(&tr_sel).skip(1) {
        let cells: Vec<ElementRef> = tr.select(&td_sel).collect();
        if cells.len() < 2 {
            continue;
        }

        let Some(row) = split_fixture_row(&cells[0].inner_html(), &cells[1]) else {
            trace!("{}: not a fixture row", team);
            continue;
        };

        if row.opponent.eq_ignore_ascii_case("bye") {
            debug!("{}: bye on {}", team, row.date);
            continue;
        }

        rows.push(row);
    }

    Ok(rows)
}

fn split_fixture_row(date_venue_html: &str, opponent_cell: &ElementRef) -> Option<RawFixtureRow> {
    let (date_html, venue_time_html) = date_venue_html.split_once(DATE_VENUE_SEPARATOR)?;

    let date = fragment_text(date_html);
    let venue_time = fragment_text(venue_time_html);
    if date.is_empty() || venue_time.is_empty() {
        return None;
    }

    let (venue, time) = match venue_time.split_once(',') {
        Some((venue, time)) => (venue.trim().to_string(), time.trim().to_string()),
        None => (venue_time.trim().to_string(), String::new()),
    };

    Some(RawFixtureRow {
        date,
        venue,
        time,
        opponent: clean_text(opponent_cell.text()),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
