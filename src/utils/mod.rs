use once_cell::sync::Lazy;
use regex::Regex;
use std::time::{Duration, Instant};
use tracing::info;

/// A simple wall-clock timer for logging elapsed time.
pub struct Timer {
    label: String,
    start: Instant,
}

impl Timer {
    pub fn start(label: impl Into<String>) -> Self {
        let label = label.into();
        info!("⏱  Starting: {}", label);
        Self {
            label,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        info!(
            "⏱  Finished: {} (took {:.2?})",
            self.label,
            self.elapsed()
        );
    }
}

static UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[<>:"/\\|?*]+"#).unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Strip filesystem-unsafe symbols and join whitespace runs with `_`.
/// "U12 Boys (Winter) / A" → "U12_Boys_(Winter)_A"
pub fn sanitize_filename(s: &str) -> String {
    let stripped = UNSAFE_CHARS.replace_all(s, "");
    WHITESPACE.replace_all(&stripped, "_").into_owned()
}

/// Minimal escaping for text placed inside HTML element content.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("U12 Boys (Winter 2024)"), "U12_Boys_(Winter_2024)");
        assert_eq!(sanitize_filename("A/B:C*D?"), "ABCD");
        assert_eq!(sanitize_filename("Div  1\t<Gold>"), "Div_1_Gold");
        assert_eq!(sanitize_filename("Plain"), "Plain");
    }

    #[test]
    fn test_sanitize_is_stable() {
        let once = sanitize_filename("Eagles | \"Red\"  Team");
        assert_eq!(sanitize_filename(&once), once);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b>Tom & \"Jerry\"</b>"), "&lt;b&gt;Tom &amp; &quot;Jerry&quot;&lt;/b&gt;");
    }
}
