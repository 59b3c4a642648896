//! Window enumeration through wmctrl.
//!
//! A window counts as the big-picture window when its title contains every
//! configured keyword, case-insensitively. An empty keyword set matches any
//! window; config validation warns about that footgun.

use crate::error::{SwitchError, SwitchResult};
use crate::exec;

/// The window-listing tool.
pub const TOOL: &str = "wmctrl";

/// Window query capability; a seam so the detection loop is testable
/// without spawning processes.
pub trait WindowQuery {
    /// Whether any open window matches every keyword.
    async fn present(&mut self, keywords: &[String]) -> SwitchResult<bool>;
}

/// Live observer backed by `wmctrl -l`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WmctrlObserver;

impl WindowQuery for WmctrlObserver {
    async fn present(&mut self, keywords: &[String]) -> SwitchResult<bool> {
        Ok(query_match(keywords).await?.is_some())
    }
}

/// Title of the first open window matching every keyword, if any.
///
/// # Errors
/// [`SwitchError::MissingTool`] when wmctrl is not installed;
/// [`SwitchError::QueryFailed`] when the listing call fails.
pub async fn query_match(keywords: &[String]) -> SwitchResult<Option<String>> {
    let args = ["-l"];
    let output = exec::run(TOOL, &args)
        .await
        .map_err(|e| e.into_query(TOOL, &args))?;
    if !output.status.success() {
        return Err(SwitchError::QueryFailed {
            tool: TOOL.to_string(),
            reason: exec::failure_reason(&output),
        });
    }
    let listing = String::from_utf8_lossy(&output.stdout);
    Ok(first_match(&listing, keywords).map(str::to_string))
}

/// First title in `listing` containing every keyword, case-insensitively.
fn first_match<'a>(listing: &'a str, keywords: &[String]) -> Option<&'a str> {
    let lowered: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
    listing.lines().find_map(|line| {
        let title = window_title(line)?;
        let haystack = title.to_lowercase();
        lowered
            .iter()
            .all(|keyword| haystack.contains(keyword))
            .then_some(title)
    })
}

/// Title field of a `wmctrl -l` line.
///
/// Window id, desktop number, and host occupy the first three
/// whitespace-delimited fields; the remainder is the title. Lines with
/// fewer than four fields are ignored.
fn window_title(line: &str) -> Option<&str> {
    let mut rest = line.trim_start();
    for _ in 0..3 {
        let boundary = rest.find(char::is_whitespace)?;
        rest = rest[boundary..].trim_start();
    }
    (!rest.is_empty()).then_some(rest)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    const LISTING: &str = "\
0x03000003 -1 htpc Steam Big Picture Mode
0x03a00004  0 htpc Terminal - htpc
0x04200009  2 htpc Mozilla Firefox";

    #[test_case(&["steam", "big", "picture"], true; "keywords are case insensitive")]
    #[test_case(&["Steam", "Big", "Picture", "Mode"], true; "default keyword set")]
    #[test_case(&["Picture", "Steam"], true; "keyword order is irrelevant")]
    #[test_case(&["big picture"], true; "a keyword may span words")]
    #[test_case(&["firefox"], true; "any window can match")]
    #[test_case(&["steam", "firefox"], false; "keywords split across windows do not match")]
    #[test_case(&["netflix"], false; "absent keyword")]
    fn keyword_matching(keywords: &[&str], expected: bool) {
        let keywords: Vec<String> = keywords.iter().map(ToString::to_string).collect();
        assert_eq!(first_match(LISTING, &keywords).is_some(), expected);
    }

    #[test]
    fn empty_keywords_match_the_first_window() {
        assert_eq!(first_match(LISTING, &[]), Some("Steam Big Picture Mode"));
    }

    #[test]
    fn empty_listing_never_matches() {
        assert_eq!(first_match("", &[]), None);
    }

    #[test]
    fn lines_with_fewer_than_four_fields_are_ignored() {
        let listing = "0x01 -1 host\n0x02 -1\njunk\n";
        assert_eq!(first_match(listing, &[]), None);
    }

    #[test]
    fn title_is_everything_after_the_third_field() {
        assert_eq!(
            window_title("0x03000003 -1 htpc Steam Big Picture Mode"),
            Some("Steam Big Picture Mode")
        );
    }

    #[test]
    fn title_keeps_internal_whitespace() {
        assert_eq!(
            window_title("0x0  0  host  a  spaced  title"),
            Some("a  spaced  title")
        );
    }

    #[test]
    fn negative_desktop_number_parses_as_a_field() {
        // Sticky windows report desktop -1.
        assert_eq!(window_title("0x40a 1-1 host x"), Some("x"));
        assert_eq!(window_title("0x40a -1 host x"), Some("x"));
    }
}
