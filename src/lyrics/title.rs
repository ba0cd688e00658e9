//! Title/artist extraction from free-form labels such as video titles.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleArtist {
    pub artist: String,
    pub title: String,
}

/// Delimiter patterns tried in order. Group order is (first, second) as it
/// appears in the label; `artist_first` says which group is the artist.
struct LabelPattern {
    re: Regex,
    artist_first: bool,
}

// Trailing "(...)" and "[...]" suffixes are matched outside the groups so
// they are dropped from the title. A spaced dash is tried before a bare one
// so hyphenated names ("Jay-Z", "a-ha") stay whole.
static PATTERNS: Lazy<Vec<LabelPattern>> = Lazy::new(|| {
    [
        (r"^(.+?)\s+-\s+(.+?)(?:\s*\(.*\))?(?:\s*\[.*\])?$", true),
        (r"(?i)^(.+?)\s*\bby\b\s*(.+?)(?:\s*\(.*\))?(?:\s*\[.*\])?$", false),
        (r"^(.+?)\s*\|\s*(.+?)(?:\s*\(.*\))?(?:\s*\[.*\])?$", true),
        (r"^(.+?)\s*-\s*(.+?)(?:\s*\(.*\))?(?:\s*\[.*\])?$", true),
    ]
    .into_iter()
    .filter_map(|(src, artist_first)| {
        Regex::new(src)
            .ok()
            .map(|re| LabelPattern { re, artist_first })
    })
    .collect()
});

/// Extract `(artist, title)` from a label. Returns `None` when no splitting
/// strategy applies or either side ends up empty.
pub fn parse(label: &str) -> Option<TitleArtist> {
    let label = label.trim();
    if label.is_empty() {
        return None;
    }

    for pattern in PATTERNS.iter() {
        let Some(caps) = pattern.re.captures(label) else {
            continue;
        };
        let first = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        let second = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
        let (artist, title) = if pattern.artist_first {
            (first, second)
        } else {
            (second, first)
        };
        debug!("label '{}' matched pattern {}", label, pattern.re.as_str());
        return non_empty(artist, title);
    }

    // Last resort: plain " - " split, everything after the first segment is
    // the title.
    let mut parts = label.split(" - ");
    let artist = parts.next()?.trim();
    let rest: Vec<&str> = parts.collect();
    if rest.is_empty() {
        return None;
    }
    non_empty(artist, rest.join(" - ").trim())
}

fn non_empty(artist: &str, title: &str) -> Option<TitleArtist> {
    if artist.is_empty() || title.is_empty() {
        return None;
    }
    Some(TitleArtist {
        artist: artist.to_string(),
        title: title.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(artist: &str, title: &str) -> Option<TitleArtist> {
        Some(TitleArtist {
            artist: artist.into(),
            title: title.into(),
        })
    }

    #[test]
    fn test_dash_with_parenthetical_suffix() {
        assert_eq!(
            parse("Earth Wind & Fire - September (Official Video)"),
            pair("Earth Wind & Fire", "September")
        );
    }

    #[test]
    fn test_hyphenated_names_stay_whole() {
        assert_eq!(
            parse("Jay-Z - Empire State of Mind"),
            pair("Jay-Z", "Empire State of Mind")
        );
        assert_eq!(parse("Take On Me by a-ha"), pair("a-ha", "Take On Me"));
    }

    #[test]
    fn test_bare_dash_still_splits() {
        assert_eq!(parse("Adele-Hello (Live)"), pair("Adele", "Hello"));
    }

    #[test]
    fn test_dash_with_bracket_suffix() {
        assert_eq!(
            parse("Daft Punk - One More Time [HD]"),
            pair("Daft Punk", "One More Time")
        );
    }

    #[test]
    fn test_title_by_artist() {
        assert_eq!(
            parse("Bohemian Rhapsody BY Queen"),
            pair("Queen", "Bohemian Rhapsody")
        );
    }

    #[test]
    fn test_pipe_separator() {
        assert_eq!(parse("Adele | Hello"), pair("Adele", "Hello"));
    }

    #[test]
    fn test_unsplittable_label() {
        assert_eq!(parse("Untitled"), None);
        assert_eq!(parse("   "), None);
        assert_eq!(parse(""), None);
    }

    #[test]
    fn test_empty_side_is_rejected() {
        assert_eq!(parse("- Hello"), None);
        assert_eq!(parse("Adele |"), None);
    }
}
