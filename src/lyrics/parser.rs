//! LRC format parser
//!
//! Parses synchronized lyrics in LRC format:
//! [mm:ss.cc]Lyrics line here
//!
//! Example:
//! [00:12.34]Hello world
//! [00:15.00]Another line
//!
//! Only the fixed two-digit `[mm:ss.cc]` stamp is recognised. Metadata tags
//! (`[ti:...]`), millisecond stamps and untimed lines are dropped.

/// A single line of lyrics with its offset into the track
#[derive(Debug, Clone, PartialEq)]
pub struct TimedLine {
    /// Seconds from the start of the track
    pub offset_seconds: f64,
    /// The lyrics text
    pub text: String,
}

impl TimedLine {
    pub fn new(offset_seconds: f64, text: impl Into<String>) -> Self {
        Self {
            offset_seconds,
            text: text.into(),
        }
    }
}

/// Parse LRC text into lines sorted by offset. Source order only breaks ties.
pub fn parse(content: &str) -> Vec<TimedLine> {
    let mut lines: Vec<TimedLine> = content.lines().filter_map(parse_timed_line).collect();

    // Vec::sort_by is stable, so equal stamps keep their source order.
    lines.sort_by(|a, b| a.offset_seconds.total_cmp(&b.offset_seconds));
    lines
}

/// Parse a line like `[00:12.34]Lyrics`
fn parse_timed_line(line: &str) -> Option<TimedLine> {
    let line = line.trim_start();
    let rest = line.strip_prefix('[')?;
    let (stamp, text) = rest.split_once(']')?;
    let offset_seconds = parse_timestamp(stamp)?;
    Some(TimedLine::new(offset_seconds, text.trim()))
}

/// Parse timestamp string like "01:02.34" into seconds
fn parse_timestamp(s: &str) -> Option<f64> {
    let (min, rest) = s.split_once(':')?;
    let (sec, centi) = rest.split_once('.')?;

    let min = two_digits(min)?;
    let sec = two_digits(sec)?;
    let centi = two_digits(centi)?;

    Some(f64::from(min) * 60.0 + f64::from(sec) + f64::from(centi) / 100.0)
}

fn two_digits(s: &str) -> Option<u32> {
    if s.len() != 2 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("00:12.34"), Some(12.34));
        assert_eq!(parse_timestamp("01:30.00"), Some(90.0));
        assert_eq!(parse_timestamp("00:12"), None);
        assert_eq!(parse_timestamp("00:12.340"), None);
        assert_eq!(parse_timestamp("0:12.34"), None);
        assert_eq!(parse_timestamp("00:12:34"), None);
        assert_eq!(parse_timestamp("ti:Song"), None);
    }

    #[test]
    fn test_parse_sorts_out_of_order_lines() {
        let parsed = parse("[00:01.00]Hello\n[00:00.50]Hi");
        assert_eq!(
            parsed,
            vec![TimedLine::new(0.5, "Hi"), TimedLine::new(1.0, "Hello")]
        );
    }

    #[test]
    fn test_parse_drops_non_matching_lines() {
        let lrc = r#"
[ti:Test Song]
[ar:Test Artist]
[00:12.34]First line
just some words
[00:15.00]Second line
[00:16.5]Bad stamp
"#;
        let parsed = parse(lrc);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].text, "First line");
        assert!((parsed[0].offset_seconds - 12.34).abs() < 1e-9);
        assert_eq!(parsed[1].text, "Second line");
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(parse("").is_empty());
    }

    #[test]
    fn test_equal_stamps_keep_source_order() {
        let parsed = parse("[00:05.00]b\n[00:02.00]a\n[00:05.00]c");
        let texts: Vec<&str> = parsed.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_crlf_line_endings() {
        let parsed = parse("[00:00.10]One\r\n[00:00.20]Two\r\n");
        assert_eq!(parsed[0].text, "One");
        assert_eq!(parsed[1].text, "Two");
    }
}
