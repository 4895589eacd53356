//! LRC and plain-text lyrics parsing.
//!
//! Synchronized lyrics carry `[mm:ss.xx]` timestamps; a line may carry
//! several. Files without any timestamp are treated as plain lyrics. Header
//! tags `[ar:]`, `[ti:]`, `[la:]` and `[offset:]` are recognized, other
//! `[xx:...]` headers are ignored.

use serde::{Deserialize, Serialize};

/// One lyrics line. `timestamp_ms` is `None` for unsynchronized lyrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricsLine {
    pub timestamp_ms: Option<u64>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Lyrics {
    pub language: String,
    pub offset_ms: i64,
    pub display_title: String,
    pub display_artist: String,
    pub synchronized: bool,
    pub lines: Vec<LyricsLine>,
}

/// Language used when a lyrics file does not declare one (ISO 639-2 "undetermined").
pub const UNKNOWN_LANGUAGE: &str = "xxx";

pub fn parse(contents: &str) -> Lyrics {
    let mut lyrics = Lyrics {
        language: UNKNOWN_LANGUAGE.to_string(),
        ..Default::default()
    };

    let mut timed: Vec<LyricsLine> = Vec::new();
    let mut plain: Vec<LyricsLine> = Vec::new();

    for raw in contents.lines() {
        let line = raw.trim_end_matches('\r');
        let (timestamps, text) = split_timestamps(line);

        if !timestamps.is_empty() {
            for ts in timestamps {
                timed.push(LyricsLine {
                    timestamp_ms: Some(ts),
                    text: text.trim().to_string(),
                });
            }
            continue;
        }

        if let Some((tag, value)) = header_tag(line) {
            match tag.as_str() {
                "ar" => lyrics.display_artist = value,
                "ti" => lyrics.display_title = value,
                "la" if !value.is_empty() => lyrics.language = value,
                "offset" => lyrics.offset_ms = value.parse().unwrap_or(0),
                _ => {}
            }
            continue;
        }

        plain.push(LyricsLine {
            timestamp_ms: None,
            text: line.to_string(),
        });
    }

    if timed.is_empty() {
        // Drop leading/trailing blank lines of plain lyrics
        while plain.last().is_some_and(|l| l.text.trim().is_empty()) {
            plain.pop();
        }
        let start = plain
            .iter()
            .position(|l| !l.text.trim().is_empty())
            .unwrap_or(plain.len());
        lyrics.lines = plain.split_off(start);
    } else {
        timed.sort_by_key(|l| l.timestamp_ms);
        lyrics.synchronized = true;
        lyrics.lines = timed;
    }

    lyrics
}

/// Split leading `[mm:ss.xx]` stamps off a line.
fn split_timestamps(mut line: &str) -> (Vec<u64>, &str) {
    let mut stamps = Vec::new();
    loop {
        let trimmed = line.trim_start();
        let Some(rest) = trimmed.strip_prefix('[') else {
            break;
        };
        let Some(end) = rest.find(']') else {
            break;
        };
        match parse_timestamp(&rest[..end]) {
            Some(ts) => {
                stamps.push(ts);
                line = &rest[end + 1..];
            }
            None => break,
        }
    }
    (stamps, line)
}

fn parse_timestamp(s: &str) -> Option<u64> {
    let (minutes, rest) = s.split_once(':')?;
    let minutes: u64 = minutes.trim().parse().ok()?;

    let (seconds, fraction) = match rest.split_once(['.', ':']) {
        Some((sec, frac)) => (sec, frac),
        None => (rest, ""),
    };
    let seconds: u64 = seconds.trim().parse().ok()?;
    if seconds >= 60 {
        return None;
    }

    let fraction_ms = if fraction.is_empty() {
        0
    } else {
        if !fraction.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        // "5" -> 500ms, "05" -> 50ms, "005" -> 5ms
        let digits: String = fraction.chars().take(3).collect();
        let value: u64 = digits.parse().ok()?;
        value * 10u64.pow(3 - digits.len() as u32)
    };

    Some(minutes * 60_000 + seconds * 1000 + fraction_ms)
}

fn header_tag(line: &str) -> Option<(String, String)> {
    let inner = line.trim().strip_prefix('[')?.strip_suffix(']')?;
    let (tag, value) = inner.split_once(':')?;
    let tag = tag.trim();
    if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some((tag.to_ascii_lowercase(), value.trim().to_string()))
}
