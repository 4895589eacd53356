//! Kodi-style `artist.nfo` parsing.
//!
//! Only a handful of flat elements are read, so a tag scan is enough; nested
//! structures (albums, discography) are ignored.

use crate::metadata::ArtistMetadata;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArtistInfoFile {
    pub artist: ArtistMetadata,
    pub artist_type: String,
    pub gender: String,
    pub disambiguation: String,
    pub biography: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArtistInfoError {
    #[error("no <artist> root element")]
    NotArtistInfo,
    #[error("missing artist name")]
    MissingArtistName,
}

pub fn parse(contents: &str) -> Result<ArtistInfoFile, ArtistInfoError> {
    if !contents.contains("<artist") {
        return Err(ArtistInfoError::NotArtistInfo);
    }

    let name = element(contents, "name").unwrap_or_default();
    if name.is_empty() {
        return Err(ArtistInfoError::MissingArtistName);
    }

    let sort_name = element(contents, "sortname").filter(|s| !s.is_empty());
    let mbid = element(contents, "musicBrainzArtistID").filter(|s| !s.is_empty());

    Ok(ArtistInfoFile {
        artist: ArtistMetadata {
            mbid,
            name,
            sort_name,
        },
        artist_type: element(contents, "type").unwrap_or_default(),
        gender: element(contents, "gender").unwrap_or_default(),
        disambiguation: element(contents, "disambiguation").unwrap_or_default(),
        biography: element(contents, "biography").unwrap_or_default(),
    })
}

/// Text of the first `<tag>...</tag>`, trimmed and unescaped.
fn element(contents: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = contents.find(&open)? + open.len();
    let len = contents[start..].find(&close)?;
    Some(unescape(contents[start..start + len].trim()))
}

fn unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
