//! M3U playlist parsing.

/// A parsed playlist: display name and the listed entries as written.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlayList {
    pub name: String,
    pub files: Vec<String>,
}

/// Parse an m3u/m3u8 playlist.
///
/// `#PLAYLIST:` sets the display name; other `#` lines are ignored. When no
/// name is given, `default_name` (usually the file stem) is used.
pub fn parse(contents: &str, default_name: &str) -> PlayList {
    let mut playlist = PlayList {
        name: default_name.to_string(),
        files: Vec::new(),
    };

    for line in contents.lines() {
        let line = line.trim().trim_start_matches('\u{feff}');
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix('#') {
            if let Some(name) = rest.strip_prefix("PLAYLIST:") {
                let name = name.trim();
                if !name.is_empty() {
                    playlist.name = name.to_string();
                }
            }
            continue;
        }
        playlist.files.push(line.to_string());
    }

    playlist
}
