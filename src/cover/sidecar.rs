//! Matching image files next to the audio by name.
//!
//! Configured names are file stems without extension, e.g. `cover` or
//! `disc*`. Matching ignores case; `*` matches any run of characters.

use std::path::{Path, PathBuf};

/// Stems looked for in an artist.nfo directory.
pub const ARTIST_INFO_IMAGE_NAMES: &[&str] = &["thumb", "folder", "fanart"];

/// Translate a configured name into a SQL LIKE pattern (escape char `\`).
pub fn like_pattern(name: &str) -> String {
    escape(name, true)
}

/// Escape a literal stem for LIKE, with no wildcards.
pub fn literal_pattern(stem: &str) -> String {
    escape(stem, false)
}

fn escape(name: &str, star_is_wildcard: bool) -> String {
    let mut pattern = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        match c {
            '*' if star_is_wildcard => pattern.push('%'),
            '%' | '_' | '\\' => {
                pattern.push('\\');
                pattern.push(c);
            }
            _ => pattern.push(c),
        }
    }
    pattern
}

/// Medium names may contain characters no file name can hold.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Deepest directory containing every path, compared component-wise.
pub fn longest_common_path<P: AsRef<Path>>(paths: &[P]) -> Option<PathBuf> {
    let (first, rest) = paths.split_first()?;
    let mut common: Vec<_> = first.as_ref().components().collect();

    for path in rest {
        let shared = common
            .iter()
            .zip(path.as_ref().components())
            .take_while(|(a, b)| **a == *b)
            .count();
        common.truncate(shared);
    }

    if common.is_empty() {
        return None;
    }
    Some(common.iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_like_pattern() {
        assert_eq!(like_pattern("cover"), "cover");
        assert_eq!(like_pattern("disc*"), "disc%");
        assert_eq!(like_pattern("100%_real"), "100\\%\\_real");
    }

    #[test]
    fn test_literal_pattern_has_no_wildcards() {
        assert_eq!(literal_pattern("Disc 1*"), "Disc 1*");
        assert_eq!(literal_pattern("50%"), "50\\%");
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("Live: Part 1/2 "), "Live_ Part 1_2");
        assert_eq!(sanitize_file_name("Bonus"), "Bonus");
    }

    #[test]
    fn test_longest_common_path() {
        let paths = [
            PathBuf::from("/music/Artist/Album/CD1"),
            PathBuf::from("/music/Artist/Album/CD2"),
        ];
        assert_eq!(
            longest_common_path(&paths),
            Some(PathBuf::from("/music/Artist/Album"))
        );

        let single = [PathBuf::from("/music/Artist")];
        assert_eq!(longest_common_path(&single), Some(PathBuf::from("/music/Artist")));

        let none: [PathBuf; 0] = [];
        assert_eq!(longest_common_path(&none), None);

        // Component-wise, not string prefix
        let paths = [PathBuf::from("/music/Ab"), PathBuf::from("/music/Abc")];
        assert_eq!(longest_common_path(&paths), Some(PathBuf::from("/music")));
    }

    fn segment() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9 ]{1,8}"
    }

    proptest! {
        #[test]
        fn prop_common_path_is_ancestor_of_all(
            base in prop::collection::vec(segment(), 1..4),
            tails in prop::collection::vec(prop::collection::vec(segment(), 0..3), 1..5),
        ) {
            let root: PathBuf = std::iter::once("/".to_string()).chain(base).collect();
            let paths: Vec<PathBuf> = tails
                .iter()
                .map(|tail| tail.iter().fold(root.clone(), |p, s| p.join(s)))
                .collect();

            let common = longest_common_path(&paths).unwrap();
            prop_assert!(common.starts_with(&root));
            for path in &paths {
                prop_assert!(path.starts_with(&common));
            }
        }

        #[test]
        fn prop_like_pattern_only_wildcards_from_star(name in "[a-z%_*\\\\]{0,12}") {
            let pattern = like_pattern(&name);
            let mut chars = pattern.chars();
            let mut wildcards = 0;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => { chars.next(); }
                    '%' => wildcards += 1,
                    '_' => prop_assert!(false, "unescaped _ in {}", pattern),
                    _ => {}
                }
            }
            prop_assert_eq!(wildcards, name.matches('*').count());
        }
    }
}
