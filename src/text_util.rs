/// Number of trailing path segments folded into a record's searchable text.
pub const PATH_CONTEXT_SEGMENTS: usize = 4;

/// Subtype from a raw extension cell such as `.XLSX ` or `csv`.
pub fn extension_subtype(raw: &str) -> String {
    raw.trim().replace('.', "")
}

/// Break a file stem into lower-cased alphanumeric words.
///
/// `Dugong_IR_Rev01` becomes `dugong ir rev01`.
pub fn filename_tokens(stem: &str) -> String {
    stem.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// The last `n` segments of `path` that carry meaning: non-empty, not
/// hidden (leading `.`) and not a drive or scheme prefix (containing `:`).
/// Both `/` and `\` separate segments.
pub fn meaningful_path_segments(path: &str, n: usize) -> Vec<&str> {
    let meaningful: Vec<&str> = path
        .split(['/', '\\'])
        .filter(|p| !p.is_empty() && !p.starts_with('.') && !p.contains(':'))
        .collect();
    let start = meaningful.len().saturating_sub(n);
    meaningful[start..].to_vec()
}

/// Key used to join records that describe the same file: forward slashes
/// only and no trailing separator.
pub fn path_key(path: &str) -> String {
    path.trim().replace('\\', "/").trim_end_matches('/').to_string()
}

/// Individual terms of a comma-joined category value.
pub fn split_terms(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_subtype_drops_dots() {
        assert_eq!(extension_subtype(" .xlsx "), "xlsx");
        assert_eq!(extension_subtype(""), "");
    }

    #[test]
    fn filename_tokens_split_on_punctuation() {
        assert_eq!(filename_tokens("Dugong_IR_Rev01"), "dugong ir rev01");
        assert_eq!(filename_tokens("turtle-nesting 2023"), "turtle nesting 2023");
        assert_eq!(filename_tokens("__"), "");
    }

    #[test]
    fn path_segments_skip_prefixes_and_hidden() {
        let segs = meaningful_path_segments(
            r"E:\NEOM\.cache\Marine\Dugong\2023\sightings.csv",
            PATH_CONTEXT_SEGMENTS,
        );
        assert_eq!(segs, vec!["Marine", "Dugong", "2023", "sightings.csv"]);
    }

    #[test]
    fn path_segments_shorter_than_n() {
        assert_eq!(meaningful_path_segments("/data/a.csv", 4), vec!["data", "a.csv"]);
        assert!(meaningful_path_segments("C:", 4).is_empty());
    }

    #[test]
    fn path_key_normalises_separators() {
        assert_eq!(path_key(r"E:\surveys\layer.gdb\"), "E:/surveys/layer.gdb");
        assert_eq!(path_key("/srv/a.csv"), "/srv/a.csv");
    }

    #[test]
    fn split_terms_drops_blanks() {
        let terms: Vec<_> = split_terms("dugong, whale ,, ").collect();
        assert_eq!(terms, vec!["dugong", "whale"]);
    }
}
