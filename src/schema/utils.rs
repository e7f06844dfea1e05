// Utility functions for the schema module
//
// Path handling shared by `Schema`, the generator and `Node`.

/// Parent path segment
pub const PARENT: &str = "..";

/// Splits a path into its non-empty segments, keeping `..` segments.
pub fn path_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty() && *s != ".").collect()
}

/// Parses a list position used as a path segment (`"3"`)
pub fn parse_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_segments_skips_empty() {
        assert_eq!(path_segments("/a//b/./c/"), vec!["a", "b", "c"]);
        assert!(path_segments("").is_empty());
    }

    #[test]
    fn test_parse_index() {
        assert_eq!(parse_index("0"), Some(0));
        assert_eq!(parse_index("42"), Some(42));
        assert_eq!(parse_index("-1"), None);
        assert_eq!(parse_index("a1"), None);
        assert_eq!(parse_index(""), None);
    }
}
