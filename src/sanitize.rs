/// Character written in place of anything outside `[a-z0-9]`.
pub const FILLER: char = '0';

/// Maps `s` onto `[a-z0-9]`, one output char per input char.
///
/// ASCII letters are lowercased; every other char (including non-ASCII
/// letters, whitespace and `-`) becomes [`FILLER`]. The output has exactly
/// as many chars as the input.
pub fn sanitize(s: &str) -> String {
    s.chars()
        .map(|ch| {
            let ch = ch.to_ascii_lowercase();
            if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
                ch
            } else {
                FILLER
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_ascii() {
        assert_eq!(sanitize("TestApplication"), "testapplication");
    }

    #[test]
    fn replaces_punctuation_and_whitespace() {
        assert_eq!(sanitize("a-b_c d.e"), "a0b0c0d0e");
        assert_eq!(sanitize("   "), "000");
    }

    #[test]
    fn non_ascii_counts_as_one_char() {
        assert_eq!(sanitize("fəˈnɛtık əsoʊsiˈeıʃn"), "f00n0t0k00so0si0e00n");
        assert_eq!(sanitize("ði ıntəˈnæʃənəl "), "0i00nt00n000n0l0");
    }

    #[test]
    fn empty_stays_empty() {
        assert_eq!(sanitize(""), "");
    }
}
