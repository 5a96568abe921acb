//! Textual hybrid-query form parsing, isolated to this one module so a
//! real parser can later replace the regex without touching dispatch logic.

use once_cell::sync::Lazy;
use regex::Regex;

static SEMANTIC_TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)SEMANTIC\s+'([^']*)'").unwrap());
static HYBRID_FORM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)SEMANTIC\s+'([^']*)'\s*WHERE\s+(.+)$").unwrap());

/// Extracts the quoted semantic text from a pure `vector_search` query.
#[must_use]
pub fn extract_semantic_text(query: &str) -> Option<String> {
    SEMANTIC_TEXT.captures(query).map(|c| c[1].to_string())
}

/// Parses `SEMANTIC '<text>' WHERE <sql>`, returning `(semantic_text,
/// sql_filter)`. `None` if the query doesn't match the expected hybrid
/// form.
#[must_use]
pub fn parse_hybrid(query: &str) -> Option<(String, String)> {
    let caps = HYBRID_FORM.captures(query)?;
    Some((caps[1].to_string(), caps[2].trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_semantic_text_from_pure_vector_query() {
        assert_eq!(extract_semantic_text("SEMANTIC 'cats and dogs'"), Some("cats and dogs".to_string()));
    }

    #[test]
    fn parses_hybrid_form_into_two_parts() {
        let (text, filter) = parse_hybrid("SEMANTIC 'cats and dogs' WHERE category = 'pets'").unwrap();
        assert_eq!(text, "cats and dogs");
        assert_eq!(filter, "category = 'pets'");
    }

    #[test]
    fn non_hybrid_query_does_not_parse() {
        assert!(parse_hybrid("SELECT * FROM docs").is_none());
    }
}
