//! Query classifier (C9): regex-based, case-insensitive, priority-ordered.

use once_cell::sync::Lazy;
use regex::Regex;

/// The dispatch class a raw query string is sorted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryClass {
    VectorSearch,
    HybridSearch,
    Analytics,
    SimpleSql,
}

impl QueryClass {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VectorSearch => "vector_search",
            Self::HybridSearch => "hybrid_search",
            Self::Analytics => "analytics",
            Self::SimpleSql => "simple_sql",
        }
    }

    /// Parses a forced-class override string. `None` for an unrecognized
    /// value, matching the collaborator contract that an invalid
    /// `force_class` rejects with `ClassifierBypass`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "vector_search" => Some(Self::VectorSearch),
            "hybrid_search" => Some(Self::HybridSearch),
            "analytics" => Some(Self::Analytics),
            "simple_sql" => Some(Self::SimpleSql),
            _ => None,
        }
    }
}

static SEMANTIC_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(SEMANTIC|VECTOR_SEARCH|SIMILAR\s+TO|vec_distance)").unwrap());
static WHERE_CLAUSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bWHERE\b").unwrap());
static ANALYTICS_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(GROUP\s+BY|HAVING|WINDOW|OVER\s*\(|WITH\s+\w+\s+AS\s*\(|JOIN|UNION|INTERSECT|EXCEPT)").unwrap()
});
static AGGREGATE_FN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(COUNT|SUM|MIN|MAX|AVG)\s*\(").unwrap());

/// Classifies `query` by priority: `vector_search` > `hybrid_search` >
/// `analytics` > `simple_sql`.
#[must_use]
pub fn classify(query: &str) -> QueryClass {
    let has_semantic = SEMANTIC_MARKER.is_match(query);
    let has_where = WHERE_CLAUSE.is_match(query);

    if has_semantic && !has_where {
        return QueryClass::VectorSearch;
    }
    if has_semantic && has_where {
        return QueryClass::HybridSearch;
    }

    let aggregate_count = AGGREGATE_FN.find_iter(query).count();
    if ANALYTICS_MARKER.is_match(query) || aggregate_count > 1 {
        return QueryClass::Analytics;
    }

    QueryClass::SimpleSql
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semantic_without_where_is_vector_search() {
        assert_eq!(classify("SEMANTIC 'cats and dogs'"), QueryClass::VectorSearch);
    }

    #[test]
    fn semantic_with_where_is_hybrid_search() {
        assert_eq!(
            classify("SEMANTIC 'cats and dogs' WHERE category = 'pets'"),
            QueryClass::HybridSearch
        );
    }

    #[test]
    fn group_by_is_analytics() {
        assert_eq!(classify("SELECT category, COUNT(*) FROM docs GROUP BY category"), QueryClass::Analytics);
    }

    #[test]
    fn multiple_aggregates_without_group_by_is_analytics() {
        assert_eq!(classify("SELECT COUNT(*), SUM(pagerank) FROM docs"), QueryClass::Analytics);
    }

    #[test]
    fn single_aggregate_is_simple_sql() {
        assert_eq!(classify("SELECT COUNT(*) FROM docs"), QueryClass::SimpleSql);
    }

    #[test]
    fn plain_select_is_simple_sql() {
        assert_eq!(classify("SELECT * FROM docs WHERE id = 'x'"), QueryClass::SimpleSql);
    }

    #[test]
    fn classification_is_case_insensitive() {
        assert_eq!(classify("semantic 'x' where y = 1"), QueryClass::HybridSearch);
    }

    #[test]
    fn force_class_parses_known_values() {
        assert_eq!(QueryClass::parse("analytics"), Some(QueryClass::Analytics));
        assert_eq!(QueryClass::parse("bogus"), None);
    }
}
