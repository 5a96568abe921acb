//! Query router (C10): classifies a request, then produces the parameters
//! needed to execute it against the right subsystem. Actual execution for
//! `vector_search`/`hybrid_search` composes the shard router, fan-out
//! executor, and ranker ([`mosaicdb_search`]/[`mosaicdb_executor`]/
//! [`mosaicdb_ranker`]); `analytics` dispatch is handed back to the caller
//! since the analytics bridge lives in a separate crate.

use mosaicdb_core::{MosaicError, MosaicResult};

use crate::classifier::{classify, QueryClass};
use crate::hybrid::{extract_semantic_text, parse_hybrid};

/// What to execute, and with which extracted parameters.
#[derive(Debug, Clone)]
pub enum Dispatch {
    VectorSearch { semantic_text: String },
    HybridSearch { semantic_text: String, sql_filter: String },
    SimpleSql { sql: String },
    Analytics { sql: String },
}

/// Classifies `query` (or honors `force_class` if given) and extracts the
/// parameters its class needs.
pub fn dispatch(query: &str, force_class: Option<&str>) -> MosaicResult<Dispatch> {
    let class = match force_class {
        Some(forced) => QueryClass::parse(forced).ok_or_else(|| MosaicError::classifier_bypass(forced))?,
        None => classify(query),
    };

    match class {
        QueryClass::VectorSearch => {
            let semantic_text = extract_semantic_text(query)
                .ok_or_else(|| MosaicError::invalid_input("vector_search query missing SEMANTIC '<text>' form"))?;
            Ok(Dispatch::VectorSearch { semantic_text })
        }
        QueryClass::HybridSearch => {
            let (semantic_text, sql_filter) = parse_hybrid(query)
                .ok_or_else(|| MosaicError::invalid_input("hybrid_search query missing SEMANTIC '<text>' WHERE <sql> form"))?;
            Ok(Dispatch::HybridSearch { semantic_text, sql_filter })
        }
        QueryClass::SimpleSql => Ok(Dispatch::SimpleSql { sql: query.to_string() }),
        QueryClass::Analytics => Ok(Dispatch::Analytics { sql: query.to_string() }),
    }
}
