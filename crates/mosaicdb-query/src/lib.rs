//! Query classification, dispatch, the federated simple-SQL path, and the
//! result cache (C9/C10/C13).

pub mod cache;
pub mod classifier;
pub mod dispatcher;
pub mod hybrid;
pub mod simple_sql;

pub use cache::{fingerprint, CacheKeyInput, ResultCache, DEFAULT_MAX_ENTRIES, DEFAULT_TTL};
pub use classifier::{classify, QueryClass};
pub use dispatcher::{dispatch, Dispatch};
pub use hybrid::{extract_semantic_text, parse_hybrid};
pub use simple_sql::execute_federated_simple;
