use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use sha2::{Digest, Sha256};

use crate::query::{self, CompiledQuery, QuerySyntaxError};

/// Compiled-query memo, keyed by (grammar, query text hash).
///
/// Compilation is pure, so a (grammar, text) pair always yields the same
/// pattern list; recompiling per file would dominate batch runs. Only
/// successful compiles are cached. Syntax errors are cheap to rediscover and
/// the failing file is usually about to be edited anyway.
///
/// Thread safety: entries live in a `RwLock<HashMap>`. Rayon workers take
/// read locks on hits, a write lock only on first compile of a pair.
pub struct QueryCache {
    entries: RwLock<HashMap<(String, String), Arc<CompiledQuery>>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch the compiled form of `text` for `grammar`, compiling on miss.
    pub fn get_or_compile(
        &self,
        grammar: &str,
        text: &str,
        known_kinds: Option<&HashSet<String>>,
    ) -> Result<Arc<CompiledQuery>, QuerySyntaxError> {
        let key = (grammar.to_string(), content_hash(text));

        {
            let entries = self.entries.read().unwrap();
            if let Some(compiled) = entries.get(&key) {
                return Ok(Arc::clone(compiled));
            }
        }

        let compiled = Arc::new(query::compile(text, known_kinds)?);
        let mut entries = self.entries.write().unwrap();
        // A racing worker may have compiled the same pair; keep the first.
        Ok(Arc::clone(
            entries.entry(key).or_insert_with(|| Arc::clone(&compiled)),
        ))
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

/// SHA-256 hex digest of the query text.
fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = hasher.finalize();
    format!("{:x}", hash)
}
