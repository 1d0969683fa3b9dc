//! Name-indexed table of rank definitions.

use std::collections::HashMap;
use std::sync::Arc;

use crate::rank::Rank;

/// Immutable lookup of ranks by name.
///
/// Built once at startup and passed by reference to the code that resolves
/// stored rank names.
#[derive(Debug, Clone, Default)]
pub struct RankRegistry {
    ranks: HashMap<String, Arc<dyn Rank>>,
}

impl RankRegistry {
    /// Index `ranks` by name. A later rank replaces an earlier one with the
    /// same name.
    pub fn new(ranks: impl IntoIterator<Item = Arc<dyn Rank>>) -> Self {
        let ranks = ranks
            .into_iter()
            .map(|rank| (rank.name().to_owned(), rank))
            .collect();
        Self { ranks }
    }

    /// Look up a rank by name.
    #[must_use]
    pub fn rank(&self, name: &str) -> Option<Arc<dyn Rank>> {
        self.ranks.get(name).cloned()
    }

    /// Number of registered ranks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    /// Whether no ranks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}
