//! Derived views over a block collection: search, tag filter, hidden-only, sort.
//! Nothing here is persisted.

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use crate::models::block::{Block, Visibility};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Most recently updated first.
    #[default]
    Newest,
    /// Least recently created first.
    Oldest,
    /// Title, case-insensitive.
    Title,
}

/// Filter criteria; an empty query matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockQuery {
    /// Case-insensitive substring of the title.
    #[serde(default)]
    pub search: String,
    /// Every tag listed must be present on the block.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Only blocks whose visibility is `hide`.
    #[serde(default)]
    pub hidden_only: bool,
}

impl BlockQuery {
    pub fn matches(&self, block: &Block) -> bool {
        let needle = self.search.to_lowercase();
        let matches_search = block.title.to_lowercase().contains(&needle);
        let matches_tags = self.tags.iter().all(|tag| block.tags.contains(tag));
        let matches_visibility = !self.hidden_only || block.visibility == Visibility::Hide;
        matches_search && matches_tags && matches_visibility
    }

    /// The matching blocks, ordered by `order`.
    pub fn apply<'a>(&self, blocks: &'a [Block], order: SortOrder) -> Vec<&'a Block> {
        let mut view: Vec<&Block> = blocks.iter().filter(|b| self.matches(b)).collect();
        match order {
            SortOrder::Newest => view.sort_by_key(|b| Reverse(b.updated_at.instant())),
            SortOrder::Oldest => view.sort_by_key(|b| b.created_at.instant()),
            SortOrder::Title => view.sort_by_cached_key(|b| b.title.to_lowercase()),
        }
        view
    }
}
