//! Selection reconciler
//!
//! Merges the agent's recommended items with the user's toggles. The
//! recommendation is recorded once per session and never changes; toggles
//! only touch the working selection.

use crate::catalog::{Catalog, ItemId};
use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("item {0} is not in the catalog")]
    UnknownItem(ItemId),
    #[error("a recommendation was already recorded for this session")]
    AlreadyRecommended,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    recommended: Option<BTreeSet<ItemId>>,
    chosen: BTreeSet<ItemId>,
}

impl Selection {
    /// Record the agent's recommendation as both the baseline and the
    /// initial working selection. Both are sets in catalog order, so the
    /// agent's ordering and duplicates are not kept. Identifiers outside
    /// the catalog are dropped; returns how many were dropped.
    pub fn recommend(
        &mut self,
        items: impl IntoIterator<Item = ItemId>,
        catalog: &Catalog,
    ) -> Result<usize, SelectionError> {
        if self.recommended.is_some() {
            return Err(SelectionError::AlreadyRecommended);
        }

        let mut dropped = 0;
        let accepted: BTreeSet<ItemId> = items
            .into_iter()
            .filter(|id| {
                let known = catalog.contains(*id);
                if !known {
                    dropped += 1;
                }
                known
            })
            .collect();

        self.chosen.clone_from(&accepted);
        self.recommended = Some(accepted);
        Ok(dropped)
    }

    /// Flip membership of one item in the working selection. Returns whether
    /// the item is selected afterwards.
    pub fn toggle(&mut self, id: ItemId, catalog: &Catalog) -> Result<bool, SelectionError> {
        if !catalog.contains(id) {
            return Err(SelectionError::UnknownItem(id));
        }
        if self.chosen.remove(&id) {
            Ok(false)
        } else {
            self.chosen.insert(id);
            Ok(true)
        }
    }

    pub fn chosen(&self) -> &BTreeSet<ItemId> {
        &self.chosen
    }

    pub fn recommended(&self) -> Option<&BTreeSet<ItemId>> {
        self.recommended.as_ref()
    }

    pub fn is_selected(&self, id: ItemId) -> bool {
        self.chosen.contains(&id)
    }

    pub fn was_recommended(&self, id: ItemId) -> bool {
        self.recommended.as_ref().is_some_and(|r| r.contains(&id))
    }

    pub fn len(&self) -> usize {
        self.chosen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chosen.is_empty()
    }
}
