//! Furniture catalog
//!
//! The catalog is fetched once per session. Every item is identified by its
//! position in the fetched list; that identifier is shared by the selection,
//! the agent's recommendation, and the image asset file name.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Stable positional identifier of a catalog item
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub usize);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Descriptive properties carried by every item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemProperties {
    #[serde(rename = "type")]
    pub kind: String,
    pub style: String,
    pub material: String,
    pub color: String,
    pub dimensions: String,
}

/// Catalog entry as served by the remote catalog endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub price: f64,
    pub properties: ItemProperties,
    pub description: String,
}

/// A catalog entry with its assigned identifier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogItem {
    pub id: ItemId,
    pub name: String,
    pub price: f64,
    pub properties: ItemProperties,
    pub description: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    #[error("catalog entry {index} ({name}) has invalid price {price}")]
    InvalidPrice {
        index: usize,
        name: String,
        price: f64,
    },
}

/// Immutable, ordered list of catalog items
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    items: Vec<CatalogItem>,
}

impl Catalog {
    /// Build the catalog from the fetched list, assigning each entry its index.
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Result<Self, CatalogError> {
        let items = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                if !entry.price.is_finite() || entry.price < 0.0 {
                    return Err(CatalogError::InvalidPrice {
                        index,
                        name: entry.name,
                        price: entry.price,
                    });
                }
                Ok(CatalogItem {
                    id: ItemId(index),
                    name: entry.name,
                    price: entry.price,
                    properties: entry.properties,
                    description: entry.description,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { items })
    }

    pub fn get(&self, id: ItemId) -> Option<&CatalogItem> {
        self.items.get(id.0)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        id.0 < self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogItem> {
        self.items.iter()
    }

    /// Items for a set of identifiers, in identifier order. Unknown
    /// identifiers are skipped.
    pub fn pick(&self, ids: &BTreeSet<ItemId>) -> Vec<&CatalogItem> {
        ids.iter().filter_map(|id| self.get(*id)).collect()
    }
}

/// Image file name for an item: `furniture_<id>.png`
pub fn asset_file_name(id: ItemId) -> String {
    format!("furniture_{}.png", id.0)
}

/// Public path of an item's image under `base` (e.g. `/furniture`)
pub fn asset_path(base: &str, id: ItemId) -> String {
    format!("{}/{}", base.trim_end_matches('/'), asset_file_name(id))
}
