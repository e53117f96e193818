// Card catalog collaborator.
//
// The catalog supplies the universe of selectable cards (in a stable order,
// which feeds the seeded shuffle) and each card's attribute tags: a type set,
// a color, and an evolution stage. The session only consumes it through the
// `CardCatalog` trait.
//
// `StaticCatalog` is the in-process implementation: built from entries,
// loaded from a JSON file, or taken from the bundled 150-card Kanto list in
// `data/kanto.json`. `CachedCatalog` wraps any `CardCatalog` with a
// memoizing lookup table keyed by card name. Each card is fetched at most
// once; a failed fetch is logged and cached as empty attributes so the
// deduction filter degrades instead of the session failing.
//
// See also: `deduction.rs`, which is the only consumer of card details.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use guess_who_protocol::CardId;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::CatalogError;

const BUNDLED_KANTO: &str = include_str!("../data/kanto.json");

/// Attribute tags for one card. Empty/absent means unknown.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDetails {
    #[serde(default)]
    pub types: BTreeSet<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub stage: Option<String>,
}

impl CardDetails {
    /// Lowercase every tag so matching can compare directly.
    fn normalized(self) -> Self {
        Self {
            types: self.types.iter().map(|t| t.trim().to_lowercase()).collect(),
            color: self.color.map(|c| c.trim().to_lowercase()),
            stage: self.stage.map(|s| s.trim().to_lowercase()),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.types.is_empty() && self.color.is_none() && self.stage.is_none()
    }
}

/// Lookup capability the session consumes.
pub trait CardCatalog {
    /// Every selectable card, in catalog order.
    fn card_names(&self) -> Vec<CardId>;

    /// Attribute tags for one card. May fail.
    fn details(&self, card: &CardId) -> Result<CardDetails, CatalogError>;
}

/// One row of a catalog file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: CardId,
    #[serde(flatten)]
    pub details: CardDetails,
}

/// In-memory catalog preserving entry order.
#[derive(Clone, Debug, Default)]
pub struct StaticCatalog {
    entries: Vec<CatalogEntry>,
    by_name: HashMap<String, usize>,
}

impl StaticCatalog {
    /// Build from entries. Later duplicates of a name are dropped.
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        let mut by_name = HashMap::with_capacity(entries.len());
        let mut kept = Vec::with_capacity(entries.len());
        for entry in entries {
            let key = entry.name.as_str().to_lowercase();
            if by_name.contains_key(&key) {
                continue;
            }
            by_name.insert(key, kept.len());
            kept.push(entry);
        }
        Self {
            entries: kept,
            by_name,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let entries: Vec<CatalogEntry> = serde_json::from_str(json)?;
        Ok(Self::new(entries))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// The 150 Kanto cards in national-dex order.
    pub fn bundled() -> Self {
        // The bundled file is checked by `bundled_catalog_is_complete`.
        Self::from_json(BUNDLED_KANTO).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CardCatalog for StaticCatalog {
    fn card_names(&self) -> Vec<CardId> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    fn details(&self, card: &CardId) -> Result<CardDetails, CatalogError> {
        self.by_name
            .get(&card.as_str().to_lowercase())
            .map(|&i| self.entries[i].details.clone())
            .ok_or_else(|| CatalogError::UnknownCard(card.clone()))
    }
}

/// Memoizing front for a `CardCatalog`.
pub struct CachedCatalog {
    inner: Box<dyn CardCatalog + Send>,
    cache: HashMap<CardId, CardDetails>,
    fetches: usize,
}

impl CachedCatalog {
    pub fn new(inner: impl CardCatalog + Send + 'static) -> Self {
        Self {
            inner: Box::new(inner),
            cache: HashMap::new(),
            fetches: 0,
        }
    }

    pub fn card_names(&self) -> Vec<CardId> {
        self.inner.card_names()
    }

    /// Normalized details for `card`, fetched from the inner catalog on the
    /// first request only. Lookup failures yield (and cache) empty details.
    pub fn details(&mut self, card: &CardId) -> &CardDetails {
        if !self.cache.contains_key(card) {
            self.fetches += 1;
            let details = match self.inner.details(card) {
                Ok(details) => details.normalized(),
                Err(e) => {
                    warn!(
                        card = %card,
                        error = %e,
                        "catalog lookup failed; treating attributes as unknown"
                    );
                    CardDetails::default()
                }
            };
            self.cache.insert(card.clone(), details);
        }
        &self.cache[card]
    }

    /// Number of lookups forwarded to the inner catalog.
    pub fn fetch_count(&self) -> usize {
        self.fetches
    }
}
