// Per-participant elimination board (the deduction filter).
//
// Each participant owns one `DeductionBoard` seeded with the shared 30-card
// candidate set. Cards only ever go from live to eliminated: answered
// questions eliminate by predicate (`apply`), the player flips cards by hand
// (`eliminate`), and both write the same flag. Nothing here is shared or
// synchronized with other participants.
//
// Predicate matching is three-valued. A card whose relevant attribute is
// unknown (catalog lookup failed, or the entry lacks a color/stage) neither
// matches nor mismatches and is left alone, so a degraded catalog can only
// make the filter less effective, never wrong.

use guess_who_protocol::{CardId, QuestionCategory};

use crate::catalog::{CachedCatalog, CardDetails};

/// Whether `details` satisfies `category == value`. `None` when unknown.
pub fn card_matches(details: &CardDetails, category: QuestionCategory, value: &str) -> Option<bool> {
    let wanted = value.trim().to_lowercase();
    match category {
        QuestionCategory::Type => {
            if details.types.is_empty() {
                None
            } else {
                Some(details.types.contains(&wanted))
            }
        }
        QuestionCategory::Color => details.color.as_ref().map(|c| *c == wanted),
        QuestionCategory::Stage => details.stage.as_ref().map(|s| *s == wanted),
    }
}

#[derive(Clone, Debug)]
struct BoardEntry {
    card: CardId,
    eliminated: bool,
}

/// A participant's private view of which candidates are still possible.
#[derive(Clone, Debug, Default)]
pub struct DeductionBoard {
    entries: Vec<BoardEntry>,
}

impl DeductionBoard {
    pub fn new(candidates: &[CardId]) -> Self {
        Self {
            entries: candidates
                .iter()
                .map(|card| BoardEntry {
                    card: card.clone(),
                    eliminated: false,
                })
                .collect(),
        }
    }

    /// Apply an answered question. An affirmative answer eliminates every
    /// live card that does not match; a negative one eliminates every live
    /// card that does. Returns the cards eliminated by this call.
    pub fn apply(
        &mut self,
        catalog: &mut CachedCatalog,
        category: QuestionCategory,
        value: &str,
        affirmative: bool,
    ) -> Vec<CardId> {
        let mut newly = Vec::new();
        for entry in self.entries.iter_mut().filter(|e| !e.eliminated) {
            let Some(matches) = card_matches(catalog.details(&entry.card), category, value) else {
                continue;
            };
            if matches != affirmative {
                entry.eliminated = true;
                newly.push(entry.card.clone());
            }
        }
        newly
    }

    /// Flip a card down by hand. Returns false if the card is not on the
    /// board. Flipping an already eliminated card is a no-op.
    pub fn eliminate(&mut self, card: &CardId) -> bool {
        match self.entries.iter_mut().find(|e| e.card.matches(card)) {
            Some(entry) => {
                entry.eliminated = true;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, card: &CardId) -> bool {
        self.entries.iter().any(|e| e.card.matches(card))
    }

    pub fn is_eliminated(&self, card: &CardId) -> bool {
        self.entries
            .iter()
            .any(|e| e.card.matches(card) && e.eliminated)
    }

    /// Live cards in board order.
    pub fn remaining(&self) -> Vec<CardId> {
        self.entries
            .iter()
            .filter(|e| !e.eliminated)
            .map(|e| e.card.clone())
            .collect()
    }

    pub fn remaining_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.eliminated).count()
    }

    /// Every card with its elimination flag, in board order.
    pub fn cards(&self) -> impl Iterator<Item = (&CardId, bool)> {
        self.entries.iter().map(|e| (&e.card, e.eliminated))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
