// Core value types for the Guess Who protocol.
//
// `PlayerIndex` is the host-assigned seat number (1 = host, 2..N = joiners in
// connection order). `CardId` names a catalog entry. `QuestionCategory` and
// `Response` carry the yes/no question vocabulary. All serialize to the plain
// JSON shapes the browser client used (numbers, strings, "YES"/"NO").

use std::fmt;

use serde::{Deserialize, Serialize};

/// Host-assigned seat number. Never self-assigned by a joiner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerIndex(pub u32);

impl PlayerIndex {
    /// The host always sits in seat 1.
    pub const HOST: PlayerIndex = PlayerIndex(1);

    /// Seat 0 is never assigned. Decoders use it for a `from` or `target`
    /// the sender left out.
    pub const UNSET: PlayerIndex = PlayerIndex(0);

    pub fn is_unset(self) -> bool {
        self == Self::UNSET
    }
}

impl fmt::Display for PlayerIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Catalog entry name, e.g. `"pikachu"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(pub String);

impl CardId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison used when evaluating guesses.
    pub fn matches(&self, other: &CardId) -> bool {
        self.0.to_lowercase() == other.0.to_lowercase()
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CardId {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

/// Attribute family a question asks about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionCategory {
    Type,
    Color,
    Stage,
}

const TYPE_VALUES: &[&str] = &[
    "Normal", "Fire", "Water", "Grass", "Electric", "Ice", "Fighting", "Poison", "Ground",
    "Flying", "Psychic", "Bug", "Rock", "Ghost", "Dragon", "Steel", "Dark", "Fairy",
];

const COLOR_VALUES: &[&str] = &[
    "Red", "Blue", "Yellow", "Green", "Black", "Brown", "Purple", "Gray", "White", "Pink",
];

const STAGE_VALUES: &[&str] = &["Basic", "Stage 1", "Stage 2"];

impl QuestionCategory {
    pub const ALL: [QuestionCategory; 3] = [
        QuestionCategory::Type,
        QuestionCategory::Color,
        QuestionCategory::Stage,
    ];

    /// Values a player may ask about in this category.
    pub fn values(self) -> &'static [&'static str] {
        match self {
            QuestionCategory::Type => TYPE_VALUES,
            QuestionCategory::Color => COLOR_VALUES,
            QuestionCategory::Stage => STAGE_VALUES,
        }
    }

    /// Canonical spelling of `value` if it belongs to this category.
    pub fn canonical_value(self, value: &str) -> Option<&'static str> {
        self.values()
            .iter()
            .copied()
            .find(|v| v.eq_ignore_ascii_case(value.trim()))
    }

    /// Word used when rendering the question text.
    pub fn label(self) -> &'static str {
        match self {
            QuestionCategory::Type => "Type",
            QuestionCategory::Color => "Color",
            QuestionCategory::Stage => "Evolution",
        }
    }

    /// Render the question shown to the answerer: `Is it Fire Type?`.
    pub fn question_text(self, value: &str) -> String {
        format!("Is it {value} {}?", self.label())
    }

    /// Parse the lowercase wire name (`"type"`, `"color"`, `"stage"`).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "type" => Some(QuestionCategory::Type),
            "color" | "colour" => Some(QuestionCategory::Color),
            "stage" | "evolution" => Some(QuestionCategory::Stage),
            _ => None,
        }
    }
}

impl fmt::Display for QuestionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QuestionCategory::Type => "type",
            QuestionCategory::Color => "color",
            QuestionCategory::Stage => "stage",
        };
        f.write_str(name)
    }
}

/// Yes/no answer to a question.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    #[serde(rename = "YES", alias = "SÍ", alias = "SI")]
    Yes,
    #[serde(rename = "NO")]
    No,
}

impl Response {
    pub fn from_affirmative(affirmative: bool) -> Self {
        if affirmative { Response::Yes } else { Response::No }
    }

    pub fn is_affirmative(self) -> bool {
        self == Response::Yes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_ids_match_case_insensitively() {
        assert!(CardId::from("Pikachu").matches(&CardId::from("pikachu")));
        assert!(CardId::from("MR-MIME").matches(&CardId::from("mr-mime")));
        assert!(!CardId::from("pikachu").matches(&CardId::from("raichu")));
    }

    #[test]
    fn canonical_value_is_case_insensitive() {
        assert_eq!(QuestionCategory::Type.canonical_value("fire"), Some("Fire"));
        assert_eq!(QuestionCategory::Stage.canonical_value("stage 1"), Some("Stage 1"));
        assert_eq!(QuestionCategory::Color.canonical_value("Fire"), None);
    }

    #[test]
    fn question_text_uses_evolution_label_for_stage() {
        assert_eq!(QuestionCategory::Type.question_text("Fire"), "Is it Fire Type?");
        assert_eq!(
            QuestionCategory::Stage.question_text("Basic"),
            "Is it Basic Evolution?"
        );
    }

    #[test]
    fn player_index_is_a_bare_number_on_the_wire() {
        assert_eq!(serde_json::to_string(&PlayerIndex(3)).unwrap(), "3");
        assert_eq!(serde_json::to_string(&CardId::from("eevee")).unwrap(), "\"eevee\"");
    }

    #[test]
    fn spanish_yes_is_accepted() {
        let r: Response = serde_json::from_str("\"SÍ\"").unwrap();
        assert!(r.is_affirmative());
        assert_eq!(serde_json::to_string(&Response::No).unwrap(), "\"NO\"");
    }
}
