// Protocol messages exchanged between Guess Who participants.
//
// A single `Message` enum covers both directions of the star topology: the
// host sends setup and scheduling kinds (`Seed`, `AssignId`, `StartGame`,
// `NextTurn`, `LobbyClosed`, `PlayerJoined`, `PlayerLeft`), joiners send
// `Ready` and `TurnPass` to the host, and the gameplay kinds (`Question`,
// `Answer`, `Guess`, `CorrectGuess`, `Lose`, `Chat`) are relayed by the host
// to everyone except their originator.
//
// Wire shape: internally tagged JSON, `{"type":"NEXT_TURN","playerIndex":3}`.
// Kind names follow the browser client, and its legacy inputs decode: a
// guess may name its card `pokemon` and may omit `from` and `target`
// (both decode as `PlayerIndex::UNSET`). Encoding always writes `card` and
// the category fields the browser client lacks, so this is not a wire
// match for it. Kinds this build does not know decode to
// `Message::Unknown` instead of failing.
//
// Relayed kinds carry `from`. A joiner fills in its own index; the host
// overwrites it with the index bound to the link the message arrived on
// (`stamp_sender`) before relaying, so a joiner cannot speak for someone else.

use serde::{Deserialize, Serialize};

use crate::types::{CardId, PlayerIndex, QuestionCategory, Response};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Message {
    /// Host shares the board seed.
    Seed { value: u32 },
    /// Host tells one joiner which seat it occupies, plus the roster so far.
    AssignId {
        id: PlayerIndex,
        #[serde(default)]
        players: Vec<PlayerIndex>,
    },
    /// Sender has committed a secret card.
    Ready,
    /// Everyone is ready; the game is on.
    StartGame,
    /// Host announces whose turn it is.
    NextTurn { player_index: PlayerIndex },
    /// Yes/no question from the turn holder.
    Question {
        #[serde(default = "unknown_sender")]
        from: PlayerIndex,
        text: String,
        category: QuestionCategory,
        value: String,
    },
    /// Reply to the outstanding question.
    Answer {
        #[serde(default = "unknown_sender")]
        from: PlayerIndex,
        response: Response,
        #[serde(default)]
        original_question: String,
        category: QuestionCategory,
        value: String,
    },
    /// Turn holder asks the host to advance the scheduler.
    TurnPass,
    /// Turn holder names a card against `target`'s secret.
    Guess {
        #[serde(default = "unknown_sender")]
        from: PlayerIndex,
        #[serde(default = "unknown_sender")]
        target: PlayerIndex,
        #[serde(alias = "pokemon")]
        card: CardId,
    },
    /// The guess against `from` was right; the game ends.
    CorrectGuess {
        #[serde(default = "unknown_sender")]
        from: PlayerIndex,
        #[serde(default = "unknown_sender")]
        guesser: PlayerIndex,
    },
    /// The guess against `from` was wrong.
    Lose {
        #[serde(default = "unknown_sender")]
        from: PlayerIndex,
        #[serde(default = "unknown_sender")]
        guesser: PlayerIndex,
        #[serde(alias = "pokemon")]
        card: CardId,
    },
    /// Free-form chat line. No state effect.
    Chat {
        #[serde(default = "unknown_sender")]
        from: PlayerIndex,
        message: String,
    },
    /// Host stopped accepting joins; selection begins.
    LobbyClosed,
    /// A joiner took a seat.
    PlayerJoined { player_index: PlayerIndex },
    /// A participant's channel closed.
    PlayerLeft { player_index: PlayerIndex },
    /// Any kind this build does not recognise.
    #[serde(other)]
    Unknown,
}

fn unknown_sender() -> PlayerIndex {
    PlayerIndex::UNSET
}

impl Message {
    /// Wire kind name, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Seed { .. } => "SEED",
            Message::AssignId { .. } => "ASSIGN_ID",
            Message::Ready => "READY",
            Message::StartGame => "START_GAME",
            Message::NextTurn { .. } => "NEXT_TURN",
            Message::Question { .. } => "QUESTION",
            Message::Answer { .. } => "ANSWER",
            Message::TurnPass => "TURN_PASS",
            Message::Guess { .. } => "GUESS",
            Message::CorrectGuess { .. } => "CORRECT_GUESS",
            Message::Lose { .. } => "LOSE",
            Message::Chat { .. } => "CHAT",
            Message::LobbyClosed => "LOBBY_CLOSED",
            Message::PlayerJoined { .. } => "PLAYER_JOINED",
            Message::PlayerLeft { .. } => "PLAYER_LEFT",
            Message::Unknown => "UNKNOWN",
        }
    }

    /// Kinds the host re-broadcasts to every other participant after
    /// handling them itself.
    pub fn is_relayed(&self) -> bool {
        matches!(
            self,
            Message::Chat { .. }
                | Message::Question { .. }
                | Message::Answer { .. }
                | Message::Guess { .. }
                | Message::CorrectGuess { .. }
                | Message::Lose { .. }
        )
    }

    /// Kinds only the host may originate.
    pub fn is_host_only(&self) -> bool {
        matches!(
            self,
            Message::Seed { .. }
                | Message::AssignId { .. }
                | Message::StartGame
                | Message::NextTurn { .. }
                | Message::LobbyClosed
                | Message::PlayerJoined { .. }
                | Message::PlayerLeft { .. }
        )
    }

    /// Originator recorded in a relayed message, if the kind carries one.
    pub fn sender(&self) -> Option<PlayerIndex> {
        match self {
            Message::Question { from, .. }
            | Message::Answer { from, .. }
            | Message::Guess { from, .. }
            | Message::CorrectGuess { from, .. }
            | Message::Lose { from, .. }
            | Message::Chat { from, .. } => Some(*from),
            _ => None,
        }
    }

    /// Overwrite the originator of a relayed kind. No-op for other kinds.
    pub fn stamp_sender(&mut self, sender: PlayerIndex) {
        match self {
            Message::Question { from, .. }
            | Message::Answer { from, .. }
            | Message::Guess { from, .. }
            | Message::CorrectGuess { from, .. }
            | Message::Lose { from, .. }
            | Message::Chat { from, .. } => *from = sender,
            _ => {}
        }
    }
}
