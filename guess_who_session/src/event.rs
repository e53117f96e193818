// Notifications from the session to the view layer.
//
// The session never renders anything. Every state change a front end might
// want to show is queued as a `SessionEvent` and drained with
// `Session::drain_events()`; the node forwards them through
// `NodeHandle::poll()`.

use guess_who_protocol::{CardId, PlayerIndex, QuestionCategory};

#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// A joiner's link to the host opened.
    Connected,
    /// The advisory connect timeout elapsed. The attempt keeps going.
    ConnectionSlow,
    /// The host assigned the local seat.
    Assigned { index: PlayerIndex },
    /// The shared candidate set is known; selection may begin.
    CandidatesReady { seed: u32, cards: Vec<CardId> },
    PlayerJoined { index: PlayerIndex },
    PlayerLeft { index: PlayerIndex },
    PlayerReady { index: PlayerIndex },
    LobbyClosed,
    GameStarted,
    TurnChanged {
        current: PlayerIndex,
        is_my_turn: bool,
    },
    QuestionAsked {
        from: PlayerIndex,
        text: String,
        category: QuestionCategory,
        value: String,
    },
    /// An answer was observed and applied to the local board.
    Answered {
        from: PlayerIndex,
        affirmative: bool,
        question: String,
        eliminated: Vec<CardId>,
    },
    GuessMade {
        from: PlayerIndex,
        target: PlayerIndex,
        card: CardId,
    },
    GuessFailed {
        guesser: PlayerIndex,
        target: PlayerIndex,
        card: CardId,
    },
    /// A correct guess ended the game. `won` is from the local player's view.
    GameOver {
        winner: PlayerIndex,
        loser: PlayerIndex,
        won: bool,
    },
    Chat { from: PlayerIndex, message: String },
    /// The session is over for this participant.
    SessionEnded { reason: String },
    /// A local command was refused.
    ActionRejected { reason: String },
}
