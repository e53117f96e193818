// Error types for the session crate.
//
// `SessionError` covers both rejected local actions (returned to the caller)
// and rejected inbound messages (logged by the router and dropped). The
// catalog and link errors are recovered locally: a failed lookup degrades to
// unknown attributes, a failed send is a dropped message.

use guess_who_protocol::{CardId, FrameError, PlayerIndex, QuestionCategory};
use thiserror::Error;

use crate::link::LinkId;
use crate::session::SessionPhase;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("not allowed during {actual:?}")]
    WrongPhase { actual: SessionPhase },

    #[error("{player} does not hold the turn")]
    NotYourTurn { player: PlayerIndex },

    #[error("a question or guess is still pending")]
    ChallengePending,

    #[error("there is no pending question to answer")]
    NoPendingQuestion,

    #[error("there is no pending guess to resolve")]
    NoPendingGuess,

    #[error("{player} cannot answer their own question")]
    OwnQuestion { player: PlayerIndex },

    #[error("a player cannot guess against themselves")]
    SelfTarget,

    #[error("more than one opponent; name a target")]
    AmbiguousTarget,

    #[error("unknown player {0}")]
    UnknownPlayer(PlayerIndex),

    #[error("{0} is not on the board")]
    UnknownCard(CardId),

    #[error("{value:?} is not a valid {category} question")]
    InvalidQuestion {
        category: QuestionCategory,
        value: String,
    },

    #[error("a secret card is already committed")]
    AlreadyCommitted,

    #[error("only the host can do that")]
    NotHost,

    #[error("{kind} may only be sent by the host")]
    HostOnly { kind: &'static str },

    #[error("{kind} is not expected by this participant")]
    Unexpected { kind: &'static str },

    #[error("no other players are connected")]
    NoOpponents,

    #[error("no seat has been assigned yet")]
    NotAssigned,

    #[error("unknown link {0}")]
    UnknownLink(LinkId),

    #[error("session is full")]
    SessionFull,

    #[error("the lobby is closed")]
    LobbyClosed,

    #[error("inbound connections are not accepted by this participant")]
    NotAccepting,

    #[error("the session has ended")]
    Terminated,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("card {0} is not in the catalog")]
    UnknownCard(CardId),
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("link to {remote} is not open")]
    NotOpen { remote: String },

    #[error("transport error: {0}")]
    Frame(#[from] FrameError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
