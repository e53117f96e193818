// guess_who_session: multiplayer session coordinator for Guess Who.
//
// One participant's side of a game played over point-to-point links in a
// star: the host owns seats, readiness, and turn order and relays gameplay
// traffic; joiners talk only to the host. Every participant derives the same
// 30-card board from the host's seed and narrows its own private board from
// the answers it observes.
//
// Module overview:
// - `session.rs`:   The state machine (`Session`): phases, roster, turn and
//                   challenge rules, local actions, host fan-out.
// - `router.rs`:    Inbound dispatch: admit, relay (host), apply.
// - `turn.rs`:      `TurnScheduler`, the host's round-robin over occupied
//                   seats.
// - `deduction.rs`: `DeductionBoard`, the per-participant elimination filter.
// - `catalog.rs`:   `CardCatalog` lookup trait, the bundled catalog, and the
//                   memoizing `CachedCatalog`.
// - `link.rs`:      `PeerLink` transport facade with TCP and in-process
//                   implementations.
// - `node.rs`:      TCP runtime: listener/connector/reader threads feeding
//                   one `mpsc` channel drained by the thread that owns the
//                   `Session`.
// - `event.rs`:     `SessionEvent`, the notifications for a front end.
// - `error.rs`:     Error enums.
//
// Dependencies: `guess_who_protocol` (messages and framing) and
// `guess_who_prng` (seeded selection). No async runtime.
//
// The `guess-who` binary (`main.rs`) is a line-oriented console front end
// over the `node` API.

pub mod catalog;
pub mod deduction;
pub mod error;
pub mod event;
pub mod link;
pub mod node;
pub mod router;
pub mod session;
pub mod turn;

pub use catalog::{CachedCatalog, CardCatalog, CardDetails, StaticCatalog};
pub use error::{CatalogError, LinkError, SessionError};
pub use event::SessionEvent;
pub use node::{
    HostConfig, JoinConfig, LocalCommand, NodeHandle, start_host, start_joiner, start_single,
};
pub use session::{Role, Session, SessionConfig, SessionPhase};
