// Session coordinator: the per-participant state machine.
//
// `Session` owns everything one participant knows about a game: its role,
// phase, seat, the shared candidate set, its private elimination board and
// secret card, the roster, whose turn it is, and the one outstanding
// challenge (a question or a guess). It also owns the participant's links.
// All mutation goes through the methods here, called from a single thread
// (the node's main loop, or a test), so there is no internal locking.
//
// Authority: the host's instance is the only source of truth for seats,
// readiness, and turn order. Joiners keep a projection updated solely by
// host traffic (`ASSIGN_ID`, `PLAYER_JOINED`, `PLAYER_LEFT`, `NEXT_TURN`) and
// never compute a turn themselves.
//
// Inbound path (see `router.rs`): `admit` resolves and validates the sender,
// the router relays accepted relayed kinds on the host, then `apply` mutates
// state. Local actions take the same route minus the relay: `validate`,
// `transmit` (host broadcasts, joiner sends to the host), `apply`. Because
// both paths share `validate`, a rule that rejects a peer's message also
// rejects the same action attempted locally.
//
// Turn rules:
// - When the asker observes the answer to their question, their turn ends.
//   A joiner asker sends `TURN_PASS`; a host asker advances directly.
// - A failed guess hands the turn to the guessed-against player; round-robin
//   continues from there.
// - Departed seats are skipped (`TurnScheduler`), never reused.
//
// Phases: LobbyOpen -> LobbyClosed -> Selecting -> AwaitingOthers -> Playing
// -> Finished. LobbyClosed is transient on the host and lasts on a joiner
// only until its seed arrives. Single-player sessions start in Selecting.
//
// Events for the view layer are queued in `events` and drained by the
// caller; nothing here blocks or renders.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use guess_who_prng::select_candidates;
use guess_who_protocol::{CardId, Message, PlayerIndex, QuestionCategory, Response};
use tracing::{debug, info, warn};

use crate::catalog::CachedCatalog;
use crate::deduction::DeductionBoard;
use crate::error::SessionError;
use crate::event::SessionEvent;
use crate::link::{LinkEvent, LinkId, PeerLink};
use crate::router;
use crate::turn::TurnScheduler;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Single,
    Host,
    Joiner,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    LobbyOpen,
    LobbyClosed,
    Selecting,
    AwaitingOthers,
    Playing,
    Finished,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Roster cap, host included.
    pub max_players: u32,
    /// Advisory only: past this, a joiner still connecting is told it is slow.
    pub connect_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_players: 8,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// The single outstanding challenge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pending {
    Question {
        asker: PlayerIndex,
        text: String,
        category: QuestionCategory,
        value: String,
    },
    Guess {
        guesser: PlayerIndex,
        target: PlayerIndex,
        card: CardId,
    },
}

impl Pending {
    fn involves(&self, player: PlayerIndex) -> bool {
        match self {
            Pending::Question { asker, .. } => *asker == player,
            Pending::Guess {
                guesser, target, ..
            } => *guesser == player || *target == player,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub winner: PlayerIndex,
    pub loser: PlayerIndex,
}

#[derive(Clone, Debug, Default)]
struct PlayerState {
    ready: bool,
}

struct LinkSlot<L> {
    link: L,
    /// Seat on the far end. `None` until the host has assigned one.
    player: Option<PlayerIndex>,
}

pub struct Session<L: PeerLink> {
    role: Role,
    phase: SessionPhase,
    config: SessionConfig,
    local: Option<PlayerIndex>,
    seed: Option<u32>,
    candidates: Vec<CardId>,
    board: DeductionBoard,
    secret: Option<CardId>,
    roster: BTreeMap<PlayerIndex, PlayerState>,
    next_index: u32,
    turns: TurnScheduler,
    pending: Option<Pending>,
    outcome: Option<Outcome>,
    links: BTreeMap<LinkId, LinkSlot<L>>,
    next_link: u32,
    host_link: Option<LinkId>,
    catalog: CachedCatalog,
    events: Vec<SessionEvent>,
    connect_started: Instant,
    connected: bool,
    slow_reported: bool,
    terminated: bool,
}

impl<L: PeerLink> Session<L> {
    fn base(role: Role, config: SessionConfig, catalog: CachedCatalog) -> Self {
        Self {
            role,
            phase: SessionPhase::LobbyOpen,
            config,
            local: None,
            seed: None,
            candidates: Vec::new(),
            board: DeductionBoard::default(),
            secret: None,
            roster: BTreeMap::new(),
            next_index: PlayerIndex::HOST.0 + 1,
            turns: TurnScheduler::new(),
            pending: None,
            outcome: None,
            links: BTreeMap::new(),
            next_link: 0,
            host_link: None,
            catalog,
            events: Vec::new(),
            connect_started: Instant::now(),
            connected: false,
            slow_reported: false,
            terminated: false,
        }
    }

    /// A solo session: the board is dealt immediately.
    pub fn single(seed: u32, config: SessionConfig, catalog: CachedCatalog) -> Self {
        let mut session = Self::base(Role::Single, config, catalog);
        session.local = Some(PlayerIndex::HOST);
        session.seed = Some(seed);
        session.roster.insert(PlayerIndex::HOST, PlayerState::default());
        session.phase = SessionPhase::LobbyClosed;
        session.enter_selection_if_ready();
        session
    }

    /// The authoritative participant, seated at index 1 with an open lobby.
    pub fn host(seed: u32, config: SessionConfig, catalog: CachedCatalog) -> Self {
        let mut session = Self::base(Role::Host, config, catalog);
        session.local = Some(PlayerIndex::HOST);
        session.seed = Some(seed);
        session.roster.insert(PlayerIndex::HOST, PlayerState::default());
        info!(seed, "hosting session");
        session
    }

    /// A participant whose only link goes to the host. The link may still be
    /// pending; report `LinkEvent::Opened` once it connects.
    pub fn joiner(link: L, config: SessionConfig, catalog: CachedCatalog) -> Self {
        let mut session = Self::base(Role::Joiner, config, catalog);
        let open = link.is_open();
        let id = session.register(link, Some(PlayerIndex::HOST));
        session.host_link = Some(id);
        if open {
            session.mark_connected();
        }
        session
    }

    // -----------------------------------------------------------------
    // Links
    // -----------------------------------------------------------------

    fn register(&mut self, link: L, player: Option<PlayerIndex>) -> LinkId {
        let id = LinkId(self.next_link);
        self.next_link += 1;
        self.links.insert(id, LinkSlot { link, player });
        id
    }

    /// Take an inbound link (host only). An already open link is seated at
    /// once; a pending one is seated on `LinkEvent::Opened`. Refused links
    /// are closed before returning the error.
    pub fn accept_link(&mut self, mut link: L) -> Result<LinkId, SessionError> {
        if self.role != Role::Host {
            link.close();
            warn!(remote = link.remote_id(), "refusing inbound link");
            return Err(SessionError::NotAccepting);
        }
        let open = link.is_open();
        let id = self.register(link, None);
        if open {
            self.on_link_opened(id)?;
        }
        Ok(id)
    }

    pub fn handle_link_event(&mut self, id: LinkId, event: LinkEvent) -> Result<(), SessionError> {
        if !self.links.contains_key(&id) {
            return Err(SessionError::UnknownLink(id));
        }
        match event {
            LinkEvent::Opened => self.on_link_opened(id),
            LinkEvent::Received(message) => router::dispatch(self, id, message),
            LinkEvent::Closed => {
                self.on_link_closed(id, "channel closed");
                Ok(())
            }
            LinkEvent::Failed(reason) => {
                self.on_link_closed(id, &reason);
                Ok(())
            }
        }
    }

    fn on_link_opened(&mut self, id: LinkId) -> Result<(), SessionError> {
        match self.role {
            Role::Joiner if self.host_link == Some(id) => {
                self.mark_connected();
                Ok(())
            }
            Role::Host => match self.seat_joiner(id) {
                Ok(_) => Ok(()),
                Err(e) => {
                    warn!(link = %id, error = %e, "refusing join");
                    self.drop_link(id);
                    Err(e)
                }
            },
            _ => {
                self.drop_link(id);
                Err(SessionError::NotAccepting)
            }
        }
    }

    fn mark_connected(&mut self) {
        if !self.connected {
            self.connected = true;
            info!("connected to host");
            self.publish(SessionEvent::Connected);
        }
    }

    /// Host: give the link's owner the next seat, then send it its seat, the
    /// seed, and tell everyone else.
    fn seat_joiner(&mut self, id: LinkId) -> Result<PlayerIndex, SessionError> {
        self.ensure_live()?;
        if let Some(index) = self.links.get(&id).and_then(|slot| slot.player) {
            return Ok(index);
        }
        if self.phase != SessionPhase::LobbyOpen {
            return Err(SessionError::LobbyClosed);
        }
        if self.roster.len() as u32 >= self.config.max_players {
            return Err(SessionError::SessionFull);
        }

        let index = PlayerIndex(self.next_index);
        self.next_index += 1;
        self.roster.insert(index, PlayerState::default());
        if let Some(slot) = self.links.get_mut(&id) {
            slot.player = Some(index);
        }

        let players = self.roster.keys().copied().collect();
        self.send_to(id, &Message::AssignId { id: index, players });
        if let Some(value) = self.seed {
            self.send_to(id, &Message::Seed { value });
        }
        self.broadcast_except(
            Some(id),
            &Message::PlayerJoined {
                player_index: index,
            },
        );
        info!(player = %index, link = %id, players = self.roster.len(), "player joined");
        self.publish(SessionEvent::PlayerJoined { index });
        Ok(index)
    }

    fn drop_link(&mut self, id: LinkId) {
        if let Some(mut slot) = self.links.remove(&id) {
            slot.link.close();
        }
    }

    fn on_link_closed(&mut self, id: LinkId, reason: &str) {
        let Some(mut slot) = self.links.remove(&id) else {
            return;
        };
        slot.link.close();
        match self.role {
            Role::Joiner if self.host_link == Some(id) => {
                self.host_link = None;
                let reason = if self.connected {
                    format!("lost connection to host: {reason}")
                } else {
                    format!("could not connect to host: {reason}")
                };
                self.terminate(reason);
            }
            Role::Host => {
                if let Some(index) = slot.player {
                    self.remove_player(index, reason);
                }
            }
            _ => {}
        }
    }

    fn remove_player(&mut self, index: PlayerIndex, reason: &str) {
        if self.roster.remove(&index).is_none() {
            return;
        }
        info!(player = %index, reason, "player left");
        self.broadcast(&Message::PlayerLeft {
            player_index: index,
        });
        self.publish(SessionEvent::PlayerLeft { index });

        if self.pending.as_ref().is_some_and(|p| p.involves(index)) {
            debug!(player = %index, "clearing challenge of departed player");
            self.pending = None;
        }
        match self.phase {
            SessionPhase::Playing if self.turns.current() == Some(index) => self.advance_turn(),
            SessionPhase::AwaitingOthers => self.check_all_ready(),
            _ => {}
        }
    }

    fn terminate(&mut self, reason: String) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        for slot in self.links.values_mut() {
            slot.link.close();
        }
        self.links.clear();
        self.host_link = None;
        info!(%reason, "session ended");
        self.publish(SessionEvent::SessionEnded { reason });
    }

    // -----------------------------------------------------------------
    // Sending
    // -----------------------------------------------------------------

    fn send_to(&mut self, id: LinkId, message: &Message) {
        if let Some(slot) = self.links.get_mut(&id) {
            if let Err(e) = slot.link.send(message) {
                warn!(link = %id, kind = message.kind(), error = %e, "send failed; message dropped");
            }
        }
    }

    /// Send to every seated link except `except`.
    fn broadcast_except(&mut self, except: Option<LinkId>, message: &Message) {
        for (id, slot) in self.links.iter_mut() {
            if Some(*id) == except || slot.player.is_none() {
                continue;
            }
            if let Err(e) = slot.link.send(message) {
                warn!(link = %id, kind = message.kind(), error = %e, "send failed; message dropped");
            }
        }
    }

    fn broadcast(&mut self, message: &Message) {
        self.broadcast_except(None, message);
    }

    /// Host fan-out of an accepted inbound message to everyone but its
    /// originator.
    pub(crate) fn relay(&mut self, source: LinkId, message: &Message) {
        debug!(link = %source, kind = message.kind(), "relaying");
        self.broadcast_except(Some(source), message);
    }

    /// Put a locally originated message on the wire.
    fn transmit(&mut self, message: &Message) {
        match self.role {
            Role::Host => self.broadcast(message),
            Role::Joiner => {
                if let Some(id) = self.host_link {
                    self.send_to(id, message);
                }
            }
            Role::Single => {}
        }
    }

    fn publish(&mut self, event: SessionEvent) {
        self.events.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    // -----------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------

    /// Resolve who sent an inbound message and check it may be applied.
    ///
    /// On the host the sender is the seat bound to the link, and relayed
    /// kinds are re-stamped with it. A joiner takes the sender from the
    /// host's stamp, or the host itself for unstamped kinds.
    pub(crate) fn admit(
        &self,
        source: LinkId,
        mut message: Message,
    ) -> Result<(PlayerIndex, Message), SessionError> {
        self.ensure_live()?;
        let slot = self
            .links
            .get(&source)
            .ok_or(SessionError::UnknownLink(source))?;
        let sender = match self.role {
            Role::Host => {
                let sender = slot.player.ok_or(SessionError::NotAssigned)?;
                if message.is_host_only() {
                    return Err(SessionError::HostOnly {
                        kind: message.kind(),
                    });
                }
                message.stamp_sender(sender);
                if let Message::Guess { target, .. } = &mut message
                    && target.is_unset()
                {
                    *target = self.sole_opponent_of(sender)?;
                }
                if let (
                    Message::CorrectGuess { guesser, .. } | Message::Lose { guesser, .. },
                    Some(Pending::Guess {
                        guesser: expected, ..
                    }),
                ) = (&mut message, &self.pending)
                {
                    *guesser = *expected;
                }
                sender
            }
            Role::Joiner => {
                if self.host_link != Some(source) {
                    return Err(SessionError::UnknownLink(source));
                }
                message.sender().unwrap_or(PlayerIndex::HOST)
            }
            Role::Single => return Err(SessionError::NotAccepting),
        };
        self.validate(sender, &message)?;
        Ok((sender, message))
    }

    /// The only other seated player, for guesses that name no target.
    fn sole_opponent_of(&self, player: PlayerIndex) -> Result<PlayerIndex, SessionError> {
        let mut others = self.roster.keys().copied().filter(|p| *p != player);
        match (others.next(), others.next()) {
            (Some(only), None) => Ok(only),
            (None, _) => Err(SessionError::NoOpponents),
            (Some(_), Some(_)) => Err(SessionError::AmbiguousTarget),
        }
    }

    /// Whether `sender` may cause `message` in the current state.
    fn validate(&self, sender: PlayerIndex, message: &Message) -> Result<(), SessionError> {
        use SessionPhase::*;

        match message {
            Message::Seed { .. } => {
                self.only_on(Role::Joiner, message)?;
                if self.seed.is_some() {
                    return Err(SessionError::Unexpected {
                        kind: message.kind(),
                    });
                }
            }
            Message::AssignId { .. } => {
                self.only_on(Role::Joiner, message)?;
                if self.local.is_some() {
                    return Err(SessionError::Unexpected {
                        kind: message.kind(),
                    });
                }
            }
            Message::LobbyClosed => {
                self.only_on(Role::Joiner, message)?;
                self.require_phase(&[LobbyOpen])?;
            }
            Message::PlayerJoined { .. } | Message::PlayerLeft { .. } => {
                self.only_on(Role::Joiner, message)?;
            }
            Message::StartGame => {
                self.only_on(Role::Joiner, message)?;
                self.require_phase(&[Selecting, AwaitingOthers])?;
            }
            Message::NextTurn { .. } => {
                self.only_on(Role::Joiner, message)?;
                self.require_phase(&[Playing])?;
            }
            Message::Ready => {
                self.only_on(Role::Host, message)?;
                self.require_phase(&[Selecting, AwaitingOthers])?;
                if self.roster.get(&sender).is_some_and(|p| p.ready) {
                    return Err(SessionError::AlreadyCommitted);
                }
            }
            Message::TurnPass => {
                self.only_on(Role::Host, message)?;
                self.require_turn(sender)?;
            }
            Message::Question {
                category, value, ..
            } => {
                self.require_turn(sender)?;
                if category.canonical_value(value).is_none() {
                    return Err(SessionError::InvalidQuestion {
                        category: *category,
                        value: value.clone(),
                    });
                }
            }
            Message::Answer { .. } => {
                self.require_phase(&[Playing])?;
                match &self.pending {
                    Some(Pending::Question { asker, .. }) if *asker == sender => {
                        return Err(SessionError::OwnQuestion { player: sender });
                    }
                    Some(Pending::Question { .. }) => {}
                    _ => return Err(SessionError::NoPendingQuestion),
                }
            }
            Message::Guess { target, card, .. } => {
                self.require_turn(sender)?;
                if *target == sender {
                    return Err(SessionError::SelfTarget);
                }
                if !self.roster.contains_key(target) {
                    return Err(SessionError::UnknownPlayer(*target));
                }
                if !self.candidates.iter().any(|c| c.matches(card)) {
                    return Err(SessionError::UnknownCard(card.clone()));
                }
            }
            Message::CorrectGuess { .. } | Message::Lose { .. } => {
                self.require_phase(&[Playing])?;
                match &self.pending {
                    Some(Pending::Guess { target, .. }) if *target == sender => {}
                    _ => return Err(SessionError::NoPendingGuess),
                }
            }
            Message::Chat { .. } => {}
            Message::Unknown => {
                return Err(SessionError::Unexpected {
                    kind: message.kind(),
                });
            }
        }
        Ok(())
    }

    fn only_on(&self, role: Role, message: &Message) -> Result<(), SessionError> {
        if self.role == role {
            Ok(())
        } else {
            Err(SessionError::Unexpected {
                kind: message.kind(),
            })
        }
    }

    fn require_phase(&self, allowed: &[SessionPhase]) -> Result<(), SessionError> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(self.wrong_phase())
        }
    }

    fn require_turn(&self, player: PlayerIndex) -> Result<(), SessionError> {
        self.require_phase(&[SessionPhase::Playing])?;
        if self.turns.current() != Some(player) {
            return Err(SessionError::NotYourTurn { player });
        }
        if self.pending.is_some() {
            return Err(SessionError::ChallengePending);
        }
        Ok(())
    }

    fn wrong_phase(&self) -> SessionError {
        SessionError::WrongPhase { actual: self.phase }
    }

    fn ensure_live(&self) -> Result<(), SessionError> {
        if self.terminated {
            Err(SessionError::Terminated)
        } else {
            Ok(())
        }
    }

    fn require_local(&self) -> Result<PlayerIndex, SessionError> {
        self.ensure_live()?;
        self.local.ok_or(SessionError::NotAssigned)
    }

    fn require_opponents(&self) -> Result<(), SessionError> {
        if self.opponents().is_empty() {
            Err(SessionError::NoOpponents)
        } else {
            Ok(())
        }
    }

    // -----------------------------------------------------------------
    // State transitions
    // -----------------------------------------------------------------

    /// Apply an accepted message from `sender`, inbound or local.
    pub(crate) fn apply(&mut self, sender: PlayerIndex, message: Message) {
        match message {
            Message::Seed { value } => {
                info!(seed = value, "received seed");
                self.seed = Some(value);
                self.enter_selection_if_ready();
            }
            Message::AssignId { id, players } => {
                self.local = Some(id);
                for player in players.into_iter().chain([PlayerIndex::HOST, id]) {
                    self.roster.entry(player).or_default();
                }
                info!(player = %id, "assigned seat");
                self.publish(SessionEvent::Assigned { index: id });
            }
            Message::Ready => self.mark_ready(sender),
            Message::StartGame => {
                self.set_phase(SessionPhase::Playing);
                self.publish(SessionEvent::GameStarted);
            }
            Message::NextTurn { player_index } => {
                self.turns.hand_to(player_index);
                self.publish_turn();
            }
            Message::Question {
                text,
                category,
                value,
                ..
            } => {
                self.pending = Some(Pending::Question {
                    asker: sender,
                    text: text.clone(),
                    category,
                    value: value.clone(),
                });
                self.publish(SessionEvent::QuestionAsked {
                    from: sender,
                    text,
                    category,
                    value,
                });
            }
            Message::Answer {
                response,
                original_question,
                category,
                value,
                ..
            } => self.observe_answer(sender, response, original_question, category, value),
            Message::TurnPass => self.advance_turn(),
            Message::Guess { target, card, .. } => self.observe_guess(sender, target, card),
            Message::CorrectGuess { guesser, .. } => {
                self.pending = None;
                self.finish(guesser, sender);
            }
            Message::Lose { guesser, card, .. } => {
                self.pending = None;
                info!(guesser = %guesser, target = %sender, card = %card, "guess failed");
                self.publish(SessionEvent::GuessFailed {
                    guesser,
                    target: sender,
                    card,
                });
                if self.role != Role::Joiner {
                    self.hand_turn_to(sender);
                }
            }
            Message::Chat { message, .. } => {
                self.publish(SessionEvent::Chat {
                    from: sender,
                    message,
                });
            }
            Message::LobbyClosed => {
                self.set_phase(SessionPhase::LobbyClosed);
                self.publish(SessionEvent::LobbyClosed);
                self.enter_selection_if_ready();
            }
            Message::PlayerJoined { player_index } => {
                self.roster.entry(player_index).or_default();
                if Some(player_index) != self.local {
                    self.publish(SessionEvent::PlayerJoined {
                        index: player_index,
                    });
                }
            }
            Message::PlayerLeft { player_index } => {
                self.roster.remove(&player_index);
                if self.pending.as_ref().is_some_and(|p| p.involves(player_index)) {
                    self.pending = None;
                }
                self.publish(SessionEvent::PlayerLeft {
                    index: player_index,
                });
            }
            Message::Unknown => {}
        }
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        if self.phase != phase {
            info!(from = ?self.phase, to = ?phase, "phase change");
            self.phase = phase;
        }
    }

    /// Deal the board once the lobby is closed and the seed is known.
    fn enter_selection_if_ready(&mut self) {
        if self.phase != SessionPhase::LobbyClosed {
            return;
        }
        let Some(seed) = self.seed else {
            return;
        };
        self.candidates = select_candidates(seed, &self.catalog.card_names());
        self.board = DeductionBoard::new(&self.candidates);
        self.set_phase(SessionPhase::Selecting);
        self.publish(SessionEvent::CandidatesReady {
            seed,
            cards: self.candidates.clone(),
        });
    }

    fn mark_ready(&mut self, player: PlayerIndex) {
        self.roster.entry(player).or_default().ready = true;
        info!(player = %player, "player ready");
        self.publish(SessionEvent::PlayerReady { index: player });
        self.check_all_ready();
    }

    /// Host: start once the local player and every seated player committed.
    fn check_all_ready(&mut self) {
        if self.role == Role::Joiner || self.phase != SessionPhase::AwaitingOthers {
            return;
        }
        if !self.roster.values().all(|p| p.ready) {
            return;
        }
        if self.role == Role::Host && self.opponents().is_empty() {
            info!("everyone left before the game started; waiting");
            return;
        }
        self.set_phase(SessionPhase::Playing);
        self.transmit(&Message::StartGame);
        self.publish(SessionEvent::GameStarted);
        let seats = self.seats();
        if let Some(first) = self.turns.start(&seats) {
            self.transmit(&Message::NextTurn {
                player_index: first,
            });
            self.publish_turn();
        }
    }

    fn seats(&self) -> Vec<PlayerIndex> {
        self.roster.keys().copied().collect()
    }

    /// Host: next occupied seat, announced to everyone.
    fn advance_turn(&mut self) {
        let seats = self.seats();
        if let Some(next) = self.turns.advance(&seats) {
            debug!(player = %next, "turn advanced");
            self.transmit(&Message::NextTurn { player_index: next });
            self.publish_turn();
        }
    }

    /// Host: grant the turn out of rotation.
    fn hand_turn_to(&mut self, player: PlayerIndex) {
        self.turns.hand_to(player);
        self.transmit(&Message::NextTurn {
            player_index: player,
        });
        self.publish_turn();
    }

    fn publish_turn(&mut self) {
        if let Some(current) = self.turns.current() {
            let is_my_turn = Some(current) == self.local;
            self.publish(SessionEvent::TurnChanged {
                current,
                is_my_turn,
            });
        }
    }

    /// The local player is done with their turn.
    fn finish_turn(&mut self) {
        match self.role {
            Role::Joiner => self.transmit(&Message::TurnPass),
            Role::Host | Role::Single => self.advance_turn(),
        }
    }

    fn observe_answer(
        &mut self,
        from: PlayerIndex,
        response: Response,
        question: String,
        category: QuestionCategory,
        value: String,
    ) {
        let asker = match self.pending.take() {
            Some(Pending::Question { asker, .. }) => Some(asker),
            _ => None,
        };
        let affirmative = response.is_affirmative();
        let eliminated = self
            .board
            .apply(&mut self.catalog, category, &value, affirmative);
        debug!(
            from = %from,
            %category,
            %value,
            affirmative,
            eliminated = eliminated.len(),
            remaining = self.board.remaining_count(),
            "answer applied"
        );
        self.publish(SessionEvent::Answered {
            from,
            affirmative,
            question,
            eliminated,
        });
        if asker.is_some() && asker == self.local {
            self.finish_turn();
        }
    }

    fn observe_guess(&mut self, guesser: PlayerIndex, target: PlayerIndex, card: CardId) {
        self.pending = Some(Pending::Guess {
            guesser,
            target,
            card: card.clone(),
        });
        self.publish(SessionEvent::GuessMade {
            from: guesser,
            target,
            card: card.clone(),
        });
        if Some(target) == self.local {
            self.evaluate_guess(guesser, card);
        }
    }

    /// Runs on the guessed-against participant: compare with the local
    /// secret and announce the result.
    fn evaluate_guess(&mut self, guesser: PlayerIndex, card: CardId) {
        let Some(local) = self.local else {
            return;
        };
        let correct = self.secret.as_ref().is_some_and(|s| s.matches(&card));
        info!(guesser = %guesser, card = %card, correct, "evaluating guess");
        let reply = if correct {
            Message::CorrectGuess {
                from: local,
                guesser,
            }
        } else {
            Message::Lose {
                from: local,
                guesser,
                card,
            }
        };
        self.transmit(&reply);
        self.apply(local, reply);
    }

    fn finish(&mut self, winner: PlayerIndex, loser: PlayerIndex) {
        self.outcome = Some(Outcome { winner, loser });
        self.set_phase(SessionPhase::Finished);
        info!(winner = %winner, loser = %loser, "game over");
        self.publish(SessionEvent::GameOver {
            winner,
            loser,
            won: Some(winner) == self.local,
        });
    }

    // -----------------------------------------------------------------
    // Local actions
    // -----------------------------------------------------------------

    /// Validate, send, and apply a locally originated message.
    fn act(&mut self, message: Message) -> Result<(), SessionError> {
        let local = self.require_local()?;
        self.validate(local, &message)?;
        debug!(kind = message.kind(), "local action");
        self.transmit(&message);
        self.apply(local, message);
        Ok(())
    }

    /// Host: stop taking joins and deal the board.
    pub fn close_lobby(&mut self) -> Result<(), SessionError> {
        self.ensure_live()?;
        if self.role != Role::Host {
            return Err(SessionError::NotHost);
        }
        self.require_phase(&[SessionPhase::LobbyOpen])?;
        self.require_opponents()?;
        info!(players = self.roster.len(), "closing lobby");
        self.transmit(&Message::LobbyClosed);
        self.apply(PlayerIndex::HOST, Message::LobbyClosed);
        Ok(())
    }

    /// Commit the secret card. It never leaves this participant.
    pub fn select_card(&mut self, card: &CardId) -> Result<(), SessionError> {
        let local = self.require_local()?;
        if self.secret.is_some() {
            return Err(SessionError::AlreadyCommitted);
        }
        self.require_phase(&[SessionPhase::Selecting])?;
        let chosen = self
            .candidates
            .iter()
            .find(|c| c.matches(card))
            .cloned()
            .ok_or_else(|| SessionError::UnknownCard(card.clone()))?;
        self.secret = Some(chosen);
        self.set_phase(SessionPhase::AwaitingOthers);
        match self.role {
            Role::Joiner => {
                self.transmit(&Message::Ready);
                self.publish(SessionEvent::PlayerReady { index: local });
            }
            Role::Host | Role::Single => self.mark_ready(local),
        }
        Ok(())
    }

    pub fn ask(&mut self, category: QuestionCategory, value: &str) -> Result<(), SessionError> {
        let local = self.require_local()?;
        self.require_phase(&[SessionPhase::Playing])?;
        self.require_opponents()?;
        let canonical =
            category
                .canonical_value(value)
                .ok_or_else(|| SessionError::InvalidQuestion {
                    category,
                    value: value.to_owned(),
                })?;
        self.act(Message::Question {
            from: local,
            text: category.question_text(canonical),
            category,
            value: canonical.to_owned(),
        })
    }

    /// Reply to the pending question.
    pub fn answer(&mut self, affirmative: bool) -> Result<(), SessionError> {
        let local = self.require_local()?;
        self.require_phase(&[SessionPhase::Playing])?;
        let Some(Pending::Question {
            text,
            category,
            value,
            ..
        }) = self.pending.clone()
        else {
            return Err(SessionError::NoPendingQuestion);
        };
        self.act(Message::Answer {
            from: local,
            response: Response::from_affirmative(affirmative),
            original_question: text,
            category,
            value,
        })
    }

    /// Name `card` as `target`'s secret.
    pub fn guess(&mut self, target: PlayerIndex, card: &CardId) -> Result<(), SessionError> {
        let local = self.require_local()?;
        self.require_phase(&[SessionPhase::Playing])?;
        self.require_opponents()?;
        let card = self
            .candidates
            .iter()
            .find(|c| c.matches(card))
            .cloned()
            .unwrap_or_else(|| card.clone());
        self.act(Message::Guess {
            from: local,
            target,
            card,
        })
    }

    /// Give up the turn without asking or guessing.
    pub fn end_turn(&mut self) -> Result<(), SessionError> {
        let local = self.require_local()?;
        self.require_turn(local)?;
        self.finish_turn();
        Ok(())
    }

    pub fn chat(&mut self, message: impl Into<String>) -> Result<(), SessionError> {
        let local = self.require_local()?;
        self.act(Message::Chat {
            from: local,
            message: message.into(),
        })
    }

    /// Flip a card down on the local board.
    pub fn eliminate(&mut self, card: &CardId) -> Result<(), SessionError> {
        self.ensure_live()?;
        if self.board.is_empty() {
            return Err(self.wrong_phase());
        }
        if self.board.eliminate(card) {
            Ok(())
        } else {
            Err(SessionError::UnknownCard(card.clone()))
        }
    }

    /// Leave the session, closing every link.
    pub fn exit(&mut self) {
        self.terminate("left the session".into());
    }

    /// Joiner: report once if the host link is still not open after the
    /// configured timeout. The attempt is not aborted.
    pub fn check_connect_deadline(&mut self, now: Instant) {
        if self.role != Role::Joiner || self.connected || self.slow_reported || self.terminated {
            return;
        }
        if now.saturating_duration_since(self.connect_started) >= self.config.connect_timeout {
            self.slow_reported = true;
            warn!(timeout = ?self.config.connect_timeout, "connection to host is slow");
            self.publish(SessionEvent::ConnectionSlow);
        }
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn local_index(&self) -> Option<PlayerIndex> {
        self.local
    }

    pub fn current_turn(&self) -> Option<PlayerIndex> {
        match self.phase {
            SessionPhase::Playing | SessionPhase::Finished => self.turns.current(),
            _ => None,
        }
    }

    pub fn is_my_turn(&self) -> bool {
        self.phase == SessionPhase::Playing
            && self.local.is_some()
            && self.turns.current() == self.local
    }

    pub fn seed(&self) -> Option<u32> {
        self.seed
    }

    pub fn candidates(&self) -> &[CardId] {
        &self.candidates
    }

    pub fn board(&self) -> &DeductionBoard {
        &self.board
    }

    pub fn remaining(&self) -> Vec<CardId> {
        self.board.remaining()
    }

    pub fn secret(&self) -> Option<&CardId> {
        self.secret.as_ref()
    }

    /// Seated players in index order (a projection on joiners).
    pub fn roster(&self) -> Vec<PlayerIndex> {
        self.seats()
    }

    pub fn opponents(&self) -> Vec<PlayerIndex> {
        self.roster
            .keys()
            .copied()
            .filter(|p| Some(*p) != self.local)
            .collect()
    }

    /// Host view of readiness. Joiners only know their own.
    pub fn is_ready(&self, player: PlayerIndex) -> bool {
        self.roster.get(&player).is_some_and(|p| p.ready)
    }

    pub fn pending(&self) -> Option<&Pending> {
        self.pending.as_ref()
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn host_link_id(&self) -> Option<LinkId> {
        self.host_link
    }

    pub fn link_mut(&mut self, id: LinkId) -> Option<&mut L> {
        self.links.get_mut(&id).map(|slot| &mut slot.link)
    }

    /// Seat bound to a link, if assigned.
    pub fn player_for_link(&self, id: LinkId) -> Option<PlayerIndex> {
        self.links.get(&id).and_then(|slot| slot.player)
    }
}
