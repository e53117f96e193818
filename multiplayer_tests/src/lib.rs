// Test-only player for multiplayer integration tests.
//
// Wraps a real node (`guess_who_session::node`) behind a synchronous,
// test-friendly API: commands go in through the `NodeHandle` and session
// events come back through a blocking `wait_for`. Every node runs over real
// localhost TCP, so a test exercises the same code paths as the console
// binary: host → framing → joiner → session → events.
//
// The only test-specific code is the blocking poll loop and a small
// projection of the event stream (seat, dealt cards, cards eliminated by
// answers) that tests can assert on.
//
// See also: `tests/full_pipeline.rs` for the scenarios.

use std::collections::{BTreeSet, VecDeque};
use std::net::SocketAddr;
use std::thread;
use std::time::{Duration, Instant};

use guess_who_protocol::{CardId, PlayerIndex};
use guess_who_session::catalog::StaticCatalog;
use guess_who_session::node::{
    HostConfig, JoinConfig, LocalCommand, NodeHandle, start_host, start_joiner,
};
use guess_who_session::{SessionConfig, SessionEvent};

/// Default timeout for blocking poll operations.
const POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Sleep duration between poll attempts.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One participant driven from a test.
pub struct TestPlayer {
    handle: Option<NodeHandle>,
    /// Events not yet consumed by `wait_for`.
    unseen: VecDeque<SessionEvent>,
    /// Every event ever received, in order.
    pub history: Vec<SessionEvent>,
    pub index: Option<PlayerIndex>,
    pub cards: Vec<CardId>,
    pub eliminated: BTreeSet<CardId>,
}

impl TestPlayer {
    fn new(handle: NodeHandle) -> Self {
        Self {
            handle: Some(handle),
            unseen: VecDeque::new(),
            history: Vec::new(),
            index: None,
            cards: Vec::new(),
            eliminated: BTreeSet::new(),
        }
    }

    /// Host a session on a free localhost port with the bundled catalog.
    pub fn host(seed: u32, max_players: u32) -> (Self, SocketAddr) {
        let config = HostConfig {
            port: 0,
            seed: Some(seed),
            session: SessionConfig {
                max_players,
                ..SessionConfig::default()
            },
            ..HostConfig::default()
        };
        let (handle, addr) =
            start_host(config, StaticCatalog::bundled()).expect("start_host failed");
        let mut host = Self::new(handle);
        host.index = Some(PlayerIndex::HOST);
        (host, addr)
    }

    /// Join the host at `addr` and wait for a seat.
    pub fn join(addr: SocketAddr) -> Self {
        let config = JoinConfig {
            addr: addr.to_string(),
            ..JoinConfig::default()
        };
        let mut player = Self::new(start_joiner(config, StaticCatalog::bundled()));
        player.wait_for(|e| matches!(e, SessionEvent::Assigned { .. }));
        player
    }

    pub fn send(&self, command: LocalCommand) {
        if let Some(handle) = &self.handle {
            handle.send(command);
        }
    }

    /// Seat index, panicking if none was assigned.
    pub fn me(&self) -> PlayerIndex {
        self.index.expect("player has no seat")
    }

    /// Cards not eliminated by answers seen so far.
    pub fn remaining(&self) -> Vec<CardId> {
        self.cards
            .iter()
            .filter(|c| !self.eliminated.contains(*c))
            .cloned()
            .collect()
    }

    fn pump(&mut self) {
        let Some(handle) = &self.handle else {
            return;
        };
        for event in handle.poll() {
            match &event {
                SessionEvent::Assigned { index } => self.index = Some(*index),
                SessionEvent::CandidatesReady { cards, .. } => self.cards = cards.clone(),
                SessionEvent::Answered { eliminated, .. } => {
                    self.eliminated.extend(eliminated.iter().cloned());
                }
                _ => {}
            }
            self.history.push(event.clone());
            self.unseen.push_back(event);
        }
    }

    /// Blocking poll until an unconsumed event matches `pred`. The match is
    /// consumed and returned; earlier events stay available.
    pub fn wait_for(&mut self, pred: impl Fn(&SessionEvent) -> bool) -> SessionEvent {
        let start = Instant::now();
        loop {
            self.pump();
            if let Some(pos) = self.unseen.iter().position(&pred) {
                if let Some(event) = self.unseen.remove(pos) {
                    return event;
                }
            }
            assert!(
                start.elapsed() < POLL_TIMEOUT,
                "{:?} timed out; unconsumed events: {:?}",
                self.index,
                self.unseen
            );
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Wait until the turn is announced as `current`. Returns whether this
    /// player was told it is theirs.
    pub fn wait_for_turn(&mut self, current: PlayerIndex) -> bool {
        match self.wait_for(
            |e| matches!(e, SessionEvent::TurnChanged { current: c, .. } if *c == current),
        ) {
            SessionEvent::TurnChanged { is_my_turn, .. } => is_my_turn,
            other => panic!("expected TurnChanged, got {other:?}"),
        }
    }

    /// Wait for the dealt board and return it.
    pub fn wait_for_cards(&mut self) -> Vec<CardId> {
        self.wait_for(|e| matches!(e, SessionEvent::CandidatesReady { .. }));
        self.cards.clone()
    }

    /// True if any received event matches `pred`.
    pub fn saw(&mut self, pred: impl Fn(&SessionEvent) -> bool) -> bool {
        self.pump();
        self.history.iter().any(pred)
    }

    /// Leave the session and stop the node.
    pub fn leave(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }
}

impl Drop for TestPlayer {
    fn drop(&mut self) {
        self.leave();
    }
}

/// Host plus `joiners` seated players, lobby closed, board dealt. The
/// player at position `k` sits in seat `k + 1`.
pub fn dealt_table(seed: u32, joiners: usize) -> Vec<TestPlayer> {
    let (mut host, addr) = TestPlayer::host(seed, 8);
    let mut players = Vec::new();
    for _ in 0..joiners {
        let player = TestPlayer::join(addr);
        let index = player.me();
        host.wait_for(|e| matches!(e, SessionEvent::PlayerJoined { index: i } if *i == index));
        players.push(player);
    }
    host.send(LocalCommand::CloseLobby);
    players.insert(0, host);
    for player in &mut players {
        player.wait_for_cards();
    }
    players
}

/// `dealt_table`, then the player at position `k` commits `cards[k]` and the game starts with
/// the host's turn.
pub fn started_table(seed: u32, joiners: usize) -> Vec<TestPlayer> {
    let mut players = dealt_table(seed, joiners);
    for (k, player) in players.iter().enumerate() {
        player.send(LocalCommand::SelectCard(player.cards[k].clone()));
    }
    for player in &mut players {
        player.wait_for(|e| matches!(e, SessionEvent::GameStarted));
        player.wait_for_turn(PlayerIndex::HOST);
    }
    players
}
