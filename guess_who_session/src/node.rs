// TCP runtime: runs one `Session` over real sockets.
//
// Architecture: thread-per-reader with a central `mpsc` channel.
//
// - **Listener thread** (host only): non-blocking `accept()` loop that sends
//   `InternalEvent::NewConnection` to the main thread and checks
//   `keep_running` between polls.
// - **Connector thread** (joiner only): performs the blocking
//   `TcpStream::connect` and reports `Connected` or `ConnectFailed`. The
//   session's link to the host exists (pending) from the start.
// - **Reader threads** (one per link): `read_frame()` in a loop, forwarding
//   each message as `InternalEvent::Link`. A malformed frame is skipped; EOF
//   or any other error reports the link closed and ends the thread.
// - **Main thread**: owns the `Session`, receives events from the channel,
//   and dispatches them. `recv_timeout` with a short tick lets it evaluate
//   the advisory connect deadline without a timer thread. After each batch
//   it forwards the session's queued events to the `NodeHandle`.
//
// The main thread is the only writer to sockets (through `TcpLink`). Reader
// threads only read.
//
// Local commands arrive on the same channel as network traffic, so a UI
// action and an inbound message are never processed concurrently. A
// rejected command comes back as `SessionEvent::ActionRejected`.

use std::io::BufReader;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use guess_who_prng::Mulberry32;
use guess_who_protocol::{CardId, PlayerIndex, QuestionCategory, read_frame};
use tracing::{debug, info, warn};

use crate::catalog::{CachedCatalog, CardCatalog};
use crate::error::SessionError;
use crate::event::SessionEvent;
use crate::link::{LinkEvent, LinkFactory, LinkId, TcpLink, TcpLinkFactory};
use crate::session::{Session, SessionConfig};

/// Main-loop wake-up interval when idle.
const TICK: Duration = Duration::from_millis(50);

/// Host seeds are drawn below this bound when none is configured.
const SEED_BOUND: usize = 1_000_000;

/// Something the local player wants to do.
#[derive(Clone, Debug, PartialEq)]
pub enum LocalCommand {
    CloseLobby,
    SelectCard(CardId),
    Ask {
        category: QuestionCategory,
        value: String,
    },
    Answer {
        affirmative: bool,
    },
    /// `target: None` picks the only opponent; ambiguous with more than one.
    Guess {
        target: Option<PlayerIndex>,
        card: CardId,
    },
    EndTurn,
    Chat(String),
    Eliminate(CardId),
    Exit,
}

/// Events sent from listener/connector/reader threads and the handle to the
/// main thread.
enum InternalEvent {
    NewConnection { stream: TcpStream },
    Connected { stream: TcpStream },
    ConnectFailed { reason: String },
    Link { id: LinkId, event: LinkEvent },
    Command(LocalCommand),
    Shutdown,
}

/// Handle returned by the `start_*` functions to drive a running node.
pub struct NodeHandle {
    tx: Sender<InternalEvent>,
    events: Receiver<SessionEvent>,
    keep_running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl NodeHandle {
    /// Queue a local command. Ignored once the node has stopped.
    pub fn send(&self, command: LocalCommand) {
        let _ = self.tx.send(InternalEvent::Command(command));
    }

    /// Drain all queued session events (non-blocking).
    pub fn poll(&self) -> Vec<SessionEvent> {
        self.events.try_iter().collect()
    }

    /// Leave the session, signal the node to stop, and wait for it.
    pub fn stop(mut self) {
        let _ = self.tx.send(InternalEvent::Shutdown);
        self.keep_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// Configuration for hosting a session.
#[derive(Clone, Debug)]
pub struct HostConfig {
    /// Interface to listen on.
    pub bind: String,
    /// 0 lets the OS pick a free port.
    pub port: u16,
    /// Board seed. Random when `None`.
    pub seed: Option<u32>,
    pub session: SessionConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 7979,
            seed: None,
            session: SessionConfig::default(),
        }
    }
}

/// Configuration for joining a hosted session.
#[derive(Clone, Debug)]
pub struct JoinConfig {
    pub addr: String,
    pub session: SessionConfig,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:7979".into(),
            session: SessionConfig::default(),
        }
    }
}

/// A seed below one million from the clock and process id.
pub fn random_seed() -> u32 {
    let clock = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() ^ (d.as_secs() as u32))
        .unwrap_or_default();
    let mut rng = Mulberry32::new(clock ^ std::process::id().rotate_left(16));
    rng.index_below(SEED_BOUND) as u32
}

/// Start hosting on a background thread. Returns the handle and the bound
/// address (useful when port 0 is used).
pub fn start_host(
    config: HostConfig,
    catalog: impl CardCatalog + Send + 'static,
) -> std::io::Result<(NodeHandle, SocketAddr)> {
    let listener = TcpListener::bind((config.bind.as_str(), config.port))?;
    let addr = listener.local_addr()?;
    listener.set_nonblocking(true)?;

    let seed = config.seed.unwrap_or_else(random_seed);
    let (tx, rx) = mpsc::channel();
    let keep_running = Arc::new(AtomicBool::new(true));

    let keep_running_listener = keep_running.clone();
    let tx_listener = tx.clone();
    thread::spawn(move || {
        while keep_running_listener.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, peer)) => {
                    debug!(%peer, "accepted connection");
                    stream.set_nonblocking(false).ok();
                    stream.set_nodelay(true).ok();
                    if tx_listener
                        .send(InternalEvent::NewConnection { stream })
                        .is_err()
                    {
                        break;
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(TICK);
                }
                Err(e) => {
                    warn!(error = %e, "listener failed");
                    break;
                }
            }
        }
    });

    info!(%addr, seed, "host listening");
    let handle = spawn_node(
        move || Session::host(seed, config.session, CachedCatalog::new(catalog)),
        tx,
        rx,
        keep_running,
    );
    Ok((handle, addr))
}

/// Join a hosted session. Connecting happens in the background; watch for
/// `Connected`, `ConnectionSlow`, or `SessionEnded`.
pub fn start_joiner(config: JoinConfig, catalog: impl CardCatalog + Send + 'static) -> NodeHandle {
    let (tx, rx) = mpsc::channel();
    let keep_running = Arc::new(AtomicBool::new(true));

    let addr = config.addr.clone();
    let tx_connect = tx.clone();
    thread::spawn(move || {
        let event = match TcpStream::connect(addr.as_str()) {
            Ok(stream) => {
                stream.set_nodelay(true).ok();
                InternalEvent::Connected { stream }
            }
            Err(e) => InternalEvent::ConnectFailed {
                reason: e.to_string(),
            },
        };
        let _ = tx_connect.send(event);
    });

    spawn_node(
        move || {
            let link = TcpLinkFactory.link_for(&config.addr);
            Session::joiner(link, config.session, CachedCatalog::new(catalog))
        },
        tx,
        rx,
        keep_running,
    )
}

/// Play alone. No sockets are opened.
pub fn start_single(
    seed: u32,
    catalog: impl CardCatalog + Send + 'static,
    config: SessionConfig,
) -> NodeHandle {
    let (tx, rx) = mpsc::channel();
    spawn_node(
        move || Session::single(seed, config, CachedCatalog::new(catalog)),
        tx,
        rx,
        Arc::new(AtomicBool::new(true)),
    )
}

fn spawn_node(
    build: impl FnOnce() -> Session<TcpLink> + Send + 'static,
    tx: Sender<InternalEvent>,
    rx: Receiver<InternalEvent>,
    keep_running: Arc<AtomicBool>,
) -> NodeHandle {
    let (events_tx, events) = mpsc::channel();
    let keep_running_node = keep_running.clone();
    let tx_node = tx.clone();
    let thread = thread::spawn(move || {
        let session = build();
        run_node(session, rx, tx_node, events_tx, keep_running_node);
    });
    NodeHandle {
        tx,
        events,
        keep_running,
        thread: Some(thread),
    }
}

/// Main loop. Runs until `keep_running` is cleared or a shutdown arrives.
fn run_node(
    mut session: Session<TcpLink>,
    rx: Receiver<InternalEvent>,
    tx: Sender<InternalEvent>,
    events_tx: Sender<SessionEvent>,
    keep_running: Arc<AtomicBool>,
) {
    forward_events(&mut session, &events_tx);
    while keep_running.load(Ordering::SeqCst) {
        let mut running = match rx.recv_timeout(TICK) {
            Ok(event) => handle_event(&mut session, event, &tx, &events_tx),
            Err(mpsc::RecvTimeoutError::Timeout) => true,
            Err(mpsc::RecvTimeoutError::Disconnected) => false,
        };
        // Drain any additional events that arrived during handling.
        while running {
            match rx.try_recv() {
                Ok(event) => running = handle_event(&mut session, event, &tx, &events_tx),
                Err(_) => break,
            }
        }
        session.check_connect_deadline(Instant::now());
        forward_events(&mut session, &events_tx);
        if !running {
            break;
        }
    }
    session.exit();
    forward_events(&mut session, &events_tx);
}

fn forward_events(session: &mut Session<TcpLink>, events_tx: &Sender<SessionEvent>) {
    for event in session.drain_events() {
        let _ = events_tx.send(event);
    }
}

/// Dispatch one event. Returns false when the node should stop.
fn handle_event(
    session: &mut Session<TcpLink>,
    event: InternalEvent,
    tx: &Sender<InternalEvent>,
    events_tx: &Sender<SessionEvent>,
) -> bool {
    match event {
        InternalEvent::NewConnection { stream } => handle_new_connection(session, stream, tx),
        InternalEvent::Connected { stream } => handle_connected(session, stream, tx),
        InternalEvent::ConnectFailed { reason } => {
            if let Some(id) = session.host_link_id() {
                let _ = session.handle_link_event(id, LinkEvent::Failed(reason));
            }
        }
        InternalEvent::Link { id, event } => {
            if let Err(e) = session.handle_link_event(id, event) {
                debug!(link = %id, error = %e, "link event not applied");
            }
        }
        InternalEvent::Command(command) => {
            if let Err(e) = run_command(session, command) {
                // Keep ordering: anything the session queued goes first.
                forward_events(session, events_tx);
                let _ = events_tx.send(SessionEvent::ActionRejected {
                    reason: e.to_string(),
                });
            }
        }
        InternalEvent::Shutdown => return false,
    }
    true
}

/// Host: wrap an accepted stream, hand it to the session, and start reading
/// if it was seated.
fn handle_new_connection(
    session: &mut Session<TcpLink>,
    stream: TcpStream,
    tx: &Sender<InternalEvent>,
) {
    let reader = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "could not clone accepted stream");
            return;
        }
    };
    let link = match TcpLink::from_stream(stream) {
        Ok(link) => link,
        Err(e) => {
            warn!(error = %e, "could not set up link");
            return;
        }
    };
    // A refused link has already been closed by the session.
    if let Ok(id) = session.accept_link(link) {
        spawn_reader(reader, id, tx.clone());
    }
}

/// Joiner: the connect completed; attach it to the pending host link.
fn handle_connected(session: &mut Session<TcpLink>, stream: TcpStream, tx: &Sender<InternalEvent>) {
    let Some(id) = session.host_link_id() else {
        return;
    };
    let reader = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            let _ = session.handle_link_event(id, LinkEvent::Failed(e.to_string()));
            return;
        }
    };
    let Some(link) = session.link_mut(id) else {
        return;
    };
    if let Err(e) = link.attach(stream) {
        let _ = session.handle_link_event(id, LinkEvent::Failed(e.to_string()));
        return;
    }
    spawn_reader(reader, id, tx.clone());
    let _ = session.handle_link_event(id, LinkEvent::Opened);
}

fn spawn_reader(stream: TcpStream, id: LinkId, tx: Sender<InternalEvent>) {
    thread::spawn(move || reader_loop(BufReader::new(stream), id, tx));
}

/// Reader loop for a single link. Runs in its own thread.
fn reader_loop(mut reader: BufReader<TcpStream>, id: LinkId, tx: Sender<InternalEvent>) {
    loop {
        match read_frame(&mut reader) {
            Ok(message) => {
                let event = LinkEvent::Received(message);
                if tx.send(InternalEvent::Link { id, event }).is_err() {
                    break; // Main thread is gone.
                }
            }
            Err(e) if e.is_recoverable() => {
                warn!(link = %id, error = %e, "skipping malformed frame");
            }
            Err(e) => {
                let event = if e.is_eof() {
                    LinkEvent::Closed
                } else {
                    LinkEvent::Failed(e.to_string())
                };
                let _ = tx.send(InternalEvent::Link { id, event });
                break;
            }
        }
    }
}

fn run_command(session: &mut Session<TcpLink>, command: LocalCommand) -> Result<(), SessionError> {
    match command {
        LocalCommand::CloseLobby => session.close_lobby(),
        LocalCommand::SelectCard(card) => session.select_card(&card),
        LocalCommand::Ask { category, value } => session.ask(category, &value),
        LocalCommand::Answer { affirmative } => session.answer(affirmative),
        LocalCommand::Guess { target, card } => {
            let target = match target {
                Some(target) => target,
                None => match session.opponents().as_slice() {
                    [only] => *only,
                    [] => return Err(SessionError::NoOpponents),
                    _ => return Err(SessionError::AmbiguousTarget),
                },
            };
            session.guess(target, &card)
        }
        LocalCommand::EndTurn => session.end_turn(),
        LocalCommand::Chat(message) => session.chat(message),
        LocalCommand::Eliminate(card) => session.eliminate(&card),
        LocalCommand::Exit => {
            session.exit();
            Ok(())
        }
    }
}
