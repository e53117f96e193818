// Integration smoke test for the host node.
//
// Starts a host on localhost and plays a whole two-player game against it
// from a mock joiner: a plain TCP socket speaking the protocol crate's
// framing, with no session code on that side. Covers seating, the seed
// hand-off, sender stamping, lobby close, readiness, an answered question,
// a wrong guess, a winning guess, chat after the game, and disconnect.

use std::io::{BufReader, BufWriter};
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use guess_who_protocol::{
    CardId, Message, PlayerIndex, QuestionCategory, Response, read_frame, write_frame,
};
use guess_who_session::catalog::StaticCatalog;
use guess_who_session::node::{HostConfig, LocalCommand, NodeHandle, start_host};
use guess_who_session::{SessionConfig, SessionEvent};

const SEED: u32 = 12345;

struct MockJoiner {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl MockJoiner {
    fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let reader = BufReader::new(stream.try_clone().unwrap());
        Self {
            reader,
            writer: BufWriter::new(stream),
        }
    }

    fn send(&mut self, msg: &Message) {
        write_frame(&mut self.writer, msg).unwrap();
    }

    fn recv(&mut self) -> Message {
        read_frame(&mut self.reader).unwrap()
    }
}

/// Poll the host until an event matching `pred` shows up. Events seen on
/// the way are returned too, in order, ending with the match.
fn wait_for(handle: &NodeHandle, pred: impl Fn(&SessionEvent) -> bool) -> Vec<SessionEvent> {
    let start = Instant::now();
    let mut seen = Vec::new();
    loop {
        assert!(
            start.elapsed() < Duration::from_secs(5),
            "timed out; host events so far: {seen:?}"
        );
        for event in handle.poll() {
            let done = pred(&event);
            seen.push(event);
            if done {
                return seen;
            }
        }
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn full_game_against_a_raw_joiner() {
    // 1. Host on a free port with a fixed seed.
    let config = HostConfig {
        port: 0,
        seed: Some(SEED),
        session: SessionConfig::default(),
        ..HostConfig::default()
    };
    let (handle, addr) = start_host(config, StaticCatalog::bundled()).unwrap();

    // 2. Seating: seat, roster, then the seed.
    let mut joiner = MockJoiner::connect(addr);
    match joiner.recv() {
        Message::AssignId { id, players } => {
            assert_eq!(id, PlayerIndex(2));
            assert_eq!(players, vec![PlayerIndex(1), PlayerIndex(2)]);
        }
        other => panic!("expected ASSIGN_ID, got {other:?}"),
    }
    assert_eq!(joiner.recv(), Message::Seed { value: SEED });
    wait_for(&handle, |e| {
        matches!(e, SessionEvent::PlayerJoined { index } if *index == PlayerIndex(2))
    });

    // 3. A forged `from` is replaced with the link's seat.
    joiner.send(&Message::Chat {
        from: PlayerIndex(7),
        message: "hello".into(),
    });
    wait_for(&handle, |e| {
        matches!(e, SessionEvent::Chat { from, message }
            if *from == PlayerIndex(2) && message == "hello")
    });

    // 4. Close the lobby; both sides deal the same board.
    handle.send(LocalCommand::CloseLobby);
    assert_eq!(joiner.recv(), Message::LobbyClosed);
    let events = wait_for(&handle, |e| matches!(e, SessionEvent::CandidatesReady { .. }));
    let cards = match events.last() {
        Some(SessionEvent::CandidatesReady { seed, cards }) => {
            assert_eq!(*seed, SEED);
            cards.clone()
        }
        other => panic!("expected CandidatesReady, got {other:?}"),
    };
    assert_eq!(cards.len(), 30);
    let host_secret = cards[0].clone();
    let wrong_card = cards[1].clone();

    // 5. Both commit; the host starts and gives itself the first turn.
    handle.send(LocalCommand::SelectCard(host_secret.clone()));
    joiner.send(&Message::Ready);
    assert_eq!(joiner.recv(), Message::StartGame);
    assert_eq!(
        joiner.recv(),
        Message::NextTurn {
            player_index: PlayerIndex(1)
        }
    );

    // 6. Out-of-turn question is dropped; the host's own question goes out.
    joiner.send(&Message::Question {
        from: PlayerIndex(2),
        text: "Is it Red Color?".into(),
        category: QuestionCategory::Color,
        value: "Red".into(),
    });
    handle.send(LocalCommand::Ask {
        category: QuestionCategory::Type,
        value: "fire".into(),
    });
    let (text, category, value) = match joiner.recv() {
        Message::Question {
            from,
            text,
            category,
            value,
        } => {
            assert_eq!(from, PlayerIndex(1));
            assert_eq!(text, "Is it Fire Type?");
            (text, category, value)
        }
        other => panic!("expected QUESTION, got {other:?}"),
    };

    // 7. Answering ends the host's turn.
    joiner.send(&Message::Answer {
        from: PlayerIndex(2),
        response: Response::No,
        original_question: text,
        category,
        value,
    });
    assert_eq!(
        joiner.recv(),
        Message::NextTurn {
            player_index: PlayerIndex(2)
        }
    );
    let events = wait_for(&handle, |e| matches!(e, SessionEvent::Answered { .. }));
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, SessionEvent::QuestionAsked { from, .. } if from.0 == 2)),
        "out-of-turn question was applied: {events:?}"
    );

    // 8. A wrong guess against the host: LOSE, then the turn goes to the host.
    joiner.send(&Message::Guess {
        from: PlayerIndex(2),
        target: PlayerIndex(1),
        card: wrong_card.clone(),
    });
    match joiner.recv() {
        Message::Lose {
            from,
            guesser,
            card,
        } => {
            assert_eq!(from, PlayerIndex(1));
            assert_eq!(guesser, PlayerIndex(2));
            assert_eq!(card, wrong_card);
        }
        other => panic!("expected LOSE, got {other:?}"),
    }
    assert_eq!(
        joiner.recv(),
        Message::NextTurn {
            player_index: PlayerIndex(1)
        }
    );

    // 9. Host passes; the joiner names the host's card and wins.
    handle.send(LocalCommand::EndTurn);
    assert_eq!(
        joiner.recv(),
        Message::NextTurn {
            player_index: PlayerIndex(2)
        }
    );
    joiner.send(&Message::Guess {
        from: PlayerIndex(2),
        target: PlayerIndex(1),
        card: CardId::new(host_secret.as_str().to_uppercase()),
    });
    assert_eq!(
        joiner.recv(),
        Message::CorrectGuess {
            from: PlayerIndex(1),
            guesser: PlayerIndex(2),
        }
    );
    wait_for(&handle, |e| {
        matches!(e, SessionEvent::GameOver { winner, loser, won: false }
            if *winner == PlayerIndex(2) && *loser == PlayerIndex(1))
    });

    // 10. Chat still flows after the game; then the joiner hangs up.
    joiner.send(&Message::Chat {
        from: PlayerIndex(2),
        message: "gg".into(),
    });
    wait_for(&handle, |e| matches!(e, SessionEvent::Chat { message, .. } if message == "gg"));
    drop(joiner);
    wait_for(&handle, |e| {
        matches!(e, SessionEvent::PlayerLeft { index } if *index == PlayerIndex(2))
    });

    handle.stop();
}

#[test]
fn joins_after_lobby_close_are_refused() {
    let config = HostConfig {
        port: 0,
        seed: Some(SEED),
        ..HostConfig::default()
    };
    let (handle, addr) = start_host(config, StaticCatalog::bundled()).unwrap();

    let mut first = MockJoiner::connect(addr);
    assert!(matches!(first.recv(), Message::AssignId { .. }));
    assert_eq!(first.recv(), Message::Seed { value: SEED });
    wait_for(&handle, |e| matches!(e, SessionEvent::PlayerJoined { .. }));

    handle.send(LocalCommand::CloseLobby);
    assert_eq!(first.recv(), Message::LobbyClosed);

    // The late link is closed without a seat.
    let mut late = MockJoiner::connect(addr);
    let err = read_frame(&mut late.reader).unwrap_err();
    assert!(err.is_eof(), "expected EOF, got {err:?}");

    handle.stop();
}
