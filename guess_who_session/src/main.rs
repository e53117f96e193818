// CLI entry point: a line-oriented console for playing Guess Who.
//
// Starts a single-player, host, or joiner node (see `node.rs`) and bridges
// it to the terminal. A stdin thread forwards typed lines to the main
// thread, which turns them into `LocalCommand`s and prints whatever
// `SessionEvent`s the node reports. Logs go to stderr so they do not
// interleave with the console on stdout; set `RUST_LOG` to change the level.
//
// The console keeps its own copy of the board for the `board` command: the
// cards from `CandidatesReady`, minus eliminations reported in `Answered`
// events and cards flipped here.
//
// Usage:
//   guess-who single [--seed N] [--catalog PATH]
//   guess-who host [OPTIONS]
//     --bind <ADDR>             Listen address (default: 127.0.0.1)
//     --port <PORT>             Listen port (default: 7979)
//     --seed <N>                Board seed (default: random)
//     --max-players <N>         Roster cap, host included (default: 8)
//     --catalog <PATH>          Catalog JSON (default: bundled Kanto list)
//   guess-who join [OPTIONS]
//     --addr <HOST:PORT>        Host to join (default: 127.0.0.1:7979)
//     --connect-timeout <SECS>  Advisory connect timeout (default: 10)
//     --catalog <PATH>

use std::collections::BTreeSet;
use std::io::BufRead;
use std::sync::mpsc;
use std::time::Duration;

use guess_who_protocol::{CardId, PlayerIndex, QuestionCategory};
use guess_who_session::catalog::StaticCatalog;
use guess_who_session::node::{
    HostConfig, JoinConfig, LocalCommand, NodeHandle, random_seed, start_host, start_joiner,
    start_single,
};
use guess_who_session::{SessionConfig, SessionEvent};
use tracing_subscriber::EnvFilter;

enum Mode {
    Single { seed: Option<u32> },
    Host(HostConfig),
    Join(JoinConfig),
}

struct Args {
    mode: Mode,
    catalog: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "guess_who=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args();
    let catalog = match &args.catalog {
        Some(path) => StaticCatalog::load(path).unwrap_or_else(|e| {
            eprintln!("Failed to load catalog {path}: {e}");
            std::process::exit(1);
        }),
        None => StaticCatalog::bundled(),
    };

    let handle = match args.mode {
        Mode::Single { seed } => {
            let seed = seed.unwrap_or_else(random_seed);
            println!("Single player, seed {seed}.");
            start_single(seed, catalog, SessionConfig::default())
        }
        Mode::Host(config) => match start_host(config, catalog) {
            Ok((handle, addr)) => {
                println!("Hosting on {addr}. Type `close` once everyone has joined.");
                handle
            }
            Err(e) => {
                eprintln!("Failed to start host: {e}");
                std::process::exit(1);
            }
        },
        Mode::Join(config) => {
            println!("Joining {}...", config.addr);
            start_joiner(config, catalog)
        }
    };

    run_console(handle);
}

/// Parse command-line arguments. Uses simple `std::env::args()` matching,
/// no clap dependency.
fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut mode = match args.get(1).map(String::as_str) {
        Some("single") => Mode::Single { seed: None },
        Some("host") => Mode::Host(HostConfig::default()),
        Some("join") => Mode::Join(JoinConfig::default()),
        Some("--help" | "-h") => {
            print_usage();
            std::process::exit(0);
        }
        _ => {
            print_usage();
            std::process::exit(1);
        }
    };
    let mut catalog = None;
    let mut i = 2;

    while i < args.len() {
        let flag = args[i].as_str();
        i += 1;
        let value = args.get(i).map(String::as_str);
        match (flag, &mut mode) {
            ("--catalog", _) => catalog = Some(required(flag, value).to_owned()),
            ("--seed", Mode::Single { seed }) => *seed = Some(parsed(flag, value)),
            ("--seed", Mode::Host(config)) => config.seed = Some(parsed(flag, value)),
            ("--bind", Mode::Host(config)) => config.bind = required(flag, value).to_owned(),
            ("--port", Mode::Host(config)) => config.port = parsed(flag, value),
            ("--max-players", Mode::Host(config)) => {
                config.session.max_players = parsed(flag, value);
            }
            ("--addr", Mode::Join(config)) => config.addr = required(flag, value).to_owned(),
            ("--connect-timeout", Mode::Join(config)) => {
                config.session.connect_timeout = Duration::from_secs(parsed(flag, value));
            }
            ("--help" | "-h", _) => {
                print_usage();
                std::process::exit(0);
            }
            (other, _) => {
                eprintln!("Unknown argument for this mode: {other}");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    Args { mode, catalog }
}

fn required<'a>(flag: &str, value: Option<&'a str>) -> &'a str {
    value.unwrap_or_else(|| {
        eprintln!("{flag} requires a value");
        std::process::exit(1);
    })
}

fn parsed<T: std::str::FromStr>(flag: &str, value: Option<&str>) -> T {
    value.and_then(|s| s.parse().ok()).unwrap_or_else(|| {
        eprintln!("{flag} requires a valid number");
        std::process::exit(1);
    })
}

fn print_usage() {
    println!("Usage: guess-who <single|host|join> [OPTIONS]");
    println!();
    println!("single:");
    println!("  --seed <N>                Board seed (default: random)");
    println!("host:");
    println!("  --bind <ADDR>             Listen address (default: 127.0.0.1)");
    println!("  --port <PORT>             Listen port (default: 7979)");
    println!("  --seed <N>                Board seed (default: random)");
    println!("  --max-players <N>         Roster cap, host included (default: 8)");
    println!("join:");
    println!("  --addr <HOST:PORT>        Host to join (default: 127.0.0.1:7979)");
    println!("  --connect-timeout <SECS>  Advisory connect timeout (default: 10)");
    println!("all modes:");
    println!("  --catalog <PATH>          Catalog JSON (default: bundled Kanto list)");
    println!("  --help, -h                Show this help");
}

fn print_commands() {
    println!("Commands:");
    println!("  close                     Close the lobby and deal (host)");
    println!("  select <card>             Commit your secret card");
    println!("  ask <type|color|stage> <value>");
    println!("  answer <yes|no>");
    println!("  guess <card> [player]     Player defaults to your only opponent");
    println!("  pass                      End your turn");
    println!("  chat <text>");
    println!("  flip <card>               Eliminate a card on your own board");
    println!("  board                     Show your board");
    println!("  quit");
}

/// The console's view of the local board.
#[derive(Default)]
struct Board {
    cards: Vec<CardId>,
    down: BTreeSet<CardId>,
}

impl Board {
    fn find(&self, name: &str) -> Option<&CardId> {
        let wanted = CardId::from(name);
        self.cards.iter().find(|c| c.matches(&wanted))
    }

    fn print(&self) {
        if self.cards.is_empty() {
            println!("No board yet.");
            return;
        }
        let live = self.cards.len() - self.down.len();
        println!("Board ({live} of {} left):", self.cards.len());
        for row in self.cards.chunks(6) {
            let line: Vec<String> = row
                .iter()
                .map(|c| {
                    if self.down.contains(c) {
                        format!("{:<14}", format!("[{}]", c.as_str()))
                    } else {
                        format!("{:<14}", c.as_str())
                    }
                })
                .collect();
            println!("  {}", line.join(" ").trim_end());
        }
    }
}

fn run_console(handle: NodeHandle) {
    let (lines_tx, lines) = mpsc::channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if lines_tx.send(line).is_err() {
                break;
            }
        }
    });

    print_commands();
    let mut board = Board::default();
    let mut quitting = false;
    while !quitting {
        match lines.recv_timeout(Duration::from_millis(100)) {
            Ok(line) => match parse_command(&line, &mut board) {
                Ok(Some(command)) => {
                    quitting = command == LocalCommand::Exit;
                    handle.send(command);
                }
                Ok(None) => {}
                Err(message) => println!("{message}"),
            },
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => quitting = true,
        }
        for event in handle.poll() {
            if matches!(event, SessionEvent::SessionEnded { .. }) {
                quitting = true;
            }
            report(&event, &mut board);
        }
    }
    handle.stop();
}

/// Turn one console line into a command. `Ok(None)` for lines handled
/// locally.
fn parse_command(line: &str, board: &mut Board) -> Result<Option<LocalCommand>, String> {
    let line = line.trim();
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    let command = match word {
        "" => return Ok(None),
        "help" | "?" => {
            print_commands();
            return Ok(None);
        }
        "board" => {
            board.print();
            return Ok(None);
        }
        "close" => LocalCommand::CloseLobby,
        "select" => LocalCommand::SelectCard(card_arg(rest)?),
        "ask" => {
            let (category, value) = rest
                .split_once(' ')
                .ok_or("usage: ask <type|color|stage> <value>")?;
            let category = QuestionCategory::parse(category)
                .ok_or_else(|| format!("unknown category {category:?}"))?;
            LocalCommand::Ask {
                category,
                value: value.trim().to_owned(),
            }
        }
        "answer" => match rest.to_lowercase().as_str() {
            "yes" | "y" | "si" | "sí" => LocalCommand::Answer { affirmative: true },
            "no" | "n" => LocalCommand::Answer { affirmative: false },
            _ => return Err("usage: answer <yes|no>".into()),
        },
        "guess" => {
            let mut parts = rest.split_whitespace();
            let card = card_arg(parts.next().unwrap_or(""))?;
            let target = match parts.next() {
                Some(p) => Some(player_arg(p)?),
                None => None,
            };
            LocalCommand::Guess { target, card }
        }
        "pass" => LocalCommand::EndTurn,
        "chat" => LocalCommand::Chat(rest.to_owned()),
        "flip" => {
            let card = board
                .find(rest)
                .cloned()
                .ok_or_else(|| format!("{rest:?} is not on your board"))?;
            board.down.insert(card.clone());
            LocalCommand::Eliminate(card)
        }
        "quit" | "exit" => LocalCommand::Exit,
        other => return Err(format!("unknown command {other:?}; try `help`")),
    };
    Ok(Some(command))
}

fn card_arg(arg: &str) -> Result<CardId, String> {
    if arg.is_empty() {
        Err("a card name is required".into())
    } else {
        Ok(CardId::from(arg))
    }
}

fn player_arg(arg: &str) -> Result<PlayerIndex, String> {
    arg.trim_start_matches(['P', 'p'])
        .parse()
        .map(PlayerIndex)
        .map_err(|_| format!("{arg:?} is not a player number"))
}

fn report(event: &SessionEvent, board: &mut Board) {
    match event {
        SessionEvent::Connected => println!("Connected to host."),
        SessionEvent::ConnectionSlow => println!("Still connecting to host..."),
        SessionEvent::Assigned { index } => println!("You are {index}."),
        SessionEvent::CandidatesReady { seed, cards } => {
            board.cards = cards.clone();
            board.down.clear();
            println!("Board dealt from seed {seed}. Pick your secret with `select <card>`.");
            board.print();
        }
        SessionEvent::PlayerJoined { index } => println!("{index} joined."),
        SessionEvent::PlayerLeft { index } => println!("{index} left."),
        SessionEvent::PlayerReady { index } => println!("{index} is ready."),
        SessionEvent::LobbyClosed => println!("Lobby closed."),
        SessionEvent::GameStarted => println!("Everyone is ready. Game on!"),
        SessionEvent::TurnChanged {
            current,
            is_my_turn,
        } => {
            if *is_my_turn {
                println!("Your turn: `ask`, `guess`, or `pass`.");
            } else {
                println!("{current}'s turn.");
            }
        }
        SessionEvent::QuestionAsked { from, text, .. } => println!("{from} asks: {text}"),
        SessionEvent::Answered {
            from,
            affirmative,
            question,
            eliminated,
        } => {
            let reply = if *affirmative { "yes" } else { "no" };
            println!(
                "{from} answered {reply} to \"{question}\" ({} cards eliminated).",
                eliminated.len()
            );
            board.down.extend(eliminated.iter().cloned());
        }
        SessionEvent::GuessMade { from, target, card } => {
            println!("{from} guesses {target} has {card}.");
        }
        SessionEvent::GuessFailed { guesser, card, .. } => {
            println!("Wrong: it is not {card}. {guesser}'s guess failed.");
        }
        SessionEvent::GameOver { winner, loser, won } => {
            if *won {
                println!("You guessed {loser}'s card. You win!");
            } else {
                println!("{winner} guessed {loser}'s card. Game over.");
            }
        }
        SessionEvent::Chat { from, message } => println!("<{from}> {message}"),
        SessionEvent::SessionEnded { reason } => println!("Session ended: {reason}."),
        SessionEvent::ActionRejected { reason } => println!("Not allowed: {reason}."),
    }
}
