// guess_who_protocol: wire protocol for Guess Who multiplayer sessions.
//
// This crate defines the message taxonomy, value types, and framing that
// participants exchange over their point-to-point links. It is shared by the
// session coordinator (`guess_who_session`) and by test clients, and has no
// dependency on either.
//
// Module overview:
// - `types.rs`:    `PlayerIndex`, `CardId`, `QuestionCategory` (with the
//                  fixed question vocabulary), `Response`.
// - `message.rs`:  The `Message` enum covering every kind in both directions,
//                  plus relay/host-only classification helpers.
// - `framing.rs`:  Length-delimited JSON frames over any `Read`/`Write`.
//
// Design decisions:
// - **JSON, internally tagged.** Kind names follow the browser client
//   (`{"type":"SEED","value":12345}`). Its legacy field names are accepted
//   on input (`pokemon` for the guessed card, missing `from`/`target`);
//   output always uses this crate's names, so the browser client itself
//   cannot join a game.
// - **Unknown kinds decode.** They become `Message::Unknown` and the router
//   drops them, keeping older builds compatible with newer peers.
// - **No async runtime.** Framing uses `std::io`, compatible with blocking
//   TCP streams and in-memory buffers alike.

pub mod framing;
pub mod message;
pub mod types;

pub use framing::{FrameError, MAX_FRAME_SIZE, read_frame, write_frame};
pub use message::Message;
pub use types::{CardId, PlayerIndex, QuestionCategory, Response};

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    /// Frame a message, read it back, and compare.
    fn roundtrip(msg: &Message) {
        let mut wire = Vec::new();
        write_frame(&mut wire, msg).unwrap();
        let mut cursor = Cursor::new(&wire);
        let recovered = read_frame(&mut cursor).unwrap();
        assert_eq!(&recovered, msg);
    }

    #[test]
    fn gameplay_exchange_survives_framing() {
        roundtrip(&Message::Question {
            from: PlayerIndex(2),
            text: QuestionCategory::Type.question_text("Fire"),
            category: QuestionCategory::Type,
            value: "Fire".into(),
        });
        roundtrip(&Message::Guess {
            from: PlayerIndex(2),
            target: PlayerIndex(1),
            card: CardId::from("charmander"),
        });
        roundtrip(&Message::Lose {
            from: PlayerIndex(1),
            guesser: PlayerIndex(2),
            card: CardId::from("charmander"),
        });
        roundtrip(&Message::CorrectGuess {
            from: PlayerIndex(1),
            guesser: PlayerIndex(3),
        });
    }

    #[test]
    fn unknown_kind_survives_framing_as_unknown() {
        let payload = br#"{"type":"SPECTATE","seat":4}"#;
        let mut wire = (payload.len() as u32).to_be_bytes().to_vec();
        wire.extend_from_slice(payload);
        let mut cursor = Cursor::new(wire);
        assert_eq!(read_frame(&mut cursor).unwrap(), Message::Unknown);
    }
}
