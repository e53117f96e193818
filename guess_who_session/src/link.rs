// Point-to-point links between participants.
//
// A `PeerLink` owns the sending half of one ordered, reliable channel to one
// remote participant. The session never reads from links directly: whoever
// runs the transport (the TCP node, or a test pump) feeds inbound traffic
// and lifecycle changes back in as `LinkEvent`s tagged with the `LinkId` the
// session assigned when the link was registered.
//
// Implementations:
// - `TcpLink`: framed JSON over a `TcpStream`. It can be created pending
//   (no stream yet) and attached once the connect completes, which is how a
//   joiner's link to the host starts life. Closing shuts the socket down in
//   both directions so the transport's reader thread sees EOF.
// - `ChannelLink`: an `mpsc` sender of whole `Message`s, for in-process
//   play and tests.
//
// Sending never retries. A send on a link that is not open fails with
// `LinkError::NotOpen`, and the session treats any send failure as a
// dropped message.

use std::fmt;
use std::io::{BufWriter, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::mpsc::{self, Receiver, Sender};

use guess_who_protocol::{Message, write_frame};

use crate::error::LinkError;

/// Session-local handle for one registered link.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(pub u32);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link#{}", self.0)
    }
}

/// Lifecycle and traffic reported by a transport for one link.
#[derive(Clone, Debug, PartialEq)]
pub enum LinkEvent {
    Opened,
    Received(Message),
    Closed,
    Failed(String),
}

pub trait PeerLink {
    /// Identifier of the remote end (an address, or a test label).
    fn remote_id(&self) -> &str;

    fn is_open(&self) -> bool;

    fn send(&mut self, message: &Message) -> Result<(), LinkError>;

    /// Stop sending. Idempotent.
    fn close(&mut self);
}

/// Produces links keyed by a remote identifier.
pub trait LinkFactory {
    type Link: PeerLink;

    fn link_for(&mut self, remote: &str) -> Self::Link;
}

pub struct TcpLink {
    remote: String,
    stream: Option<TcpStream>,
    writer: Option<BufWriter<TcpStream>>,
}

impl TcpLink {
    /// A link with no stream yet. Sends fail until `attach`.
    pub fn pending(remote: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            stream: None,
            writer: None,
        }
    }

    /// Wrap an already connected stream.
    pub fn from_stream(stream: TcpStream) -> std::io::Result<Self> {
        let remote = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".into());
        let mut link = Self::pending(remote);
        link.attach(stream)?;
        Ok(link)
    }

    /// Install the connected stream. The caller keeps its own clone for
    /// reading.
    pub fn attach(&mut self, stream: TcpStream) -> std::io::Result<()> {
        let write_half = stream.try_clone()?;
        self.writer = Some(BufWriter::new(write_half));
        self.stream = Some(stream);
        Ok(())
    }
}

impl PeerLink for TcpLink {
    fn remote_id(&self) -> &str {
        &self.remote
    }

    fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    fn send(&mut self, message: &Message) -> Result<(), LinkError> {
        let writer = self.writer.as_mut().ok_or_else(|| LinkError::NotOpen {
            remote: self.remote.clone(),
        })?;
        write_frame(writer, message)?;
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

impl Drop for TcpLink {
    fn drop(&mut self) {
        self.close();
    }
}

/// Creates pending `TcpLink`s; the remote identifier is the address to dial.
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpLinkFactory;

impl LinkFactory for TcpLinkFactory {
    type Link = TcpLink;

    fn link_for(&mut self, remote: &str) -> TcpLink {
        TcpLink::pending(remote)
    }
}

/// In-process link. Whatever is sent shows up on the paired `Receiver`.
pub struct ChannelLink {
    remote: String,
    tx: Option<Sender<Message>>,
}

impl ChannelLink {
    pub fn new(remote: impl Into<String>) -> (Self, Receiver<Message>) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                remote: remote.into(),
                tx: Some(tx),
            },
            rx,
        )
    }
}

impl PeerLink for ChannelLink {
    fn remote_id(&self) -> &str {
        &self.remote
    }

    fn is_open(&self) -> bool {
        self.tx.is_some()
    }

    fn send(&mut self, message: &Message) -> Result<(), LinkError> {
        let not_open = || LinkError::NotOpen {
            remote: self.remote.clone(),
        };
        let tx = self.tx.as_ref().ok_or_else(not_open)?;
        tx.send(message.clone()).map_err(|_| not_open())
    }

    fn close(&mut self) {
        self.tx = None;
    }
}

#[cfg(test)]
mod tests {
    use std::io::BufReader;
    use std::net::TcpListener;

    use guess_who_protocol::{PlayerIndex, read_frame};

    use super::*;

    fn tcp_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    #[test]
    fn channel_link_delivers_in_order_until_closed() {
        let (mut link, rx) = ChannelLink::new("peer");
        assert!(link.is_open());
        link.send(&Message::Ready).unwrap();
        link.send(&Message::TurnPass).unwrap();
        assert_eq!(rx.try_recv().unwrap(), Message::Ready);
        assert_eq!(rx.try_recv().unwrap(), Message::TurnPass);

        link.close();
        assert!(!link.is_open());
        assert!(matches!(
            link.send(&Message::Ready),
            Err(LinkError::NotOpen { .. })
        ));
    }

    #[test]
    fn channel_link_send_fails_when_receiver_dropped() {
        let (mut link, rx) = ChannelLink::new("gone");
        drop(rx);
        assert!(link.send(&Message::Ready).is_err());
    }

    #[test]
    fn pending_tcp_link_is_not_open() {
        let mut link = TcpLinkFactory.link_for("127.0.0.1:1");
        assert_eq!(link.remote_id(), "127.0.0.1:1");
        assert!(!link.is_open());
        assert!(matches!(
            link.send(&Message::Ready),
            Err(LinkError::NotOpen { .. })
        ));
    }

    #[test]
    fn tcp_link_frames_messages() {
        let (client, server) = tcp_pair();
        let mut link = TcpLink::pending("host");
        link.attach(client).unwrap();
        assert!(link.is_open());

        let msg = Message::NextTurn {
            player_index: PlayerIndex(2),
        };
        link.send(&msg).unwrap();

        let mut reader = BufReader::new(server);
        assert_eq!(read_frame(&mut reader).unwrap(), msg);
    }

    #[test]
    fn closing_tcp_link_ends_the_remote_stream() {
        let (client, server) = tcp_pair();
        let mut link = TcpLink::from_stream(server).unwrap();
        link.close();
        assert!(!link.is_open());

        let mut reader = BufReader::new(client);
        assert!(read_frame(&mut reader).unwrap_err().is_eof());
    }
}
