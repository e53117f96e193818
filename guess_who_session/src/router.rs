// Inbound message dispatch.
//
// Every message a transport delivers goes through `dispatch`: unknown kinds
// are dropped, the session admits or rejects the message (resolving the
// sender from the link it arrived on), the host re-broadcasts accepted
// relayed kinds to everyone except the originator, and finally the session
// applies it. Rejected messages are logged and neither applied nor relayed.
//
// The relay happens before the local apply so that anything the host emits
// in reaction (a `NEXT_TURN` after an answer, a `LOSE` after a guess against
// the host) reaches each joiner after the message that caused it.

use guess_who_protocol::Message;
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::link::{LinkId, PeerLink};
use crate::session::{Role, Session};

pub fn dispatch<L: PeerLink>(
    session: &mut Session<L>,
    source: LinkId,
    message: Message,
) -> Result<(), SessionError> {
    if message == Message::Unknown {
        debug!(link = %source, "ignoring unknown message kind");
        return Ok(());
    }
    let kind = message.kind();
    let (sender, message) = match session.admit(source, message) {
        Ok(admitted) => admitted,
        Err(e) => {
            warn!(link = %source, kind, error = %e, "rejected inbound message");
            return Err(e);
        }
    };
    debug!(link = %source, player = %sender, kind, "dispatching");
    if session.role() == Role::Host && message.is_relayed() {
        session.relay(source, &message);
    }
    session.apply(sender, message);
    Ok(())
}
