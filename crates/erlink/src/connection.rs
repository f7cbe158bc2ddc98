//! A framed TCP connection to one peer node.
//!
//! Every frame is a big-endian `u32` length followed by that many bytes
//! of payload; a zero length is a keepalive tick. The payload is a
//! control tuple in the external term format, followed, for the
//! data-bearing kinds, by the payload term.
//!
//! Each connection runs one receive worker thread. The worker reads
//! with a 500 ms socket timeout so a shutdown request is observed
//! promptly, silently discards ticks, verifies the control tuple's
//! cookie, and hands decoded [`Message`]s to the owning node's
//! dispatcher. The socket is guarded by a mutex shared between the
//! worker and concurrent senders.

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use erlink_term::{codec, Buffer, Pid, Term};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::error::NodeError;
use crate::message::{
    Message, Recipient, CTRL_EXIT, CTRL_LINK, CTRL_REG_SEND, CTRL_SEND, CTRL_UNLINK,
};
use crate::node::Node;

/// How long a socket read blocks before the worker rechecks its exit
/// flag.
const READ_WINDOW: Duration = Duration::from_millis(500);

/// A connection to one peer, identified by the peer's node name.
pub struct Connection {
    peer: String,
    cookie: String,
    stream: Mutex<TcpStream>,
    exit: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    /// Wraps an established, handshaken socket.
    pub(crate) fn new(
        peer: String,
        cookie: String,
        stream: TcpStream,
    ) -> Result<Connection, NodeError> {
        stream.set_read_timeout(Some(READ_WINDOW))?;
        Ok(Connection {
            peer,
            cookie,
            stream: Mutex::new(stream),
            exit: AtomicBool::new(false),
            worker: Mutex::new(None),
        })
    }

    /// The peer's node name.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Starts the receive worker, delivering into `node`.
    pub(crate) fn start(self: &Arc<Self>, node: Weak<Node>) {
        let conn = Arc::clone(self);
        let handle = std::thread::spawn(move || conn.receive_loop(node));
        *self.worker.lock() = Some(handle);
    }

    /// Asks the worker to exit and joins it.
    pub(crate) fn stop(&self) {
        self.exit.store(true, Ordering::Relaxed);
        {
            let stream = self.stream.lock();
            let _ = stream.shutdown(Shutdown::Both);
        }
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            // The worker itself can end up here when dropping the last
            // node reference; a thread cannot join itself.
            if handle.thread().id() != std::thread::current().id() {
                let _ = handle.join();
            }
        }
    }

    /// Encodes and writes a pid-addressed payload as one frame.
    pub(crate) fn send_to_pid(&self, to: &Pid, term: &Term) -> Result<(), NodeError> {
        let control = Term::tuple(vec![
            Term::Long(CTRL_SEND),
            Term::atom(self.cookie.as_str())?,
            Term::Pid(to.clone()),
        ]);
        self.send_frame(&control, Some(term))
    }

    /// Encodes and writes a name-addressed payload as one frame.
    pub(crate) fn send_to_name(
        &self,
        from: &Pid,
        name: &str,
        term: &Term,
    ) -> Result<(), NodeError> {
        let control = Term::tuple(vec![
            Term::Long(CTRL_REG_SEND),
            Term::Pid(from.clone()),
            Term::atom(self.cookie.as_str())?,
            Term::atom(name)?,
        ]);
        self.send_frame(&control, Some(term))
    }

    fn send_frame(&self, control: &Term, payload: Option<&Term>) -> Result<(), NodeError> {
        let mut body = Buffer::new();
        codec::encode_term(control, &mut body, true)?;
        if let Some(payload) = payload {
            codec::encode_term(payload, &mut body, true)?;
        }
        let bytes = body.as_slice();
        let mut frame = Vec::with_capacity(4 + bytes.len());
        frame.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        frame.extend_from_slice(bytes);

        let mut stream = self.stream.lock();
        stream.write_all(&frame)?;
        Ok(())
    }

    fn receive_loop(self: Arc<Self>, node: Weak<Node>) {
        debug!(peer = %self.peer, "receive worker started");
        loop {
            if self.exit.load(Ordering::Relaxed) {
                break;
            }
            let frame = match self.read_frame() {
                Ok(Some(frame)) => frame,
                // Shutdown observed mid-read.
                Ok(None) => break,
                Err(err) => {
                    if !self.exit.load(Ordering::Relaxed) {
                        self.deliver(&node, Message::Error { to: None, error: err });
                    }
                    break;
                }
            };
            if frame.is_empty() {
                trace!(peer = %self.peer, "tick");
                continue;
            }
            match self.decode_frame(&frame) {
                Ok(msg) => {
                    if !self.deliver(&node, msg) {
                        break;
                    }
                }
                // A malformed term inside a well-framed message is
                // reported but does not desync the stream.
                Err(err @ NodeError::Term(_)) => {
                    if !self.deliver(&node, Message::Error { to: None, error: err }) {
                        break;
                    }
                }
                // Anything else (unknown control opcode, non-tuple
                // control) ends the conversation.
                Err(err) => {
                    self.deliver(&node, Message::Error { to: None, error: err });
                    break;
                }
            }
        }
        debug!(peer = %self.peer, "receive worker exited");
    }

    /// Hands a message to the node. Returns false when the node is gone
    /// and the worker should stop.
    fn deliver(&self, node: &Weak<Node>, msg: Message) -> bool {
        match node.upgrade() {
            Some(node) => {
                node.deliver(&self.peer, msg);
                true
            }
            None => false,
        }
    }

    /// Reads one length-prefixed frame. Returns `None` when shutdown
    /// was requested before the frame completed.
    fn read_frame(&self) -> Result<Option<Vec<u8>>, NodeError> {
        let mut header = [0u8; 4];
        if !self.read_exact_interruptible(&mut header)? {
            return Ok(None);
        }
        let len = u32::from_be_bytes(header) as usize;
        let mut payload = vec![0u8; len];
        if len > 0 && !self.read_exact_interruptible(&mut payload)? {
            return Ok(None);
        }
        Ok(Some(payload))
    }

    /// Fills `buf`, waking every read window to recheck the exit flag.
    /// Returns false if shutdown was requested first.
    fn read_exact_interruptible(&self, buf: &mut [u8]) -> Result<bool, NodeError> {
        let mut filled = 0;
        while filled < buf.len() {
            if self.exit.load(Ordering::Relaxed) {
                return Ok(false);
            }
            let mut stream = self.stream.lock();
            match stream.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(NodeError::Connection("peer closed the connection".into()))
                }
                Ok(n) => filled += n,
                Err(err)
                    if err.kind() == ErrorKind::WouldBlock
                        || err.kind() == ErrorKind::TimedOut => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(true)
    }

    /// Decodes a frame into a typed message, checking the cookie.
    fn decode_frame(&self, frame: &[u8]) -> Result<Message, NodeError> {
        let mut buf = Buffer::from_slice(frame);
        let control = codec::decode_term(&mut buf)?;
        let ctrl = match &control {
            Term::Tuple(t) => t,
            other => {
                return Err(NodeError::Connection(format!(
                    "control message is not a tuple: {}",
                    other
                )))
            }
        };
        let opcode = ctrl
            .element_at(0)
            .ok()
            .and_then(|t| t.long_value())
            .ok_or_else(|| {
                NodeError::Connection("control tuple has no numeric opcode".into())
            })?;

        match opcode {
            CTRL_SEND => {
                // {SEND, Cookie, ToPid}
                let cookie = expect_atom(ctrl.element_at(1)?)?;
                let to = expect_pid(ctrl.element_at(2)?)?;
                if let Some(err) = self.check_cookie(cookie, Recipient::Pid(to.clone())) {
                    return Ok(err);
                }
                let payload = codec::decode_term(&mut buf)?;
                Ok(Message::Send { to, payload })
            }
            CTRL_REG_SEND => {
                // {REG_SEND, FromPid, Cookie, ToName}
                let from = expect_pid(ctrl.element_at(1)?)?;
                let cookie = expect_atom(ctrl.element_at(2)?)?;
                let to_name = expect_atom(ctrl.element_at(3)?)?.to_string();
                if let Some(err) = self.check_cookie(cookie, Recipient::Name(to_name.clone())) {
                    return Ok(err);
                }
                let payload = codec::decode_term(&mut buf)?;
                Ok(Message::RegSend {
                    from,
                    to_name,
                    payload,
                })
            }
            CTRL_LINK => Ok(Message::Link {
                from: expect_pid(ctrl.element_at(1)?)?,
                to: expect_pid(ctrl.element_at(2)?)?,
            }),
            CTRL_UNLINK => Ok(Message::Unlink {
                from: expect_pid(ctrl.element_at(1)?)?,
                to: expect_pid(ctrl.element_at(2)?)?,
            }),
            CTRL_EXIT => Ok(Message::Exit {
                from: expect_pid(ctrl.element_at(1)?)?,
                to: expect_pid(ctrl.element_at(2)?)?,
                reason: ctrl.element_at(3)?.clone(),
            }),
            other => Err(NodeError::Connection(format!(
                "unknown control opcode {}",
                other
            ))),
        }
    }

    /// On mismatch, the auth failure travels to the addressed mailbox
    /// as a message and the offending payload is dropped; the
    /// connection stays up.
    fn check_cookie(&self, presented: &str, to: Recipient) -> Option<Message> {
        if presented == self.cookie {
            return None;
        }
        warn!(peer = %self.peer, "cookie mismatch");
        Some(Message::Error {
            to: Some(to),
            error: NodeError::Auth(format!(
                "cookie mismatch: peer '{}' presented '{}'",
                self.peer, presented
            )),
        })
    }
}

fn expect_atom(term: &Term) -> Result<&str, NodeError> {
    term.atom_value()
        .ok_or_else(|| NodeError::Connection(format!("expected atom, found {}", term)))
}

fn expect_pid(term: &Term) -> Result<Pid, NodeError> {
    match term {
        Term::Pid(pid) => Ok(pid.clone()),
        other => Err(NodeError::Connection(format!(
            "expected pid, found {}",
            other
        ))),
    }
}
