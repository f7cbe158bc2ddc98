//! The local node: identity, identifier minting and message routing.
//!
//! [`LocalNode`] owns the node's identity (name, cookie, creation) and
//! mints pids, ports and references. [`Node`] adds the dispatcher: the
//! pid and name registries of mailboxes, the pool of per-peer
//! connections, and the accept worker that admits inbound peers.
//!
//! Routing is on demand: sending to an unknown peer dials it through
//! the transport and caches the connection. Sending to the local node
//! never touches the network; the message is enqueued synchronously in
//! the sender's thread.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use erlink_term::{Pid, Port, Ref, Term};
use parking_lot::Mutex;
use rand::Rng;
use tracing::{debug, error, info, warn};

use crate::connection::Connection;
use crate::error::NodeError;
use crate::mailbox::Mailbox;
use crate::message::{Message, Recipient};
use crate::transport::{self, Transport, TransportRegistry};

/// How long the accept worker waits per accept call before rechecking
/// the exit flag.
const ACCEPT_WINDOW: Duration = Duration::from_millis(500);

/// Pid id field width: ids wrap at 15 bits, advancing the serial.
const PID_ID_MASK: u32 = 0x7fff;
/// Pid serial field width.
const PID_SERIAL_MASK: u32 = 0x1fff;
/// Reference first-word width.
const REF_ID_MASK: u32 = 0x3ffff;

#[derive(Default)]
struct PidSeq {
    id: u32,
    serial: u32,
}

/// Identity and identifier minting for one node.
///
/// The tuple (node, id, serial, creation) of every minted pid is unique
/// for the node's lifetime.
pub struct LocalNode {
    node: String,
    alive: String,
    host: String,
    cookie: String,
    creation: AtomicU8,
    pid_seq: Mutex<PidSeq>,
    ref_seq: AtomicU32,
    port_seq: AtomicU32,
}

impl LocalNode {
    /// Creates the identity for `name` (`alive@host`, or a bare alive
    /// name which gets the local hostname appended).
    pub fn new(name: &str, cookie: String) -> Result<LocalNode, NodeError> {
        let (alive, host) = match name.split_once('@') {
            Some((alive, host)) => (alive.to_string(), host.to_string()),
            None => (name.to_string(), local_host()),
        };
        let node = format!("{}@{}", alive, host);
        // Node names travel as atoms; enforce the same limits.
        Term::atom(node.as_str())?;
        Ok(LocalNode {
            node,
            alive,
            host,
            cookie,
            creation: AtomicU8::new(0),
            pid_seq: Mutex::new(PidSeq::default()),
            ref_seq: AtomicU32::new(0),
            port_seq: AtomicU32::new(0),
        })
    }

    /// The full node name, `alive@host`.
    pub fn name(&self) -> &str {
        &self.node
    }

    /// The part of the name before the `@`.
    pub fn alive_name(&self) -> &str {
        &self.alive
    }

    /// The host part of the name.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The shared-secret cookie.
    pub fn cookie(&self) -> &str {
        &self.cookie
    }

    /// The 2-bit creation counter assigned at publication.
    pub fn creation(&self) -> u8 {
        self.creation.load(Ordering::Relaxed)
    }

    pub(crate) fn set_creation(&self, creation: u8) {
        self.creation.store(creation & 0x03, Ordering::Relaxed);
    }

    /// Mints a fresh pid. The id wraps at 15 bits, advancing the
    /// 13-bit serial.
    pub fn create_pid(&self) -> Pid {
        let (id, serial) = {
            let mut seq = self.pid_seq.lock();
            let (id, serial) = (seq.id, seq.serial);
            seq.id = (seq.id + 1) & PID_ID_MASK;
            if seq.id == 0 {
                seq.serial = (seq.serial + 1) & PID_SERIAL_MASK;
            }
            (id, serial)
        };
        Pid::new(self.node.clone(), id, serial, self.creation())
            .expect("node name was validated at construction")
    }

    /// Mints a fresh new-style reference: one counter word, two random
    /// words.
    pub fn create_ref(&self) -> Ref {
        let mut rng = rand::thread_rng();
        let ids = [
            self.ref_seq.fetch_add(1, Ordering::Relaxed) & REF_ID_MASK,
            rng.gen(),
            rng.gen(),
        ];
        Ref::new(self.node.clone(), ids, self.creation())
            .expect("node name was validated at construction")
    }

    /// Mints a fresh port identifier.
    pub fn create_port(&self) -> Port {
        let id = self.port_seq.fetch_add(1, Ordering::Relaxed) & 0x0fff_ffff;
        Port::new(self.node.clone(), id, self.creation())
            .expect("node name was validated at construction")
    }
}

fn local_host() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// A running node: mailbox registries, connection pool, accept worker.
pub struct Node {
    local: LocalNode,
    transport: Box<dyn Transport>,
    // Lock order: named < mailboxes < connections < a connection's
    // socket < a mailbox's queue.
    named: Mutex<HashMap<String, Arc<Mailbox>>>,
    mailboxes: Mutex<HashMap<Pid, Arc<Mailbox>>>,
    connections: Mutex<HashMap<String, Arc<Connection>>>,
    // Connections dropped by the dispatcher; stopped at the next
    // add_connection or at close, never from the worker that failed.
    retired: Mutex<Vec<Arc<Connection>>>,
    exit: AtomicBool,
    acceptor: Mutex<Option<JoinHandle<()>>>,
}

impl Node {
    /// Starts a node named `name` using the process-wide default
    /// transport registry.
    ///
    /// Without an explicit cookie the fallback file
    /// (`$HOME/.erlang.cookie`) is consulted.
    pub fn start(name: &str, cookie: Option<&str>) -> Result<Arc<Node>, NodeError> {
        Node::start_with(name, cookie, transport::global_registry())
    }

    /// Starts a node with an explicit transport registry.
    pub fn start_with(
        name: &str,
        cookie: Option<&str>,
        registry: &TransportRegistry,
    ) -> Result<Arc<Node>, NodeError> {
        let cookie = match cookie {
            Some(cookie) => cookie.to_string(),
            None => transport::default_cookie().ok_or_else(|| {
                NodeError::Auth("no cookie given and no cookie file found".into())
            })?,
        };
        let transport = registry.create(name, &cookie)?;
        let bare = match name.split_once(':') {
            Some((_proto, rest)) => rest,
            None => name,
        };
        let local = LocalNode::new(bare, cookie)?;

        let node = Arc::new(Node {
            local,
            transport,
            named: Mutex::new(HashMap::new()),
            mailboxes: Mutex::new(HashMap::new()),
            connections: Mutex::new(HashMap::new()),
            retired: Mutex::new(Vec::new()),
            exit: AtomicBool::new(false),
            acceptor: Mutex::new(None),
        });

        // Publish the listen port; if a stale publication is in the
        // way, withdraw it and retry once.
        let creation = match node.transport.publish() {
            Ok(creation) => creation,
            Err(_) => {
                node.transport.unpublish();
                node.transport.publish()?
            }
        };
        node.local.set_creation(creation);

        let weak = Arc::downgrade(&node);
        let handle = std::thread::spawn(move || accept_loop(weak));
        *node.acceptor.lock() = Some(handle);

        info!(node = %node.local.name(), "node started");
        Ok(node)
    }

    /// The node's identity.
    pub fn local(&self) -> &LocalNode {
        &self.local
    }

    /// The full node name.
    pub fn name(&self) -> &str {
        self.local.name()
    }

    /// Creates a mailbox addressed by a fresh pid.
    pub fn create_mailbox(self: &Arc<Self>) -> Arc<Mailbox> {
        let pid = self.local.create_pid();
        let mailbox = Arc::new(Mailbox::new(pid.clone(), Arc::downgrade(self)));
        self.mailboxes.lock().insert(pid, Arc::clone(&mailbox));
        mailbox
    }

    /// Removes a mailbox from both registries. Pending messages die
    /// with it once the last reference drops.
    pub fn deattach_mailbox(&self, mailbox: &Mailbox) {
        self.named.lock().retain(|_, m| m.pid() != mailbox.pid());
        self.mailboxes.lock().remove(mailbox.pid());
    }

    /// Looks up the pid registered under `name`.
    pub fn whereis(&self, name: &str) -> Option<Pid> {
        self.named.lock().get(name).map(|m| m.pid().clone())
    }

    pub(crate) fn register_name(&self, name: &str, pid: &Pid) -> Result<(), NodeError> {
        let mailbox = self.mailboxes.lock().get(pid).cloned();
        let mailbox = mailbox.ok_or_else(|| {
            NodeError::Connection(format!("no mailbox for pid {}", Term::Pid(pid.clone())))
        })?;
        self.named.lock().insert(name.to_string(), mailbox);
        Ok(())
    }

    pub(crate) fn unregister_names_of(&self, pid: &Pid) {
        self.named.lock().retain(|_, m| m.pid() != pid);
    }

    /// True when `node` names this node, by full or alive name.
    fn is_local(&self, node: &str) -> bool {
        node == self.local.name() || node == self.local.alive_name()
    }

    /// Routes a pid-addressed send: locally without touching the
    /// network, remotely through a (possibly fresh) connection.
    pub(crate) fn send_to_pid(self: &Arc<Self>, to: &Pid, term: Term) -> Result<(), NodeError> {
        if self.is_local(to.node()) {
            self.deliver(
                self.local.name(),
                Message::Send {
                    to: to.clone(),
                    payload: term,
                },
            );
            Ok(())
        } else {
            let connection = self.attempt_connection(to.node())?;
            connection.send_to_pid(to, &term)
        }
    }

    /// Routes a name-addressed send.
    pub(crate) fn send_to_name(
        self: &Arc<Self>,
        from: &Pid,
        node: &str,
        name: &str,
        term: Term,
    ) -> Result<(), NodeError> {
        if self.is_local(node) {
            self.deliver(
                self.local.name(),
                Message::RegSend {
                    from: from.clone(),
                    to_name: name.to_string(),
                    payload: term,
                },
            );
            Ok(())
        } else {
            let connection = self.attempt_connection(node)?;
            connection.send_to_name(from, name, &term)
        }
    }

    /// Returns the cached connection to `peer`, dialing if absent.
    pub(crate) fn attempt_connection(
        self: &Arc<Self>,
        peer: &str,
    ) -> Result<Arc<Connection>, NodeError> {
        if let Some(connection) = self.connections.lock().get(peer).cloned() {
            return Ok(connection);
        }
        let connection = Arc::new(self.transport.connect(peer)?);
        self.add_connection(Arc::clone(&connection));
        Ok(connection)
    }

    fn add_connection(self: &Arc<Self>, connection: Arc<Connection>) {
        // Stop connections retired since the last add. Doing it here
        // keeps teardown out of the failing worker's own call stack.
        let retired: Vec<_> = std::mem::take(&mut *self.retired.lock());
        for old in retired {
            old.stop();
        }
        self.connections
            .lock()
            .insert(connection.peer().to_string(), Arc::clone(&connection));
        connection.start(Arc::downgrade(self));
    }

    fn remove_connection(&self, peer: &str) {
        let removed = self.connections.lock().remove(peer);
        if let Some(connection) = removed {
            debug!(peer = %peer, "connection retired");
            self.retired.lock().push(connection);
        }
    }

    /// Dispatches one inbound message from `origin` (a peer name, or
    /// this node for local sends).
    pub(crate) fn deliver(&self, origin: &str, msg: Message) {
        match msg {
            Message::Error { to: None, error } => {
                warn!(peer = %origin, error = %error, "connection failed");
                self.remove_connection(origin);
            }
            Message::Error {
                to: Some(Recipient::Pid(pid)),
                error,
            } => {
                let mailbox = self.mailboxes.lock().get(&pid).cloned();
                match mailbox {
                    Some(mailbox) => mailbox.deliver(Message::Error {
                        to: Some(Recipient::Pid(pid)),
                        error,
                    }),
                    None => debug!(peer = %origin, "error for unknown pid dropped"),
                }
            }
            Message::Error {
                to: Some(Recipient::Name(name)),
                error,
            } => {
                let mailbox = self.named.lock().get(&name).cloned();
                match mailbox {
                    Some(mailbox) => mailbox.deliver(Message::Error {
                        to: Some(Recipient::Name(name)),
                        error,
                    }),
                    None => debug!(peer = %origin, name = %name, "error for unknown name dropped"),
                }
            }
            Message::Send { to, payload } => {
                let mailbox = self.mailboxes.lock().get(&to).cloned();
                match mailbox {
                    Some(mailbox) => mailbox.deliver(Message::Send { to, payload }),
                    None => {
                        debug!(peer = %origin, to = %Term::Pid(to), "message for unknown pid dropped")
                    }
                }
            }
            Message::RegSend {
                from,
                to_name,
                payload,
            } => {
                let mailbox = self.named.lock().get(&to_name).cloned();
                match mailbox {
                    Some(mailbox) => mailbox.deliver(Message::RegSend {
                        from,
                        to_name,
                        payload,
                    }),
                    None => {
                        debug!(peer = %origin, name = %to_name, "message for unknown name dropped")
                    }
                }
            }
            Message::Link { from, to } => self.deliver_control(origin, to.clone(), Message::Link { from, to }),
            Message::Unlink { from, to } => {
                self.deliver_control(origin, to.clone(), Message::Unlink { from, to })
            }
            Message::Exit { from, to, reason } => self.deliver_control(
                origin,
                to.clone(),
                Message::Exit { from, to, reason },
            ),
        }
    }

    fn deliver_control(&self, origin: &str, to: Pid, msg: Message) {
        let mailbox = self.mailboxes.lock().get(&to).cloned();
        match mailbox {
            Some(mailbox) => mailbox.deliver(msg),
            None => debug!(peer = %origin, "control message for unknown pid dropped"),
        }
    }

    /// Probes `remote` for liveness.
    ///
    /// A ping to this node short-circuits to `true` without touching
    /// the network. Otherwise the canonical
    /// `{'$gen_call', {Self, Ref}, {is_auth, Node}}` probe goes to the
    /// `net_kernel` name on the remote, and any `{Ref, yes}` reply
    /// within `timeout` counts as alive.
    pub fn ping(self: &Arc<Self>, remote: &str, timeout: Duration) -> bool {
        if self.is_local(remote) {
            return true;
        }
        let mailbox = self.create_mailbox();
        let alive = self.ping_probe(&mailbox, remote, timeout).unwrap_or(false);
        self.deattach_mailbox(&mailbox);
        alive
    }

    fn ping_probe(
        self: &Arc<Self>,
        mailbox: &Mailbox,
        remote: &str,
        timeout: Duration,
    ) -> Result<bool, NodeError> {
        let probe_ref = self.local.create_ref();
        let probe = Term::tuple(vec![
            Term::atom("$gen_call")?,
            Term::tuple(vec![
                Term::Pid(mailbox.pid().clone()),
                Term::Ref(probe_ref.clone()),
            ]),
            Term::tuple(vec![
                Term::atom("is_auth")?,
                Term::atom(self.local.name())?,
            ]),
        ]);
        mailbox.send_reg(remote, "net_kernel", probe)?;

        let reply = Term::tuple(vec![Term::Ref(probe_ref), Term::atom("yes")?]);
        Ok(mailbox.receive_match(&reply, timeout).is_some())
    }

    /// Shuts the node down: stop accepting, join every worker, then
    /// drop the mailboxes, in that order.
    pub fn close(&self) {
        if self.exit.swap(true, Ordering::SeqCst) {
            return;
        }
        let acceptor = self.acceptor.lock().take();
        if let Some(handle) = acceptor {
            // Never join the current thread: the last node reference
            // can be dropped from a worker.
            if handle.thread().id() != std::thread::current().id() {
                let _ = handle.join();
            }
        }

        let connections: Vec<_> = self
            .connections
            .lock()
            .drain()
            .map(|(_, connection)| connection)
            .collect();
        for connection in connections {
            connection.stop();
        }
        let retired: Vec<_> = std::mem::take(&mut *self.retired.lock());
        for connection in retired {
            connection.stop();
        }

        // Only now, with every posting thread joined, drop mailboxes.
        self.named.lock().clear();
        self.mailboxes.lock().clear();
        self.transport.unpublish();
        info!(node = %self.local.name(), "node closed");
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.close();
    }
}

fn accept_loop(weak: Weak<Node>) {
    loop {
        let Some(node) = weak.upgrade() else { break };
        if node.exit.load(Ordering::Relaxed) {
            break;
        }
        match node.transport.accept(ACCEPT_WINDOW) {
            Ok(Some(connection)) => node.add_connection(Arc::new(connection)),
            Ok(None) => {}
            Err(err) => {
                if !node.exit.load(Ordering::Relaxed) {
                    error!(error = %err, "accept failed");
                }
            }
        }
    }
    debug!("accept worker exited");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> LocalNode {
        LocalNode::new("alpha@localhost", "secret".to_string()).unwrap()
    }

    #[test]
    fn bare_name_gets_a_host() {
        let node = LocalNode::new("alpha", "c".to_string()).unwrap();
        assert!(node.name().contains('@'));
        assert_eq!(node.alive_name(), "alpha");
    }

    #[test]
    fn pids_are_unique_and_sequential() {
        let node = local();
        let a = node.create_pid();
        let b = node.create_pid();
        assert_ne!(a, b);
        assert_eq!(a.id() + 1, b.id());
        assert_eq!(a.node(), "alpha@localhost");
    }

    #[test]
    fn pid_id_wrap_advances_serial() {
        let node = local();
        {
            let mut seq = node.pid_seq.lock();
            seq.id = PID_ID_MASK; // one before the wrap
        }
        let last = node.create_pid();
        let wrapped = node.create_pid();
        assert_eq!(last.id(), PID_ID_MASK);
        assert_eq!(wrapped.id(), 0);
        assert_eq!(wrapped.serial(), last.serial() + 1);
    }

    #[test]
    fn refs_are_new_style_and_distinct() {
        let node = local();
        let a = node.create_ref();
        let b = node.create_ref();
        assert!(a.is_new_style());
        assert_ne!(a, b);
        assert_eq!(a.ids()[0] + 1, b.ids()[0]);
    }

    #[test]
    fn ports_count_up() {
        let node = local();
        assert_eq!(node.create_port().id() + 1, node.create_port().id());
    }

    #[test]
    fn creation_is_masked() {
        let node = local();
        node.set_creation(7);
        assert_eq!(node.creation(), 3);
        assert_eq!(node.create_pid().creation(), 3);
    }
}
