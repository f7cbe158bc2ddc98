//! Transport plumbing: how a node reaches its peers.
//!
//! A [`Transport`] owns a listener and dials peers, handing back
//! established [`Connection`]s. Implementations are selected through a
//! [`TransportRegistry`] keyed by protocol name: a node id of the form
//! `proto:name@host` picks the factory registered under `proto`, a bare
//! `name@host` uses the default protocol.
//!
//! The built-in [`TcpTransport`] resolves peers through a
//! [`NameService`], dials plain TCP and exchanges a one-frame greeting
//! carrying each side's node name. Authentication happens per frame via
//! the control-tuple cookie check, not at connection setup.

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use erlink_term::Term;
use tracing::{debug, info};

use crate::connection::Connection;
use crate::error::NodeError;
use crate::names::{NameService, StaticNames};

/// Protocol used when a node id carries no `proto:` prefix.
pub const DEFAULT_PROTOCOL: &str = "tcp";

/// How long handshake reads may block.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// How often the accept loop polls its listener.
const ACCEPT_POLL: Duration = Duration::from_millis(25);

/// A connected transport: listener plus dialer for one node.
pub trait Transport: Send + Sync {
    /// Dials `peer` (a `name@host` node id) and completes the greeting.
    fn connect(&self, peer: &str) -> Result<Connection, NodeError>;

    /// Waits up to `timeout` for an inbound connection.
    fn accept(&self, timeout: Duration) -> Result<Option<Connection>, NodeError>;

    /// Publishes this node's listen port. Returns the creation counter.
    fn publish(&self) -> Result<u8, NodeError>;

    /// Withdraws the publication.
    fn unpublish(&self);

    /// The local listen port.
    fn local_port(&self) -> u16;
}

/// Builds transports for one protocol.
pub trait TransportFactory: Send + Sync {
    /// Creates a transport for the given full node name and cookie.
    fn create(&self, node: &str, cookie: &str) -> Result<Box<dyn Transport>, NodeError>;
}

/// Maps protocol names to factories.
///
/// The registry is a value the embedding application owns; a
/// process-wide default with the TCP transport registered is available
/// through [`global_registry`].
pub struct TransportRegistry {
    factories: DashMap<String, Arc<dyn TransportFactory>>,
}

impl TransportRegistry {
    /// An empty registry.
    pub fn new() -> TransportRegistry {
        TransportRegistry {
            factories: DashMap::new(),
        }
    }

    /// A registry with the TCP transport registered as the default
    /// protocol, resolving peers through `names`.
    pub fn with_defaults(names: Arc<dyn NameService>) -> TransportRegistry {
        let registry = TransportRegistry::new();
        registry.register(DEFAULT_PROTOCOL, Arc::new(TcpTransportFactory::new(names)));
        registry
    }

    /// Registers (or replaces) the factory for `protocol`.
    pub fn register(&self, protocol: &str, factory: Arc<dyn TransportFactory>) {
        self.factories.insert(protocol.to_string(), factory);
    }

    /// Creates a transport for `node_id`, which may carry a
    /// `proto:` prefix selecting the protocol.
    pub fn create(&self, node_id: &str, cookie: &str) -> Result<Box<dyn Transport>, NodeError> {
        let (protocol, node) = match node_id.split_once(':') {
            Some((proto, rest)) => (proto, rest),
            None => (DEFAULT_PROTOCOL, node_id),
        };
        let factory = self
            .factories
            .get(protocol)
            .ok_or_else(|| NodeError::UnknownProtocol(protocol.to_string()))?;
        factory.create(node, cookie)
    }
}

impl Default for TransportRegistry {
    fn default() -> TransportRegistry {
        TransportRegistry::new()
    }
}

/// The process-wide default registry.
///
/// Its TCP factory shares one in-memory name table, so nodes created
/// through it within the same process can resolve each other.
pub fn global_registry() -> &'static TransportRegistry {
    static REGISTRY: OnceLock<TransportRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| TransportRegistry::with_defaults(Arc::new(StaticNames::new())))
}

/// Reads the fallback cookie from `$HOME/.erlang.cookie`.
pub fn default_cookie() -> Option<String> {
    let home = std::env::var_os("HOME")?;
    let path = Path::new(&home).join(".erlang.cookie");
    let contents = std::fs::read_to_string(path).ok()?;
    let line = contents.lines().next()?.trim().to_string();
    if line.is_empty() {
        None
    } else {
        Some(line)
    }
}

/// Factory for [`TcpTransport`].
pub struct TcpTransportFactory {
    names: Arc<dyn NameService>,
}

impl TcpTransportFactory {
    /// Creates a factory resolving peers through `names`.
    pub fn new(names: Arc<dyn NameService>) -> TcpTransportFactory {
        TcpTransportFactory { names }
    }
}

impl TransportFactory for TcpTransportFactory {
    fn create(&self, node: &str, cookie: &str) -> Result<Box<dyn Transport>, NodeError> {
        let transport = TcpTransport::bind(node, cookie, Arc::clone(&self.names), 0)?;
        Ok(Box::new(transport))
    }
}

/// Plain TCP transport with a greeting handshake.
pub struct TcpTransport {
    node: String,
    alive: String,
    cookie: String,
    listener: TcpListener,
    names: Arc<dyn NameService>,
}

impl TcpTransport {
    /// Binds a listener on `port` (0 for ephemeral) for the node named
    /// `node` (`alive@host`).
    pub fn bind(
        node: &str,
        cookie: &str,
        names: Arc<dyn NameService>,
        port: u16,
    ) -> Result<TcpTransport, NodeError> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        listener.set_nonblocking(true)?;
        let alive = alive_name(node).to_string();
        info!(node = %node, port = listener.local_addr()?.port(), "transport listening");
        Ok(TcpTransport {
            node: node.to_string(),
            alive,
            cookie: cookie.to_string(),
            listener,
            names,
        })
    }
}

impl Transport for TcpTransport {
    fn connect(&self, peer: &str) -> Result<Connection, NodeError> {
        let (host, port, _creation) = self.names.lookup(alive_name(peer))?;
        let mut stream = TcpStream::connect((host.as_str(), port))?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;

        send_greeting(&mut stream, &self.node)?;
        let peer_name = read_greeting(&mut stream)?;
        debug!(peer = %peer_name, "outbound connection established");

        Connection::new(peer_name, self.cookie.clone(), stream)
    }

    fn accept(&self, timeout: Duration) -> Result<Option<Connection>, NodeError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.listener.accept() {
                Ok((mut stream, _addr)) => {
                    stream.set_nonblocking(false)?;
                    stream.set_nodelay(true)?;
                    stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;

                    let peer_name = read_greeting(&mut stream)?;
                    send_greeting(&mut stream, &self.node)?;
                    debug!(peer = %peer_name, "inbound connection established");

                    return Connection::new(peer_name, self.cookie.clone(), stream).map(Some);
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Ok(None);
                    }
                    std::thread::sleep(ACCEPT_POLL);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn publish(&self) -> Result<u8, NodeError> {
        self.names.publish(&self.alive, self.local_port())
    }

    fn unpublish(&self) {
        self.names.unpublish(&self.alive);
    }

    fn local_port(&self) -> u16 {
        self.listener
            .local_addr()
            .map(|addr| addr.port())
            .unwrap_or(0)
    }
}

/// The part of a node id before the `@`.
pub(crate) fn alive_name(node: &str) -> &str {
    node.split('@').next().unwrap_or(node)
}

fn send_greeting(stream: &mut TcpStream, node: &str) -> Result<(), NodeError> {
    let body = Term::atom(node)?.encode(true)?;
    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    stream.write_all(&frame)?;
    Ok(())
}

fn read_greeting(stream: &mut TcpStream) -> Result<String, NodeError> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header)?;
    let len = u32::from_be_bytes(header) as usize;
    if len == 0 || len > 512 {
        return Err(NodeError::Connection(format!(
            "greeting frame of {} bytes",
            len
        )));
    }
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload)?;
    Term::decode(&payload)?
        .atom_value()
        .map(str::to_string)
        .ok_or_else(|| NodeError::Connection("greeting is not an atom".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_selects_by_protocol_prefix() {
        let names: Arc<dyn NameService> = Arc::new(StaticNames::new());
        let registry = TransportRegistry::with_defaults(names);

        assert!(registry.create("tcp:a@localhost", "secret").is_ok());
        assert!(registry.create("a@localhost", "secret").is_ok());
        assert!(matches!(
            registry.create("quic:a@localhost", "secret"),
            Err(NodeError::UnknownProtocol(p)) if p == "quic"
        ));
    }

    #[test]
    fn alive_name_splits_at_host() {
        assert_eq!(alive_name("bingo@aule"), "bingo");
        assert_eq!(alive_name("bare"), "bare");
    }

    #[test]
    fn greeting_exchange_over_loopback() {
        let names: Arc<dyn NameService> = Arc::new(StaticNames::new());
        let a = TcpTransport::bind("a@localhost", "secret", Arc::clone(&names), 0).unwrap();
        let b = TcpTransport::bind("b@localhost", "secret", Arc::clone(&names), 0).unwrap();
        a.publish().unwrap();
        b.publish().unwrap();

        let accepted = std::thread::spawn(move || b.accept(Duration::from_secs(5)).unwrap());
        let outbound = a.connect("b@localhost").unwrap();
        let inbound = accepted.join().unwrap().expect("accept timed out");

        assert_eq!(outbound.peer(), "b@localhost");
        assert_eq!(inbound.peer(), "a@localhost");
    }

    #[test]
    fn accept_timeout_yields_none() {
        let names: Arc<dyn NameService> = Arc::new(StaticNames::new());
        let t = TcpTransport::bind("a@localhost", "secret", names, 0).unwrap();
        let got = t.accept(Duration::from_millis(40)).unwrap();
        assert!(got.is_none());
    }
}
