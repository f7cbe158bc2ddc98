//! # erlink: a node runtime for Erlang-style clusters
//!
//! An `erlink` [`Node`] participates as a peer in a distributed
//! cluster: it exchanges asynchronously delivered terms with other
//! nodes over TCP, addressing either pids or registered names.
//!
//! A node owns a set of [`Mailbox`]es and a pool of per-peer
//! [`Connection`]s. Routing is on demand: sending to a peer nobody has
//! talked to yet dials it through the configured [`Transport`] and
//! caches the connection. Inbound frames are decoded by one receive
//! worker per peer and enqueued into the addressed mailbox, in wire
//! order.
//!
//! # Quick start
//!
//! ```no_run
//! use std::time::Duration;
//! use erlink::Node;
//! use erlink_term::Term;
//!
//! let node = Node::start("console@localhost", Some("secret")).unwrap();
//! let mailbox = node.create_mailbox();
//!
//! // {self(), hello} to a server registered on a peer
//! let greeting = Term::tuple(vec![
//!     Term::Pid(mailbox.pid().clone()),
//!     Term::atom("hello").unwrap(),
//! ]);
//! mailbox.send_reg("server@localhost", "reply_server", greeting).unwrap();
//!
//! if let Some(reply) = mailbox.receive_timeout(Duration::from_secs(5)) {
//!     println!("got {:?}", reply.payload());
//! }
//! node.close();
//! ```

pub mod connection;
pub mod error;
pub mod mailbox;
pub mod message;
pub mod names;
pub mod node;
pub mod queue;
pub mod transport;

pub use connection::Connection;
pub use error::NodeError;
pub use mailbox::Mailbox;
pub use message::{Message, Recipient};
pub use names::{NameService, StaticNames};
pub use node::{LocalNode, Node};
pub use queue::Queue;
pub use transport::{
    default_cookie, global_registry, TcpTransport, TcpTransportFactory, Transport,
    TransportFactory, TransportRegistry, DEFAULT_PROTOCOL,
};
