//! Mailboxes: the receive primitive of a node.
//!
//! A mailbox is an addressable endpoint identified by a freshly minted
//! pid, optionally registered under a name in the node's registry. It
//! owns a [`Queue`] of [`Message`]s; the node's dispatcher pushes
//! inbound messages in, user threads block on the receive methods.
//!
//! Pattern receives use the queue's guarded scan: the first queued
//! payload that matches the pattern is consumed, everything else stays
//! queued in order.

use std::sync::Weak;
use std::time::Duration;

use erlink_term::{Pid, Term, VariableBinding};

use crate::error::NodeError;
use crate::message::Message;
use crate::node::Node;
use crate::queue::Queue;

/// An addressable message endpoint inside a node.
pub struct Mailbox {
    pid: Pid,
    queue: Queue<Message>,
    node: Weak<Node>,
}

impl Mailbox {
    pub(crate) fn new(pid: Pid, node: Weak<Node>) -> Mailbox {
        Mailbox {
            pid,
            queue: Queue::new(),
            node,
        }
    }

    /// The pid messages to this mailbox are addressed to.
    pub fn pid(&self) -> &Pid {
        &self.pid
    }

    /// Registers this mailbox under `name` in the node's registry.
    pub fn register(&self, name: &str) -> Result<(), NodeError> {
        self.node()?.register_name(name, &self.pid)
    }

    /// Removes every name registration of this mailbox.
    pub fn unregister(&self) -> Result<(), NodeError> {
        self.node()?.unregister_names_of(&self.pid);
        Ok(())
    }

    /// Sends `term` to a pid, local or remote.
    pub fn send(&self, to: &Pid, term: Term) -> Result<(), NodeError> {
        self.node()?.send_to_pid(to, term)
    }

    /// Sends `term` to the mailbox registered as `name` on
    /// `remote_node`.
    pub fn send_reg(&self, remote_node: &str, name: &str, term: Term) -> Result<(), NodeError> {
        self.node()?
            .send_to_name(&self.pid, remote_node, name, term)
    }

    /// Blocks until a message arrives.
    pub fn receive(&self) -> Message {
        self.queue.get()
    }

    /// Waits at most `timeout` for a message. A zero timeout polls.
    pub fn receive_timeout(&self, timeout: Duration) -> Option<Message> {
        self.queue.get_timeout(timeout)
    }

    /// Waits at most `timeout` for a payload matching `pattern`.
    ///
    /// Non-matching messages stay queued in their original order. On a
    /// match, returns the pattern instantiated through the captured
    /// binding (or the stored payload itself when the pattern contains
    /// the anonymous variable) together with the binding.
    pub fn receive_match(
        &self,
        pattern: &Term,
        timeout: Duration,
    ) -> Option<(Term, VariableBinding)> {
        let mut captured: Option<VariableBinding> = None;
        let msg = self.queue.get_when_timeout(
            |msg| match msg.payload() {
                Some(term) => {
                    let mut binding = VariableBinding::new();
                    match term.matches(pattern, &mut binding) {
                        Ok(true) => {
                            captured = Some(binding);
                            true
                        }
                        _ => false,
                    }
                }
                None => false,
            },
            timeout,
        )?;
        let binding = captured.unwrap_or_default();
        let bound = match pattern.subst(&binding) {
            Ok(term) => term,
            Err(_) => msg.into_payload()?,
        };
        Some((bound, binding))
    }

    /// How many messages are waiting.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Node-side entry: enqueue an inbound message.
    pub(crate) fn deliver(&self, msg: Message) {
        self.queue.put(msg);
    }

    fn node(&self) -> Result<std::sync::Arc<Node>, NodeError> {
        self.node
            .upgrade()
            .ok_or_else(|| NodeError::Connection("node is closed".into()))
    }
}
