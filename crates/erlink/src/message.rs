//! Messages delivered to mailboxes.
//!
//! Every frame a peer sends opens with a control tuple whose first
//! element selects the kind of message; data-bearing kinds carry a
//! payload term after the control tuple. The receive worker decodes a
//! frame into a [`Message`] and hands it to the node's dispatcher.

use erlink_term::{Pid, Term};

use crate::error::NodeError;

/// Control tuple opcode: establish a link.
pub const CTRL_LINK: i64 = 1;
/// Control tuple opcode: send to a pid.
pub const CTRL_SEND: i64 = 2;
/// Control tuple opcode: an exit signal.
pub const CTRL_EXIT: i64 = 3;
/// Control tuple opcode: drop a link.
pub const CTRL_UNLINK: i64 = 4;
/// Control tuple opcode: send to a registered name.
pub const CTRL_REG_SEND: i64 = 6;

/// A message en route to (or sitting in) a mailbox.
#[derive(Debug)]
pub enum Message {
    /// A payload addressed to a pid.
    Send {
        /// The recipient.
        to: Pid,
        /// The payload term.
        payload: Term,
    },
    /// A payload addressed to a registered name.
    RegSend {
        /// The sender.
        from: Pid,
        /// The registered name of the recipient.
        to_name: String,
        /// The payload term.
        payload: Term,
    },
    /// A link request from a remote process.
    Link {
        /// The linking process.
        from: Pid,
        /// The local process being linked.
        to: Pid,
    },
    /// A link teardown from a remote process.
    Unlink {
        /// The unlinking process.
        from: Pid,
        /// The local process being unlinked.
        to: Pid,
    },
    /// An exit signal from a linked remote process.
    Exit {
        /// The exiting process.
        from: Pid,
        /// The local process the signal is aimed at.
        to: Pid,
        /// The exit reason.
        reason: Term,
    },
    /// A failure surfaced as a message.
    ///
    /// An authentication failure is aimed at the mailbox the offending
    /// frame addressed; a connection-level failure has no recipient and
    /// makes the dispatcher drop the originating connection.
    Error {
        /// The mailbox the failure concerns, if any.
        to: Option<Recipient>,
        /// What went wrong.
        error: NodeError,
    },
}

/// Either way a frame can address a mailbox.
#[derive(Debug, Clone)]
pub enum Recipient {
    /// Addressed by pid.
    Pid(Pid),
    /// Addressed by registered name.
    Name(String),
}

impl Message {
    /// The payload term, for the data-bearing kinds.
    pub fn payload(&self) -> Option<&Term> {
        match self {
            Message::Send { payload, .. } | Message::RegSend { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// Consumes the message, returning the payload term if any.
    pub fn into_payload(self) -> Option<Term> {
        match self {
            Message::Send { payload, .. } | Message::RegSend { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// True for the error kind.
    pub fn is_error(&self) -> bool {
        matches!(self, Message::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use erlink_term::Pid;

    #[test]
    fn payload_only_for_data_kinds() {
        let pid = Pid::new("n@h", 1, 0, 0).unwrap();
        let send = Message::Send {
            to: pid.clone(),
            payload: Term::Long(1),
        };
        assert_eq!(send.payload(), Some(&Term::Long(1)));

        let link = Message::Link {
            from: pid.clone(),
            to: pid,
        };
        assert!(link.payload().is_none());
        assert!(!link.is_error());
    }

    #[test]
    fn error_kind_is_detected() {
        let err = Message::Error {
            to: None,
            error: crate::error::NodeError::Timeout,
        };
        assert!(err.is_error());
        assert!(err.payload().is_none());
    }
}
