//! # erlink-term: the term model and wire codec
//!
//! Values exchanged between nodes are [`Term`]s: a tagged sum over
//! atoms, integers, floats, strings, binaries, identifiers, tuples,
//! lists and match variables, with a bit-exact codec for the external
//! term format.
//!
//! The crate provides:
//!
//! - **Construction**: checked constructors plus [`TupleBuilder`] /
//!   [`ListBuilder`] for incremental assembly
//! - **Codec**: [`Term::encode`] / [`Term::decode`] and the streaming
//!   [`codec`] functions over a [`Buffer`]
//! - **Matching**: [`Term::matches`] with [`VariableBinding`] capture,
//!   and [`Term::subst`] to instantiate patterns
//!
//! # Example
//!
//! ```
//! use erlink_term::{Term, VariableBinding};
//!
//! let msg = Term::tuple(vec![Term::atom("reply").unwrap(), Term::Long(7)]);
//! let wire = msg.encode(true).unwrap();
//! let back = Term::decode(&wire).unwrap();
//!
//! let pattern = Term::tuple(vec![Term::atom("reply").unwrap(), Term::var("N")]);
//! let mut binding = VariableBinding::new();
//! assert!(back.matches(&pattern, &mut binding).unwrap());
//! assert_eq!(binding.search("N"), Some(&Term::Long(7)));
//! ```

pub mod binding;
pub mod buffer;
pub mod codec;
pub mod error;
mod pattern;
pub mod term;

pub use binding::VariableBinding;
pub use buffer::Buffer;
pub use error::{DecodeReason, TermError};
pub use term::{
    Atom, List, ListBuilder, Pid, Port, Ref, Term, Tuple, TupleBuilder, Variable,
    MAX_ATOM_LENGTH, MAX_NODE_LENGTH,
};
