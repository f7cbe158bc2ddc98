//! The term model.
//!
//! Every value exchanged between nodes is a [`Term`]: a tagged sum over
//! atoms, integers, floats, strings, binaries, identifiers (pid / port /
//! reference), tuples, lists and match variables. Terms are owned trees:
//! a tuple or list owns its elements, nothing is shared, and the wire
//! format cannot represent cycles.
//!
//! Composite terms are either built in one shot from a vector of elements
//! or incrementally through [`TupleBuilder`] / [`ListBuilder`], which is
//! how the decoder assembles them. A builder declares its arity up front
//! and seals into an immutable [`Term`] once every element is in place.
//!
//! # Example
//!
//! ```
//! use erlink_term::Term;
//!
//! let t = Term::tuple(vec![
//!     Term::atom("hello").unwrap(),
//!     Term::Long(42),
//! ]);
//! assert_eq!(t.to_string(), "{hello,42}");
//! ```

use std::fmt;

use crate::binding::VariableBinding;
use crate::error::TermError;

/// Longest permitted atom name, in bytes.
pub const MAX_ATOM_LENGTH: usize = 255;

/// Longest permitted node name, in bytes.
pub const MAX_NODE_LENGTH: usize = 255;

/// A value in the external term model.
///
/// `PartialEq` is structural: tuples compare arity then element-wise,
/// lists compare element sequence then tail, identifiers compare by
/// node, ids and creation. Variables compare by name.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// A symbolic constant with a printable name of 1..=255 bytes.
    Atom(Atom),
    /// A signed 64-bit integer.
    Long(i64),
    /// An IEEE-754 binary64 float.
    Double(f64),
    /// A byte string. On the wire this is a list of small integers.
    String(String),
    /// An owned chunk of opaque bytes.
    Binary(Vec<u8>),
    /// A process identifier.
    Pid(Pid),
    /// A port identifier.
    Port(Port),
    /// A reference.
    Ref(Ref),
    /// A fixed-arity ordered sequence of terms.
    Tuple(Tuple),
    /// The empty list, a unique value.
    EmptyList,
    /// A non-empty list: a head sequence plus a tail term.
    List(List),
    /// A match variable. Never appears on the wire.
    Variable(Variable),
}

impl Term {
    /// Builds an atom term, validating the name length.
    pub fn atom(name: impl Into<String>) -> Result<Term, TermError> {
        Atom::new(name).map(Term::Atom)
    }

    /// Builds a string term.
    pub fn string(value: impl Into<String>) -> Term {
        Term::String(value.into())
    }

    /// Builds a binary term from owned bytes.
    pub fn binary(bytes: impl Into<Vec<u8>>) -> Term {
        Term::Binary(bytes.into())
    }

    /// Builds a tuple term from its elements.
    pub fn tuple(elems: Vec<Term>) -> Term {
        Term::Tuple(Tuple::new(elems))
    }

    /// Builds a proper list term. An empty vector yields [`Term::EmptyList`].
    pub fn list(elems: Vec<Term>) -> Term {
        if elems.is_empty() {
            Term::EmptyList
        } else {
            Term::List(List::proper(elems))
        }
    }

    /// Builds a named match variable. `"_"` is the anonymous variable.
    pub fn var(name: impl Into<String>) -> Term {
        Term::Variable(Variable::new(name))
    }

    /// The atom name, if this term is an atom.
    pub fn atom_value(&self) -> Option<&str> {
        match self {
            Term::Atom(a) => Some(a.name()),
            _ => None,
        }
    }

    /// The integer value, if this term is a long.
    pub fn long_value(&self) -> Option<i64> {
        match self {
            Term::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// True if this term is the empty list or a proper list.
    pub fn is_proper_list(&self) -> bool {
        match self {
            Term::EmptyList => true,
            Term::List(l) => matches!(*l.tail, Term::EmptyList),
            _ => false,
        }
    }

    /// Renders the term, resolving variables through `binding`.
    ///
    /// An unbound variable renders as its name; everything else renders
    /// in the conventional textual form (`{a,b}`, `[1,2|T]`, `<<1,2>>`).
    pub fn format(&self, binding: Option<&VariableBinding>) -> String {
        match self {
            Term::Atom(a) => a.name().to_string(),
            Term::Long(v) => v.to_string(),
            Term::Double(v) => {
                let s = v.to_string();
                if s.contains(&['.', 'e', 'E', 'n', 'i'][..]) {
                    s
                } else {
                    format!("{}.0", s)
                }
            }
            Term::String(s) => format!("\"{}\"", s),
            Term::Binary(bytes) => {
                let inner: Vec<String> = bytes.iter().map(|b| b.to_string()).collect();
                format!("<<{}>>", inner.join(","))
            }
            Term::Pid(p) => format!("<{}.{}.{}>", p.node, p.id, p.serial),
            Term::Port(p) => format!("#Port<{}.{}>", p.node, p.id),
            Term::Ref(r) => {
                if r.new_style {
                    format!(
                        "#Ref<{}.{}.{}.{}.{}>",
                        r.node, r.ids[0], r.ids[1], r.ids[2], r.creation
                    )
                } else {
                    format!("#Ref<{}.{}.{}>", r.node, r.ids[0], r.creation)
                }
            }
            Term::Tuple(t) => {
                let inner: Vec<String> =
                    t.elems.iter().map(|e| e.format(binding)).collect();
                format!("{{{}}}", inner.join(","))
            }
            Term::EmptyList => "[]".to_string(),
            Term::List(l) => {
                let inner: Vec<String> =
                    l.elems.iter().map(|e| e.format(binding)).collect();
                match &*l.tail {
                    Term::EmptyList => format!("[{}]", inner.join(",")),
                    tail => format!("[{}|{}]", inner.join(","), tail.format(binding)),
                }
            }
            Term::Variable(v) => {
                if v.is_anonymous() {
                    return v.name.clone();
                }
                match binding.and_then(|b| b.search(&v.name)) {
                    Some(bound) => bound.format(binding),
                    None => v.name.clone(),
                }
            }
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(None))
    }
}

impl From<Atom> for Term {
    fn from(a: Atom) -> Term {
        Term::Atom(a)
    }
}

impl From<Pid> for Term {
    fn from(p: Pid) -> Term {
        Term::Pid(p)
    }
}

impl From<Ref> for Term {
    fn from(r: Ref) -> Term {
        Term::Ref(r)
    }
}

impl From<i64> for Term {
    fn from(v: i64) -> Term {
        Term::Long(v)
    }
}

/// A symbolic constant. The name is non-empty and at most 255 bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Atom {
    name: String,
}

impl Atom {
    /// Creates an atom, rejecting empty or overlong names.
    pub fn new(name: impl Into<String>) -> Result<Atom, TermError> {
        let name = name.into();
        if name.is_empty() {
            return Err(TermError::BadArgument("atom must be non-empty".into()));
        }
        if name.len() > MAX_ATOM_LENGTH {
            return Err(TermError::BadArgument(format!(
                "atom must not exceed {} bytes",
                MAX_ATOM_LENGTH
            )));
        }
        Ok(Atom { name })
    }

    /// The printable name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A process identifier: the minting node's name plus id, serial and a
/// 2-bit creation counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pid {
    pub(crate) node: String,
    pub(crate) id: u32,
    pub(crate) serial: u32,
    pub(crate) creation: u8,
}

impl Pid {
    /// Creates a pid. The creation counter keeps its low two bits.
    pub fn new(
        node: impl Into<String>,
        id: u32,
        serial: u32,
        creation: u8,
    ) -> Result<Pid, TermError> {
        let node = check_node_name(node.into())?;
        Ok(Pid {
            node,
            id,
            serial,
            creation: creation & 0x03,
        })
    }

    /// The name of the node that minted this pid.
    pub fn node(&self) -> &str {
        &self.node
    }

    /// The id component.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The serial component.
    pub fn serial(&self) -> u32 {
        self.serial
    }

    /// The 2-bit creation counter.
    pub fn creation(&self) -> u8 {
        self.creation
    }
}

/// A port identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Port {
    pub(crate) node: String,
    pub(crate) id: u32,
    pub(crate) creation: u8,
}

impl Port {
    /// Creates a port identifier.
    pub fn new(node: impl Into<String>, id: u32, creation: u8) -> Result<Port, TermError> {
        let node = check_node_name(node.into())?;
        Ok(Port {
            node,
            id,
            creation: creation & 0x03,
        })
    }

    /// The name of the node that minted this port.
    pub fn node(&self) -> &str {
        &self.node
    }

    /// The id component.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The 2-bit creation counter.
    pub fn creation(&self) -> u8 {
        self.creation
    }
}

/// A reference: one (old style) or three (new style) 32-bit id words.
///
/// Equality requires the same style; an old-style reference compares by
/// its first id word only.
#[derive(Debug, Clone, Eq, Hash)]
pub struct Ref {
    pub(crate) node: String,
    pub(crate) ids: [u32; 3],
    pub(crate) count: u8,
    pub(crate) creation: u8,
    pub(crate) new_style: bool,
}

impl Ref {
    /// Creates a new-style reference with three id words.
    ///
    /// The first id word keeps its low 18 bits, the creation counter its
    /// low two bits.
    pub fn new(node: impl Into<String>, ids: [u32; 3], creation: u8) -> Result<Ref, TermError> {
        let node = check_node_name(node.into())?;
        Ok(Ref {
            node,
            ids: [ids[0] & 0x3ffff, ids[1], ids[2]],
            count: 3,
            creation: creation & 0x03,
            new_style: true,
        })
    }

    /// Creates an old-style reference with a single id word.
    pub fn old_style(node: impl Into<String>, id: u32, creation: u8) -> Result<Ref, TermError> {
        let node = check_node_name(node.into())?;
        Ok(Ref {
            node,
            ids: [id & 0x3ffff, 0, 0],
            count: 1,
            creation: creation & 0x03,
            new_style: false,
        })
    }

    pub(crate) fn from_wire(
        node: String,
        ids: [u32; 3],
        count: u8,
        creation: u8,
        new_style: bool,
    ) -> Ref {
        Ref {
            node,
            ids,
            count,
            creation: creation & 0x03,
            new_style,
        }
    }

    /// The name of the node that minted this reference.
    pub fn node(&self) -> &str {
        &self.node
    }

    /// The id words. Only the first is meaningful for old-style refs.
    pub fn ids(&self) -> &[u32; 3] {
        &self.ids
    }

    /// How many id words travel on the wire (1 or 3).
    pub fn count(&self) -> u8 {
        self.count
    }

    /// The 2-bit creation counter.
    pub fn creation(&self) -> u8 {
        self.creation
    }

    /// Whether this is a new-style (three-word) reference.
    pub fn is_new_style(&self) -> bool {
        self.new_style
    }
}

impl PartialEq for Ref {
    fn eq(&self, other: &Ref) -> bool {
        if self.new_style != other.new_style
            || self.node != other.node
            || self.creation != other.creation
            || self.ids[0] != other.ids[0]
        {
            return false;
        }
        !self.new_style || (self.ids[1] == other.ids[1] && self.ids[2] == other.ids[2])
    }
}

/// A fixed-arity ordered sequence of terms.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    pub(crate) elems: Vec<Term>,
}

impl Tuple {
    /// Creates a tuple from its elements.
    pub fn new(elems: Vec<Term>) -> Tuple {
        Tuple { elems }
    }

    /// The number of elements.
    pub fn arity(&self) -> usize {
        self.elems.len()
    }

    /// The element at `index`, for `index ∈ [0, arity)`.
    pub fn element_at(&self, index: usize) -> Result<&Term, TermError> {
        self.elems.get(index).ok_or_else(|| {
            TermError::BadArgument(format!(
                "index {} out of range [0..{})",
                index,
                self.elems.len()
            ))
        })
    }

    /// The elements as a slice.
    pub fn elements(&self) -> &[Term] {
        &self.elems
    }
}

/// Incremental tuple construction with a declared arity.
///
/// The decoder reads the arity from the wire and pushes elements one at
/// a time; [`TupleBuilder::seal`] produces the finished [`Tuple`].
#[derive(Debug)]
pub struct TupleBuilder {
    arity: usize,
    elems: Vec<Term>,
}

impl TupleBuilder {
    /// Starts a tuple of exactly `arity` elements.
    pub fn with_arity(arity: usize) -> TupleBuilder {
        TupleBuilder {
            arity,
            elems: Vec::with_capacity(arity),
        }
    }

    /// Adds the next element. Fails once the declared arity is reached.
    pub fn push(&mut self, term: Term) -> Result<(), TermError> {
        if self.elems.len() == self.arity {
            return Err(TermError::AlreadyInitialized);
        }
        self.elems.push(term);
        Ok(())
    }

    /// Seals the tuple. Fails if elements are missing.
    pub fn seal(self) -> Result<Tuple, TermError> {
        if self.elems.len() != self.arity {
            return Err(TermError::InvalidTerm);
        }
        Ok(Tuple { elems: self.elems })
    }
}

/// A non-empty list: at least one head element and a tail term.
///
/// A proper list has [`Term::EmptyList`] as its tail.
#[derive(Debug, Clone, PartialEq)]
pub struct List {
    pub(crate) elems: Vec<Term>,
    pub(crate) tail: Box<Term>,
}

impl List {
    /// Creates a proper list from a non-empty element vector.
    pub fn proper(elems: Vec<Term>) -> List {
        List {
            elems,
            tail: Box::new(Term::EmptyList),
        }
    }

    /// Creates a list with an explicit tail.
    pub fn with_tail(elems: Vec<Term>, tail: Term) -> List {
        List {
            elems,
            tail: Box::new(tail),
        }
    }

    /// The head elements.
    pub fn elements(&self) -> &[Term] {
        &self.elems
    }

    /// The tail term.
    pub fn tail(&self) -> &Term {
        &self.tail
    }

    /// The number of head elements (at least 1).
    pub fn arity(&self) -> usize {
        self.elems.len()
    }
}

/// Incremental list construction with a declared element count.
#[derive(Debug)]
pub struct ListBuilder {
    arity: usize,
    elems: Vec<Term>,
}

impl ListBuilder {
    /// Starts a list of exactly `arity` head elements.
    pub fn with_arity(arity: usize) -> ListBuilder {
        ListBuilder {
            arity,
            elems: Vec::with_capacity(arity),
        }
    }

    /// Adds the next head element. Fails once the count is reached.
    pub fn push(&mut self, term: Term) -> Result<(), TermError> {
        if self.elems.len() == self.arity {
            return Err(TermError::AlreadyInitialized);
        }
        self.elems.push(term);
        Ok(())
    }

    /// Closes the list with an explicit tail.
    ///
    /// Fails if head elements are missing or the list would be empty.
    pub fn close(self, tail: Term) -> Result<List, TermError> {
        if self.elems.len() != self.arity {
            return Err(TermError::InvalidTerm);
        }
        if self.elems.is_empty() {
            return Err(TermError::BadArgument("list must have at least one element".into()));
        }
        Ok(List {
            elems: self.elems,
            tail: Box::new(tail),
        })
    }
}

/// A match variable. The name `_` denotes the anonymous variable, which
/// matches anything and never binds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variable {
    pub(crate) name: String,
}

impl Variable {
    /// Creates a named variable.
    pub fn new(name: impl Into<String>) -> Variable {
        Variable { name: name.into() }
    }

    /// The anonymous variable `_`.
    pub fn anonymous() -> Variable {
        Variable { name: "_".into() }
    }

    /// The variable's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True for the anonymous variable.
    pub fn is_anonymous(&self) -> bool {
        self.name == "_"
    }
}

fn check_node_name(node: String) -> Result<String, TermError> {
    if node.is_empty() {
        return Err(TermError::BadArgument("node name must be non-empty".into()));
    }
    if node.len() > MAX_NODE_LENGTH {
        return Err(TermError::BadArgument(format!(
            "node name must not exceed {} bytes",
            MAX_NODE_LENGTH
        )));
    }
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atom_rejects_empty_and_overlong() {
        assert!(Atom::new("").is_err());
        assert!(Atom::new("a".repeat(256)).is_err());
        assert!(Atom::new("a".repeat(255)).is_ok());
    }

    #[test]
    fn tuple_builder_enforces_arity() {
        let mut b = TupleBuilder::with_arity(2);
        b.push(Term::Long(1)).unwrap();
        assert_eq!(b.push(Term::Long(2)), Ok(()));
        let mut full = TupleBuilder::with_arity(0);
        assert_eq!(full.push(Term::Long(3)), Err(TermError::AlreadyInitialized));
    }

    #[test]
    fn tuple_builder_rejects_early_seal() {
        let mut b = TupleBuilder::with_arity(2);
        b.push(Term::Long(1)).unwrap();
        assert_eq!(b.seal().err(), Some(TermError::InvalidTerm));
    }

    #[test]
    fn tuple_element_bounds() {
        let t = Tuple::new(vec![Term::Long(1), Term::Long(2)]);
        assert_eq!(t.element_at(1).unwrap(), &Term::Long(2));
        assert!(t.element_at(2).is_err());
    }

    #[test]
    fn ref_equality_ignores_extra_words_for_old_style() {
        let a = Ref::old_style("n@h", 7, 1).unwrap();
        let mut b = Ref::old_style("n@h", 7, 1).unwrap();
        b.ids[1] = 99;
        assert_eq!(a, b);

        let c = Ref::new("n@h", [7, 0, 0], 1).unwrap();
        assert_ne!(a, c); // style differs
    }

    #[test]
    fn ref_new_style_compares_all_words() {
        let a = Ref::new("n@h", [1, 2, 3], 0).unwrap();
        let b = Ref::new("n@h", [1, 2, 4], 0).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn display_forms() {
        let pid = Pid::new("a@h", 1, 0, 0).unwrap();
        let t = Term::tuple(vec![Term::Pid(pid), Term::atom("hello").unwrap()]);
        assert_eq!(t.to_string(), "{<a@h.1.0>,hello}");

        assert_eq!(Term::binary(vec![1u8, 2, 3]).to_string(), "<<1,2,3>>");
        assert_eq!(Term::string("hi").to_string(), "\"hi\"");
        assert_eq!(Term::list(vec![]).to_string(), "[]");
        assert_eq!(
            Term::List(List::with_tail(vec![Term::Long(1)], Term::var("T"))).to_string(),
            "[1|T]"
        );
        assert_eq!(Term::Double(1.0).to_string(), "1.0");
    }

    #[test]
    fn proper_list_detection() {
        assert!(Term::list(vec![Term::Long(1)]).is_proper_list());
        assert!(Term::EmptyList.is_proper_list());
        let improper = Term::List(List::with_tail(vec![Term::Long(1)], Term::Long(2)));
        assert!(!improper.is_proper_list());
    }
}
