//! Variable bindings accumulated during pattern matching.

use indexmap::IndexMap;

use crate::term::Term;

/// An insertion-ordered mapping from variable names to terms.
///
/// Binding is write-once per name: once a name is bound, later binds of
/// the same name are ignored. This is what makes [`merge`] give
/// precedence to the receiving binding's entries.
///
/// [`merge`]: VariableBinding::merge
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableBinding {
    map: IndexMap<String, Term>,
}

impl VariableBinding {
    /// Creates an empty binding.
    pub fn new() -> VariableBinding {
        VariableBinding::default()
    }

    /// Binds `name` to `term` unless `name` is already bound.
    pub fn bind(&mut self, name: impl Into<String>, term: Term) {
        self.map.entry(name.into()).or_insert(term);
    }

    /// Looks up the term bound to `name`.
    pub fn search(&self, name: &str) -> Option<&Term> {
        self.map.get(name)
    }

    /// Copies every entry of `other` into this binding through
    /// [`bind`](VariableBinding::bind); existing entries win.
    pub fn merge(&mut self, other: &VariableBinding) {
        for (name, term) in &other.map {
            self.bind(name.clone(), term.clone());
        }
    }

    /// The number of bound names.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True if no name is bound.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Removes every entry.
    pub fn reset(&mut self) {
        self.map.clear();
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Term)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_is_write_once() {
        let mut b = VariableBinding::new();
        b.bind("X", Term::Long(1));
        b.bind("X", Term::Long(2));
        assert_eq!(b.search("X"), Some(&Term::Long(1)));
    }

    #[test]
    fn merge_keeps_existing_entries() {
        let mut a = VariableBinding::new();
        a.bind("X", Term::Long(1));

        let mut b = VariableBinding::new();
        b.bind("X", Term::Long(9));
        b.bind("Y", Term::Long(2));

        a.merge(&b);
        assert_eq!(a.search("X"), Some(&Term::Long(1)));
        assert_eq!(a.search("Y"), Some(&Term::Long(2)));
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn search_missing_is_none() {
        let b = VariableBinding::new();
        assert!(b.search("X").is_none());
    }

    #[test]
    fn insertion_order_is_stable() {
        let mut b = VariableBinding::new();
        b.bind("B", Term::Long(1));
        b.bind("A", Term::Long(2));
        b.bind("C", Term::Long(3));
        let names: Vec<&str> = b.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["B", "A", "C"]);
    }
}
