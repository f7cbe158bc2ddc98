//! Unification-style pattern matching and substitution.
//!
//! Matching compares a term against a pattern, binding unbound variables
//! to whatever stands opposite them. The caller's [`VariableBinding`] is
//! only updated when the whole match succeeds; a failed match leaves no
//! partial bindings behind.

use crate::binding::VariableBinding;
use crate::error::TermError;
use crate::term::{List, Term, Variable};

impl Term {
    /// Attempts to match this term against `pattern`.
    ///
    /// The rules, in order:
    ///
    /// 1. The anonymous variable `_` matches anything and binds nothing.
    /// 2. A bound variable matches whatever its bound value matches.
    /// 3. An unbound variable on either side binds to the opposite side
    ///    (substituted through the in-progress binding) and succeeds.
    /// 4. Terms of the same kind recurse: tuples arity-then-elements,
    ///    lists elements-then-tail, atomic kinds by equality.
    /// 5. Terms of different kinds do not match.
    ///
    /// On success the new bindings are merged into `binding`; on failure
    /// or error `binding` is left exactly as it was.
    ///
    /// # Example
    ///
    /// ```
    /// use erlink_term::{Term, VariableBinding};
    ///
    /// let t = Term::tuple(vec![Term::Long(1), Term::Long(2)]);
    /// let p = Term::tuple(vec![Term::var("X"), Term::Long(2)]);
    /// let mut b = VariableBinding::new();
    /// assert!(t.matches(&p, &mut b).unwrap());
    /// assert_eq!(b.search("X"), Some(&Term::Long(1)));
    /// ```
    pub fn matches(
        &self,
        pattern: &Term,
        binding: &mut VariableBinding,
    ) -> Result<bool, TermError> {
        let mut scratch = binding.clone();
        let matched = internal_match(self, pattern, &mut scratch)?;
        if matched {
            binding.merge(&scratch);
        }
        Ok(matched)
    }

    /// Returns a copy of this term with every variable replaced by its
    /// bound value.
    ///
    /// Fails with [`TermError::VariableUnbound`] if any variable has no
    /// binding; the anonymous variable `_` never has one.
    pub fn subst(&self, binding: &VariableBinding) -> Result<Term, TermError> {
        match self {
            Term::Variable(v) => {
                if v.is_anonymous() {
                    return Err(TermError::VariableUnbound("_".into()));
                }
                binding
                    .search(&v.name)
                    .cloned()
                    .ok_or_else(|| TermError::VariableUnbound(v.name.clone()))
            }
            Term::Tuple(t) => {
                let elems = t
                    .elems
                    .iter()
                    .map(|e| e.subst(binding))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Term::tuple(elems))
            }
            Term::List(l) => {
                let elems = l
                    .elems
                    .iter()
                    .map(|e| e.subst(binding))
                    .collect::<Result<Vec<_>, _>>()?;
                let tail = l.tail.subst(binding)?;
                Ok(Term::List(List::with_tail(elems, tail)))
            }
            other => Ok(other.clone()),
        }
    }

    /// Finds the first variable in this term with no binding, in
    /// depth-first order. The anonymous variable is never reported.
    pub fn search_unbound<'a>(&'a self, binding: &VariableBinding) -> Option<&'a Variable> {
        match self {
            Term::Variable(v) => {
                if v.is_anonymous() || binding.search(&v.name).is_some() {
                    None
                } else {
                    Some(v)
                }
            }
            Term::Tuple(t) => t.elems.iter().find_map(|e| e.search_unbound(binding)),
            Term::List(l) => l
                .elems
                .iter()
                .find_map(|e| e.search_unbound(binding))
                .or_else(|| l.tail.search_unbound(binding)),
            _ => None,
        }
    }
}

fn internal_match(
    subject: &Term,
    pattern: &Term,
    binding: &mut VariableBinding,
) -> Result<bool, TermError> {
    match (subject, pattern) {
        (_, Term::Variable(v)) => match_variable(v, subject, binding),
        (Term::Variable(v), _) => match_variable(v, pattern, binding),
        (Term::Tuple(a), Term::Tuple(b)) => {
            if a.arity() != b.arity() {
                return Ok(false);
            }
            for (x, y) in a.elems.iter().zip(b.elems.iter()) {
                if !internal_match(x, y, binding)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        (Term::List(a), Term::List(b)) => match_lists(a, b, binding),
        (a, b) => Ok(a == b),
    }
}

fn match_variable(
    var: &Variable,
    other: &Term,
    binding: &mut VariableBinding,
) -> Result<bool, TermError> {
    if var.is_anonymous() {
        return Ok(true);
    }
    if let Some(bound) = binding.search(var.name()).cloned() {
        return internal_match(&bound, other, binding);
    }
    let value = other.subst(binding)?;
    binding.bind(var.name().to_string(), value);
    Ok(true)
}

/// Lists match over their common element prefix; the side that runs out
/// of head elements continues with its tail against the remainder of the
/// other, so `[1|T]` matches `[1,2,3]` binding `T` to `[2,3]`.
fn match_lists(a: &List, b: &List, binding: &mut VariableBinding) -> Result<bool, TermError> {
    let n = a.arity().min(b.arity());
    for (x, y) in a.elems.iter().take(n).zip(b.elems.iter().take(n)) {
        if !internal_match(x, y, binding)? {
            return Ok(false);
        }
    }
    let rest_a = remainder(a, n);
    let rest_b = remainder(b, n);
    internal_match(&rest_a, &rest_b, binding)
}

fn remainder(list: &List, from: usize) -> Term {
    if list.arity() > from {
        Term::List(List::with_tail(
            list.elems[from..].to_vec(),
            (*list.tail).clone(),
        ))
    } else {
        (*list.tail).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuple(elems: Vec<Term>) -> Term {
        Term::tuple(elems)
    }

    #[test]
    fn match_binds_variables() {
        // {1, 2, 3} against {X, 2, Y}
        let t = tuple(vec![Term::Long(1), Term::Long(2), Term::Long(3)]);
        let p = tuple(vec![Term::var("X"), Term::Long(2), Term::var("Y")]);
        let mut b = VariableBinding::new();
        assert!(t.matches(&p, &mut b).unwrap());
        assert_eq!(b.search("X"), Some(&Term::Long(1)));
        assert_eq!(b.search("Y"), Some(&Term::Long(3)));
    }

    #[test]
    fn failed_match_leaves_binding_untouched() {
        // {1, 2} against {X, 3} with X already bound to 1
        let t = tuple(vec![Term::Long(1), Term::Long(2)]);
        let p = tuple(vec![Term::var("X"), Term::Long(3)]);
        let mut b = VariableBinding::new();
        b.bind("X", Term::Long(1));
        assert!(!t.matches(&p, &mut b).unwrap());
        assert_eq!(b.len(), 1);
        assert_eq!(b.search("X"), Some(&Term::Long(1)));
    }

    #[test]
    fn variable_matches_whole_term() {
        let t = tuple(vec![Term::atom("a").unwrap(), Term::Long(7)]);
        let mut b = VariableBinding::new();
        assert!(t.matches(&Term::var("X"), &mut b).unwrap());
        assert_eq!(b.search("X"), Some(&t));
    }

    #[test]
    fn anonymous_variable_never_binds() {
        let t = Term::Long(5);
        let mut b = VariableBinding::new();
        assert!(t.matches(&Term::var("_"), &mut b).unwrap());
        assert!(b.is_empty());
    }

    #[test]
    fn bound_variable_delegates_to_value() {
        let mut b = VariableBinding::new();
        b.bind("X", Term::Long(1));
        assert!(Term::Long(1).matches(&Term::var("X"), &mut b).unwrap());
        assert!(!Term::Long(2).matches(&Term::var("X"), &mut b).unwrap());
    }

    #[test]
    fn variable_free_match_is_equality() {
        let t = tuple(vec![Term::Long(1), Term::atom("x").unwrap()]);
        let same = tuple(vec![Term::Long(1), Term::atom("x").unwrap()]);
        let other = tuple(vec![Term::Long(2), Term::atom("x").unwrap()]);
        let mut b = VariableBinding::new();
        assert!(t.matches(&same, &mut b).unwrap());
        assert!(!t.matches(&other, &mut b).unwrap());
        assert!(b.is_empty());
    }

    #[test]
    fn kinds_must_agree() {
        let mut b = VariableBinding::new();
        assert!(!Term::Long(1).matches(&Term::Double(1.0), &mut b).unwrap());
        assert!(!Term::EmptyList
            .matches(&Term::list(vec![Term::Long(1)]), &mut b)
            .unwrap());
    }

    #[test]
    fn list_tail_variable_takes_remainder() {
        // [1, 2, 3] against [1 | T]
        let t = Term::list(vec![Term::Long(1), Term::Long(2), Term::Long(3)]);
        let p = Term::List(List::with_tail(vec![Term::Long(1)], Term::var("T")));
        let mut b = VariableBinding::new();
        assert!(t.matches(&p, &mut b).unwrap());
        assert_eq!(
            b.search("T"),
            Some(&Term::list(vec![Term::Long(2), Term::Long(3)]))
        );
    }

    #[test]
    fn subst_replaces_bound_variables() {
        let p = tuple(vec![Term::var("X"), Term::Long(2)]);
        let mut b = VariableBinding::new();
        b.bind("X", Term::atom("ok").unwrap());
        let s = p.subst(&b).unwrap();
        assert_eq!(
            s,
            tuple(vec![Term::atom("ok").unwrap(), Term::Long(2)])
        );
    }

    #[test]
    fn subst_fails_on_unbound_and_anonymous() {
        let b = VariableBinding::new();
        assert_eq!(
            Term::var("X").subst(&b),
            Err(TermError::VariableUnbound("X".into()))
        );
        assert_eq!(
            Term::var("_").subst(&b),
            Err(TermError::VariableUnbound("_".into()))
        );
    }

    #[test]
    fn search_unbound_finds_first() {
        let mut b = VariableBinding::new();
        b.bind("X", Term::Long(1));
        let t = tuple(vec![Term::var("X"), Term::var("Y"), Term::var("Z")]);
        assert_eq!(t.search_unbound(&b).map(|v| v.name()), Some("Y"));
        assert!(Term::var("_").search_unbound(&b).is_none());
    }

    #[test]
    fn matching_unbound_against_open_term_errors() {
        // binding X to a term that itself contains an unbound variable
        let t = Term::var("X");
        let p = tuple(vec![Term::var("Y")]);
        let mut b = VariableBinding::new();
        assert!(matches!(
            t.matches(&p, &mut b),
            Err(TermError::VariableUnbound(_))
        ));
        assert!(b.is_empty());
    }
}
