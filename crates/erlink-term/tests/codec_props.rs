//! Property coverage for the codec and matcher over generated term trees.

use erlink_term::{List, Pid, Port, Ref, Term, VariableBinding};
use proptest::prelude::*;

fn atom() -> impl Strategy<Value = Term> {
    "[a-z][a-z0-9_]{0,11}".prop_map(|name| Term::atom(name).unwrap())
}

fn identifier() -> impl Strategy<Value = Term> {
    let node = "[a-z]{1,8}@[a-z]{1,8}";
    prop_oneof![
        (node, any::<u32>(), any::<u32>(), 0u8..4)
            .prop_map(|(n, id, serial, c)| Term::Pid(Pid::new(n, id, serial, c).unwrap())),
        (node, any::<u32>(), 0u8..4)
            .prop_map(|(n, id, c)| Term::Port(Port::new(n, id, c).unwrap())),
        (node, any::<[u32; 3]>(), 0u8..4)
            .prop_map(|(n, ids, c)| Term::Ref(Ref::new(n, ids, c).unwrap())),
        (node, any::<u32>(), 0u8..4)
            .prop_map(|(n, id, c)| Term::Ref(Ref::old_style(n, id, c).unwrap())),
    ]
}

fn leaf() -> impl Strategy<Value = Term> {
    prop_oneof![
        atom(),
        any::<i64>().prop_map(Term::Long),
        (-1.0e15..1.0e15f64).prop_map(Term::Double),
        ".{0,20}".prop_map(Term::string),
        prop::collection::vec(any::<u8>(), 0..48).prop_map(Term::binary),
        identifier(),
        Just(Term::EmptyList),
    ]
}

fn term() -> impl Strategy<Value = Term> {
    leaf().prop_recursive(3, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Term::tuple),
            prop::collection::vec(inner.clone(), 1..6).prop_map(Term::list),
            (prop::collection::vec(inner.clone(), 1..4), inner)
                .prop_map(|(elems, tail)| Term::List(List::with_tail(elems, tail))),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn roundtrip_with_and_without_version(t in term()) {
        let framed = t.encode(true).unwrap();
        prop_assert_eq!(framed[0], 131);
        prop_assert_eq!(&Term::decode(&framed).unwrap(), &t);

        let bare = t.encode(false).unwrap();
        prop_assert_eq!(&Term::decode(&bare).unwrap(), &t);
    }

    #[test]
    fn ground_match_agrees_with_equality(t in term()) {
        let mut binding = VariableBinding::new();
        prop_assert!(t.matches(&t.clone(), &mut binding).unwrap());
        prop_assert!(binding.is_empty());
    }

    #[test]
    fn fresh_variable_captures_any_term(t in term()) {
        let mut binding = VariableBinding::new();
        prop_assert!(t.matches(&Term::var("X"), &mut binding).unwrap());
        prop_assert_eq!(binding.search("X"), Some(&t));

        let mut anon = VariableBinding::new();
        prop_assert!(t.matches(&Term::var("_"), &mut anon).unwrap());
        prop_assert!(anon.is_empty());
    }
}
