//! Property tests for the encoding, the reader, the environments, and
//! compile determinism.

use lisp86::env::{self, Env};
use lisp86::value;
use lisp86::{compile_function, read, Ast, Buffer};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

/// Readable values: everything the reader can parse back from `Display`.
///
/// Symbols start with a letter so they cannot collide with signed integer
/// literals; the quote character is excluded from char literals because
/// the reader cannot accept it.
fn arb_readable() -> impl Strategy<Value = Ast> {
    let leaf = prop_oneof![
        5 => ((value::INTEGER_MIN + 1)..value::INTEGER_MAX).prop_map(Ast::Integer),
        2 => any::<bool>().prop_map(Ast::Bool),
        1 => Just(Ast::Nil),
        2 => (32u8..=126)
            .prop_filter("quote cannot be read back", |c| *c != b'\'')
            .prop_map(Ast::Char),
        3 => "[a-z][a-z0-9+*=>?-]{0,8}".prop_map(Ast::symbol),
    ];
    leaf.prop_recursive(6, 64, 4, |inner| {
        prop::collection::vec(inner, 0..4).prop_map(Ast::list)
    })
}

/// Closed programs over the arithmetic subset; always compile.
fn arb_program() -> impl Strategy<Value = Ast> {
    let leaf = prop_oneof![
        (-1000i64..1000).prop_map(Ast::Integer),
        any::<bool>().prop_map(Ast::Bool),
    ];
    leaf.prop_recursive(4, 24, 2, |inner| {
        prop_oneof![
            inner.clone().prop_map(|a| Ast::unary_call("add1", a)),
            inner.clone().prop_map(|a| Ast::unary_call("sub1", a)),
            inner.clone().prop_map(|a| Ast::unary_call("integer?", a)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Ast::binary_call("+", a, b)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Ast::binary_call("-", a, b)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Ast::binary_call("<", a, b)),
            (inner.clone(), inner.clone(), inner)
                .prop_map(|(c, t, e)| Ast::list(vec![Ast::symbol("if"), c, t, e])),
        ]
    })
}

fn compile_bytes(node: &Ast) -> Result<Vec<u8>, TestCaseError> {
    let mut buf = Buffer::new();
    prop_assert!(compile_function(&mut buf, node).is_ok());
    Ok(buf.as_slice().to_vec())
}

fn check_chain(
    remaining: &[(String, i64)],
    parent: Option<&Env<'_>>,
    all: &[(String, i64)],
) -> Result<(), TestCaseError> {
    match remaining.split_first() {
        Some(((name, val), rest)) => {
            let frame = Env::bind(name, *val, parent);
            check_chain(rest, Some(&frame), all)
        }
        None => {
            for (name, _) in all {
                let expected = all.iter().rev().find(|(n, _)| n == name).map(|(_, v)| *v);
                prop_assert_eq!(expected, env::lookup(parent, name));
            }
            prop_assert_eq!(None, env::lookup(parent, "never-bound"));
            Ok(())
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn integer_roundtrip(n in (value::INTEGER_MIN + 1)..value::INTEGER_MAX) {
        let word = value::encode_integer(n);
        prop_assert_eq!(n, value::decode_integer(word));
        prop_assert_eq!(0, word & value::INTEGER_MASK);
    }

    #[test]
    fn char_roundtrip(c in any::<u8>()) {
        let word = value::encode_char(c);
        prop_assert_eq!(c, value::decode_char(word));
        prop_assert_eq!(value::CHAR_TAG, word & value::IMMEDIATE_TAG_MASK);
    }

    #[test]
    fn bool_roundtrip(b in any::<bool>()) {
        let word = value::encode_bool(b);
        prop_assert_eq!(b, value::decode_bool(word));
        prop_assert_eq!(value::BOOL_TAG, word & value::IMMEDIATE_TAG_MASK);
    }

    #[test]
    fn integers_carry_exactly_one_tag(n in (value::INTEGER_MIN + 1)..value::INTEGER_MAX) {
        let word = value::encode_integer(n);
        prop_assert!(value::is_integer(word));
        prop_assert!(!value::is_char(word));
        prop_assert!(!value::is_bool(word));
        prop_assert!(!value::is_nil(word));
        prop_assert!(!value::is_error(word));
        prop_assert!(!value::is_pair_ref(word));
        prop_assert!(!value::is_symbol_ref(word));
    }
}

proptest! {
    #[test]
    fn reader_round_trips_printed_trees(ast in arb_readable()) {
        let printed = ast.to_string();
        let back = read(&printed).unwrap();
        prop_assert_eq!(ast, back);
    }

    #[test]
    fn compilation_is_deterministic(ast in arb_program()) {
        let first = compile_bytes(&ast)?;
        let second = compile_bytes(&ast)?;
        prop_assert_eq!(first, second);
    }

    #[test]
    fn innermost_binding_wins(
        bindings in prop::collection::vec(("[abc]", -64i64..0), 1..8)
    ) {
        check_chain(&bindings, None, &bindings)?;
    }
}
