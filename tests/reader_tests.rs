//! Reader acceptance, quirks, and failure positions.

use lisp86::error::ReadErrorKind;
use lisp86::reader::{read, ATOM_MAX, MAX_DEPTH};
use lisp86::Ast;

#[test]
fn reads_unsigned_integers() {
    assert_eq!(Ast::Integer(1234), read("1234").unwrap());
    assert_eq!(Ast::Integer(0), read("0").unwrap());
}

#[test]
fn reads_signed_integers() {
    assert_eq!(Ast::Integer(1234), read("+1234").unwrap());
    assert_eq!(Ast::Integer(-1234), read("-1234").unwrap());
}

#[test]
fn skips_leading_whitespace() {
    assert_eq!(Ast::Integer(1234), read("   \t   \n  1234").unwrap());
}

#[test]
fn reads_lists() {
    let node = read("(1 2 0)").unwrap();
    let pair = node.as_pair().unwrap();
    assert_eq!(Some(1), pair.car.get_integer());
    let pair = pair.cdr.as_pair().unwrap();
    assert_eq!(Some(2), pair.car.get_integer());
    let pair = pair.cdr.as_pair().unwrap();
    assert_eq!(Some(0), pair.car.get_integer());
    assert!(pair.cdr.is_nil());
}

#[test]
fn reads_lists_with_arbitrary_whitespace() {
    assert_eq!(read("(1 2 0)").unwrap(), read("( 1\t2 0  )").unwrap());
}

#[test]
fn empty_list_is_nil() {
    assert!(read("()").unwrap().is_nil());
    assert!(read("(  )").unwrap().is_nil());
}

#[test]
fn reads_symbols_with_every_allowed_character() {
    let node = read("hello?+-*=>").unwrap();
    assert_eq!(Some("hello?+-*=>"), node.as_symbol());
}

#[test]
fn lone_signs_are_symbols() {
    assert_eq!(Some("+"), read("+").unwrap().as_symbol());
    assert_eq!(Some("-"), read("-").unwrap().as_symbol());
}

#[test]
fn reading_stops_after_one_expression() {
    let node = read("add1 1").unwrap();
    assert_eq!(Some("add1"), node.as_symbol());
    assert_eq!(Ast::Integer(1), read("1 2").unwrap());
}

#[test]
fn symbols_are_cut_off_at_the_atom_limit() {
    let long: String = "a".repeat(ATOM_MAX + 8);
    let node = read(&long).unwrap();
    assert_eq!(Some("a".repeat(ATOM_MAX).as_str()), node.as_symbol());
}

#[test]
fn reads_char_literals() {
    assert_eq!(Ast::Char(b'x'), read("'x'").unwrap());
    assert_eq!(Ast::Char(b' '), read("' '").unwrap());
}

#[test]
fn quote_is_not_a_readable_char() {
    let err = read("'''").unwrap_err();
    assert_eq!(ReadErrorKind::BadCharLiteral, err.kind);
}

#[test]
fn unterminated_char_literal_fails() {
    let err = read("'a").unwrap_err();
    assert_eq!(ReadErrorKind::BadCharLiteral, err.kind);
}

#[test]
fn reads_booleans() {
    assert_eq!(Ast::Bool(true), read("#t").unwrap());
    assert_eq!(Ast::Bool(false), read("#f").unwrap());
}

#[test]
fn rejects_unknown_hash_forms() {
    let err = read("#x").unwrap_err();
    assert_eq!(ReadErrorKind::UnexpectedChar('#'), err.kind);
}

#[test]
fn rejects_garbage_with_a_position() {
    let err = read("  %").unwrap_err();
    assert_eq!(ReadErrorKind::UnexpectedChar('%'), err.kind);
    assert_eq!(2, err.pos);
}

#[test]
fn rejects_empty_input() {
    assert_eq!(ReadErrorKind::UnexpectedEof, read("").unwrap_err().kind);
    assert_eq!(ReadErrorKind::UnexpectedEof, read("   ").unwrap_err().kind);
}

#[test]
fn rejects_unterminated_lists() {
    assert_eq!(ReadErrorKind::UnexpectedEof, read("(1 2").unwrap_err().kind);
}

#[test]
fn rejects_oversized_integer_literals() {
    let err = read("123456789012345678901234567890").unwrap_err();
    assert_eq!(ReadErrorKind::IntegerOverflow, err.kind);
}

#[test]
fn bounds_list_nesting() {
    let source = "(".repeat(MAX_DEPTH + 2);
    assert_eq!(ReadErrorKind::TooDeep, read(&source).unwrap_err().kind);

    // One below the limit parses fine.
    let mut ok = "(".repeat(MAX_DEPTH - 1);
    ok.push('1');
    ok.push_str(&")".repeat(MAX_DEPTH - 1));
    assert!(read(&ok).is_ok());
}

#[test]
fn nested_program_round_trips_through_display() {
    let source = "(labels ((id (code (x) x))) (labelcall id 5))";
    let node = read(source).unwrap();
    assert_eq!(source, node.to_string());
    assert_eq!(node, read(&node.to_string()).unwrap());
}
