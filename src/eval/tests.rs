use super::*;

fn ev(s: &str) -> i64 {
    eval_str(s, false).unwrap()
}

#[test]
fn test_precedence() {
    assert_eq!(ev("1+2*3"), 7);
    assert_eq!(ev("(1+2)*3"), 9);
    assert_eq!(ev("1+2*3**2"), 19);
    assert_eq!(ev("2*3+4*5"), 26);
}

#[test]
fn test_exponentiation() {
    assert_eq!(ev("2**10"), 1024);
    assert_eq!(ev("2**0"), 1);
    assert_eq!(ev("0**5"), 0);
    assert_eq!(ev("(-2)**3"), -8);
    // Right associative
    assert_eq!(ev("2**3**2"), 512);
}

#[test]
fn test_unary_operators() {
    assert_eq!(ev("-5"), -5);
    assert_eq!(ev("+5"), 5);
    assert_eq!(ev("~0"), -1);
    assert_eq!(ev("!0"), 1);
    assert_eq!(ev("!7"), 0);
    assert_eq!(ev("--5"), 5);
    assert_eq!(ev("2 - -3"), 5);
}

#[test]
fn test_division_and_modulo() {
    assert_eq!(ev("7/2"), 3);
    assert_eq!(ev("5 % 3"), 2);
    assert!(matches!(eval_str("7/0", false), Err(Error::DivideByZero)));
    assert!(matches!(eval_str("7%0", false), Err(Error::DivideByZero)));
}

#[test]
fn test_shifts() {
    assert_eq!(ev("1 << 31"), 1 << 31);
    assert_eq!(ev("1 << 62"), 1 << 62);
    assert_eq!(ev("256 >> 4"), 16);
}

#[test]
fn test_comparisons_and_logic() {
    assert_eq!(ev("1 < 2"), 1);
    assert_eq!(ev("2 <= 1"), 0);
    assert_eq!(ev("3 > 2"), 1);
    assert_eq!(ev("3 >= 4"), 0);
    assert_eq!(ev("5 == 5"), 1);
    assert_eq!(ev("5 != 5"), 0);
    assert_eq!(ev("1 && 2"), 1);
    assert_eq!(ev("1 && 0"), 0);
    assert_eq!(ev("0 || 3"), 1);
    assert_eq!(ev("0 || 0"), 0);
}

#[test]
fn test_bitwise() {
    assert_eq!(ev("12 & 10"), 8);
    assert_eq!(ev("12 | 10"), 14);
    assert_eq!(ev("12 ^ 10"), 6);
}

#[test]
fn test_radix_literals() {
    assert_eq!(ev("0x10"), 16);
    assert_eq!(ev("010"), 8);
    assert_eq!(ev("0xff + 1"), 256);
}

#[test]
fn test_overflow() {
    assert!(matches!(
        eval_str("9223372036854775807+1", false),
        Err(Error::UserOverflow)
    ));
    assert!(matches!(
        eval_str("9223372036854775807*2", false),
        Err(Error::UserOverflow)
    ));
    assert!(matches!(
        eval_str("2**64", false),
        Err(Error::UserOverflow)
    ));
    assert_eq!(ev("9223372036854775807"), i64::MAX);
}

#[test]
fn test_negative_exponent_is_syntax() {
    assert!(matches!(eval_str("2**-1", false), Err(Error::Syntax(_))));
}

#[test]
fn test_syntax_errors() {
    assert!(matches!(eval_str("1 2", false), Err(Error::Syntax(_))));
    assert!(matches!(eval_str("(1+2", false), Err(Error::Syntax(_))));
    assert!(matches!(eval_str("1+2)", false), Err(Error::Syntax(_))));
    assert!(matches!(eval_str("1 $ 2", false), Err(Error::Syntax(_))));
    assert!(matches!(eval_str("abc", false), Err(Error::Syntax(_))));
}

#[test]
fn test_whitespace_only_is_zero() {
    assert_eq!(ev("   "), 0);
}

#[test]
fn test_empty_input_is_distinct() {
    let mut input = InputStack::from_str("").unwrap();
    assert_eq!(eval_input(&mut input, false).unwrap(), None);
}

#[test]
fn test_error_consumes_rest_of_line() {
    let mut input = InputStack::from_str("1 $ junk\n2+2\n").unwrap();
    assert!(eval_input(&mut input, false).is_err());
    // The next expression parses cleanly
    assert_eq!(eval_input(&mut input, false).unwrap(), Some(4));
}

#[test]
fn test_parenthesized_unary() {
    assert_eq!(ev("-(1+2)"), -3);
    assert_eq!(ev("~(1|2)"), -4);
}
