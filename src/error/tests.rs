use super::*;

#[test]
fn test_exit_codes() {
    assert_eq!(Error::Infra("overflow").exit_code(), 1);
    assert_eq!(Error::NoMatch.exit_code(), 2);
    assert_eq!(Error::syntax("bad escape").exit_code(), 3);
    assert_eq!(Error::DivideByZero.exit_code(), 4);
    assert_eq!(Error::UserOverflow.exit_code(), 5);
    assert_eq!(Error::usage("missing argument").exit_code(), 6);
}

#[test]
fn test_io_error_maps_to_infra_code() {
    let e: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert_eq!(e.exit_code(), 1);
    assert!(!e.is_user());
}

#[test]
fn test_user_errors_are_user() {
    assert!(Error::NoMatch.is_user());
    assert!(Error::DivideByZero.is_user());
    assert!(Error::UserOverflow.is_user());
    assert!(Error::syntax("x").is_user());
    assert!(Error::usage("x").is_user());
}

#[test]
fn test_display() {
    assert_eq!(Error::DivideByZero.to_string(), "divide by zero");
    assert_eq!(
        Error::syntax("unclosed set").to_string(),
        "syntax error: unclosed set"
    );
}
