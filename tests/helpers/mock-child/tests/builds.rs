//! Exists so `cargo test` builds the mock-child binary.

#[test]
fn builds() {}
