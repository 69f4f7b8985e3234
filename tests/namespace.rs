//! Integration-level checks for the `Local` namespace's mangle/normalize
//! round trip (spec's "Mangling round-trip" property) and prefix parsing,
//! exercised through the public API only.

use ewc::namespace::{get_prefix, Local};

#[test]
fn mangle_after_normalize_is_idempotent() {
    for title in ["A Page", "Weird/Name:With?Chars", "already_normalized"] {
        let once = Local::mangle(Local::normalize(title).as_str());
        let twice = Local::mangle(once.as_str());
        assert_eq!(once, twice, "{title}");
    }
}

#[test]
fn mangle_escape_set_only_ever_appears_as_dollar_hex() {
    let mangled = Local::mangle("a/b:c?d");
    for c in ['/', ':', '?'] {
        assert!(!mangled.contains(c), "{mangled} still has {c:?}");
    }
    assert!(mangled.contains("$2f") || mangled.contains("$3a") || mangled.contains("$3f"));
}

#[test]
fn normalize_is_idempotent() {
    let once = Local::normalize("A Page Title");
    let twice = Local::normalize(&once);
    assert_eq!(once, twice);
}

#[test]
fn get_prefix_splits_on_the_first_colon() {
    assert_eq!(get_prefix("wp:Rust"), ("wp".to_owned(), "Rust".to_owned()));
    assert_eq!(get_prefix("no prefix here"), (String::new(), "no prefix here".to_owned()));
}

#[test]
fn demangle_reverses_mangle_for_display() {
    let mangled = Local::mangle("a page title");
    let demangled = Local::demangle(&mangled);
    assert_eq!(demangled, "A page title");
}
