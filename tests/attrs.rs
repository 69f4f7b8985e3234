//! Integration-level checks for `AttributeMap`'s class/style invariants
//! (spec's "Attribute invariants" property), exercised through the public
//! API only.

use ewc::attrs::AttributeMap;

#[test]
fn class_list_has_no_duplicates_and_preserves_first_seen_order() {
    let mut attrs = AttributeMap::new();
    for name in ["b", "a", "b", "c", "a"] {
        attrs.add_class(name);
    }
    assert_eq!(attrs.class_value().as_deref(), Some("b a c"));
}

#[test]
fn style_pseudo_key_round_trips_its_structured_form() {
    let mut attrs = AttributeMap::new();
    attrs.set("style", "color: red; font-weight: bold");
    let rendered = attrs.style_value().unwrap();

    let mut reparsed = AttributeMap::new();
    reparsed.set("style", &rendered);
    assert_eq!(reparsed.style_value(), attrs.style_value());
}

#[test]
fn class_pseudo_key_round_trips_its_structured_form() {
    let mut attrs = AttributeMap::new();
    attrs.set("class", "foo bar baz");
    let rendered = attrs.class_value().unwrap();

    let mut reparsed = AttributeMap::new();
    reparsed.set("class", &rendered);
    assert_eq!(reparsed.class_value(), attrs.class_value());
}

#[test]
fn removing_a_class_that_was_never_added_is_a_no_op() {
    let mut attrs = AttributeMap::new();
    attrs.add_class("a");
    attrs.remove_class("nonexistent");
    assert_eq!(attrs.class_value().as_deref(), Some("a"));
}
