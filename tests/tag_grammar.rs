#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Directive string parsing: the four recognized keys, defaults, last-write-wins
//! and rejection of anything else.

use ua_protocol::core::tag::{parse_tag, FieldTag};
use ua_protocol::error::ProtocolError;

#[test]
fn test_empty_tag_is_default() {
    let tag = parse_tag("").unwrap();
    assert_eq!(tag, FieldTag::default());
    assert!(tag.is_default());
    assert_eq!(tag.bit_size, 0);
    assert_eq!(tag.switch_value, 0);
    assert!(tag.switch_field.is_empty());
    assert!(tag.length_field.is_empty());
}

#[test]
fn test_every_key() {
    let tag = parse_tag("bits=4,lengthField=Count,switchField=Mask,switchValue=-3").unwrap();
    assert_eq!(tag.bit_size, 4);
    assert_eq!(tag.length_field, "Count");
    assert_eq!(tag.switch_field, "Mask");
    assert_eq!(tag.switch_value, -3);
    assert!(!tag.is_default());
}

#[test]
fn test_switch_value_without_field() {
    let tag = parse_tag("switchValue=7").unwrap();
    assert_eq!(tag.switch_value, 7);
    assert!(tag.switch_field.is_empty());
}

#[test]
fn test_duplicate_keys_last_write_wins() {
    let tag = parse_tag("bits=3,bits=5,lengthField=a,lengthField=b").unwrap();
    assert_eq!(tag.bit_size, 5);
    assert_eq!(tag.length_field, "b");
}

#[test]
fn test_from_str_matches_parse_tag() {
    let parsed: FieldTag = "switchField=Kind,switchValue=2".parse().unwrap();
    assert_eq!(parsed, parse_tag("switchField=Kind,switchValue=2").unwrap());
}

#[test]
fn test_invalid_tags() {
    for tag in [
        "bits=abc",
        "foo=1",
        "bits=-1",
        "bits=256",
        "switchValue=x",
        "Bits=1",
        "bits",
        "bits=3,",
        " bits=3",
    ] {
        assert!(
            matches!(parse_tag(tag), Err(ProtocolError::InvalidTag)),
            "{tag:?} should be rejected"
        );
    }
}

#[test]
fn test_names_are_not_validated_at_parse_time() {
    let tag = parse_tag("lengthField=does_not_exist").unwrap();
    assert_eq!(tag.length_field, "does_not_exist");
}
