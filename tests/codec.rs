#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Encode/decode engine: bit packing, length-linked sequences, switch-gated
//! fields and the failures each of them can raise.

use ua_protocol::core::codec::{decode, decode_from, encode, Encodable};
use ua_protocol::error::ProtocolError;
use ua_protocol::ua_struct;

ua_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Packed {
        #[ua(tag = "bits=3")]
        pub low: u8,
        #[ua(tag = "bits=5")]
        pub high: u8,
    }
}

ua_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Counted {
        pub n: i32,
        #[ua(tag = "lengthField=n")]
        pub items: Vec<u16>,
    }
}

ua_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Switched {
        pub kind: u8,
        #[ua(tag = "switchField=kind,switchValue=2")]
        pub present: u16,
        #[ua(tag = "switchField=kind,switchValue=1")]
        pub absent: u32,
    }
}

ua_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct SplitRun {
        #[ua(tag = "bits=4")]
        pub a: u8,
        pub b: u8,
        #[ua(tag = "bits=4")]
        pub c: u8,
    }
}

ua_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct WideRun {
        #[ua(tag = "bits=4")]
        pub a: u8,
        #[ua(tag = "bits=12")]
        pub b: u16,
    }
}

ua_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct GatedSequence {
        pub has_names: bool,
        pub no_of_names: i32,
        #[ua(tag = "lengthField=no_of_names,switchField=has_names,switchValue=1")]
        pub names: Vec<String>,
    }
}

ua_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct MissingLength {
        #[ua(tag = "lengthField=count")]
        pub items: Vec<u8>,
    }
}

ua_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct MissingSwitch {
        #[ua(tag = "switchField=selector,switchValue=1")]
        pub value: u8,
    }
}

ua_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct CountAfter {
        #[ua(tag = "lengthField=n")]
        pub items: Vec<u8>,
        pub n: i32,
    }
}

ua_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct TooWide {
        #[ua(tag = "bits=65")]
        pub wide: u64,
    }
}

ua_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct PackedText {
        #[ua(tag = "bits=4")]
        pub text: String,
    }
}

ua_struct! {
    /// Carries local state only, so it encodes to nothing
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Marker {
        seen: bool,
    }
}

ua_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Markers {
        pub no_of_markers: i32,
        #[ua(tag = "lengthField=no_of_markers")]
        pub markers: Vec<Marker>,
    }
}

#[test]
fn test_bit_packing_msb_first() {
    let value = Packed { low: 5, high: 17 };
    let bytes = encode(&value).unwrap();
    assert_eq!(&bytes[..], &[0b1011_0001]);
    assert_eq!(decode::<Packed>(&bytes).unwrap(), value);
}

#[test]
fn test_bit_value_must_fit_width() {
    let err = encode(&Packed { low: 8, high: 0 }).unwrap_err();
    match err {
        ProtocolError::ValueOutOfRange { field, bits, value } => {
            assert_eq!(field, "low");
            assert_eq!(bits, 3);
            assert_eq!(value, 8);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_whole_value_field_ends_run() {
    let value = SplitRun { a: 0xA, b: 0x55, c: 0x3 };
    let bytes = encode(&value).unwrap();
    assert_eq!(&bytes[..], &[0xA0, 0x55, 0x30]);
    assert_eq!(decode::<SplitRun>(&bytes).unwrap(), value);
}

#[test]
fn test_run_spans_bytes() {
    let value = WideRun { a: 0xA, b: 0xBCD };
    let bytes = encode(&value).unwrap();
    assert_eq!(&bytes[..], &[0xAB, 0xCD]);
    assert_eq!(decode::<WideRun>(&bytes).unwrap(), value);
}

#[test]
fn test_width_over_64_bits() {
    let err = encode(&TooWide { wide: 1 }).unwrap_err();
    assert_eq!(err.field_name(), Some("wide"));
}

#[test]
fn test_bit_packed_field_must_be_integer() {
    let err = encode(&PackedText { text: "x".into() }).unwrap_err();
    assert!(matches!(err, ProtocolError::NotInteger(ref field) if field == "text"));
}

#[test]
fn test_length_linked_sequence() {
    let value = Counted {
        n: 3,
        items: vec![0x0102, 0x0304, 0x0506],
    };
    let bytes = encode(&value).unwrap();
    assert_eq!(
        &bytes[..],
        &[3, 0, 0, 0, 0x02, 0x01, 0x04, 0x03, 0x06, 0x05]
    );

    let back = decode::<Counted>(&bytes).unwrap();
    assert_eq!(back.n, 3);
    assert_eq!(back.items, value.items);
}

#[test]
fn test_count_is_taken_from_sequence() {
    let value = Counted {
        n: 42,
        items: vec![7],
    };
    let bytes = encode(&value).unwrap();
    assert_eq!(&bytes[..4], &1i32.to_le_bytes());
    // The instance itself is not modified
    assert_eq!(value.n, 42);

    let back = decode::<Counted>(&bytes).unwrap();
    assert_eq!(back.n, 1);
}

#[test]
fn test_null_count_reads_empty() {
    let back = decode::<Counted>(&(-1i32).to_le_bytes()).unwrap();
    assert_eq!(back.n, -1);
    assert!(back.items.is_empty());
}

#[test]
fn test_count_larger_than_buffer() {
    let mut bytes = 1000i32.to_le_bytes().to_vec();
    bytes.extend_from_slice(&[1, 0]);
    let err = decode::<Counted>(&bytes).unwrap_err();
    assert_eq!(err.field_name(), Some("items"));
    assert!(matches!(err.root_cause(), ProtocolError::UnexpectedEof { .. }));
}

#[test]
fn test_empty_elements_decode_from_count_alone() {
    let value = Markers {
        no_of_markers: 0,
        markers: vec![Marker::default(); 3],
    };
    let bytes = encode(&value).unwrap();
    assert_eq!(&bytes[..], &[3, 0, 0, 0]);

    let back = decode::<Markers>(&bytes).unwrap();
    assert_eq!(back.no_of_markers, 3);
    assert_eq!(back.markers.len(), 3);
}

#[test]
fn test_switch_selects_fields() {
    let value = Switched {
        kind: 2,
        present: 0xBEEF,
        absent: 0xFFFF_FFFF,
    };
    let bytes = encode(&value).unwrap();
    assert_eq!(&bytes[..], &[2, 0xEF, 0xBE]);

    let back = decode::<Switched>(&bytes).unwrap();
    assert_eq!(back.kind, 2);
    assert_eq!(back.present, 0xBEEF);
    assert_eq!(back.absent, 0);
}

#[test]
fn test_switch_other_branch() {
    let value = Switched {
        kind: 1,
        present: 9,
        absent: 0x0A0B_0C0D,
    };
    let bytes = encode(&value).unwrap();
    assert_eq!(&bytes[..], &[1, 0x0D, 0x0C, 0x0B, 0x0A]);

    let back = decode::<Switched>(&bytes).unwrap();
    assert_eq!(back.present, 0);
    assert_eq!(back.absent, 0x0A0B_0C0D);
}

#[test]
fn test_switch_with_no_match_writes_nothing() {
    let bytes = encode(&Switched {
        kind: 0,
        present: 1,
        absent: 1,
    })
    .unwrap();
    assert_eq!(&bytes[..], &[0]);
}

#[test]
fn test_gated_length_linked_sequence() {
    let value = GatedSequence {
        has_names: true,
        no_of_names: 2,
        names: vec!["a".into(), "bc".into()],
    };
    let bytes = encode(&value).unwrap();
    assert_eq!(decode::<GatedSequence>(&bytes).unwrap(), value);

    let hidden = GatedSequence {
        has_names: false,
        no_of_names: 0,
        names: vec!["ignored".into()],
    };
    let bytes = encode(&hidden).unwrap();
    // flag, then the count (synced to the sequence length), no elements
    assert_eq!(&bytes[..], &[0, 1, 0, 0, 0]);
}

#[test]
fn test_unknown_length_sibling() {
    let value = MissingLength { items: vec![1] };
    match encode(&value).unwrap_err() {
        ProtocolError::UnknownSibling { field, sibling } => {
            assert_eq!(field, "items");
            assert_eq!(sibling, "count");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(matches!(
        decode::<MissingLength>(&[]),
        Err(ProtocolError::UnknownSibling { .. })
    ));
}

#[test]
fn test_unknown_switch_sibling() {
    assert!(matches!(
        encode(&MissingSwitch { value: 1 }),
        Err(ProtocolError::UnknownSibling { .. })
    ));
    assert!(matches!(
        decode::<MissingSwitch>(&[1]),
        Err(ProtocolError::UnknownSibling { .. })
    ));
}

#[test]
fn test_count_declared_after_sequence() {
    let value = CountAfter {
        items: vec![1, 2],
        n: 2,
    };
    let bytes = encode(&value).unwrap();
    assert_eq!(&bytes[..], &[1, 2, 2, 0, 0, 0]);

    match decode::<CountAfter>(&bytes).unwrap_err() {
        ProtocolError::LinkOrder { field, sibling } => {
            assert_eq!(field, "items");
            assert_eq!(sibling, "n");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_failed_decode_leaves_instance_untouched() {
    let original = Counted {
        n: 1,
        items: vec![9],
    };
    let mut target = original.clone();
    let truncated: &[u8] = &[2, 0, 0, 0, 1, 0];
    let mut cursor = truncated;

    assert!(target.decode(&mut cursor).is_err());
    assert_eq!(target, original);
    assert_eq!(cursor.len(), truncated.len());
}

#[test]
fn test_trailing_bytes() {
    let mut bytes = encode(&Packed { low: 1, high: 2 }).unwrap().to_vec();
    bytes.push(0xFF);
    assert!(matches!(
        decode::<Packed>(&bytes),
        Err(ProtocolError::InvalidEncoding(_))
    ));

    let mut cursor = &bytes[..];
    let value = decode_from::<Packed>(&mut cursor).unwrap();
    assert_eq!(value, Packed { low: 1, high: 2 });
    assert_eq!(cursor, &[0xFF]);
}

#[test]
fn test_short_buffer_reports_eof() {
    let err = decode::<Switched>(&[2, 0xEF]).unwrap_err();
    assert_eq!(err.field_name(), Some("present"));
    assert!(matches!(
        err.root_cause(),
        ProtocolError::UnexpectedEof {
            needed: 2,
            remaining: 1
        }
    ));
}

#[test]
fn test_nested_structures_round_trip() {
    ua_struct! {
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct Outer {
            pub header: Packed,
            pub no_of_rows: i32,
            #[ua(tag = "lengthField=no_of_rows")]
            pub rows: Vec<Switched>,
        }
    }

    let value = Outer {
        header: Packed { low: 7, high: 31 },
        no_of_rows: 2,
        rows: vec![
            Switched {
                kind: 2,
                present: 5,
                absent: 0,
            },
            Switched {
                kind: 1,
                present: 0,
                absent: 6,
            },
        ],
    };
    let bytes = encode(&value).unwrap();
    assert_eq!(bytes[0], 0xFF);
    assert_eq!(decode::<Outer>(&bytes).unwrap(), value);
}
