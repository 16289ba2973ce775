//! End-to-end tests of factory construction, dispatch, and decoding.

use std::sync::Arc;

use num_bigint::BigInt;
use serde_smile_factory::{
    Error, Event, ReadFeatures, ReadOverrides, SmileFactory, Token, WriteFeatures, WriteOverrides,
};

/// Encodes a representative document: nested structure, repeated field
/// names, strings, numbers, and binary.
fn encode_sample(factory: &SmileFactory, overrides: &WriteOverrides) -> Vec<u8> {
    let mut w = factory
        .writer_with_overrides(Vec::new(), overrides)
        .unwrap();
    w.start_object().unwrap();
    w.write_field_name("users").unwrap();
    w.start_array().unwrap();
    for (id, name) in [(1i64, "Alice"), (2, "Bob")] {
        w.start_object().unwrap();
        w.write_field_name("id").unwrap();
        w.write_i64(id).unwrap();
        w.write_field_name("name").unwrap();
        w.write_string(name).unwrap();
        w.write_field_name("active").unwrap();
        w.write_bool(id == 1).unwrap();
        w.end_object().unwrap();
    }
    w.end_array().unwrap();
    w.write_field_name("score").unwrap();
    w.write_f64(0.25).unwrap();
    w.write_field_name("total").unwrap();
    w.write_bigint(&BigInt::parse_bytes(b"123456789012345678901234567890", 10).unwrap())
        .unwrap();
    w.write_field_name("blob").unwrap();
    w.write_binary(&[0x00, 0x7F, 0x80, 0xFF, 0x55]).unwrap();
    w.write_field_name("none").unwrap();
    w.write_null().unwrap();
    w.end_object().unwrap();
    w.finish().unwrap()
}

fn collect_slice_tokens(factory: &SmileFactory, bytes: &[u8]) -> Vec<Token> {
    let mut reader = factory.reader_from_slice(bytes).unwrap();
    let mut tokens = Vec::new();
    while let Some(token) = reader.next_token().unwrap() {
        tokens.push(token);
    }
    tokens
}

#[test]
fn header_write_enabled_always_constructs() {
    let factory = SmileFactory::new();
    for end_marker in [false, true] {
        for seven_bit in [false, true] {
            for shared_names in [false, true] {
                for shared_values in [false, true] {
                    let overrides = WriteOverrides::new()
                        .write_header(true)
                        .write_end_marker(end_marker)
                        .encode_binary_as_7bit(seven_bit)
                        .check_shared_names(shared_names)
                        .check_shared_string_values(shared_values);
                    assert!(
                        factory.writer_with_overrides(Vec::new(), &overrides).is_ok(),
                        "construction must succeed whenever the header is written"
                    );
                }
            }
        }
    }
}

#[test]
fn headerless_shared_string_values_conflict() {
    let factory = SmileFactory::new();
    let overrides = WriteOverrides::new()
        .write_header(false)
        .check_shared_string_values(true);
    let err = factory
        .writer_with_overrides(Vec::new(), &overrides)
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("WRITE_HEADER"));
    assert!(msg.contains("CHECK_SHARED_STRING_VALUES"));
    assert!(msg.contains("either enable"));
}

#[test]
fn headerless_raw_binary_conflict() {
    let factory = SmileFactory::new();
    let overrides = WriteOverrides::new()
        .write_header(false)
        .encode_binary_as_7bit(false);
    let err = factory
        .writer_with_overrides(Vec::new(), &overrides)
        .unwrap_err();
    assert!(matches!(err, Error::ConfigurationConflict { .. }));
    assert!(err.to_string().contains("ENCODE_BINARY_AS_7BIT"));
}

#[test]
fn rejection_produces_no_bytes_and_no_writer() {
    // The sink is moved into the construction attempt; a second attempt on
    // a fresh sink after fixing the flags starts from a clean slate, which
    // is only sound because rejection happens before any write.
    let factory = SmileFactory::new();
    let overrides = WriteOverrides::new()
        .write_header(false)
        .check_shared_string_values(true);
    assert!(factory
        .writer_with_overrides(Vec::new(), &overrides)
        .is_err());
    let fixed = WriteOverrides::new().check_shared_string_values(true);
    let writer = factory.writer_with_overrides(Vec::new(), &fixed).unwrap();
    let bytes = writer.finish().unwrap();
    assert_eq!(bytes.len(), 4); // header only
}

#[test]
fn stream_and_slice_sources_decode_identically() {
    let factory = SmileFactory::new();
    let bytes = encode_sample(&factory, &WriteOverrides::new());
    let from_slice = collect_slice_tokens(&factory, &bytes);

    let mut stream_reader = factory.reader_from_reader(&bytes[..]).unwrap();
    let mut from_stream = Vec::new();
    while let Some(token) = stream_reader.next_token().unwrap() {
        from_stream.push(token);
    }
    assert_eq!(from_slice, from_stream);
    assert!(from_slice.len() > 20);
}

#[test]
fn region_reader_honors_offset_and_len() {
    let factory = SmileFactory::new();
    let bytes = encode_sample(&factory, &WriteOverrides::new());
    let mut padded = vec![0xAAu8; 7];
    padded.extend_from_slice(&bytes);
    padded.extend_from_slice(&[0xBB; 3]);

    let mut reader = factory
        .reader_from_region(&padded, 7, bytes.len())
        .unwrap();
    let mut tokens = Vec::new();
    while let Some(token) = reader.next_token().unwrap() {
        tokens.push(token);
    }
    assert_eq!(tokens, collect_slice_tokens(&factory, &bytes));
}

#[test]
fn character_sources_are_unsupported() {
    let factory = SmileFactory::new();
    assert!(matches!(
        factory.reader_from_str("{}"),
        Err(Error::UnsupportedSource(_))
    ));
}

#[test]
fn non_blocking_two_chunk_split_equivalence() {
    let factory = SmileFactory::new();
    let bytes = encode_sample(&factory, &WriteOverrides::new());
    let whole = collect_slice_tokens(&factory, &bytes);

    for split in 0..=bytes.len() {
        let mut reader = factory.non_blocking_reader();
        let (a, b) = bytes.split_at(split);
        let mut fed_second = false;
        let mut tokens = Vec::new();
        reader.feed(a);
        loop {
            match reader.next_event().unwrap() {
                Event::Token(token) => tokens.push(token),
                Event::NeedMoreInput => {
                    if fed_second {
                        panic!("decoder asked for input after the document ended");
                    }
                    reader.feed(b);
                    reader.end_of_input();
                    fed_second = true;
                }
                Event::End => break,
            }
        }
        assert_eq!(tokens, whole, "split at byte {split} changed the tokens");
    }
}

#[test]
fn non_blocking_never_reports_completed_token_as_partial() {
    // Feed one byte at a time; every event must be either a real token or
    // a suspension, and the final sequence matches the buffered decode.
    let factory = SmileFactory::new();
    let bytes = encode_sample(&factory, &WriteOverrides::new());
    let whole = collect_slice_tokens(&factory, &bytes);

    let mut reader = factory.non_blocking_reader();
    let mut tokens = Vec::new();
    for &byte in &bytes {
        reader.feed(&[byte]);
        loop {
            match reader.next_event().unwrap() {
                Event::Token(token) => tokens.push(token),
                Event::NeedMoreInput => break,
                Event::End => break,
            }
        }
    }
    reader.end_of_input();
    while let Event::Token(token) = reader.next_event().unwrap() {
        tokens.push(token);
    }
    assert_eq!(tokens, whole);
}

#[test]
fn shared_string_values_roundtrip_and_compress() {
    let factory = SmileFactory::new();
    let repeated = ["north", "south", "north", "north", "south"];

    let write_doc = |overrides: &WriteOverrides| {
        let mut w = factory.writer_with_overrides(Vec::new(), overrides).unwrap();
        w.start_array().unwrap();
        for value in repeated {
            w.write_string(value).unwrap();
        }
        w.end_array().unwrap();
        w.finish().unwrap()
    };

    let plain = write_doc(&WriteOverrides::new());
    let shared = write_doc(&WriteOverrides::new().check_shared_string_values(true));
    assert!(shared.len() < plain.len());

    let expected: Vec<Token> = std::iter::once(Token::StartArray)
        .chain(repeated.iter().map(|s| Token::String(s.to_string())))
        .chain(std::iter::once(Token::EndArray))
        .collect();
    assert_eq!(collect_slice_tokens(&factory, &plain), expected);
    assert_eq!(collect_slice_tokens(&factory, &shared), expected);
}

#[test]
fn raw_binary_mode_roundtrips_with_header() {
    let factory = SmileFactory::new();
    let data: Vec<u8> = (0..=255u8).collect();
    let overrides = WriteOverrides::new().encode_binary_as_7bit(false);
    let mut w = factory.writer_with_overrides(Vec::new(), &overrides).unwrap();
    w.write_binary(&data).unwrap();
    let bytes = w.finish().unwrap();
    assert_eq!(
        collect_slice_tokens(&factory, &bytes),
        vec![Token::Binary(data)]
    );
}

#[test]
fn headerless_writer_pairs_with_lenient_reader() {
    let factory = SmileFactory::builder()
        .read_features(ReadFeatures::default().with_require_header(false))
        .write_features(WriteFeatures::default().with_write_header(false))
        .build();
    let mut w = factory.writer(Vec::new()).unwrap();
    w.start_object().unwrap();
    w.write_field_name("k").unwrap();
    w.write_string("v").unwrap();
    w.end_object().unwrap();
    let bytes = w.finish().unwrap();
    assert_ne!(&bytes[..3], b":)\n");

    let tokens = collect_slice_tokens(&factory, &bytes);
    assert_eq!(tokens.len(), 4);
    assert!(matches!(&tokens[1], Token::FieldName(n) if &**n == "k"));
}

#[test]
fn strict_reader_rejects_headerless_content() {
    let factory = SmileFactory::new();
    let overrides = WriteOverrides::new().write_header(false);
    let mut w = factory.writer_with_overrides(Vec::new(), &overrides).unwrap();
    w.write_i64(1).unwrap();
    let bytes = w.finish().unwrap();

    let mut reader = factory.reader_from_slice(&bytes).unwrap();
    assert!(matches!(reader.next_token(), Err(Error::Decode { .. })));

    // The same bytes decode once the requirement is overridden per-call.
    let mut lenient = factory
        .reader_from_region_with_overrides(
            &bytes,
            0,
            bytes.len(),
            &ReadOverrides::new().require_header(false),
        )
        .unwrap();
    assert_eq!(lenient.next_token().unwrap(), Some(Token::Int(1)));
}

#[test]
fn end_marker_terminates_document() {
    let factory = SmileFactory::new();
    let overrides = WriteOverrides::new().write_end_marker(true);
    let mut w = factory.writer_with_overrides(Vec::new(), &overrides).unwrap();
    w.write_i64(9).unwrap();
    let mut bytes = w.finish().unwrap();
    // Trailing garbage after the end marker is never looked at.
    bytes.extend_from_slice(&[0x00, 0x01, 0x02]);
    assert_eq!(
        collect_slice_tokens(&factory, &bytes),
        vec![Token::Int(9)]
    );
}

#[test]
fn truncated_document_reports_unexpected_end() {
    let factory = SmileFactory::new();
    let bytes = encode_sample(&factory, &WriteOverrides::new());
    let mut reader = factory
        .reader_from_slice(&bytes[..bytes.len() - 2])
        .unwrap();
    let result = loop {
        match reader.next_token() {
            Ok(Some(_)) => continue,
            other => break other,
        }
    };
    assert!(matches!(result, Err(Error::UnexpectedEndOfInput { .. })));
}

#[test]
fn concurrent_sessions_merge_into_a_consistent_union() {
    let factory = Arc::new(SmileFactory::new());
    let sessions: usize = 8;

    std::thread::scope(|scope| {
        for t in 0..sessions {
            let factory = Arc::clone(&factory);
            scope.spawn(move || {
                let mut w = factory.writer(Vec::new()).unwrap();
                w.start_object().unwrap();
                w.write_field_name("common").unwrap();
                w.write_i64(t as i64).unwrap();
                w.write_field_name(&format!("only_in_{t}")).unwrap();
                w.write_bool(true).unwrap();
                w.end_object().unwrap();
                let bytes = w.finish().unwrap();

                let mut reader = factory.reader_from_slice(&bytes).unwrap();
                while reader.next_token().unwrap().is_some() {}
                // Dropping the reader releases its scope and merges.
            });
        }
    });

    let symbols = factory.symbols();
    assert_eq!(symbols.len(), 1 + sessions);
    assert!(symbols.contains("common"));
    for t in 0..sessions {
        assert!(symbols.contains(&format!("only_in_{t}")));
    }
}

#[test]
fn later_sessions_reuse_interned_references() {
    let factory = SmileFactory::new();
    let bytes = {
        let mut w = factory.writer(Vec::new()).unwrap();
        w.start_object().unwrap();
        w.write_field_name("payload").unwrap();
        w.write_null().unwrap();
        w.end_object().unwrap();
        w.finish().unwrap()
    };

    let first = collect_slice_tokens(&factory, &bytes);
    let second = collect_slice_tokens(&factory, &bytes);
    let (Token::FieldName(a), Token::FieldName(b)) = (&first[1], &second[1]) else {
        panic!("expected field names");
    };
    // The second session's name came from the root snapshot.
    assert!(Arc::ptr_eq(a, b));
}

#[test]
fn matcher_duplicate_and_fast_path() {
    let factory = SmileFactory::new();
    assert!(matches!(
        factory.field_name_matcher(["a", "b", "a"], false),
        Err(Error::DuplicateName { .. })
    ));

    let matcher = factory.field_name_matcher(["a", "b"], false).unwrap();
    let mut scope = factory.symbols().make_child(true);
    let fresh = scope.intern("a");
    assert_eq!(matcher.match_interned(&fresh), Some(0));
    assert_eq!(matcher.match_name("b"), Some(1));
    assert_eq!(matcher.match_name("c"), None);
}

#[test]
fn case_insensitive_matcher() {
    let factory = SmileFactory::new();
    let matcher = factory
        .case_insensitive_field_name_matcher(["Content-Type", "Accept"], false)
        .unwrap();
    assert_eq!(matcher.match_name("content-type"), Some(0));
    assert_eq!(matcher.match_name("ACCEPT"), Some(1));
    assert!(matches!(
        factory.case_insensitive_field_name_matcher(["id", "ID"], false),
        Err(Error::DuplicateName { .. })
    ));
}

#[test]
fn factory_persists_features_but_never_symbols() {
    let factory = SmileFactory::builder()
        .read_features(ReadFeatures::default().with_require_header(false))
        .write_features(WriteFeatures::default().with_write_end_marker(true))
        .build();
    factory.symbols().make_child(true).intern("learned");

    let json = serde_json::to_string(&factory).unwrap();
    assert!(!json.contains("learned"));

    let restored: SmileFactory = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.read_features(), factory.read_features());
    assert_eq!(restored.write_features(), factory.write_features());
    assert!(restored.symbols().is_empty());
}
