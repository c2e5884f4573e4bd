//! Black-box container tests (spec section 8), placed in `tests/` rather than
//! the teacher's `e2e/` directory name (there is no `[[bin]]` whose name that
//! was disambiguating against here).

use qs2::api::{load_qdata, load_qs, save_qdata, save_qs};
use qs2::header::MAX_BLOCKSIZE;
use qs2::io::{MemReader, MemWriter};
use qs2::options::{Options, ShuffleMode};
use qs2::qdata::{Attributes, NullableVec, Tagged, Value};
use qs2::Qs2Error;

fn synthetic_bytes(n: usize) -> Vec<u8> {
    (0..n).map(|i| (i % 256) as u8).collect()
}

/// S1-shaped scenario: a nested list carrying attributes, including a NaN
/// payload that must round-trip as its exact bit pattern (spec section 8).
fn nested_tree_with_attributes() -> Tagged {
    let mut class_attrs = Attributes::new();
    class_attrs.push(
        "class".to_string(),
        Tagged::plain(Value::Character(vec![Some("data.frame".to_string())])),
    );

    let column = Tagged {
        attributes: class_attrs,
        value: Value::Numeric(vec![1.0, f64::NAN, -0.0, f64::INFINITY]),
    };

    let names = Tagged::plain(Value::Character(vec![
        Some("a".to_string()),
        None,
        Some("c".to_string()),
    ]));
    let mut list_attrs = Attributes::new();
    list_attrs.push("names".to_string(), names);

    Tagged {
        attributes: list_attrs,
        value: Value::List(vec![
            column,
            Tagged::plain(Value::Integer(NullableVec::from_vec(vec![
                Some(1),
                None,
                Some(3),
            ]))),
            Tagged::plain(Value::Raw(vec![0xDE, 0xAD, 0xBE, 0xEF])),
        ]),
    }
}

fn assert_numeric_bitwise_eq(a: &Value, b: &Value) {
    match (a, b) {
        (Value::Numeric(x), Value::Numeric(y)) => {
            assert_eq!(x.len(), y.len());
            for (xi, yi) in x.iter().zip(y.iter()) {
                assert_eq!(xi.to_bits(), yi.to_bits(), "NaN/sign payload must survive exactly");
            }
        }
        _ => panic!("expected Numeric values"),
    }
}

#[test]
fn qdata_roundtrip_preserves_attributes_and_nan_bits() {
    let options = Options {
        n_threads: 1,
        ..Options::default()
    };
    let root = nested_tree_with_attributes();
    let sink = save_qdata(MemWriter::new(), &root, &options).unwrap();
    let out = load_qdata(MemReader::new(sink.into_inner()), &options).unwrap();

    assert_eq!(out.value, root.value);
    assert!(out.attributes.object, "class attribute must set object=true");

    if let (Value::List(orig), Value::List(got)) = (&root.value, &out.value) {
        assert_numeric_bitwise_eq(&orig[0].value, &got[0].value);
    } else {
        panic!("expected List values");
    }
}

/// Spans several framed blocks (spec section 3.2's `MAX_BLOCKSIZE`), checking
/// the block-boundary discipline doesn't lose or duplicate bytes.
#[test]
fn qs_roundtrip_spans_many_blocks() {
    let options = Options::default();
    let bytes = synthetic_bytes(MAX_BLOCKSIZE * 3 + 12345);
    let sink = save_qs(MemWriter::new(), &bytes, &options).unwrap();
    let saved = sink.into_inner();
    assert!(saved.len() > MAX_BLOCKSIZE * 2);

    let out = load_qs(MemReader::new(saved), bytes.len(), &options).unwrap();
    assert_eq!(out, bytes);
}

/// QS never learns an element size for its opaque payload (type_size stays
/// at the writer's default of 1), so `ShuffleMode::On` is a no-op for this
/// format in practice — but the option must still round-trip cleanly rather
/// than error out.
#[test]
fn qs_roundtrip_with_shuffle_mode_on() {
    let options = Options {
        shuffle: ShuffleMode::On,
        n_threads: 1,
        ..Options::default()
    };
    let mut bytes = Vec::with_capacity(1 << 20);
    for i in 0..(1 << 17) {
        bytes.extend_from_slice(&(i as f64).to_le_bytes());
    }
    let sink = save_qs(MemWriter::new(), &bytes, &options).unwrap();
    let out = load_qs(MemReader::new(sink.into_inner()), bytes.len(), &options).unwrap();
    assert_eq!(out, bytes);
}

#[test]
fn truncated_container_is_rejected() {
    let options = Options {
        n_threads: 1,
        ..Options::default()
    };
    let bytes = synthetic_bytes(200_000);
    let sink = save_qs(MemWriter::new(), &bytes, &options).unwrap();
    let mut saved = sink.into_inner();
    saved.truncate(saved.len() - 16);

    let err = load_qs(MemReader::new(saved), bytes.len(), &options).unwrap_err();
    assert!(matches!(
        err,
        Qs2Error::TruncatedInput(_) | Qs2Error::CorruptBlock(_)
    ));
}

#[cfg(feature = "multithread")]
#[test]
fn hash_is_deterministic_across_worker_counts() {
    let root = nested_tree_with_attributes();

    let mut hashes = Vec::new();
    for &n_threads in &[1usize, 2, 4] {
        let options = Options {
            n_threads,
            shuffle: ShuffleMode::On,
            ..Options::default()
        };
        let sink = save_qdata(MemWriter::new(), &root, &options).unwrap();
        let bytes = sink.into_inner();
        let mut hash_bytes = [0u8; 8];
        hash_bytes.copy_from_slice(&bytes[16..24]);
        hashes.push(u64::from_le_bytes(hash_bytes));
    }

    assert!(
        hashes.iter().all(|h| *h == hashes[0]),
        "trailer hash must not depend on n_threads: {hashes:?}"
    );
}

#[cfg(feature = "multithread")]
#[test]
fn hash_validated_reader_detects_corruption() {
    let options = Options {
        n_threads: 2,
        validate_hash: true,
        ..Options::default()
    };
    let bytes = synthetic_bytes(500_000);
    let sink = save_qs(MemWriter::new(), &bytes, &options).unwrap();
    let mut saved = sink.into_inner();

    // Flip a byte well inside the compressed payload, after the header.
    let flip_at = saved.len() / 2;
    saved[flip_at] ^= 0xFF;

    let result = load_qs(MemReader::new(saved), bytes.len(), &options);
    assert!(result.is_err(), "corrupted payload must not validate");
}
