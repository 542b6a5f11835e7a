//! Golden wire-format vectors.
//!
//! The versioned option set must interoperate bit-exactly: these vectors
//! pin the byte layout so an implementation in another language can be
//! checked against the same document.

use shardtx_codec::{RecordKey, Value};
use shardtx_protocol::{OptionSet, TxnId, WriteOption};

/// Hex-encodes bytes, lowercase, no separators.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Decodes a lowercase hex string.
///
/// # Panics
///
/// Panics on odd length or non-hex characters; golden vectors are
/// authored by hand and a malformed one is a bug in the vector.
pub fn hex_decode(hex: &str) -> Vec<u8> {
    assert!(hex.len() % 2 == 0, "odd-length hex string");
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).expect("invalid hex"))
        .collect()
}

/// The embedded option-set wire vectors: name, the structured set, and
/// its exact encoding.
pub fn option_set_vectors() -> Vec<(String, OptionSet, Vec<u8>)> {
    let doc: serde_json::Value =
        serde_json::from_str(&vectors_json()).expect("embedded vectors must parse");
    doc.as_array()
        .expect("vector document is an array")
        .iter()
        .map(|v| {
            let name = v["name"].as_str().expect("name").to_owned();
            let mut set = OptionSet::new(
                TxnId::new(v["txn_id"].as_u64().expect("txn_id")),
                v["table"].as_str().expect("table"),
                RecordKey::from_values(
                    v["key"]
                        .as_array()
                        .expect("key")
                        .iter()
                        .map(value_from_json),
                ),
            );
            for option in v["options"].as_array().expect("options") {
                set.add(WriteOption::new(
                    option["column"].as_i64().expect("column") as i32,
                    option["version"].as_u64().expect("version"),
                    value_from_json(&option["value"]),
                ));
            }
            if v["accepted"].as_bool().expect("accepted") {
                set.accept();
            }
            let bytes = hex_decode(v["hex"].as_str().expect("hex"));
            (name, set, bytes)
        })
        .collect()
}

fn value_from_json(v: &serde_json::Value) -> Value {
    match v["type"].as_str().expect("value type") {
        "null" => Value::Null,
        "int" => Value::Integer(v["v"].as_i64().expect("int payload")),
        "text" => Value::Text(v["v"].as_str().expect("text payload").to_owned()),
        "bytes" => Value::Bytes(hex_decode(v["v"].as_str().expect("bytes payload"))),
        other => panic!("unknown value type in vector: {other}"),
    }
}

// Pinned encodings, assembled from labeled segments. All integers are
// little-endian; variable-length fields carry a u32 length prefix;
// values are tagged (00 null, 01 integer, 02 text, 03 bytes).

/// txn 1, table "t", no options, not accepted, empty key.
const EMPTY_HEX: &str = concat!(
    "0100000000000000", // txn id 1
    "01000000", "74", // table "t"
    "00000000", // 0 options
    "00000000", // accepted = 0
    "00000000", // 0 key components
);

/// txn 42, table "acct", one option, not accepted, key (5).
const SINGLE_HEX: &str = concat!(
    "2a00000000000000", // txn id 42
    "04000000", "61636374", // table "acct"
    "01000000", // 1 option
    "01000000", "0300000000000000", "01", "0700000000000000", // col 1, ver 3, int 7
    "00000000", // accepted = 0
    "01000000", "01", "0500000000000000", // key (5)
);

/// txn 0x0102030405060708, table "orders", three options, accepted,
/// key ("eu", 11).
const ACCEPTED_HEX: &str = concat!(
    "0807060504030201", // txn id
    "06000000", "6f7264657273", // table "orders"
    "03000000", // 3 options
    "00000000", "0100000000000000", "02", "01000000", "70", // col 0, ver 1, text "p"
    "02000000", "0900000000000000", "01", "ffffffffffffffff", // col 2, ver 9, int -1
    "ffffffff", "0000000000000000", "00", // col -1, ver 0, null
    "01000000", // accepted = 1
    "02000000", "02", "02000000", "6575", "01", "0b00000000000000", // key ("eu", 11)
);

const VECTORS_TEMPLATE: &str = r#"[
  {
    "name": "empty",
    "txn_id": 1,
    "table": "t",
    "options": [],
    "accepted": false,
    "key": [],
    "hex": "@EMPTY@"
  },
  {
    "name": "single_option",
    "txn_id": 42,
    "table": "acct",
    "options": [
      {"column": 1, "version": 3, "value": {"type": "int", "v": 7}}
    ],
    "accepted": false,
    "key": [{"type": "int", "v": 5}],
    "hex": "@SINGLE@"
  },
  {
    "name": "accepted_three_options",
    "txn_id": 72623859790382856,
    "table": "orders",
    "options": [
      {"column": 0, "version": 1, "value": {"type": "text", "v": "p"}},
      {"column": 2, "version": 9, "value": {"type": "int", "v": -1}},
      {"column": -1, "version": 0, "value": {"type": "null"}}
    ],
    "accepted": true,
    "key": [{"type": "text", "v": "eu"}, {"type": "int", "v": 11}],
    "hex": "@ACCEPTED@"
  }
]"#;

fn vectors_json() -> String {
    VECTORS_TEMPLATE
        .replace("@EMPTY@", EMPTY_HEX)
        .replace("@SINGLE@", SINGLE_HEX)
        .replace("@ACCEPTED@", ACCEPTED_HEX)
}
