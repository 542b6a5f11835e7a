//! Property-based generators for protocol types.

use proptest::prelude::*;
use shardtx_codec::{RecordKey, Value};
use shardtx_protocol::{OptionSet, TxnId, WriteOption};

/// Strategy producing arbitrary cell values.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<i64>().prop_map(Value::Integer),
        "[a-z0-9]{0,24}".prop_map(Value::Text),
        proptest::collection::vec(any::<u8>(), 0..48).prop_map(Value::Bytes),
    ]
}

/// Strategy producing record keys of up to four components.
pub fn record_key_strategy() -> impl Strategy<Value = RecordKey> {
    proptest::collection::vec(value_strategy(), 0..4).prop_map(RecordKey::from_values)
}

/// Strategy producing option sets with up to eight options.
pub fn option_set_strategy() -> impl Strategy<Value = OptionSet> {
    (
        any::<u64>(),
        "[a-z_]{1,16}",
        proptest::collection::vec((any::<i32>(), any::<u64>(), value_strategy()), 0..8),
        any::<bool>(),
        record_key_strategy(),
    )
        .prop_map(|(txn, table, options, accepted, key)| {
            let mut set = OptionSet::new(TxnId::new(txn), table, key);
            for (column, version, value) in options {
                set.add(WriteOption::new(column, version, value));
            }
            if accepted {
                set.accept();
            }
            set
        })
}
