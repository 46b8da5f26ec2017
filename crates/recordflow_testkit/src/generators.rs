//! Property-based test generators using proptest.
//!
//! Provides strategies for field names, trust lists and rows.

use proptest::prelude::*;
use recordflow_store::{Row, Value};

/// Strategy for generating valid field names.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for generating field lists, possibly with duplicates.
pub fn field_list_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(field_name_strategy(), 0..8)
}

/// Strategy for generating backend/frontend list pairs that share some
/// fields.
pub fn overlapping_lists_strategy() -> impl Strategy<Value = (Vec<String>, Vec<String>)> {
    (
        field_list_strategy(),
        field_list_strategy(),
        field_list_strategy(),
    )
        .prop_map(|(backend_only, frontend_only, shared)| {
            let mut backend = backend_only;
            backend.extend(shared.iter().cloned());
            let mut frontend = shared;
            frontend.extend(frontend_only);
            (backend, frontend)
        })
}

/// Strategy for generating non-null column values.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        prop::string::string_regex("[ -~]{0,24}")
            .expect("Invalid regex")
            .prop_map(Value::Text),
    ]
}

/// Strategy for generating rows over arbitrary field names.
pub fn row_strategy() -> impl Strategy<Value = Row> {
    prop::collection::btree_map(field_name_strategy(), value_strategy(), 0..6)
}
