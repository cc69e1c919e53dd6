use proptest::prelude::*;
use serde_json::{json, Map, Value};

/// Hex object ids
pub fn object_id_strategy() -> impl Strategy<Value = String> {
    "[0-9a-f]{24}"
}

/// Scalar values in the shapes documents carry them
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|n| json!(n)),
        (-1.0e9..1.0e9f64).prop_map(|n| json!(n)),
        "[a-zA-Z0-9 ]{0,16}".prop_map(Value::String),
        any::<i32>().prop_map(|n| json!({"$numberLong": n.to_string()})),
        (0i64..4_102_444_800_000).prop_map(|ms| json!({"$date": ms})),
    ]
}

const FIELDS: &[&str] = &[
    "id",
    "address",
    "balanceAmount",
    "cashAmount",
    "createdAt",
    "invoiceNumber",
    "isPrinted",
    "orderNumber",
    "status",
    "total",
    "transactionId",
    "updatedAt",
];

/// Order documents with a random subset of known fields and an optional creator
pub fn order_document_strategy() -> impl Strategy<Value = Value> {
    (
        object_id_strategy(),
        prop::collection::vec((prop::sample::select(FIELDS), scalar_strategy()), 0..10),
        prop::option::of((object_id_strategy(), "[a-z]{1,8}")),
    )
        .prop_map(|(oid, fields, creator)| {
            let mut document = Map::new();
            document.insert("_id".to_string(), json!({"$oid": oid}));
            for (name, value) in fields {
                document.insert(name.to_string(), value);
            }
            if let Some((creator_oid, user_name)) = creator {
                document.insert(
                    "createdBy".to_string(),
                    json!({"_id": {"$oid": creator_oid}, "userName": user_name}),
                );
            }
            Value::Object(document)
        })
}

/// Payload bytes that are not a JSON object
pub fn garbage_payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        Just(b"not json".to_vec()),
        Just(b"[1,2,3]".to_vec()),
        Just(b"\"string\"".to_vec()),
        Just(vec![0xff, 0xfe, 0x00]),
        "[a-z\\[\\]:,]{0,20}".prop_map(String::into_bytes),
    ]
}
