//! Random demo data shaped like production traffic: parent records with
//! fifty children each, and a batch of transfer documents between owners.

use std::time::Duration;

use rand::Rng;
use serde_json::{Map, Value, json};
use uuid::Uuid;

use docflow_store::{DEFAULT_DOCUMENT_TYPE, Document, Record, Timestamp, add_duration};

pub const PARENTS: usize = 20;
pub const CHILDREN_PER_PARENT: usize = 50;
pub const OWNERS: [&str; 4] = ["owner_1", "owner_2", "owner_3", "owner_4"];
pub const STATUSES: [i32; 6] = [1, 2, 3, 4, 10, 13];
pub const DOCUMENT_TYPES: [&str; 2] = [DEFAULT_DOCUMENT_TYPE, "not_transfer_document"];

pub struct SeedData {
    pub records: Vec<Record>,
    pub documents: Vec<Document>,
}

#[derive(Clone, Copy, Debug)]
pub struct SeedOptions {
    /// Store payloads as a JSON-encoded string, like the legacy writer did.
    pub encode_payload: bool,
}

pub fn generate(rng: &mut impl Rng, now: Timestamp, options: SeedOptions) -> SeedData {
    let records = make_records(rng);
    let count = rng.random_range(10..20usize);
    let documents = (0..count)
        .map(|index| {
            // Stagger arrival so selection order is well defined.
            let received_at = add_duration(now, Duration::from_millis(index as u64));
            make_document(rng, &records, received_at, options)
        })
        .collect();
    SeedData { records, documents }
}

/// Seed pools are non-empty constant arrays.
fn pick<T: Copy, const N: usize>(rng: &mut impl Rng, values: &[T; N]) -> T {
    values[rng.random_range(0..N)]
}

fn pick_other<T: Copy + PartialEq, const N: usize>(
    rng: &mut impl Rng,
    values: &[T; N],
    current: T,
) -> T {
    loop {
        let candidate = pick(rng, values);
        if candidate != current {
            return candidate;
        }
    }
}

fn object_id(rng: &mut impl Rng, prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::from_u128(rng.random()))
}

fn make_records(rng: &mut impl Rng) -> Vec<Record> {
    let mut records = Vec::with_capacity(PARENTS * (CHILDREN_PER_PARENT + 1));
    for _ in 0..PARENTS {
        let parent = object_id(rng, "p");
        let owner = pick(rng, &OWNERS);
        records.push(Record {
            object: parent.clone(),
            status: Some(pick(rng, &STATUSES)),
            level: Some(1),
            parent: None,
            owner: Some(owner.to_string()),
        });
        for _ in 0..CHILDREN_PER_PARENT {
            records.push(Record {
                object: object_id(rng, "ch"),
                status: Some(pick(rng, &STATUSES)),
                level: Some(0),
                parent: Some(parent.clone()),
                owner: Some(owner.to_string()),
            });
        }
    }
    records
}

fn make_document(
    rng: &mut impl Rng,
    records: &[Record],
    received_at: Timestamp,
    options: SeedOptions,
) -> Document {
    let seller = pick(rng, &OWNERS);
    let doc_id = Uuid::from_u128(rng.random()).to_string();
    let document_type = pick(rng, &DOCUMENT_TYPES);

    let objects: Vec<&str> = records
        .iter()
        .filter(|record| record.level == Some(1) && record.owner.as_deref() == Some(seller))
        .map(|record| record.object.as_str())
        .collect();

    let mut details = Map::new();
    if rng.random_bool(0.5) {
        let old = pick(rng, &STATUSES);
        let new = pick_other(rng, &STATUSES, old);
        details.insert("status".to_string(), json!({"old": old, "new": new}));
    }
    if document_type == DEFAULT_DOCUMENT_TYPE {
        let old = pick(rng, &OWNERS);
        let new = pick_other(rng, &OWNERS, old);
        details.insert("owner".to_string(), json!({"old": old, "new": new}));
    }

    let payload = json!({
        "document_data": {"document_id": doc_id, "document_type": document_type},
        "objects": objects,
        "operation_details": Value::Object(details),
    });
    let payload = if options.encode_payload {
        Value::String(payload.to_string())
    } else {
        payload
    };
    Document::new(doc_id, document_type, payload, received_at)
}
