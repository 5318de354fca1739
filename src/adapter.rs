use crate::driver::ResultSet;
use crate::error::CallError;
use serde_json::{Map, Value};

/// One normalized output record: `Key` first, then the row's columns in
/// positional order.
pub type Record = Map<String, Value>;

pub const KEY_FIELD: &str = "Key";
pub const ANSWER_FIELD: &str = "Answer";
pub const CLASS_FIELD: &str = "Class";

/// Flatten every result set of an invocation into one record sequence.
///
/// Rows are concatenated in arrival order and numbered with a single
/// running `Key`, never reset between result sets. A call that produced
/// no rows at all yields the single `Done` status record instead.
pub fn flatten(result_sets: Vec<ResultSet>) -> Vec<Record> {
    let mut records = Vec::new();
    for set in result_sets {
        let names: Vec<String> = set
            .columns
            .iter()
            .map(|c| strip_sigil(c).to_string())
            .collect();
        for row in set.rows {
            let mut record = Record::new();
            record.insert(KEY_FIELD.to_string(), Value::from(records.len()));
            for (name, cell) in names.iter().zip(row) {
                record.insert(name.clone(), cell.into_json());
            }
            records.push(record);
        }
    }
    if records.is_empty() {
        records.push(status_record("Done"));
    }
    records
}

/// The `{Key: 0, Answer: ...}` degenerate record.
pub fn status_record(answer: &str) -> Record {
    let mut record = Record::new();
    record.insert(KEY_FIELD.to_string(), Value::from(0));
    record.insert(ANSWER_FIELD.to_string(), Value::String(answer.to_string()));
    record
}

/// The error envelope: one status record carrying the failure description
/// and its class tag.
pub fn error_records(error: &CallError) -> Vec<Record> {
    let mut record = status_record(&error.message);
    record.insert(
        CLASS_FIELD.to_string(),
        Value::String(error.kind.as_str().to_string()),
    );
    vec![record]
}

// Procedures that select session variables report columns like "@usuario";
// the JSON field drops the marker.
fn strip_sigil(name: &str) -> &str {
    name.strip_prefix('@').unwrap_or(name)
}
