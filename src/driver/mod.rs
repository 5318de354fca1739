pub mod odbc;

use crate::error::CallError;
use serde_json::Value;

/// A positional argument for a stored-procedure call.
///
/// Date and datetime parameters travel as ISO text; the route layer has
/// already validated their shape by the time a `Scalar` exists.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Int(i64),
    Float(f64),
    Null,
}

/// A single cell value from a procedure result set.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Int(i64),
    Float(f64),
    Null,
}

impl CellValue {
    /// JSON representation of the cell. Non-finite floats degrade to null.
    pub fn into_json(self) -> Value {
        match self {
            CellValue::Text(s) => Value::String(s),
            CellValue::Int(i) => Value::from(i),
            CellValue::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            CellValue::Null => Value::Null,
        }
    }
}

/// One tabular output of a procedure call. A single call may produce
/// several of these; the adapter flattens them in arrival order.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

/// Trait for stored-procedure drivers.
///
/// Implementations must leave the connection transaction-clean whatever
/// the outcome: commit after a successful call, roll back after a failed
/// one, so the next invocation finds a usable connection.
pub trait ProcedureDriver {
    fn call(&mut self, procedure: &str, args: &[Scalar]) -> Result<Vec<ResultSet>, CallError>;
}
