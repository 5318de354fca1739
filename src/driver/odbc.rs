use crate::config::DatabaseConfig;
use crate::driver::{CellValue, ProcedureDriver, ResultSet, Scalar};
use crate::error::{CallError, CallErrorKind};
use odbc_api::parameter::InputParameter;
use odbc_api::{
    ColumnDescription, Connection, ConnectionOptions, Cursor, DataType, Environment,
    IntoParameter, ResultSetMetadata,
};
use secrecy::ExposeSecret;
use std::sync::OnceLock;

/// Process-wide ODBC environment, shared by every connection.
fn environment() -> Result<&'static Environment, CallError> {
    static ENV: OnceLock<Environment> = OnceLock::new();
    if ENV.get().is_none() {
        let env = Environment::new().map_err(|e| {
            CallError::connection(format!("ODBC environment error: {}", e))
        })?;
        let _ = ENV.set(env);
    }
    ENV.get()
        .ok_or_else(|| CallError::connection("ODBC environment unavailable"))
}

pub struct OdbcDriver {
    conn: Connection<'static>,
    call_timeout: Option<usize>,
}

impl OdbcDriver {
    /// Open a connection for the configured target with autocommit off;
    /// the adapter's commit discipline takes over from there.
    pub fn connect(config: &DatabaseConfig) -> Result<Self, CallError> {
        let conn_str = connection_string(config);
        let env = environment()?;
        let conn = env
            .connect_with_connection_string(
                &conn_str,
                ConnectionOptions {
                    login_timeout_sec: Some(config.login_timeout_secs),
                    ..Default::default()
                },
            )
            .map_err(call_error)?;
        conn.set_autocommit(false).map_err(call_error)?;
        Ok(Self {
            conn,
            call_timeout: config.call_timeout_secs.map(|secs| secs as usize),
        })
    }

    fn execute_call(&self, text: &str, args: &[Scalar]) -> Result<Vec<ResultSet>, CallError> {
        let params = bind_params(args);
        let mut sets = Vec::new();
        let mut maybe_cursor = self
            .conn
            .execute(text, &params[..], self.call_timeout)
            .map_err(call_error)?;
        while let Some(mut cursor) = maybe_cursor {
            sets.push(drain_result_set(&mut cursor)?);
            maybe_cursor = cursor.more_results().map_err(call_error)?;
        }
        Ok(sets)
    }
}

impl ProcedureDriver for OdbcDriver {
    fn call(&mut self, procedure: &str, args: &[Scalar]) -> Result<Vec<ResultSet>, CallError> {
        let text = call_escape(procedure, args.len());
        match self.execute_call(&text, args) {
            Ok(sets) => {
                self.conn.commit().map_err(call_error)?;
                Ok(sets)
            }
            Err(e) => {
                // Keep the connection usable for the next invocation.
                if let Err(rollback) = self.conn.rollback() {
                    log::warn!("rollback after failed call: {}", rollback);
                }
                Err(e)
            }
        }
    }
}

/// Assemble the ODBC connection string from the configured target.
pub fn connection_string(config: &DatabaseConfig) -> String {
    let parts = vec![
        format!("Driver={{{}}}", config.driver),
        format!("Server={}", config.host),
        format!("Port={}", config.port),
        format!("Database={}", config.database),
        format!("UID={}", config.username),
        format!(
            "PWD={}",
            odbc_api::escape_attribute_value(config.password.expose_secret())
        ),
    ];
    parts.join(";") + ";"
}

/// ODBC call escape for a procedure with `arity` positional parameters.
pub fn call_escape(procedure: &str, arity: usize) -> String {
    if arity == 0 {
        format!("{{CALL {}}}", procedure)
    } else {
        let markers = vec!["?"; arity].join(", ");
        format!("{{CALL {}({})}}", procedure, markers)
    }
}

fn bind_params(args: &[Scalar]) -> Vec<Box<dyn InputParameter>> {
    args.iter()
        .map(|arg| -> Box<dyn InputParameter> {
            match arg {
                Scalar::Text(s) => Box::new(s.clone().into_parameter()),
                Scalar::Int(i) => Box::new((*i).into_parameter()),
                Scalar::Float(f) => Box::new((*f).into_parameter()),
                Scalar::Null => Box::new(Option::<String>::None.into_parameter()),
            }
        })
        .collect()
}

/// How cells of a column are decoded from their text representation.
#[derive(Debug, Clone, Copy)]
enum CellKind {
    Text,
    Int,
    Float,
}

fn cell_kind(data_type: &DataType) -> CellKind {
    match data_type {
        DataType::TinyInt
        | DataType::SmallInt
        | DataType::Integer
        | DataType::BigInt
        | DataType::Bit => CellKind::Int,
        DataType::Real
        | DataType::Float { .. }
        | DataType::Double
        | DataType::Decimal { .. }
        | DataType::Numeric { .. } => CellKind::Float,
        _ => CellKind::Text,
    }
}

/// A numeric column whose text does not parse falls back to text rather
/// than dropping the cell.
fn typed_cell(kind: CellKind, text: String) -> CellValue {
    match kind {
        CellKind::Int => match text.parse::<i64>() {
            Ok(i) => CellValue::Int(i),
            Err(_) => CellValue::Text(text),
        },
        CellKind::Float => match text.parse::<f64>() {
            Ok(f) => CellValue::Float(f),
            Err(_) => CellValue::Text(text),
        },
        CellKind::Text => CellValue::Text(text),
    }
}

fn drain_result_set(
    cursor: &mut (impl Cursor + ResultSetMetadata),
) -> Result<ResultSet, CallError> {
    let num_cols = cursor.num_result_cols().map_err(call_error)? as usize;

    let mut columns = Vec::with_capacity(num_cols);
    let mut kinds = Vec::with_capacity(num_cols);
    for i in 1..=num_cols as u16 {
        let mut desc = ColumnDescription::default();
        cursor.describe_col(i, &mut desc).map_err(call_error)?;
        let name = desc.name_to_string().map_err(|e| {
            CallError::database(format!("failed to decode column name {}: {}", i, e))
        })?;
        columns.push(name);
        kinds.push(cell_kind(&desc.data_type));
    }

    let mut rows = Vec::new();
    let mut buf = Vec::new();
    while let Some(mut row) = cursor.next_row().map_err(call_error)? {
        let mut cells = Vec::with_capacity(num_cols);
        for (idx, kind) in kinds.iter().enumerate() {
            buf.clear();
            let present = row
                .get_text((idx + 1) as u16, &mut buf)
                .map_err(|e| CallError::database(format!("fetch error: {}", e)))?;
            if present {
                let text = String::from_utf8_lossy(&buf).into_owned();
                cells.push(typed_cell(*kind, text));
            } else {
                cells.push(CellValue::Null);
            }
        }
        rows.push(cells);
    }

    Ok(ResultSet { columns, rows })
}

fn call_error(error: odbc_api::Error) -> CallError {
    let message = error.to_string();
    CallError::new(classify_sqlstate(&message), message)
}

/// Map a diagnostic message to an error class by the SQLSTATE it carries.
pub fn classify_sqlstate(message: &str) -> CallErrorKind {
    const CONNECTION_STATES: [&str; 5] = ["08001", "08003", "08004", "08007", "08S01"];
    const INVALID_STATES: [&str; 5] = ["42000", "42S02", "42S22", "07001", "07002"];

    if message.contains("28000") {
        CallErrorKind::Auth
    } else if CONNECTION_STATES.iter().any(|s| message.contains(s)) {
        CallErrorKind::Connection
    } else if INVALID_STATES.iter().any(|s| message.contains(s)) {
        CallErrorKind::InvalidCall
    } else {
        CallErrorKind::Database
    }
}
