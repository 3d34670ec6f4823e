//! In-process backend for tests and offline runs.

use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::{BTreeMap, VecDeque};

use super::{BackendError, DataApi, SelectQuery, Tables};
use crate::model::TicketId;

/// A request received by a [`MemoryBackend`], failed or not.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Select {
        table: String,
        offset: usize,
        limit: usize,
    },
    Update {
        table: String,
        id: TicketId,
        fields: Map<String, Value>,
    },
    Insert {
        table: String,
        rows: usize,
    },
    Rpc {
        function: String,
        args: Value,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Read,
    Write,
}

/// Tables held in memory. Writes and reads can be scripted to fail.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: RefCell<BTreeMap<String, Vec<Value>>>,
    names: Tables,
    calls: RefCell<Vec<Call>>,
    read_failures: RefCell<VecDeque<BackendError>>,
    write_failures: RefCell<VecDeque<BackendError>>,
    next_id: Cell<TicketId>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::with_tables(Tables::default())
    }

    #[must_use]
    pub fn with_tables(names: Tables) -> Self {
        Self {
            names,
            next_id: Cell::new(1),
            ..Self::default()
        }
    }

    /// Replace the contents of `table`.
    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        let max_id = rows.iter().filter_map(row_id).max().unwrap_or(0);
        if max_id >= self.next_id.get() {
            self.next_id.set(max_id + 1);
        }
        self.tables.borrow_mut().insert(table.to_string(), rows);
    }

    /// Current contents of `table`.
    #[must_use]
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables.borrow().get(table).cloned().unwrap_or_default()
    }

    /// The row of `table` with `id`.
    #[must_use]
    pub fn row(&self, table: &str, id: TicketId) -> Option<Value> {
        self.tables
            .borrow()
            .get(table)
            .and_then(|rows| rows.iter().find(|row| row_id(row) == Some(id)).cloned())
    }

    /// Fail the next `count` reads with `error`.
    pub fn fail_reads(&self, count: usize, error: &BackendError) {
        self.script(Op::Read, count, error);
    }

    /// Fail the next `count` writes (update, insert, rpc) with `error`.
    pub fn fail_writes(&self, count: usize, error: &BackendError) {
        self.script(Op::Write, count, error);
    }

    /// Every request received so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    fn script(&self, op: Op, count: usize, error: &BackendError) {
        let queue = match op {
            Op::Read => &self.read_failures,
            Op::Write => &self.write_failures,
        };
        queue
            .borrow_mut()
            .extend(std::iter::repeat_n(error.clone(), count));
    }

    fn record(&self, call: Call, op: Op) -> Result<(), BackendError> {
        self.calls.borrow_mut().push(call);
        let queue = match op {
            Op::Read => &self.read_failures,
            Op::Write => &self.write_failures,
        };
        queue.borrow_mut().pop_front().map_or(Ok(()), Err)
    }

    fn apply_update(
        &self,
        table: &str,
        id: TicketId,
        fields: &Map<String, Value>,
    ) -> Result<Value, BackendError> {
        let mut tables = self.tables.borrow_mut();
        let row = tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|row| row_id(row) == Some(id)))
            .ok_or_else(|| BackendError::NotFound {
                table: table.to_string(),
                id,
            })?;
        if let Value::Object(object) = row {
            for (column, value) in fields {
                object.insert(column.clone(), value.clone());
            }
        }
        Ok(row.clone())
    }
}

fn row_id(row: &Value) -> Option<TicketId> {
    row.get("id").and_then(Value::as_i64)
}

fn compare_column(a: &Value, b: &Value, column: &str) -> Ordering {
    match (a.get(column), b.get(column)) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Null) | None, Some(Value::Null) | None) => Ordering::Equal,
        (Some(Value::Null) | None, _) => Ordering::Greater,
        (_, Some(Value::Null) | None) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

impl DataApi for MemoryBackend {
    fn select_page(
        &self,
        query: &SelectQuery,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Value>, BackendError> {
        self.record(
            Call::Select {
                table: query.table.clone(),
                offset,
                limit,
            },
            Op::Read,
        )?;

        let mut rows = self.rows(&query.table);
        if let Some((column, ascending)) = &query.order {
            rows.sort_by(|a, b| {
                let ordering = compare_column(a, b, column);
                if *ascending { ordering } else { ordering.reverse() }
            });
        }
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    fn update(
        &self,
        table: &str,
        id: TicketId,
        fields: &Map<String, Value>,
    ) -> Result<Value, BackendError> {
        self.record(
            Call::Update {
                table: table.to_string(),
                id,
                fields: fields.clone(),
            },
            Op::Write,
        )?;
        self.apply_update(table, id, fields)
    }

    fn insert(&self, table: &str, rows: &[Value]) -> Result<Vec<Value>, BackendError> {
        self.record(
            Call::Insert {
                table: table.to_string(),
                rows: rows.len(),
            },
            Op::Write,
        )?;

        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            let Value::Object(object) = row else {
                return Err(BackendError::Status {
                    status: 400,
                    body: "row is not an object".into(),
                });
            };
            let id = self.next_id.get();
            self.next_id.set(id + 1);
            let mut object = object.clone();
            object.insert("id".into(), Value::from(id));
            stored.push(Value::Object(object));
        }

        self.tables
            .borrow_mut()
            .entry(table.to_string())
            .or_default()
            .extend(stored.iter().cloned());
        Ok(stored)
    }

    fn rpc(&self, function: &str, args: &Value) -> Result<Value, BackendError> {
        self.record(
            Call::Rpc {
                function: function.to_string(),
                args: args.clone(),
            },
            Op::Write,
        )?;

        if function != self.names.bulk_rpc {
            return Err(BackendError::Status {
                status: 404,
                body: format!("function {function} not found"),
            });
        }

        let updates = args
            .get("updates")
            .and_then(Value::as_array)
            .ok_or_else(|| BackendError::Status {
                status: 400,
                body: "missing updates array".into(),
            })?;

        let mut applied = 0_u64;
        for update in updates {
            let id = update.get("id").and_then(Value::as_i64);
            let fields = update.get("updates").and_then(Value::as_object);
            if let (Some(id), Some(fields)) = (id, fields) {
                if self.apply_update(&self.names.tickets, id, fields).is_ok() {
                    applied += 1;
                }
            }
        }
        Ok(Value::from(applied))
    }
}
