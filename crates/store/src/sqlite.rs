//! SQLite-backed entity store
//!
//! One table per collection:
//!
//! | column         | content                                        |
//! |----------------|------------------------------------------------|
//! | `id`           | entity id, primary key                         |
//! | `seq`          | first-insertion order, kept on update          |
//! | declared field | one column per [`FieldDef`], typed by its kind |
//! | `refreshed_at` | RFC 3339 timestamp                             |
//! | `extra`        | JSON object of every other payload field       |
//!
//! A declared field that is present with a `null` value is recorded in
//! `extra` as well so that absent and null fields round-trip distinctly.
//! Values in `real` columns always read back as floating point numbers.

use crate::error::{Result, StoreError};
use crate::observe::{ChangeNotifier, LiveView};
use crate::LocalStore;
use chrono::{DateTime, SecondsFormat, Utc};
use larder_core::collection::{CollectionSchema, FieldDef, FieldKind};
use larder_core::entity::{Entity, EntityId, Payload};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Durable [`LocalStore`] backed by one SQLite table
///
/// Construct once and share behind an `Arc`; writes are serialised by the
/// connection mutex.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    schema: CollectionSchema,
    sql: Statements,
    notifier: ChangeNotifier,
}

/// SQL text derived from the schema once at open
#[derive(Debug)]
struct Statements {
    upsert: String,
    select_all: String,
    select_one: String,
    delete: String,
    clear: String,
    count: String,
}

impl Statements {
    fn new(schema: &CollectionSchema) -> Self {
        let table = quoted(&schema.name);
        let field_cols: Vec<String> = schema.fields.iter().map(|f| quoted(&f.name)).collect();

        let mut insert_cols: Vec<&str> = vec!["id", "seq"];
        insert_cols.extend(field_cols.iter().map(String::as_str));
        insert_cols.extend(["refreshed_at", "extra"]);

        // ?1 = id, seq is computed, remaining placeholders follow in order
        let mut values = vec![
            "?1".to_string(),
            format!("(SELECT COALESCE(MAX(seq), 0) + 1 FROM {table})"),
        ];
        values.extend((0..field_cols.len() + 2).map(|i| format!("?{}", i + 2)));

        let updates: Vec<String> = field_cols
            .iter()
            .map(String::as_str)
            .chain(["refreshed_at", "extra"])
            .map(|c| format!("{c} = excluded.{c}"))
            .collect();

        let mut select_cols: Vec<&str> = vec!["id"];
        select_cols.extend(field_cols.iter().map(String::as_str));
        select_cols.extend(["refreshed_at", "extra"]);
        let select_cols = select_cols.join(", ");

        Self {
            upsert: format!(
                "INSERT INTO {table} ({}) VALUES ({}) ON CONFLICT(id) DO UPDATE SET {}",
                insert_cols.join(", "),
                values.join(", "),
                updates.join(", ")
            ),
            select_all: format!("SELECT {select_cols} FROM {table} ORDER BY seq"),
            select_one: format!("SELECT {select_cols} FROM {table} WHERE id = ?1"),
            delete: format!("DELETE FROM {table} WHERE id = ?1"),
            clear: format!("DELETE FROM {table}"),
            count: format!("SELECT COUNT(*) FROM {table}"),
        }
    }
}

impl SqliteStore {
    /// Open (or create) a store at `path`
    pub fn open(path: impl AsRef<Path>, schema: CollectionSchema) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Schema(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        tracing::debug!(path = %path.display(), collection = %schema.name, "Opened SQLite store");
        Self::with_connection(conn, schema)
    }

    /// Open a store that lives only as long as this value
    pub fn open_in_memory(schema: CollectionSchema) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, schema)
    }

    fn with_connection(conn: Connection, schema: CollectionSchema) -> Result<Self> {
        schema.validate()?;
        init_schema(&conn, &schema)?;
        let sql = Statements::new(&schema);
        let initial = load_all(&conn, &schema, &sql)?;
        Ok(Self {
            conn: Mutex::new(conn),
            notifier: ChangeNotifier::new(initial),
            schema,
            sql,
        })
    }

    /// Collection schema this store was opened with
    pub fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Publish a snapshot read inside the transaction that produced it
    ///
    /// Reading before commit means a failed read rolls the write back, so an
    /// error from a mutation always leaves both table and observers as they
    /// were.
    fn publish(&self, entities: Vec<Entity>) {
        let version = self.notifier.publish(entities);
        tracing::debug!(collection = %self.schema.name, version, "Store changed");
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("collection", &self.schema.name)
            .field("subscribers", &self.notifier.subscriber_count())
            .finish()
    }
}

impl LocalStore for SqliteStore {
    fn put_all(&self, entities: Vec<Entity>) -> Result<()> {
        if entities.is_empty() {
            return Ok(());
        }
        // Encode everything first so a bad value rejects the whole batch
        let rows = entities
            .iter()
            .map(|e| encode_row(&self.schema, e))
            .collect::<Result<Vec<_>>>()?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(&self.sql.upsert)?;
            for row in &rows {
                stmt.execute(params_from_iter(row.iter()))?;
            }
        }
        let snapshot = load_all(&tx, &self.schema, &self.sql)?;
        tx.commit()?;
        tracing::debug!(collection = %self.schema.name, count = rows.len(), "Upserted batch");
        self.publish(snapshot);
        Ok(())
    }

    fn get(&self, id: &EntityId) -> Result<Option<Entity>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(&self.sql.select_one)?;
        let raw = stmt
            .query_row(params![id.as_str()], |row| read_raw(row, self.schema.fields.len()))
            .optional()?;
        raw.map(|r| decode_row(&self.schema, r)).transpose()
    }

    fn all(&self) -> Result<Vec<Entity>> {
        let conn = self.lock()?;
        load_all(&conn, &self.schema, &self.sql)
    }

    fn observe_all(&self) -> LiveView {
        self.notifier.subscribe()
    }

    fn delete(&self, id: &EntityId) -> Result<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        if tx.execute(&self.sql.delete, params![id.as_str()])? == 0 {
            return Ok(false);
        }
        let snapshot = load_all(&tx, &self.schema, &self.sql)?;
        tx.commit()?;
        self.publish(snapshot);
        Ok(true)
    }

    fn clear(&self) -> Result<()> {
        let conn = self.lock()?;
        let removed = conn.execute(&self.sql.clear, [])?;
        if removed > 0 {
            tracing::info!(collection = %self.schema.name, removed, "Cleared store");
            self.publish(Vec::new());
        }
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(&self.sql.count, [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn subscriber_count(&self) -> usize {
        self.notifier.subscriber_count()
    }
}

/// Double-quote a validated identifier so SQL keywords work as names
fn quoted(name: &str) -> String {
    format!("\"{name}\"")
}

/// Create the table, adding columns for fields declared since it was created
fn init_schema(conn: &Connection, schema: &CollectionSchema) -> Result<()> {
    let table = quoted(&schema.name);
    let index = quoted(&format!("{}_seq", schema.name));
    let columns: Vec<String> = schema
        .fields
        .iter()
        .map(|f| format!("{} {}", quoted(&f.name), f.kind.sql_type()))
        .collect();
    let declared = if columns.is_empty() {
        String::new()
    } else {
        format!("{},", columns.join(", "))
    };

    conn.execute_batch(&format!(
        "
        CREATE TABLE IF NOT EXISTS {table} (
            id TEXT PRIMARY KEY NOT NULL,
            seq INTEGER NOT NULL,
            {declared}
            refreshed_at TEXT NOT NULL,
            extra TEXT NOT NULL DEFAULT '{{}}'
        );
        CREATE INDEX IF NOT EXISTS {index} ON {table} (seq);
        "
    ))?;

    let existing: HashSet<String> = {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
        let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
        names.collect::<rusqlite::Result<_>>()?
    };
    for field in &schema.fields {
        if !existing.contains(&field.name) {
            tracing::info!(table = %schema.name, column = %field.name, "Adding column");
            conn.execute_batch(&format!(
                "ALTER TABLE {table} ADD COLUMN {} {}",
                quoted(&field.name),
                field.kind.sql_type()
            ))?;
        }
    }
    Ok(())
}

fn load_all(conn: &Connection, schema: &CollectionSchema, sql: &Statements) -> Result<Vec<Entity>> {
    let mut stmt = conn.prepare_cached(&sql.select_all)?;
    let raws = stmt
        .query_map([], |row| read_raw(row, schema.fields.len()))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(|r| decode_row(schema, r)).collect()
}

/// Columns of one row before decoding
struct RawRow {
    id: String,
    fields: Vec<SqlValue>,
    refreshed_at: String,
    extra: String,
}

fn read_raw(row: &Row<'_>, field_count: usize) -> rusqlite::Result<RawRow> {
    let fields = (0..field_count)
        .map(|i| row.get::<_, SqlValue>(i + 1))
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(RawRow {
        id: row.get(0)?,
        fields,
        refreshed_at: row.get(field_count + 1)?,
        extra: row.get(field_count + 2)?,
    })
}

/// Build the upsert parameters: id, declared fields, refreshed_at, extra
fn encode_row(schema: &CollectionSchema, entity: &Entity) -> Result<Vec<SqlValue>> {
    let mut extra = Payload::new();
    let mut params = Vec::with_capacity(schema.fields.len() + 3);
    params.push(SqlValue::Text(entity.id().to_string()));

    for field in &schema.fields {
        let value = entity.field(&field.name);
        if matches!(value, Some(Value::Null)) {
            extra.insert(field.name.clone(), Value::Null);
        }
        params.push(encode_value(entity.id(), field, value)?);
    }

    for (name, value) in entity.payload() {
        if schema.field(name).is_none() {
            extra.insert(name.clone(), value.clone());
        }
    }

    params.push(SqlValue::Text(
        entity.refreshed_at().to_rfc3339_opts(SecondsFormat::Nanos, true),
    ));
    params.push(SqlValue::Text(serde_json::to_string(&extra)?));
    Ok(params)
}

fn encode_value(id: &EntityId, field: &FieldDef, value: Option<&Value>) -> Result<SqlValue> {
    let invalid = |v: &Value| StoreError::InvalidValue {
        id: id.to_string(),
        field: field.name.clone(),
        expected: field.kind,
        actual: v.to_string(),
    };

    let Some(value) = value.filter(|v| !v.is_null()) else {
        return Ok(SqlValue::Null);
    };
    if !field.kind.accepts(value) {
        return Err(invalid(value));
    }

    Ok(match (field.kind, value) {
        (FieldKind::Text, Value::String(s)) => SqlValue::Text(s.clone()),
        (FieldKind::Integer, Value::Number(n)) => {
            SqlValue::Integer(n.as_i64().ok_or_else(|| invalid(value))?)
        }
        (FieldKind::Real, Value::Number(n)) => {
            SqlValue::Real(n.as_f64().ok_or_else(|| invalid(value))?)
        }
        (FieldKind::Boolean, Value::Bool(b)) => SqlValue::Integer(i64::from(*b)),
        (FieldKind::Json, v) => SqlValue::Text(serde_json::to_string(v)?),
        _ => return Err(invalid(value)),
    })
}

fn decode_row(schema: &CollectionSchema, raw: RawRow) -> Result<Entity> {
    let corrupt = |message: String| StoreError::CorruptRow {
        id: raw.id.clone(),
        message,
    };

    let mut payload = Payload::new();
    for (field, value) in schema.fields.iter().zip(raw.fields) {
        let decoded = decode_value(field.kind, value)
            .map_err(|m| corrupt(format!("{}: {m}", field.name)))?;
        if let Some(v) = decoded {
            payload.insert(field.name.clone(), v);
        }
    }

    let extra: Payload = serde_json::from_str(&raw.extra)
        .map_err(|e| corrupt(format!("extra column: {e}")))?;
    payload.extend(extra);

    let refreshed_at = DateTime::parse_from_rfc3339(&raw.refreshed_at)
        .map_err(|e| corrupt(format!("refreshed_at: {e}")))?
        .with_timezone(&Utc);

    Ok(Entity::new(raw.id.clone(), payload).with_refreshed_at(refreshed_at))
}

fn decode_value(kind: FieldKind, value: SqlValue) -> std::result::Result<Option<Value>, String> {
    Ok(Some(match (kind, value) {
        (_, SqlValue::Null) => return Ok(None),
        (FieldKind::Text, SqlValue::Text(s)) => Value::String(s),
        (FieldKind::Integer, SqlValue::Integer(n)) => Value::from(n),
        (FieldKind::Real, SqlValue::Real(f)) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .ok_or_else(|| format!("non-finite real {f}"))?,
        (FieldKind::Real, SqlValue::Integer(n)) => Value::from(n as f64),
        (FieldKind::Boolean, SqlValue::Integer(n)) => Value::Bool(n != 0),
        (FieldKind::Json, SqlValue::Text(s)) => {
            serde_json::from_str(&s).map_err(|e| e.to_string())?
        }
        (kind, other) => {
            return Err(format!("unexpected {:?} in {kind:?} column", other.data_type()));
        }
    }))
}
