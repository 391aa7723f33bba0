use std::collections::BTreeSet;

use sqlparser::ast::{
    self, AssignmentTarget, BinaryOperator, Expr, FromTable, ObjectNamePart, SetExpr, Statement,
    TableFactor, TableObject, Value, ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::model::*;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertRoom(NewRoom),
    SelectRooms {
        id: Option<Ulid>,
        filter: RoomFilter,
    },
    UpdateRoomStatus {
        id: Ulid,
        status: String,
    },
    DeleteRoom {
        id: Ulid,
    },
    InsertUser(NewUser),
    SelectUsers {
        id: Option<Ulid>,
        email: Option<String>,
    },
    DeleteUser {
        id: Ulid,
    },
    InsertBooking {
        /// `None` books for the logged-in user.
        user_id: Option<Ulid>,
        room_id: Ulid,
        start: Ms,
        end: Ms,
        purpose: String,
    },
    SelectBookings(BookingFilter),
    SelectBookingDetails {
        room_id: Ulid,
    },
    DeleteBooking {
        id: Ulid,
    },
    SelectAvailability {
        room_id: Ulid,
        start: Ms,
        end: Ms,
    },
    SelectSchedule {
        room_id: Ulid,
        date: Ms,
    },
}

/// WHERE filters on `bookings`. All `None` means every booking.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BookingFilter {
    pub id: Option<Ulid>,
    pub room_id: Option<Ulid>,
    pub user_id: Option<Ulid>,
    /// `start >= t`
    pub from: Option<Ms>,
    /// `"end" <= t`
    pub until: Option<Ms>,
}

impl BookingFilter {
    pub fn is_unfiltered(&self) -> bool {
        *self == BookingFilter::default()
    }
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    let Some(stmt) = stmts.first() else {
        return Err(SqlError::Empty);
    };

    match stmt {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => parse_update(&table.relation, assignments, selection),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

// ── INSERT ────────────────────────────────────────────────────

const ROOM_COLUMNS: &[&str] = &[
    "name",
    "room_number",
    "capacity",
    "floor",
    "location",
    "amenities",
    "description",
    "status",
];
const USER_COLUMNS: &[&str] = &["name", "email", "password", "role"];
const BOOKING_COLUMNS: &[&str] = &["user_id", "room_id", "start", "end", "purpose"];

/// Column name → value expression for a single-row INSERT.
struct Row {
    table: &'static str,
    cells: Vec<(String, Expr)>,
}

impl Row {
    fn get(&self, column: &str) -> Option<&Expr> {
        self.cells
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, e)| e)
            .filter(|e| !is_null(e))
    }

    fn require(&self, column: &'static str) -> Result<&Expr, SqlError> {
        self.get(column).ok_or(SqlError::MissingColumn(self.table, column))
    }
}

fn insert_row(insert: &ast::Insert, table: &'static str, known: &[&str]) -> Result<Row, SqlError> {
    let values = extract_insert_values(insert)?;
    let columns: Vec<String> = if insert.columns.is_empty() {
        known.iter().take(values.len()).map(|c| c.to_string()).collect()
    } else {
        insert.columns.iter().map(|c| c.value.to_lowercase()).collect()
    };
    if columns.len() != values.len() {
        return Err(SqlError::WrongArity(table, columns.len(), values.len()));
    }
    for c in &columns {
        if !known.contains(&c.as_str()) {
            return Err(SqlError::UnknownColumn(table, c.clone()));
        }
    }
    Ok(Row {
        table,
        cells: columns.into_iter().zip(values).collect(),
    })
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    match table.as_str() {
        "rooms" => {
            let row = insert_row(insert, "rooms", ROOM_COLUMNS)?;
            Ok(Command::InsertRoom(NewRoom {
                name: parse_string_expr(row.require("name")?)?,
                room_number: parse_i32_expr(row.require("room_number")?)?,
                capacity: parse_i32_expr(row.require("capacity")?)?,
                floor: row.get("floor").map(parse_i32_expr).transpose()?.unwrap_or(0),
                location: parse_string_expr(row.require("location")?)?,
                amenities: row
                    .get("amenities")
                    .map(parse_amenities_expr)
                    .transpose()?
                    .unwrap_or_default(),
                description: row.get("description").map(parse_string_expr).transpose()?,
                status: row.get("status").map(parse_string_expr).transpose()?,
            }))
        }
        "users" => {
            let row = insert_row(insert, "users", USER_COLUMNS)?;
            Ok(Command::InsertUser(NewUser {
                name: parse_string_expr(row.require("name")?)?,
                email: parse_string_expr(row.require("email")?)?,
                password: parse_string_expr(row.require("password")?)?,
                role: row
                    .get("role")
                    .map(parse_string_expr)
                    .transpose()?
                    .unwrap_or_else(|| Role::User.as_str().to_string()),
            }))
        }
        "bookings" => {
            let row = insert_row(insert, "bookings", BOOKING_COLUMNS)?;
            Ok(Command::InsertBooking {
                user_id: row.get("user_id").map(parse_ulid_expr).transpose()?,
                room_id: parse_ulid_expr(row.require("room_id")?)?,
                start: parse_time_expr(row.require("start")?)?,
                end: parse_time_expr(row.require("end")?)?,
                purpose: row
                    .get("purpose")
                    .map(parse_string_expr)
                    .transpose()?
                    .unwrap_or_default(),
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── UPDATE / DELETE ───────────────────────────────────────────

fn parse_update(
    relation: &TableFactor,
    assignments: &[ast::Assignment],
    selection: &Option<Expr>,
) -> Result<Command, SqlError> {
    let table = table_factor_name(relation)?;
    if table != "rooms" {
        return Err(SqlError::Unsupported(format!("UPDATE {table}")));
    }
    let id = extract_where_id(selection)?;
    let mut status = None;
    for a in assignments {
        let column = match &a.target {
            AssignmentTarget::ColumnName(name) => object_name_last(name),
            AssignmentTarget::Tuple(_) => None,
        };
        match column.as_deref() {
            Some("status") => status = Some(parse_string_expr(&a.value)?),
            Some(other) => return Err(SqlError::Unsupported(format!("UPDATE rooms SET {other}"))),
            None => return Err(SqlError::Parse("unsupported assignment target".into())),
        }
    }
    let status = status.ok_or(SqlError::MissingColumn("rooms", "status"))?;
    Ok(Command::UpdateRoomStatus { id, status })
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let id = extract_where_id(&delete.selection)?;

    match table.as_str() {
        "rooms" => Ok(Command::DeleteRoom { id }),
        "users" => Ok(Command::DeleteUser { id }),
        "bookings" => Ok(Command::DeleteBooking { id }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── SELECT ────────────────────────────────────────────────────

/// One `column <op> value` term of an AND-chain.
struct Condition {
    column: String,
    op: BinaryOperator,
    value: Expr,
}

fn collect_conditions(expr: &Expr, out: &mut Vec<Condition>) -> Result<(), SqlError> {
    match expr {
        Expr::Nested(inner) => collect_conditions(inner, out),
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            collect_conditions(left, out)?;
            collect_conditions(right, out)
        }
        Expr::BinaryOp { left, op, right } => {
            let column = expr_column_name(left)
                .ok_or_else(|| SqlError::Unsupported(format!("filter {expr}")))?;
            out.push(Condition {
                column,
                op: op.clone(),
                value: (**right).clone(),
            });
            Ok(())
        }
        other => Err(SqlError::Unsupported(format!("filter {other}"))),
    }
}

fn unsupported_filter(table: &str, c: &Condition) -> SqlError {
    SqlError::Unsupported(format!("filter {} {} on {table}", c.column, c.op))
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };
    let Some(from) = select.from.first() else {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    };
    let table = table_factor_name(&from.relation)?;

    let mut conditions = Vec::new();
    if let Some(selection) = &select.selection {
        collect_conditions(selection, &mut conditions)?;
    }

    match table.as_str() {
        "rooms" => select_rooms(&conditions),
        "users" => select_users(&conditions),
        "bookings" => select_bookings(&conditions),
        "booking_details" => {
            let mut room_id = None;
            for c in &conditions {
                match (c.column.as_str(), &c.op) {
                    ("room_id", BinaryOperator::Eq) => room_id = Some(parse_ulid_expr(&c.value)?),
                    _ => return Err(unsupported_filter("booking_details", c)),
                }
            }
            Ok(Command::SelectBookingDetails {
                room_id: room_id.ok_or(SqlError::MissingFilter("room_id"))?,
            })
        }
        "availability" => {
            let (mut room_id, mut start, mut end) = (None, None, None);
            for c in &conditions {
                match (c.column.as_str(), &c.op) {
                    ("room_id", BinaryOperator::Eq) => room_id = Some(parse_ulid_expr(&c.value)?),
                    ("start", BinaryOperator::GtEq) => start = Some(parse_time_expr(&c.value)?),
                    ("end", BinaryOperator::LtEq) => end = Some(parse_time_expr(&c.value)?),
                    _ => return Err(unsupported_filter("availability", c)),
                }
            }
            Ok(Command::SelectAvailability {
                room_id: room_id.ok_or(SqlError::MissingFilter("room_id"))?,
                start: start.ok_or(SqlError::MissingFilter("start"))?,
                end: end.ok_or(SqlError::MissingFilter("end"))?,
            })
        }
        "schedule" => {
            let (mut room_id, mut date) = (None, None);
            for c in &conditions {
                match (c.column.as_str(), &c.op) {
                    ("room_id", BinaryOperator::Eq) => room_id = Some(parse_ulid_expr(&c.value)?),
                    ("date", BinaryOperator::Eq) => date = Some(parse_date_expr(&c.value)?),
                    _ => return Err(unsupported_filter("schedule", c)),
                }
            }
            Ok(Command::SelectSchedule {
                room_id: room_id.ok_or(SqlError::MissingFilter("room_id"))?,
                date: date.ok_or(SqlError::MissingFilter("date"))?,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn select_rooms(conditions: &[Condition]) -> Result<Command, SqlError> {
    let mut id = None;
    let mut filter = RoomFilter::default();
    for c in conditions {
        match (c.column.as_str(), &c.op) {
            ("id", BinaryOperator::Eq) => id = Some(parse_ulid_expr(&c.value)?),
            ("capacity", BinaryOperator::GtEq) => filter.min_capacity = parse_i32_expr(&c.value)?,
            ("capacity", BinaryOperator::LtEq) => filter.max_capacity = parse_i32_expr(&c.value)?,
            ("capacity", BinaryOperator::Eq) => {
                let n = parse_i32_expr(&c.value)?;
                filter.min_capacity = n;
                filter.max_capacity = n;
            }
            ("floor", BinaryOperator::Eq) => filter.floor = Some(parse_i32_expr(&c.value)?),
            ("amenity", BinaryOperator::Eq) => {
                filter.amenities.insert(parse_string_expr(&c.value)?);
            }
            _ => return Err(unsupported_filter("rooms", c)),
        }
    }
    Ok(Command::SelectRooms { id, filter })
}

fn select_users(conditions: &[Condition]) -> Result<Command, SqlError> {
    let (mut id, mut email) = (None, None);
    for c in conditions {
        match (c.column.as_str(), &c.op) {
            ("id", BinaryOperator::Eq) => id = Some(parse_ulid_expr(&c.value)?),
            ("email", BinaryOperator::Eq) => email = Some(parse_string_expr(&c.value)?),
            _ => return Err(unsupported_filter("users", c)),
        }
    }
    Ok(Command::SelectUsers { id, email })
}

fn select_bookings(conditions: &[Condition]) -> Result<Command, SqlError> {
    let mut filter = BookingFilter::default();
    for c in conditions {
        match (c.column.as_str(), &c.op) {
            ("id", BinaryOperator::Eq) => filter.id = Some(parse_ulid_expr(&c.value)?),
            ("room_id", BinaryOperator::Eq) => filter.room_id = Some(parse_ulid_expr(&c.value)?),
            ("user_id", BinaryOperator::Eq) => filter.user_id = Some(parse_ulid_expr(&c.value)?),
            ("start", BinaryOperator::GtEq) => filter.from = Some(parse_time_expr(&c.value)?),
            ("end", BinaryOperator::LtEq) => filter.until = Some(parse_time_expr(&c.value)?),
            _ => return Err(unsupported_filter("bookings", c)),
        }
    }
    match (filter.from, filter.until) {
        (Some(_), None) => Err(SqlError::MissingFilter("end")),
        (None, Some(_)) => Err(SqlError::MissingFilter("start")),
        _ => Ok(Command::SelectBookings(filter)),
    }
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    if let Some(first) = tables_with_joins.first() {
        table_factor_name(&first.relation)
    } else {
        Err(SqlError::Parse("DELETE without table".into()))
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_values(insert: &ast::Insert) -> Result<Vec<Expr>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => match values.rows.as_slice() {
            [] => Err(SqlError::Parse("empty VALUES".into())),
            [row] => Ok(row.clone()),
            _ => Err(SqlError::Unsupported("multi-row INSERT".into())),
        },
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn extract_where_id(selection: &Option<Expr>) -> Result<Ulid, SqlError> {
    let sel = selection.as_ref().ok_or(SqlError::MissingFilter("id"))?;
    match sel {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Eq,
            right,
        } if expr_column_name(left).as_deref() == Some("id") => parse_ulid_expr(right),
        _ => Err(SqlError::MissingFilter("id")),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn is_null(expr: &Expr) -> bool {
    matches!(extract_value(expr), Some(Value::Null))
}

fn parse_ulid_expr(expr: &Expr) -> Result<Ulid, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s) | Value::Number(s, _)) => {
            Ulid::from_string(s.trim()).map_err(|e| SqlError::Parse(format!("bad ULID: {e}")))
        }
        Some(value) => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

fn parse_string_expr(expr: &Expr) -> Result<String, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s) | Value::Number(s, _)) => Ok(s.clone()),
        Some(value) => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

fn parse_i64_expr(expr: &Expr) -> Result<i64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) | Value::SingleQuotedString(s) => s
                .trim()
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad integer {s:?}: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value:?}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_i64_expr(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_i32_expr(expr: &Expr) -> Result<i32, SqlError> {
    let v = parse_i64_expr(expr)?;
    i32::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of i32 range")))
}

/// Integer Unix ms, or an RFC 3339 string.
fn parse_time_expr(expr: &Expr) -> Result<Ms, SqlError> {
    if let Some(Value::SingleQuotedString(s)) = extract_value(expr)
        && s.trim().parse::<i64>().is_err()
    {
        return parse_rfc3339(s).ok_or_else(|| SqlError::Parse(format!("bad timestamp: {s}")));
    }
    parse_i64_expr(expr)
}

/// `YYYY-MM-DD`, or any instant accepted by [`parse_time_expr`].
fn parse_date_expr(expr: &Expr) -> Result<Ms, SqlError> {
    if let Some(Value::SingleQuotedString(s)) = extract_value(expr)
        && let Some(ms) = parse_date(s)
    {
        return Ok(ms);
    }
    parse_time_expr(expr)
}

/// Comma-separated list (`'tv, whiteboard'`) or a JSON array (`'["tv"]'`).
fn parse_amenities_expr(expr: &Expr) -> Result<BTreeSet<String>, SqlError> {
    let raw = parse_string_expr(expr)?;
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        return serde_json::from_str::<Vec<String>>(trimmed)
            .map(|v| v.into_iter().collect())
            .map_err(|e| SqlError::Parse(format!("bad amenities: {e}")));
    }
    Ok(trimmed
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect())
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    UnknownColumn(&'static str, String),
    WrongArity(&'static str, usize, usize),
    MissingColumn(&'static str, &'static str),
    MissingFilter(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::UnknownColumn(t, c) => write!(f, "{t}: unknown column {c}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingColumn(t, c) => write!(f, "{t}: missing column {c}"),
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}
