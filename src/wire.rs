use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream;
use futures::Sink;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::data::DataRow;
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;
use ulid::Ulid;

use crate::app::App;
use crate::auth::{self, Actor, AuthError, RoombookAuthSource};
use crate::engine::{EngineError, ErrorKind};
use crate::model::*;
use crate::observability::{self, AUTH_FAILURES_TOTAL, QUERIES_TOTAL, QUERY_DURATION_SECONDS};
use crate::sql::{self, BookingFilter, Command};

type Schema = Arc<Vec<FieldInfo>>;

pub struct RoombookHandler {
    app: Arc<App>,
    query_parser: Arc<RoombookQueryParser>,
}

impl RoombookHandler {
    pub fn new(app: Arc<App>) -> Self {
        Self {
            app,
            query_parser: Arc::new(RoombookQueryParser),
        }
    }

    async fn resolve_actor<C: ClientInfo>(&self, client: &C) -> PgWireResult<Actor> {
        let login = client.metadata().get("user").cloned().unwrap_or_default();
        auth::resolve_actor(&self.app.users, &login).await.map_err(|e| {
            metrics::counter!(AUTH_FAILURES_TOTAL).increment(1);
            tracing::debug!("rejecting statement from {login:?}: {e}");
            auth_err(e)
        })
    }

    /// Parse, authorize, execute, and record metrics for one statement.
    async fn run<C: ClientInfo>(&self, client: &C, query: &str) -> PgWireResult<Response> {
        let actor = self.resolve_actor(client).await?;
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        let label = observability::command_label(&cmd);
        let started = Instant::now();

        let result = match auth::authorize(&actor, &cmd) {
            Ok(()) => self.execute_command(&actor, cmd).await,
            Err(e) => Err(auth_err(e)),
        };

        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(QUERIES_TOTAL, "command" => label, "status" => status).increment(1);
        metrics::histogram!(QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn execute_command(&self, actor: &Actor, cmd: Command) -> PgWireResult<Response> {
        let app = &self.app;
        match cmd {
            Command::InsertRoom(new) => {
                let room = app.rooms.add_room(new).await.map_err(engine_err)?;
                rows(rooms_schema(), [&room], room_row)
            }
            Command::SelectRooms { id, filter } => {
                let rooms = match id {
                    Some(id) => vec![app.rooms.get_room(id).await.map_err(engine_err)?],
                    None if filter == RoomFilter::default() => {
                        app.rooms.list_rooms().await.map_err(engine_err)?
                    }
                    None => app.rooms.search_rooms(filter).await.map_err(engine_err)?,
                };
                rows(rooms_schema(), &rooms, room_row)
            }
            Command::UpdateRoomStatus { id, status } => {
                let room = app.rooms.update_status(id, &status).await.map_err(engine_err)?;
                rows(rooms_schema(), [&room], room_row)
            }
            Command::DeleteRoom { id } => {
                app.rooms.delete_room(id).await.map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
            }
            Command::InsertUser(new) => {
                let user = app.users.register(new).await.map_err(engine_err)?;
                rows(users_schema(), [&user], user_row)
            }
            Command::SelectUsers { id, email } => {
                let users = match (id, email) {
                    (Some(id), _) => vec![app.users.get_user(id).await.map_err(engine_err)?],
                    (None, Some(email)) => {
                        vec![app.users.find_by_email(&email).await.map_err(engine_err)?]
                    }
                    (None, None) => app.users.list_users().await.map_err(engine_err)?,
                };
                rows(users_schema(), &users, user_row)
            }
            Command::DeleteUser { id } => {
                app.users.delete_user(id).await.map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
            }
            Command::InsertBooking {
                user_id,
                room_id,
                start,
                end,
                purpose,
            } => {
                let user_id = user_id
                    .or(actor.user_id())
                    .ok_or_else(|| engine_err(EngineError::InvalidInput("user_id is required")))?;
                let booking = app
                    .engine
                    .create_booking(NewBooking {
                        user_id,
                        room_id,
                        start,
                        end,
                        purpose,
                    })
                    .await
                    .map_err(engine_err)?;
                rows(bookings_schema(), [&booking], booking_row)
            }
            Command::SelectBookings(filter) => {
                let bookings = self.select_bookings(filter).await.map_err(engine_err)?;
                rows(bookings_schema(), &bookings, booking_row)
            }
            Command::SelectBookingDetails { room_id } => {
                let details = app
                    .engine
                    .bookings_with_details_for_room(room_id)
                    .await
                    .map_err(engine_err)?;
                rows(booking_details_schema(), &details, booking_details_row)
            }
            Command::DeleteBooking { id } => {
                let booking = app.engine.get_booking(id).await.map_err(engine_err)?;
                if !actor.may_act_for(booking.user_id) {
                    return Err(auth_err(AuthError::Forbidden(
                        "members may only cancel their own bookings",
                    )));
                }
                app.engine.cancel_booking(id).await.map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
            }
            Command::SelectAvailability { room_id, start, end } => {
                let availability = app
                    .engine
                    .check_availability(room_id, start, end)
                    .await
                    .map_err(engine_err)?;
                availability_rows(&availability)
            }
            Command::SelectSchedule { room_id, date } => {
                let schedule = app
                    .engine
                    .get_room_schedule_by_date(room_id, date)
                    .await
                    .map_err(engine_err)?;
                schedule_rows(&schedule)
            }
        }
    }

    async fn select_bookings(&self, f: BookingFilter) -> Result<Vec<Booking>, EngineError> {
        let engine = &self.app.engine;
        if let Some(id) = f.id {
            return Ok(vec![engine.get_booking(id).await?]);
        }
        let mut found = match (f.room_id, f.from.zip(f.until)) {
            (Some(room_id), Some((from, until))) => {
                engine.get_bookings_by_room_and_time(room_id, from, until).await?
            }
            (None, Some((from, until))) => engine.bookings_in_range(from, until).await?,
            (Some(room_id), None) => engine.bookings_for_room(room_id).await?,
            (None, None) => match f.user_id {
                Some(user_id) => return engine.bookings_for_user(user_id).await,
                None => return engine.list_bookings().await,
            },
        };
        if let Some(user_id) = f.user_id {
            found.retain(|b| b.user_id == user_id);
        }
        Ok(found)
    }
}

// ── Result sets ──────────────────────────────────────────────────

fn text_field(name: &str, ty: Type) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, ty, FieldFormat::Text)
}

fn rooms_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id", Type::VARCHAR),
        text_field("name", Type::VARCHAR),
        text_field("room_number", Type::INT4),
        text_field("capacity", Type::INT4),
        text_field("floor", Type::INT4),
        text_field("amenities", Type::VARCHAR),
        text_field("status", Type::VARCHAR),
        text_field("location", Type::VARCHAR),
        text_field("description", Type::VARCHAR),
        text_field("created_at", Type::INT8),
        text_field("updated_at", Type::INT8),
    ]
}

fn users_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id", Type::VARCHAR),
        text_field("name", Type::VARCHAR),
        text_field("email", Type::VARCHAR),
        text_field("role", Type::VARCHAR),
        text_field("created_at", Type::INT8),
        text_field("updated_at", Type::INT8),
    ]
}

fn bookings_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id", Type::VARCHAR),
        text_field("user_id", Type::VARCHAR),
        text_field("room_id", Type::VARCHAR),
        text_field("start", Type::INT8),
        text_field("end", Type::INT8),
        text_field("purpose", Type::VARCHAR),
        text_field("status", Type::VARCHAR),
        text_field("created_at", Type::INT8),
        text_field("updated_at", Type::INT8),
    ]
}

fn booking_details_schema() -> Vec<FieldInfo> {
    let mut fields = bookings_schema();
    fields.extend([
        text_field("user_name", Type::VARCHAR),
        text_field("user_email", Type::VARCHAR),
        text_field("room_name", Type::VARCHAR),
        text_field("room_number", Type::INT4),
    ]);
    fields
}

fn availability_schema() -> Vec<FieldInfo> {
    vec![
        text_field("room_id", Type::VARCHAR),
        text_field("available", Type::BOOL),
        text_field("booking_id", Type::VARCHAR),
        text_field("user_id", Type::VARCHAR),
        text_field("start", Type::INT8),
        text_field("end", Type::INT8),
        text_field("purpose", Type::VARCHAR),
    ]
}

fn schedule_schema() -> Vec<FieldInfo> {
    vec![
        text_field("room_id", Type::VARCHAR),
        text_field("room_name", Type::VARCHAR),
        text_field("room_number", Type::INT4),
        text_field("date", Type::VARCHAR),
        text_field("start", Type::VARCHAR),
        text_field("end", Type::VARCHAR),
        text_field("is_booked", Type::BOOL),
        text_field("booking_id", Type::VARCHAR),
        text_field("user_name", Type::VARCHAR),
        text_field("purpose", Type::VARCHAR),
    ]
}

/// Result schema for a statement, judged from its leading keywords so it
/// works before parameters are bound.
fn result_schema(sql: &str) -> Vec<FieldInfo> {
    let words: Vec<String> = sql
        .split(|c: char| c.is_whitespace() || c == '(' || c == ';')
        .filter(|w| !w.is_empty())
        .map(|w| w.trim_matches('"').to_lowercase())
        .collect();
    let table = match words.first().map(String::as_str) {
        Some("select") => words
            .iter()
            .position(|w| w == "from")
            .and_then(|i| words.get(i + 1)),
        Some("insert") => words.get(2),
        Some("update") => words.get(1),
        _ => None,
    };
    match table.map(String::as_str) {
        Some("rooms") => rooms_schema(),
        Some("users") => users_schema(),
        Some("bookings") => bookings_schema(),
        Some("booking_details") => booking_details_schema(),
        Some("availability") => availability_schema(),
        Some("schedule") => schedule_schema(),
        _ => vec![],
    }
}

fn rows<'a, T: 'a>(
    fields: Vec<FieldInfo>,
    items: impl IntoIterator<Item = &'a T>,
    encode: fn(&Schema, &T) -> PgWireResult<DataRow>,
) -> PgWireResult<Response> {
    let schema = Arc::new(fields);
    let data: Vec<PgWireResult<DataRow>> = items.into_iter().map(|t| encode(&schema, t)).collect();
    Ok(Response::Query(QueryResponse::new(schema, stream::iter(data))))
}

fn amenities_text(amenities: &std::collections::BTreeSet<String>) -> String {
    serde_json::to_string(amenities).unwrap_or_else(|_| "[]".into())
}

fn room_row(schema: &Schema, r: &Room) -> PgWireResult<DataRow> {
    let mut encoder = DataRowEncoder::new(schema.clone());
    encoder.encode_field(&r.id.to_string())?;
    encoder.encode_field(&r.name)?;
    encoder.encode_field(&r.room_number)?;
    encoder.encode_field(&r.capacity)?;
    encoder.encode_field(&r.floor)?;
    encoder.encode_field(&amenities_text(&r.amenities))?;
    encoder.encode_field(&r.status)?;
    encoder.encode_field(&r.location)?;
    encoder.encode_field(&r.description)?;
    encoder.encode_field(&r.created_at)?;
    encoder.encode_field(&r.updated_at)?;
    Ok(encoder.take_row())
}

fn user_row(schema: &Schema, u: &User) -> PgWireResult<DataRow> {
    let mut encoder = DataRowEncoder::new(schema.clone());
    encoder.encode_field(&u.id.to_string())?;
    encoder.encode_field(&u.name)?;
    encoder.encode_field(&u.email)?;
    encoder.encode_field(&u.role.as_str())?;
    encoder.encode_field(&u.created_at)?;
    encoder.encode_field(&u.updated_at)?;
    Ok(encoder.take_row())
}

fn encode_booking(encoder: &mut DataRowEncoder, b: &Booking) -> PgWireResult<()> {
    encoder.encode_field(&b.id.to_string())?;
    encoder.encode_field(&b.user_id.to_string())?;
    encoder.encode_field(&b.room_id.to_string())?;
    encoder.encode_field(&b.start)?;
    encoder.encode_field(&b.end)?;
    encoder.encode_field(&b.purpose)?;
    encoder.encode_field(&b.status.as_str())?;
    encoder.encode_field(&b.created_at)?;
    encoder.encode_field(&b.updated_at)?;
    Ok(())
}

fn booking_row(schema: &Schema, b: &Booking) -> PgWireResult<DataRow> {
    let mut encoder = DataRowEncoder::new(schema.clone());
    encode_booking(&mut encoder, b)?;
    Ok(encoder.take_row())
}

fn booking_details_row(schema: &Schema, d: &BookingWithDetails) -> PgWireResult<DataRow> {
    let mut encoder = DataRowEncoder::new(schema.clone());
    encode_booking(&mut encoder, &d.booking)?;
    encoder.encode_field(&d.user_name)?;
    encoder.encode_field(&d.user_email)?;
    encoder.encode_field(&d.room_name)?;
    encoder.encode_field(&d.room_number)?;
    Ok(encoder.take_row())
}

fn availability_rows(a: &Availability) -> PgWireResult<Response> {
    let schema: Schema = Arc::new(availability_schema());
    let room_id = a.room_id.to_string();
    let mut data = Vec::new();
    if a.available {
        let mut encoder = DataRowEncoder::new(schema.clone());
        encoder.encode_field(&room_id)?;
        encoder.encode_field(&true)?;
        encoder.encode_field(&None::<String>)?;
        encoder.encode_field(&None::<String>)?;
        encoder.encode_field(&None::<i64>)?;
        encoder.encode_field(&None::<i64>)?;
        encoder.encode_field(&None::<String>)?;
        data.push(Ok(encoder.take_row()));
    }
    for b in &a.conflicts {
        let mut encoder = DataRowEncoder::new(schema.clone());
        encoder.encode_field(&room_id)?;
        encoder.encode_field(&false)?;
        encoder.encode_field(&b.id.to_string())?;
        encoder.encode_field(&b.user_id.to_string())?;
        encoder.encode_field(&b.start)?;
        encoder.encode_field(&b.end)?;
        encoder.encode_field(&b.purpose)?;
        data.push(Ok(encoder.take_row()));
    }
    Ok(Response::Query(QueryResponse::new(schema, stream::iter(data))))
}

fn schedule_rows(s: &RoomSchedule) -> PgWireResult<Response> {
    let schema: Schema = Arc::new(schedule_schema());
    let room_id = s.room_id.to_string();
    let mut data = Vec::with_capacity(s.slots.len());
    for slot in &s.slots {
        let mut encoder = DataRowEncoder::new(schema.clone());
        encoder.encode_field(&room_id)?;
        encoder.encode_field(&s.room_name)?;
        encoder.encode_field(&s.room_number)?;
        encoder.encode_field(&s.date)?;
        encoder.encode_field(&slot.start)?;
        encoder.encode_field(&slot.end)?;
        encoder.encode_field(&slot.is_booked)?;
        encoder.encode_field(&slot.booking_id.to_string())?;
        encoder.encode_field(&slot.user_name)?;
        encoder.encode_field(&slot.purpose)?;
        data.push(Ok(encoder.take_row()));
    }
    Ok(Response::Query(QueryResponse::new(schema, stream::iter(data))))
}

#[async_trait]
impl SimpleQueryHandler for RoombookHandler {
    async fn do_query<C>(
        &self,
        client: &mut C,
        query: &str,
    ) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(vec![self.run(client, query).await?])
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct RoombookQueryParser;

#[async_trait]
impl QueryParser for RoombookQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(result_schema(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for RoombookHandler {
    type Statement = String;
    type QueryParser = RoombookQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let sql = substitute_params(portal);
        self.run(client, &sql).await
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(
            param_types,
            result_schema(&target.statement),
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(result_schema(
            &target.statement.statement,
        )))
    }
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    let mut max = 0usize;
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            i += 1;
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i > start
                && let Ok(n) = sql[start..i].parse::<usize>()
            {
                max = max.max(n);
            }
        } else {
            i += 1;
        }
    }
    max
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
fn substitute_params(portal: &Portal<String>) -> String {
    bind_params(&portal.statement.statement, &portal.parameters)
}

/// One pass over the statement text: each `$N` outside a string literal is
/// replaced by its quoted value, and substituted text is never rescanned.
fn bind_params<B: AsRef<[u8]>>(sql: &str, params: &[Option<B>]) -> String {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut in_literal = false;
    let mut copied = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => in_literal = !in_literal,
            b'$' if !in_literal => {
                let digits = bytes[i + 1..].iter().take_while(|b| b.is_ascii_digit()).count();
                let bound = sql[i + 1..i + 1 + digits]
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|idx| params.get(idx));
                if let Some(param) = bound {
                    out.push_str(&sql[copied..i]);
                    match param {
                        Some(value) => {
                            let text = String::from_utf8_lossy(value.as_ref());
                            out.push('\'');
                            out.push_str(&text.replace('\'', "''"));
                            out.push('\'');
                        }
                        None => out.push_str("NULL"),
                    }
                    i += 1 + digits;
                    copied = i;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }
    out.push_str(&sql[copied..]);
    out
}

// ── Factory ──────────────────────────────────────────────────────

pub struct RoombookFactory {
    handler: Arc<RoombookHandler>,
    auth_handler: Arc<
        CleartextPasswordAuthStartupHandler<RoombookAuthSource, DefaultServerParameterProvider>,
    >,
    noop: Arc<NoopHandler>,
}

impl RoombookFactory {
    pub fn new(app: Arc<App>, password: String) -> Self {
        let auth_source = RoombookAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(RoombookHandler::new(app)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for RoombookFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client socket until it disconnects.
pub async fn process_connection(
    socket: TcpStream,
    app: Arc<App>,
    password: String,
    tls: Option<TlsAcceptor>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let factory = Arc::new(RoombookFactory::new(app, password));
    pgwire::tokio::process_socket(socket, tls, factory).await?;
    Ok(())
}

// ── Errors ───────────────────────────────────────────────────────

fn user_error(code: &str, message: String) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        code.into(),
        message,
    )))
}

pub fn sqlstate(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::InvalidInput => "22023",
        ErrorKind::TimeRangeInvalid => "22007",
        ErrorKind::NotFound => "P0002",
        ErrorKind::Conflict => "23505",
        ErrorKind::RoomUnavailable => "23P01",
        ErrorKind::Storage => "58030",
    }
}

fn engine_err(e: EngineError) -> PgWireError {
    user_error(sqlstate(e.kind()), e.to_string())
}

fn auth_err(e: AuthError) -> PgWireError {
    let code = match &e {
        AuthError::Unauthorized(_) => "28000",
        AuthError::Forbidden(_) => "42501",
        AuthError::Lookup(_) => "58030",
    };
    user_error(code, e.to_string())
}

fn sql_err(e: sql::SqlError) -> PgWireError {
    user_error("42601", e.to_string())
}
