//! In-process database
//!
//! `SimClient` runs the anonymous blocks the gateway sends against an in-memory database
//! that provides the companion packages:
//!
//! - `owa.init_cgi_env(num_params, param_name, param_val)` seeds the CGI environment,
//! - `htp.init` clears the page buffer and `htp.htbuf_len := n` sets its chunk length,
//! - `htp.p`, `htp.print` and `htp.prn` append to the page,
//! - `node_plsql.get_page(page OUT CLOB)` returns the page.
//!
//! Application procedures are Rust closures registered with [`SimClient::register`]. The client
//! counts the resources it hands out and can fail any call on request, which makes leaks and
//! error paths observable in tests.

use std::{collections::HashMap, sync::{Arc, atomic::{AtomicU64, Ordering}}};

use parking_lot::{Mutex, RwLock};

use crate::stmt::Value;
use super::{
    Client, Outcome, Status, PoolSizing, LobKind, LobMode, LobBuffer, BindBuffer, DataType, Direction, INVALID_HANDLE,
};

type Procedure = dyn Fn(&mut Owa, &mut Args) -> std::result::Result<(), String> + Send + Sync;

/// Client call that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    PoolCreate,
    PoolDestroy,
    Connect,
    SessionGet,
    SessionRelease,
    Commit,
    Rollback,
    Prepare,
    ReleaseStatement,
    Bind,
    Execute,
    LocatorAlloc,
    LocatorFree,
    LobCreateTemporary,
    LobFreeTemporary,
    LobOpen,
    LobClose,
    LobLength,
    LobRead,
    LobWrite,
}

/// Resource counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    pub pools: u32,
    pub sessions_open: u32,
    /// Highest number of sessions that were open at the same time
    pub peak_sessions: u32,
    pub connects: u64,
    pub releases: u64,
    pub statements_live: u32,
    pub locators_live: u32,
    pub lobs_open: u32,
    pub binds: u64,
    pub executes: u64,
}

struct Fault {
    op: Op,
    remaining: u32,
    code: i32,
    message: String,
}

enum Content {
    Clob(Vec<u16>),
    Blob(Vec<u8>),
}

struct LobData {
    content: Content,
    open: bool,
    /// Freed with the last locator that points to it
    transient: bool,
}

struct SessionState {
    pool: Option<u64>,
    /// Taken while a statement executes on the session
    owa: Option<Owa>,
}

#[derive(Default)]
struct Inner {
    procedures: RwLock<HashMap<String, Arc<Procedure>>>,
    accounts:   RwLock<HashMap<String, String>>,
    faults:     Mutex<Vec<Fault>>,
    stats:      Mutex<Stats>,
    history:    Mutex<Vec<String>>,
    sessions:   Mutex<HashMap<u64, SessionState>>,
    lobs:       Mutex<HashMap<u64, LobData>>,
    next_id:    AtomicU64,
}

/**
    In-process database client.

    Clones share the same database.

    # Example

    ```
    use plsql_gateway::{Environment, client::sim::SimClient};

    let sim = SimClient::new().with_account("demo", "demo");
    let oracle = Environment::new(sim.clone());

    assert!(oracle.connect("orcl", "demo", "wrong").is_err());
    let _conn = oracle.connect("orcl", "demo", "demo")?;
    assert_eq!(sim.stats().sessions_open, 1);
    # Ok::<(),plsql_gateway::Error>(())
    ```
*/
#[derive(Clone, Default)]
pub struct SimClient {
    inner: Arc<Inner>,
}

/// Connection pool handle
pub struct SimPool {
    id: u64,
    database: String,
    sizing: PoolSizing,
}

impl SimPool {
    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn sizing(&self) -> PoolSizing {
        self.sizing
    }
}

/// Session handle
pub struct SimSession {
    id: u64,
}

/// LOB locator
pub struct SimLocator {
    lob: Arc<Mutex<Option<u64>>>,
}

enum Bound {
    Scalar { direction: Direction, value: Option<Value> },
    Array { direction: Direction, values: Vec<Option<Value>> },
    Locator(Arc<Mutex<Option<u64>>>),
}

/// Prepared statement handle
pub struct SimStmt {
    sql: String,
    block: Block,
    binds: HashMap<String, Bound>,
    outputs: HashMap<String, Vec<Option<Value>>>,
}

impl SimStmt {
    pub fn sql(&self) -> &str {
        &self.sql
    }
}

/**
    Session state of the web toolkit packages: the CGI environment and the page buffer.

    The page is kept in chunks of at most `htbuf_len` characters.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owa {
    cgi: Vec<(String, String)>,
    chunks: Vec<String>,
    last_len: usize,
    htbuf_len: u32,
}

impl Default for Owa {
    fn default() -> Self {
        Self { cgi: Vec::new(), chunks: Vec::new(), last_len: 0, htbuf_len: 255 }
    }
}

impl Owa {
    /// Returns the value of a CGI variable. Names are not case sensitive.
    pub fn cgi_var(&self, name: &str) -> Option<String> {
        self.cgi.iter().find(|(var, _)| var.eq_ignore_ascii_case(name)).map(|(_, val)| val.clone())
    }

    pub fn cgi_vars(&self) -> &[(String, String)] {
        &self.cgi
    }

    pub fn htbuf_len(&self) -> u32 {
        self.htbuf_len
    }

    /// Appends a line to the page (`htp.p`).
    pub fn print(&mut self, text: &str) {
        self.append(text);
        self.append("\n");
    }

    /// Appends text to the page without a line break (`htp.prn`).
    pub fn prn(&mut self, text: &str) {
        self.append(text);
    }

    pub fn page(&self) -> String {
        self.chunks.concat()
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    fn reset(&mut self) {
        self.chunks.clear();
        self.last_len = 0;
    }

    fn append(&mut self, text: &str) {
        let max = self.htbuf_len as usize;
        for c in text.chars() {
            if self.chunks.is_empty() || self.last_len >= max {
                self.chunks.push(String::new());
                self.last_len = 0;
            }
            if let Some(chunk) = self.chunks.last_mut() {
                chunk.push(c);
            }
            self.last_len += 1;
        }
    }
}

#[derive(Debug, Clone)]
enum Resolved {
    Null,
    Value(Value),
    Array(Vec<Option<Value>>),
    Output,
    Locator(Arc<Mutex<Option<u64>>>),
}

struct Arg {
    name: Option<String>,
    bind: Option<String>,
    value: Resolved,
}

/// Arguments of a registered procedure call
pub struct Args {
    args: Vec<Arg>,
    outputs: Vec<(String, Value)>,
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Text(text) => text.clone(),
        Value::Int(num) => num.to_string(),
    }
}

impl Args {
    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Names of the arguments passed in named notation.
    pub fn names(&self) -> Vec<&str> {
        self.args.iter().filter_map(|arg| arg.name.as_deref()).collect()
    }

    fn named(&self, name: &str) -> Option<&Resolved> {
        self.args.iter()
            .find(|arg| arg.name.as_deref().map_or(false, |arg_name| arg_name.eq_ignore_ascii_case(name)))
            .map(|arg| &arg.value)
    }

    fn scalar_text(value: &Resolved) -> Option<String> {
        match value {
            Resolved::Value(value) => Some(value_text(value)),
            _ => None,
        }
    }

    /// Returns the named argument as text.
    pub fn text(&self, name: &str) -> Option<String> {
        self.named(name).and_then(Self::scalar_text)
    }

    /// Returns the positional argument at `idx` as text.
    pub fn text_at(&self, idx: usize) -> Option<String> {
        self.args.get(idx).and_then(|arg| Self::scalar_text(&arg.value))
    }

    /// Returns the named argument as an integer.
    pub fn int(&self, name: &str) -> Option<i64> {
        match self.named(name)? {
            Resolved::Value(Value::Int(num)) => Some(*num),
            Resolved::Value(Value::Text(text)) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns the named table argument. NULL elements are returned as empty strings.
    pub fn array(&self, name: &str) -> Option<Vec<String>> {
        match self.named(name)? {
            Resolved::Array(values) => Some(values.iter().map(|val| val.as_ref().map(value_text).unwrap_or_default()).collect()),
            _ => None,
        }
    }

    /// Sets the value of an OUT argument.
    pub fn set_out(&mut self, name: &str, value: impl Into<Value>) -> std::result::Result<(), String> {
        let bind = self.args.iter()
            .find(|arg| arg.name.as_deref().map_or(false, |arg_name| arg_name.eq_ignore_ascii_case(name)))
            .and_then(|arg| match arg.value {
                Resolved::Output => arg.bind.clone(),
                _ => None,
            })
            .ok_or_else(|| format!("{} is not an OUT argument", name))?;
        self.outputs.push((bind, value.into()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    Null,
    Int(i64),
    Text(String),
    Bind(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ArgExpr {
    name: Option<String>,
    expr: Expr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Null,
    Commit,
    Rollback,
    Assign { target: String, expr: Expr },
    Call { name: String, args: Vec<ArgExpr> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Block {
    actions: Vec<Action>,
    placeholders: Vec<String>,
}

fn syntax_error(near: &str) -> Status {
    Status::error(6550, format!("PLS-00103: Encountered the symbol \"{}\"", near.trim()))
}

fn undeclared(name: &str) -> Status {
    Status::error(6550, format!("PLS-00201: identifier '{}' must be declared", name.to_ascii_uppercase()))
}

fn wrong_args(name: &str) -> Status {
    Status::error(6550, format!("PLS-00306: wrong number or types of arguments in call to '{}'", name.to_ascii_uppercase()))
}

fn not_connected() -> Status {
    Status::error(3114, "not connected to ORACLE")
}

fn invalid_locator() -> Status {
    Status::error(22275, "invalid LOB locator specified")
}

fn value_error(detail: &str) -> Status {
    Status::error(6502, format!("PL/SQL: numeric or value error: {}", detail))
}

/// Scans `text` outside of quoted strings and parentheses.
/// Calls `found` with the byte position of every top level match of `pat`.
fn scan_top(text: &str, pat: &str, mut found: impl FnMut(usize) -> bool) -> Outcome<()> {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    for (pos, c) in text.char_indices() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => {
                if depth == 0 && text[pos..].starts_with(pat) && !found(pos) {
                    return Ok(());
                }
                match c {
                    '\'' | '"' => quote = Some(c),
                    '(' => depth += 1,
                    ')' => depth -= 1,
                    _ => {}
                }
                if depth < 0 {
                    return Err(syntax_error(")"));
                }
            }
        }
    }
    if quote.is_some() || depth != 0 {
        return Err(syntax_error("end-of-file"));
    }
    Ok(())
}

fn split_top(text: &str, sep: char) -> Outcome<Vec<&str>> {
    let mut positions = Vec::new();
    scan_top(text, sep.encode_utf8(&mut [0; 4]), |pos| { positions.push(pos); true })?;
    let mut parts = Vec::with_capacity(positions.len() + 1);
    let mut start = 0;
    for pos in positions {
        parts.push(&text[start..pos]);
        start = pos + sep.len_utf8();
    }
    parts.push(&text[start..]);
    Ok(parts)
}

fn find_top(text: &str, pat: &str) -> Outcome<Option<usize>> {
    let mut first = None;
    scan_top(text, pat, |pos| { first = Some(pos); false })?;
    Ok(first)
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '#'),
        _ => false,
    }
}

/// Returns the canonical form of an optionally dotted and quoted name: quoted parts keep their
/// case, unquoted ones are folded to lower case.
fn normalize_name(name: &str) -> Option<String> {
    let name = name.trim();
    let mut parts = Vec::new();
    for part in split_top(name, '.').ok()? {
        let part = part.trim();
        if let Some(quoted) = part.strip_prefix('"').and_then(|part| part.strip_suffix('"')) {
            if quoted.is_empty() || quoted.contains('"') {
                return None;
            }
            parts.push(quoted.to_string());
        } else if is_plain_identifier(part) {
            parts.push(part.to_ascii_lowercase());
        } else {
            return None;
        }
    }
    Some(parts.join("."))
}

fn parse_expr(text: &str) -> Outcome<Expr> {
    let text = text.trim();
    if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
        let inner = &text[1..text.len() - 1];
        if inner.replace("''", "").contains('\'') {
            return Err(syntax_error(text));
        }
        return Ok(Expr::Text(inner.replace("''", "'")));
    }
    if let Some(name) = text.strip_prefix(':') {
        if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Ok(Expr::Bind(name.to_ascii_lowercase()));
        }
        return Err(syntax_error(text));
    }
    if text.eq_ignore_ascii_case("NULL") {
        return Ok(Expr::Null);
    }
    text.parse::<i64>().map(Expr::Int).map_err(|_| syntax_error(text))
}

fn parse_arg(text: &str) -> Outcome<ArgExpr> {
    if let Some(pos) = find_top(text, "=>")? {
        let name = normalize_name(&text[..pos]).ok_or_else(|| syntax_error(&text[..pos]))?;
        return Ok(ArgExpr { name: Some(name), expr: parse_expr(&text[pos + 2..])? });
    }
    Ok(ArgExpr { name: None, expr: parse_expr(text)? })
}

fn parse_action(text: &str) -> Outcome<Action> {
    match text.to_ascii_uppercase().as_str() {
        "NULL" => return Ok(Action::Null),
        "COMMIT" => return Ok(Action::Commit),
        "ROLLBACK" => return Ok(Action::Rollback),
        _ => {}
    }
    if let Some(pos) = find_top(text, ":=")? {
        let target = normalize_name(&text[..pos]).ok_or_else(|| syntax_error(&text[..pos]))?;
        return Ok(Action::Assign { target, expr: parse_expr(&text[pos + 2..])? });
    }
    if text.ends_with(')') {
        let open = find_top(text, "(")?.ok_or_else(|| syntax_error(")"))?;
        let name = normalize_name(&text[..open]).ok_or_else(|| syntax_error(&text[..open]))?;
        let args_text = &text[open + 1..text.len() - 1];
        let args = if args_text.trim().is_empty() {
            Vec::new()
        } else {
            split_top(args_text, ',')?.into_iter().map(parse_arg).collect::<Outcome<Vec<_>>>()?
        };
        return Ok(Action::Call { name, args });
    }
    let name = normalize_name(text).ok_or_else(|| syntax_error(text))?;
    Ok(Action::Call { name, args: Vec::new() })
}

fn parse_block(sql: &str) -> Outcome<Block> {
    let text = sql.trim();
    let upper = text.to_ascii_uppercase();
    let actions = match upper.trim_end_matches(';').trim_end() {
        "COMMIT" => vec![Action::Commit],
        "ROLLBACK" => vec![Action::Rollback],
        _ => {
            let body_start = upper.strip_prefix("BEGIN").filter(|rest| rest.starts_with(char::is_whitespace));
            let body_end = upper.trim_end().strip_suffix(';').map(str::trim_end).filter(|rest| rest.ends_with("END"));
            if body_start.is_none() || body_end.is_none() {
                return Err(Status::error(900, "invalid SQL statement"));
            }
            let end = text.trim_end().len() - 1;
            let end = text[..end].trim_end().len() - 3;
            if end < 5 {
                return Err(syntax_error("END"));
            }
            let body = &text[5..end];
            let mut stmts = split_top(body, ';')?;
            let tail = stmts.pop().unwrap_or_default();
            if !tail.trim().is_empty() {
                return Err(syntax_error("END"));
            }
            if stmts.is_empty() {
                return Err(syntax_error("END"));
            }
            stmts.into_iter().map(|stmt| parse_action(stmt.trim())).collect::<Outcome<Vec<_>>>()?
        }
    };
    let mut placeholders: Vec<String> = Vec::new();
    let mut note = |expr: &Expr| {
        if let Expr::Bind(name) = expr {
            if !placeholders.contains(name) {
                placeholders.push(name.clone());
            }
        }
    };
    for action in &actions {
        match action {
            Action::Assign { expr, .. } => note(expr),
            Action::Call { args, .. } => args.iter().for_each(|arg| note(&arg.expr)),
            _ => {}
        }
    }
    Ok(Block { actions, placeholders })
}

fn read_element(buf: &BindBuffer, idx: usize) -> Option<Value> {
    match buf.data_type {
        DataType::Text => buf.text(idx).map(|text| Value::Text(text.to_owned())),
        DataType::Integer => buf.int(idx).map(Value::Int),
    }
}

fn store_element(buf: &mut BindBuffer, idx: usize, value: Option<&Value>) -> Outcome<()> {
    let stored = match (value, buf.data_type) {
        (None, _) => {
            buf.set_null(idx);
            true
        }
        (Some(Value::Int(num)), DataType::Integer) => buf.set_int(idx, *num),
        (Some(Value::Int(num)), DataType::Text) => buf.set_text(idx, &num.to_string()),
        (Some(Value::Text(text)), DataType::Text) => buf.set_text(idx, text),
        (Some(Value::Text(text)), DataType::Integer) => {
            let num = text.trim().parse().map_err(|_| value_error("character to number conversion error"))?;
            buf.set_int(idx, num)
        }
    };
    if stored {
        Ok(())
    } else {
        Err(value_error("character string buffer too small"))
    }
}

impl SimClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts logons to the registered accounts. Without accounts any non-empty username is accepted.
    pub fn with_account(self, username: &str, password: &str) -> Self {
        self.add_account(username, password);
        self
    }

    pub fn add_account(&self, username: &str, password: &str) {
        self.inner.accounts.write().insert(username.to_ascii_lowercase(), password.to_owned());
    }

    /**
        Registers a procedure that anonymous blocks can call by `name`.

        The procedure writes the page through [`Owa`] and reads its arguments from [`Args`].
        An error it returns is raised as ORA-20000.
    */
    pub fn register<F>(&self, name: &str, procedure: F)
    where
        F: Fn(&mut Owa, &mut Args) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        let key = normalize_name(name).unwrap_or_else(|| name.to_ascii_lowercase());
        self.inner.procedures.write().insert(key, Arc::new(procedure));
    }

    /// Makes the `n`-th next call of `op` fail with ORA-03113.
    pub fn fail_nth(&self, op: Op, n: u32) {
        self.fail_with(op, n, 3113, "end-of-file on communication channel");
    }

    /**
        Makes the `n`-th next call of `op` fail with the given error.

        Calls that release a resource release it even when they fail.
    */
    pub fn fail_with(&self, op: Op, n: u32, code: i32, message: &str) {
        self.inner.faults.lock().push(Fault { op, remaining: n.max(1), code, message: message.to_owned() });
    }

    /// Removes pending faults.
    pub fn clear_faults(&self) {
        self.inner.faults.lock().clear();
    }

    /// Returns a snapshot of the resource counters.
    pub fn stats(&self) -> Stats {
        self.inner.stats.lock().clone()
    }

    /// Returns the text of every statement executed so far.
    pub fn history(&self) -> Vec<String> {
        self.inner.history.lock().clone()
    }

    pub fn clear_history(&self) {
        self.inner.history.lock().clear();
    }

    fn fault(&self, op: Op) -> Outcome<()> {
        let mut faults = self.inner.faults.lock();
        let mut hit = None;
        for (idx, fault) in faults.iter_mut().enumerate() {
            if fault.op == op {
                fault.remaining = fault.remaining.saturating_sub(1);
                if fault.remaining == 0 && hit.is_none() {
                    hit = Some(idx);
                }
            }
        }
        match hit {
            Some(idx) => {
                let fault = faults.remove(idx);
                Err(Status::error(fault.code, fault.message))
            }
            None => Ok(()),
        }
    }

    fn next_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn authenticate(&self, username: &str, password: &str) -> Outcome<()> {
        if username.is_empty() {
            return Err(Status::error(1017, "invalid username/password; logon denied"));
        }
        let accounts = self.inner.accounts.read();
        if !accounts.is_empty() && accounts.get(&username.to_ascii_lowercase()).map_or(true, |pass| pass != password) {
            return Err(Status::error(1017, "invalid username/password; logon denied"));
        }
        Ok(())
    }

    fn check_database(database: &str) -> Outcome<()> {
        if database.trim().is_empty() {
            Err(Status::error(12154, "TNS:could not resolve the connect identifier specified"))
        } else {
            Ok(())
        }
    }

    fn open_session(&self, pool: Option<u64>) -> SimSession {
        let id = self.next_id();
        self.inner.sessions.lock().insert(id, SessionState { pool, owa: Some(Owa::default()) });
        let mut stats = self.inner.stats.lock();
        stats.sessions_open += 1;
        stats.peak_sessions = stats.peak_sessions.max(stats.sessions_open);
        stats.connects += 1;
        SimSession { id }
    }

    fn close_session(&self, id: u64) -> bool {
        let closed = self.inner.sessions.lock().remove(&id).is_some();
        if closed {
            let mut stats = self.inner.stats.lock();
            stats.sessions_open = stats.sessions_open.saturating_sub(1);
            stats.releases += 1;
        }
        closed
    }

    fn check_session(&self, session: &SimSession) -> Outcome<()> {
        if self.inner.sessions.lock().contains_key(&session.id) {
            Ok(())
        } else {
            Err(not_connected())
        }
    }

    fn new_lob(&self, content: Content, transient: bool) -> u64 {
        let id = self.next_id();
        self.inner.lobs.lock().insert(id, LobData { content, open: false, transient });
        id
    }

    fn lob_id(locator: &SimLocator) -> Outcome<u64> {
        (*locator.lob.lock()).ok_or_else(invalid_locator)
    }

    fn with_lob<R>(&self, locator: &SimLocator, f: impl FnOnce(&mut LobData) -> Outcome<R>) -> Outcome<R> {
        let id = Self::lob_id(locator)?;
        let mut lobs = self.inner.lobs.lock();
        let lob = lobs.get_mut(&id).ok_or_else(invalid_locator)?;
        f(lob)
    }

    fn resolve(binds: &HashMap<String, Bound>, expr: &Expr) -> Outcome<Resolved> {
        Ok(match expr {
            Expr::Null => Resolved::Null,
            Expr::Int(num) => Resolved::Value(Value::Int(*num)),
            Expr::Text(text) => Resolved::Value(Value::Text(text.clone())),
            Expr::Bind(name) => match binds.get(name) {
                Some(Bound::Scalar { direction: Direction::Input, value }) => value.clone().map_or(Resolved::Null, Resolved::Value),
                Some(Bound::Array { direction: Direction::Input, values }) => Resolved::Array(values.clone()),
                Some(Bound::Scalar { .. }) | Some(Bound::Array { .. }) => Resolved::Output,
                Some(Bound::Locator(slot)) => Resolved::Locator(slot.clone()),
                None => return Err(Status::error(1008, "not all variables bound")),
            },
        })
    }

    fn resolve_args(binds: &HashMap<String, Bound>, args: &[ArgExpr]) -> Outcome<Vec<Arg>> {
        args.iter().map(|arg| {
            let bind = match &arg.expr {
                Expr::Bind(name) => Some(name.clone()),
                _ => None,
            };
            Ok(Arg { name: arg.name.clone(), bind, value: Self::resolve(binds, &arg.expr)? })
        }).collect()
    }

    /// Picks an argument by name when the call uses named notation, by position otherwise.
    fn pick<'x>(args: &'x [Arg], idx: usize, name: &str) -> Option<&'x Resolved> {
        if args.iter().any(|arg| arg.name.is_some()) {
            args.iter().find(|arg| arg.name.as_deref() == Some(name)).map(|arg| &arg.value)
        } else {
            args.get(idx).map(|arg| &arg.value)
        }
    }

    fn run(&self, owa: &mut Owa, stmt: &mut SimStmt) -> Outcome<()> {
        let SimStmt { block, binds, outputs, .. } = stmt;
        for action in &block.actions {
            match action {
                Action::Null | Action::Commit | Action::Rollback => {}
                Action::Assign { target, expr } => {
                    if target != "htp.htbuf_len" {
                        return Err(undeclared(target));
                    }
                    let len = match Self::resolve(binds, expr)? {
                        Resolved::Value(Value::Int(num)) => num,
                        Resolved::Value(Value::Text(text)) => text.trim().parse().map_err(|_| value_error("character to number conversion error"))?,
                        _ => return Err(value_error("invalid chunk length")),
                    };
                    if !(1..=255).contains(&len) {
                        return Err(value_error("invalid chunk length"));
                    }
                    owa.htbuf_len = len as u32;
                }
                Action::Call { name, args } => {
                    let args = Self::resolve_args(binds, args)?;
                    self.call(owa, name, args, outputs)?;
                }
            }
        }
        Ok(())
    }

    fn call(&self, owa: &mut Owa, name: &str, args: Vec<Arg>, outputs: &mut HashMap<String, Vec<Option<Value>>>) -> Outcome<()> {
        match name {
            "htp.init" => {
                if !args.is_empty() {
                    return Err(wrong_args("INIT"));
                }
                owa.reset();
            }
            "htp.p" | "htp.print" | "htp.prn" => {
                let text = match args.as_slice() {
                    [Arg { value: Resolved::Value(value), .. }] => value_text(value),
                    [Arg { value: Resolved::Null, .. }] => String::new(),
                    _ => return Err(wrong_args(name)),
                };
                if name == "htp.prn" {
                    owa.prn(&text);
                } else {
                    owa.print(&text);
                }
            }
            "owa.init_cgi_env" => {
                let count = match Self::pick(&args, 0, "num_params") {
                    Some(Resolved::Value(Value::Int(num))) if *num >= 0 => *num as usize,
                    _ => return Err(wrong_args("INIT_CGI_ENV")),
                };
                let (names, values) = match (Self::pick(&args, 1, "param_name"), Self::pick(&args, 2, "param_val")) {
                    (Some(Resolved::Array(names)), Some(Resolved::Array(values))) => (names, values),
                    _ => return Err(wrong_args("INIT_CGI_ENV")),
                };
                if count > names.len() || count > values.len() {
                    return Err(Status::error(6533, "Subscript beyond count"));
                }
                owa.cgi = names.iter().zip(values.iter()).take(count)
                    .map(|(name, value)| (
                        name.as_ref().map(value_text).unwrap_or_default(),
                        value.as_ref().map(value_text).unwrap_or_default(),
                    ))
                    .collect();
            }
            "node_plsql.get_page" => {
                let slot = match Self::pick(&args, 0, "page") {
                    Some(Resolved::Locator(slot)) => slot.clone(),
                    _ => return Err(wrong_args("GET_PAGE")),
                };
                let page: Vec<u16> = owa.page().encode_utf16().collect();
                let id = self.new_lob(Content::Clob(page), true);
                *slot.lock() = Some(id);
            }
            _ => {
                let procedure = self.inner.procedures.read().get(name).cloned().ok_or_else(|| undeclared(name))?;
                let mut call_args = Args { args, outputs: Vec::new() };
                procedure(owa, &mut call_args).map_err(|msg| Status::error(20000, msg))?;
                for (bind, value) in call_args.outputs {
                    outputs.insert(bind, vec![Some(value)]);
                }
            }
        }
        Ok(())
    }
}

impl Client for SimClient {
    type Pool = SimPool;
    type Session = SimSession;
    type Stmt = SimStmt;
    type Locator = SimLocator;

    fn connect(&self, database: &str, username: &str, password: &str) -> Outcome<SimSession> {
        self.fault(Op::Connect)?;
        Self::check_database(database)?;
        self.authenticate(username, password)?;
        Ok(self.open_session(None))
    }

    fn pool_create(&self, database: &str, username: &str, password: &str, sizing: PoolSizing) -> Outcome<SimPool> {
        self.fault(Op::PoolCreate)?;
        Self::check_database(database)?;
        if sizing.max == 0 || sizing.min > sizing.max || sizing.increment == 0 {
            return Err(Status::error(24413, "Invalid number of sessions specified"));
        }
        self.authenticate(username, password)?;
        self.inner.stats.lock().pools += 1;
        Ok(SimPool { id: self.next_id(), database: database.to_owned(), sizing })
    }

    fn pool_destroy(&self, pool: SimPool) -> Outcome<()> {
        let busy = self.inner.sessions.lock().values().filter(|session| session.pool == Some(pool.id)).count();
        {
            let mut stats = self.inner.stats.lock();
            stats.pools = stats.pools.saturating_sub(1);
        }
        self.fault(Op::PoolDestroy)?;
        if busy > 0 {
            return Err(Status::error(24422, "error occurred while trying to destroy the Session Pool"));
        }
        Ok(())
    }

    fn session_get(&self, pool: &SimPool, username: &str, password: &str) -> Outcome<SimSession> {
        self.fault(Op::SessionGet)?;
        self.authenticate(username, password)?;
        Ok(self.open_session(Some(pool.id)))
    }

    fn session_release(&self, session: SimSession) -> Outcome<()> {
        let closed = self.close_session(session.id);
        self.fault(Op::SessionRelease)?;
        if closed {
            Ok(())
        } else {
            Err(Status::new(INVALID_HANDLE, 0, "invalid session handle"))
        }
    }

    fn commit(&self, session: &SimSession) -> Outcome<()> {
        self.fault(Op::Commit)?;
        self.check_session(session)
    }

    fn rollback(&self, session: &SimSession) -> Outcome<()> {
        self.fault(Op::Rollback)?;
        self.check_session(session)
    }

    fn prepare(&self, session: &SimSession, sql: &str) -> Outcome<SimStmt> {
        self.fault(Op::Prepare)?;
        self.check_session(session)?;
        if sql.trim().is_empty() {
            return Err(Status::error(24373, "invalid length specified for statement"));
        }
        let block = parse_block(sql)?;
        self.inner.stats.lock().statements_live += 1;
        Ok(SimStmt { sql: sql.to_owned(), block, binds: HashMap::new(), outputs: HashMap::new() })
    }

    fn release_statement(&self, _stmt: SimStmt) -> Outcome<()> {
        {
            let mut stats = self.inner.stats.lock();
            stats.statements_live = stats.statements_live.saturating_sub(1);
        }
        self.fault(Op::ReleaseStatement)
    }

    fn bind(&self, stmt: &mut SimStmt, name: &str, buf: BindBuffer<'_>) -> Outcome<()> {
        self.fault(Op::Bind)?;
        let key = name.to_ascii_lowercase();
        if !stmt.block.placeholders.contains(&key) {
            return Err(Status::error(1036, "illegal variable name/number"));
        }
        let direction = buf.direction;
        let bound = if buf.is_array() {
            let values = (0..buf.len().min(buf.capacity())).map(|idx| read_element(&buf, idx)).collect();
            Bound::Array { direction, values }
        } else {
            Bound::Scalar { direction, value: read_element(&buf, 0) }
        };
        stmt.binds.insert(key, bound);
        self.inner.stats.lock().binds += 1;
        Ok(())
    }

    fn bind_locator(&self, stmt: &mut SimStmt, name: &str, locator: &mut SimLocator) -> Outcome<()> {
        self.fault(Op::Bind)?;
        let key = name.to_ascii_lowercase();
        if !stmt.block.placeholders.contains(&key) {
            return Err(Status::error(1036, "illegal variable name/number"));
        }
        stmt.binds.insert(key, Bound::Locator(locator.lob.clone()));
        self.inner.stats.lock().binds += 1;
        Ok(())
    }

    fn execute(&self, session: &SimSession, stmt: &mut SimStmt, iterations: u32) -> Outcome<()> {
        self.fault(Op::Execute)?;
        if iterations == 0 {
            return Err(Status::error(24333, "zero iteration count"));
        }
        self.inner.stats.lock().executes += 1;
        self.inner.history.lock().push(stmt.sql.clone());
        if stmt.block.placeholders.iter().any(|name| !stmt.binds.contains_key(name)) {
            return Err(Status::error(1008, "not all variables bound"));
        }
        stmt.outputs.clear();

        let mut owa = {
            let mut sessions = self.inner.sessions.lock();
            let state = sessions.get_mut(&session.id).ok_or_else(not_connected)?;
            state.owa.take().ok_or_else(|| Status::error(3127, "no new operations allowed until the active operation ends"))?
        };
        let res = self.run(&mut owa, stmt);
        if let Some(state) = self.inner.sessions.lock().get_mut(&session.id) {
            state.owa = Some(owa);
        }
        res
    }

    fn read_out(&self, stmt: &SimStmt, name: &str, mut buf: BindBuffer<'_>) -> Outcome<()> {
        let values = stmt.outputs.get(&name.to_ascii_lowercase()).map(Vec::as_slice).unwrap_or_default();
        if buf.is_array() {
            if values.len() > buf.capacity() {
                return Err(Status::error(6532, "Subscript outside of limit"));
            }
            for (idx, value) in values.iter().enumerate() {
                store_element(&mut buf, idx, value.as_ref())?;
            }
            buf.set_len(values.len());
            Ok(())
        } else {
            store_element(&mut buf, 0, values.first().and_then(Option::as_ref))
        }
    }

    fn locator_alloc(&self) -> Outcome<SimLocator> {
        self.fault(Op::LocatorAlloc)?;
        self.inner.stats.lock().locators_live += 1;
        Ok(SimLocator { lob: Arc::new(Mutex::new(None)) })
    }

    fn locator_free(&self, locator: SimLocator) -> Outcome<()> {
        if let Some(id) = *locator.lob.lock() {
            let mut lobs = self.inner.lobs.lock();
            if lobs.get(&id).map_or(false, |lob| lob.transient) {
                lobs.remove(&id);
            }
        }
        {
            let mut stats = self.inner.stats.lock();
            stats.locators_live = stats.locators_live.saturating_sub(1);
        }
        self.fault(Op::LocatorFree)
    }

    fn lob_create_temporary(&self, session: &SimSession, locator: &mut SimLocator, kind: LobKind) -> Outcome<()> {
        self.fault(Op::LobCreateTemporary)?;
        self.check_session(session)?;
        let content = match kind {
            LobKind::Clob => Content::Clob(Vec::new()),
            LobKind::Blob => Content::Blob(Vec::new()),
        };
        let id = self.new_lob(content, false);
        *locator.lob.lock() = Some(id);
        Ok(())
    }

    fn lob_free_temporary(&self, _session: &SimSession, locator: &mut SimLocator) -> Outcome<()> {
        if let Some(id) = locator.lob.lock().take() {
            self.inner.lobs.lock().remove(&id);
        }
        self.fault(Op::LobFreeTemporary)
    }

    fn lob_open(&self, session: &SimSession, locator: &SimLocator, _mode: LobMode) -> Outcome<()> {
        self.fault(Op::LobOpen)?;
        self.check_session(session)?;
        self.with_lob(locator, |lob| {
            if lob.open {
                return Err(Status::error(22293, "LOB already opened in the same transaction"));
            }
            lob.open = true;
            Ok(())
        })?;
        self.inner.stats.lock().lobs_open += 1;
        Ok(())
    }

    fn lob_close(&self, _session: &SimSession, locator: &SimLocator) -> Outcome<()> {
        self.with_lob(locator, |lob| {
            if !lob.open {
                return Err(Status::error(22289, "cannot perform operation on an unopened file or LOB"));
            }
            lob.open = false;
            Ok(())
        })?;
        {
            let mut stats = self.inner.stats.lock();
            stats.lobs_open = stats.lobs_open.saturating_sub(1);
        }
        self.fault(Op::LobClose)
    }

    fn lob_length(&self, session: &SimSession, locator: &SimLocator) -> Outcome<u64> {
        self.fault(Op::LobLength)?;
        self.check_session(session)?;
        self.with_lob(locator, |lob| Ok(match &lob.content {
            Content::Clob(chars) => chars.len() as u64,
            Content::Blob(bytes) => bytes.len() as u64,
        }))
    }

    fn lob_read(&self, session: &SimSession, locator: &SimLocator, offset: u64, buf: LobBuffer<'_>) -> Outcome<usize> {
        self.fault(Op::LobRead)?;
        self.check_session(session)?;
        if offset == 0 {
            return Err(Status::error(24801, "illegal parameter value in OCI lob function"));
        }
        let start = (offset - 1) as usize;
        self.with_lob(locator, |lob| match (&lob.content, buf) {
            (Content::Clob(chars), LobBuffer::Utf16(out)) => {
                let src = chars.get(start..).unwrap_or_default();
                let len = src.len().min(out.len());
                out[..len].copy_from_slice(&src[..len]);
                Ok(len)
            }
            (Content::Blob(bytes), LobBuffer::Bytes(out)) => {
                let src = bytes.get(start..).unwrap_or_default();
                let len = src.len().min(out.len());
                out[..len].copy_from_slice(&src[..len]);
                Ok(len)
            }
            _ => Err(Status::error(932, "inconsistent datatypes")),
        })
    }

    fn lob_write(&self, session: &SimSession, locator: &SimLocator, offset: u64, data: &[u8]) -> Outcome<usize> {
        self.fault(Op::LobWrite)?;
        self.check_session(session)?;
        if offset == 0 {
            return Err(Status::error(24801, "illegal parameter value in OCI lob function"));
        }
        let start = (offset - 1) as usize;
        self.with_lob(locator, |lob| {
            match &mut lob.content {
                Content::Blob(bytes) => {
                    if bytes.len() < start + data.len() {
                        bytes.resize(start + data.len(), 0);
                    }
                    bytes[start..start + data.len()].copy_from_slice(data);
                }
                Content::Clob(chars) => {
                    let text = std::str::from_utf8(data).map_err(|_| Status::error(22993, "specified input amount is greater than actual source amount"))?;
                    let units: Vec<u16> = text.encode_utf16().collect();
                    if chars.len() < start + units.len() {
                        chars.resize(start + units.len(), 0x20);
                    }
                    chars[start..start + units.len()].copy_from_slice(&units);
                }
            }
            Ok(data.len())
        })
    }
}
