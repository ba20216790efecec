//! Database client capability
//!
//! Everything the gateway does to a database goes through [`Client`]. The trait mirrors the
//! handful of OCI calls the gateway needs: session and pool management, prepare, bind by name,
//! execute, and LOB locator operations. Every call reports failure as a [`Status`] that the
//! crate then maps into an [`Error`](crate::Error) in one place.

pub mod bind;

#[cfg(any(test, feature="sim"))]
#[cfg_attr(docsrs, doc(cfg(feature="sim")))]
pub mod sim;

#[cfg(feature="oci")]
#[cfg_attr(docsrs, doc(cfg(feature="oci")))]
pub mod oci;

pub use bind::{BindBuffer, ArrayBounds, DataType, Direction, IND_NULL, IND_NOTNULL};

use std::fmt;

// Return codes
pub const SUCCESS           : i32 = 0;
pub const SUCCESS_WITH_INFO : i32 = 1;
pub const NO_DATA           : i32 = 100;
pub const ERROR             : i32 = -1;
pub const INVALID_HANDLE    : i32 = -2;

/// Status of a failed client call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// Return code of the call
    pub rc: i32,
    /// Database error number or 0 when the client has no diagnostic record
    pub code: i32,
    /// Diagnostic message
    pub message: String,
}

impl Status {
    pub fn new(rc: i32, code: i32, message: impl Into<String>) -> Self {
        Self { rc, code, message: message.into() }
    }

    /// Returns the status of a call that failed with a database error.
    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self::new(ERROR, code, message)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.code > 0 {
            write!(f, "ORA-{:05}: {}", self.code, self.message)
        } else if self.message.is_empty() {
            write!(f, "status {}", self.rc)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

/// Result of a client call.
pub type Outcome<T> = std::result::Result<T, Status>;

/// Connection pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSizing {
    pub min: u32,
    pub max: u32,
    pub increment: u32,
}

/// Kind of a temporary LOB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobKind {
    Clob,
    Blob,
}

/// LOB open mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobMode {
    ReadOnly,
    ReadWrite,
}

/// Destination of a LOB read. The variant selects the encoding the client
/// delivers: CLOB content transcoded to UTF-16, or raw BLOB bytes.
pub enum LobBuffer<'a> {
    Utf16(&'a mut [u16]),
    Bytes(&'a mut [u8]),
}

impl LobBuffer<'_> {
    /// Capacity in characters (UTF-16 code units) or bytes.
    pub fn len(&self) -> usize {
        match self {
            LobBuffer::Utf16(buf) => buf.len(),
            LobBuffer::Bytes(buf) => buf.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/**
    Primitive database operations used by the gateway.

    All calls are synchronous and may block on the network. Handles are owned values: a
    session is given back with [`session_release`](Client::session_release), a statement with
    [`release_statement`](Client::release_statement), a locator with
    [`locator_free`](Client::locator_free).

    LOB offsets are 1-based, as they are in OCI.
*/
pub trait Client: Send + Sync + 'static {
    type Pool: Send + Sync;
    type Session: Send;
    type Stmt: Send;
    type Locator: Send;

    /// Starts a standalone user session.
    fn connect(&self, database: &str, username: &str, password: &str) -> Outcome<Self::Session>;

    /// Creates a connection pool for `database` under the pool identity.
    fn pool_create(&self, database: &str, username: &str, password: &str, sizing: PoolSizing) -> Outcome<Self::Pool>;

    fn pool_destroy(&self, pool: Self::Pool) -> Outcome<()>;

    /// Starts a user session over a connection from the pool.
    fn session_get(&self, pool: &Self::Pool, username: &str, password: &str) -> Outcome<Self::Session>;

    /// Ends a standalone session, or returns a pooled one to its pool.
    fn session_release(&self, session: Self::Session) -> Outcome<()>;

    fn commit(&self, session: &Self::Session) -> Outcome<()>;

    fn rollback(&self, session: &Self::Session) -> Outcome<()>;

    fn prepare(&self, session: &Self::Session, sql: &str) -> Outcome<Self::Stmt>;

    fn release_statement(&self, stmt: Self::Stmt) -> Outcome<()>;

    /**
        Binds a buffer to the named placeholder.

        A client may keep pointers into `buf` (OCI does). The caller keeps the buffer alive and
        in place until the statement is executed for the last time or released.
    */
    fn bind(&self, stmt: &mut Self::Stmt, name: &str, buf: BindBuffer<'_>) -> Outcome<()>;

    /// Binds a LOB locator to an output placeholder.
    fn bind_locator(&self, stmt: &mut Self::Stmt, name: &str, locator: &mut Self::Locator) -> Outcome<()>;

    fn execute(&self, session: &Self::Session, stmt: &mut Self::Stmt, iterations: u32) -> Outcome<()>;

    /**
        Copies the value returned for an output placeholder into `buf`.

        Clients that write output values directly into the bound buffers have nothing to do here.
    */
    fn read_out(&self, _stmt: &Self::Stmt, _name: &str, _buf: BindBuffer<'_>) -> Outcome<()> {
        Ok(())
    }

    fn locator_alloc(&self) -> Outcome<Self::Locator>;

    fn locator_free(&self, locator: Self::Locator) -> Outcome<()>;

    fn lob_create_temporary(&self, session: &Self::Session, locator: &mut Self::Locator, kind: LobKind) -> Outcome<()>;

    /// Frees the temporary LOB the locator points to. The locator itself stays allocated.
    fn lob_free_temporary(&self, session: &Self::Session, locator: &mut Self::Locator) -> Outcome<()>;

    fn lob_open(&self, session: &Self::Session, locator: &Self::Locator, mode: LobMode) -> Outcome<()>;

    fn lob_close(&self, session: &Self::Session, locator: &Self::Locator) -> Outcome<()>;

    /// Returns LOB length in characters (CLOB) or bytes (BLOB).
    fn lob_length(&self, session: &Self::Session, locator: &Self::Locator) -> Outcome<u64>;

    /// Reads up to `buf.len()` units starting at `offset`. Returns the number of units read.
    fn lob_read(&self, session: &Self::Session, locator: &Self::Locator, offset: u64, buf: LobBuffer<'_>) -> Outcome<usize>;

    /// Writes `data` at `offset`. Returns the number of bytes written.
    fn lob_write(&self, session: &Self::Session, locator: &Self::Locator, offset: u64, data: &[u8]) -> Outcome<usize>;
}
