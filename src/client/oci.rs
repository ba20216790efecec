//! Oracle Call Interface client

use std::{ffi::CStr, mem::size_of, ptr};

use libc::{c_void, size_t};
use once_cell::sync::OnceCell;

use crate::{Error, Result};
use super::{Client, Outcome, Status, PoolSizing, LobKind, LobMode, LobBuffer, BindBuffer, DataType, INVALID_HANDLE};

const OCI_DEFAULT               : u32 = 0;
const OCI_THREADED              : u32 = 1;
const OCI_OBJECT                : u32 = 2;
const OCI_CPOOL                 : u32 = 0x0200;
const OCI_NTV_SYNTAX            : u32 = 1;

const OCI_SUCCESS               : i32 = 0;
const OCI_SUCCESS_WITH_INFO     : i32 = 1;
const OCI_NO_DATA               : i32 = 100;
const OCI_NEED_DATA             : i32 = 99;
const OCI_INVALID_HANDLE        : i32 = -2;

const OCI_HTYPE_ENV             : u32 = 1;
const OCI_HTYPE_ERROR           : u32 = 2;
const OCI_HTYPE_CPOOL           : u32 = 26;
const OCI_DTYPE_LOB             : u32 = 50;

const SQLT_INT                  : u16 = 3;
const SQLT_STR                  : u16 = 5;
const SQLT_CLOB                 : u16 = 112;

const SQLCS_IMPLICIT            : u8 = 1;
const OCI_TEMP_BLOB             : u8 = 1;
const OCI_TEMP_CLOB             : u8 = 2;
const OCI_LOB_READONLY          : u8 = 1;
const OCI_LOB_READWRITE         : u8 = 2;
const OCI_ONE_PIECE             : u8 = 0;
const OCI_DURATION_SESSION      : u16 = 10;

const AL32UTF8                  : u16 = 873;
const OCI_UTF16ID               : u16 = 1000;

const OCI_ERROR_MAXMSG_SIZE     : usize = 3072;

#[repr(C)] pub struct OCIEnv          { _private: [u8; 0] }
#[repr(C)] pub struct OCIError        { _private: [u8; 0] }
#[repr(C)] pub struct OCISvcCtx       { _private: [u8; 0] }
#[repr(C)] pub struct OCIStmt         { _private: [u8; 0] }
#[repr(C)] pub struct OCIBind         { _private: [u8; 0] }
#[repr(C)] pub struct OCICPool        { _private: [u8; 0] }
#[repr(C)] pub struct OCILobLocator   { _private: [u8; 0] }

extern "C" {
    fn OCIEnvNlsCreate(
        envhpp:     *mut *mut OCIEnv,
        mode:       u32,
        ctxp:       *const c_void,
        malocfp:    *const c_void,
        ralocfp:    *const c_void,
        mfreefp:    *const c_void,
        xtramemsz:  size_t,
        usrmempp:   *const c_void,
        charset:    u16,
        ncharset:   u16
    ) -> i32;

    fn OCIHandleAlloc(
        parenth:    *mut OCIEnv,
        hndlpp:     *mut *mut c_void,
        hndl_type:  u32,
        xtramem_sz: size_t,
        usrmempp:   *const c_void
    ) -> i32;

    fn OCIHandleFree(
        hndlp:      *mut c_void,
        hnd_type:   u32
    ) -> i32;

    fn OCIDescriptorAlloc(
        parenth:    *mut OCIEnv,
        descpp:     *mut *mut c_void,
        desc_type:  u32,
        xtramem_sz: size_t,
        usrmempp:   *const c_void
    ) -> i32;

    fn OCIDescriptorFree(
        descp:      *mut c_void,
        desc_type:  u32
    ) -> i32;

    fn OCIErrorGet(
        hndlp:      *const c_void,
        recordno:   u32,
        sqlstate:   *const c_void,
        errcodep:   *mut i32,
        bufp:       *mut u8,
        bufsiz:     u32,
        hnd_type:   u32,
    ) -> i32;
}

extern "C" {
    fn OCIConnectionPoolCreate(
        envhp:      *mut OCIEnv,
        errhp:      *mut OCIError,
        poolhp:     *mut OCICPool,
        pool_name:  *mut *const u8,
        name_len:   *mut i32,
        dblink:     *const u8,
        dblink_len: i32,
        conn_min:   u32,
        conn_max:   u32,
        conn_incr:  u32,
        username:   *const u8,
        user_len:   i32,
        password:   *const u8,
        pass_len:   i32,
        mode:       u32
    ) -> i32;

    fn OCIConnectionPoolDestroy(
        poolhp:     *mut OCICPool,
        errhp:      *mut OCIError,
        mode:       u32
    ) -> i32;

    fn OCILogon2(
        envhp:      *mut OCIEnv,
        errhp:      *mut OCIError,
        svchp:      *mut *mut OCISvcCtx,
        username:   *const u8,
        uname_len:  u32,
        password:   *const u8,
        passwd_len: u32,
        dbname:     *const u8,
        dbname_len: u32,
        mode:       u32
    ) -> i32;

    fn OCILogoff(
        svchp:      *mut OCISvcCtx,
        errhp:      *mut OCIError
    ) -> i32;

    fn OCITransCommit(
        svchp:      *mut OCISvcCtx,
        errhp:      *mut OCIError,
        flags:      u32
    ) -> i32;

    fn OCITransRollback(
        svchp:      *mut OCISvcCtx,
        errhp:      *mut OCIError,
        flags:      u32
    ) -> i32;
}

extern "C" {
    fn OCIStmtPrepare2(
        svchp:      *mut OCISvcCtx,
        stmthp:     *mut *mut OCIStmt,
        errhp:      *mut OCIError,
        stmttext:   *const u8,
        stmt_len:   u32,
        key:        *const u8,
        keylen:     u32,
        language:   u32,
        mode:       u32
    ) -> i32;

    fn OCIStmtRelease(
        stmtp:      *mut OCIStmt,
        errhp:      *mut OCIError,
        key:        *const u8,
        keylen:     u32,
        mode:       u32
    ) -> i32;

    fn OCIBindByName(
        stmtp:      *mut OCIStmt,
        bindpp:     *mut *mut OCIBind,
        errhp:      *mut OCIError,
        namep:      *const u8,
        name_len:   i32,
        valuep:     *mut c_void,
        value_sz:   i32,
        dty:        u16,
        indp:       *mut c_void,
        alenp:      *mut u16,
        rcodep:     *mut u16,
        maxarr_len: u32,
        curelep:    *mut u32,
        mode:       u32
    ) -> i32;

    fn OCIStmtExecute(
        svchp:      *mut OCISvcCtx,
        stmtp:      *mut OCIStmt,
        errhp:      *mut OCIError,
        iters:      u32,
        rowoff:     u32,
        snap_in:    *const c_void,
        snap_out:   *mut c_void,
        mode:       u32
    ) -> i32;
}

extern "C" {
    fn OCILobCreateTemporary(
        svchp:      *mut OCISvcCtx,
        errhp:      *mut OCIError,
        loc:        *mut OCILobLocator,
        csid:       u16,
        csfrm:      u8,
        lob_type:   u8,
        cache:      u8,
        duration:   u16,
    ) -> i32;

    fn OCILobFreeTemporary(
        svchp:      *mut OCISvcCtx,
        errhp:      *mut OCIError,
        loc:        *mut OCILobLocator,
    ) -> i32;

    fn OCILobOpen(
        svchp:      *mut OCISvcCtx,
        errhp:      *mut OCIError,
        loc:        *mut OCILobLocator,
        mode:       u8,
    ) -> i32;

    fn OCILobClose(
        svchp:      *mut OCISvcCtx,
        errhp:      *mut OCIError,
        loc:        *mut OCILobLocator,
    ) -> i32;

    fn OCILobGetLength2(
        svchp:      *mut OCISvcCtx,
        errhp:      *mut OCIError,
        loc:        *mut OCILobLocator,
        len:        *mut u64,
    ) -> i32;

    fn OCILobRead2(
        svchp:      *mut OCISvcCtx,
        errhp:      *mut OCIError,
        loc:        *mut OCILobLocator,
        byte_cnt:   *mut u64,
        char_cnt:   *mut u64,
        offset:     u64,
        buf:        *mut u8,
        buf_len:    u64,
        piece:      u8,
        ctx:        *mut c_void,
        read_cb:    *const c_void,
        csid:       u16,
        csfrm:      u8,
    ) -> i32;

    fn OCILobWrite2(
        svchp:      *mut OCISvcCtx,
        errhp:      *mut OCIError,
        loc:        *mut OCILobLocator,
        byte_cnt:   *mut u64,
        char_cnt:   *mut u64,
        offset:     u64,
        buf:        *const u8,
        buf_len:    u64,
        piece:      u8,
        ctx:        *mut c_void,
        write_cb:   *const c_void,
        csid:       u16,
        csfrm:      u8,
    ) -> i32;
}

/// Reads the first diagnostic record of a handle.
fn status(rc: i32, hndl: *const c_void, htype: u32) -> Status {
    if rc == OCI_INVALID_HANDLE {
        return Status::new(INVALID_HANDLE, 0, "invalid handle");
    }
    let mut errcode = rc;
    let mut errmsg = vec![0u8; OCI_ERROR_MAXMSG_SIZE];
    let res = unsafe {
        OCIErrorGet(hndl, 1, ptr::null(), &mut errcode, errmsg.as_mut_ptr(), OCI_ERROR_MAXMSG_SIZE as u32, htype)
    };
    let msg = if res == OCI_SUCCESS {
        CStr::from_bytes_until_nul(&errmsg)
            .map(|msg| msg.to_string_lossy().trim_end().to_string())
            .unwrap_or_default()
    } else {
        match rc {
            OCI_NO_DATA   => String::from("No Data"),
            OCI_NEED_DATA => String::from("Need Data"),
            _ => format!("Error {}", rc),
        }
    };
    Status::new(rc, if res == OCI_SUCCESS { errcode } else { 0 }, msg)
}

fn check(rc: i32, err: *mut OCIError) -> Outcome<()> {
    match rc {
        OCI_SUCCESS | OCI_SUCCESS_WITH_INFO => Ok(()),
        _ => Err(status(rc, err as *const c_void, OCI_HTYPE_ERROR)),
    }
}

fn text_len(text: &str) -> Outcome<u32> {
    u32::try_from(text.len()).map_err(|_| Status::error(1460, "unimplemented or unreasonable conversion requested"))
}

struct Env(*mut OCIEnv);

unsafe impl Send for Env {}
unsafe impl Sync for Env {}

static OCI_ENV: OnceCell<Env> = OnceCell::new();

fn environment() -> Outcome<*mut OCIEnv> {
    let env = OCI_ENV.get_or_try_init(|| {
        let mut env = ptr::null_mut::<OCIEnv>();
        let rc = unsafe {
            OCIEnvNlsCreate(
                &mut env, OCI_THREADED | OCI_OBJECT,
                ptr::null(), ptr::null(), ptr::null(), ptr::null(), 0, ptr::null(),
                AL32UTF8, AL32UTF8
            )
        };
        if rc != OCI_SUCCESS || env.is_null() {
            let err = if env.is_null() { Status::new(rc, 0, "OCI environment was not created") } else { status(rc, env as *const c_void, OCI_HTYPE_ENV) };
            return Err(err);
        }
        Ok(Env(env))
    })?;
    Ok(env.0)
}

fn handle_alloc<T>(env: *mut OCIEnv, htype: u32) -> Outcome<*mut T> {
    let mut handle = ptr::null_mut::<c_void>();
    let rc = unsafe { OCIHandleAlloc(env, &mut handle, htype, 0, ptr::null()) };
    if rc != OCI_SUCCESS {
        return Err(status(rc, env as *const c_void, OCI_HTYPE_ENV));
    }
    if handle.is_null() {
        return Err(Status::new(INVALID_HANDLE, 0, format!("OCI returned NULL for handle {}", htype)));
    }
    Ok(handle as *mut T)
}

fn handle_free<T>(handle: *mut T, htype: u32) {
    if !handle.is_null() {
        unsafe {
            OCIHandleFree(handle as *mut c_void, htype);
        }
    }
}

/**
    Client that talks to Oracle through OCI.

    All clients share one threaded OCI environment that uses AL32UTF8 for both character sets.
*/
#[derive(Clone, Copy)]
pub struct OciClient {
    env: *mut OCIEnv,
}

unsafe impl Send for OciClient {}
unsafe impl Sync for OciClient {}

impl OciClient {
    /// Returns a client. The OCI environment is created by the first call.
    pub fn new() -> Result<Self> {
        let env = environment().map_err(|status| Error::msg(format!("OCI environment: {}", status)))?;
        Ok(Self { env })
    }

    fn error_handle(&self) -> Outcome<*mut OCIError> {
        handle_alloc(self.env, OCI_HTYPE_ERROR)
    }

    fn logon(&self, database: &str, username: &str, password: &str, mode: u32) -> Outcome<OciSession> {
        let err = self.error_handle()?;
        let mut svc = ptr::null_mut::<OCISvcCtx>();
        let rc = unsafe {
            OCILogon2(
                self.env, err, &mut svc,
                username.as_ptr(), text_len(username)?,
                password.as_ptr(), text_len(password)?,
                database.as_ptr(), text_len(database)?,
                mode
            )
        };
        if let Err(status) = check(rc, err) {
            handle_free(err, OCI_HTYPE_ERROR);
            return Err(status);
        }
        Ok(OciSession { svc, err })
    }
}

/// Connection pool
pub struct OciPool {
    pool: *mut OCICPool,
    err:  *mut OCIError,
    name: Vec<u8>,
}

unsafe impl Send for OciPool {}
unsafe impl Sync for OciPool {}

/// User session
pub struct OciSession {
    svc: *mut OCISvcCtx,
    err: *mut OCIError,
}

unsafe impl Send for OciSession {}

/// Prepared statement with its own error handle
pub struct OciStmt {
    stmt: *mut OCIStmt,
    err:  *mut OCIError,
}

unsafe impl Send for OciStmt {}

/// LOB locator. The descriptor pointer is boxed so that its address stays put after it is bound.
pub struct OciLocator {
    loc: Box<*mut OCILobLocator>,
}

unsafe impl Send for OciLocator {}

impl Client for OciClient {
    type Pool = OciPool;
    type Session = OciSession;
    type Stmt = OciStmt;
    type Locator = OciLocator;

    fn connect(&self, database: &str, username: &str, password: &str) -> Outcome<OciSession> {
        self.logon(database, username, password, OCI_DEFAULT)
    }

    fn pool_create(&self, database: &str, username: &str, password: &str, sizing: PoolSizing) -> Outcome<OciPool> {
        let err = self.error_handle()?;
        let pool = match handle_alloc::<OCICPool>(self.env, OCI_HTYPE_CPOOL) {
            Ok(pool) => pool,
            Err(status) => {
                handle_free(err, OCI_HTYPE_ERROR);
                return Err(status);
            }
        };
        let mut name_ptr = ptr::null::<u8>();
        let mut name_len = 0i32;
        let rc = unsafe {
            OCIConnectionPoolCreate(
                self.env, err, pool, &mut name_ptr, &mut name_len,
                database.as_ptr(), text_len(database)? as i32,
                sizing.min, sizing.max, sizing.increment,
                username.as_ptr(), text_len(username)? as i32,
                password.as_ptr(), text_len(password)? as i32,
                OCI_DEFAULT
            )
        };
        if let Err(status) = check(rc, err) {
            handle_free(pool, OCI_HTYPE_CPOOL);
            handle_free(err, OCI_HTYPE_ERROR);
            return Err(status);
        }
        let name = if name_ptr.is_null() || name_len <= 0 {
            Vec::new()
        } else {
            unsafe { std::slice::from_raw_parts(name_ptr, name_len as usize) }.to_vec()
        };
        Ok(OciPool { pool, err, name })
    }

    fn pool_destroy(&self, pool: OciPool) -> Outcome<()> {
        let rc = unsafe { OCIConnectionPoolDestroy(pool.pool, pool.err, OCI_DEFAULT) };
        let res = check(rc, pool.err);
        handle_free(pool.pool, OCI_HTYPE_CPOOL);
        handle_free(pool.err, OCI_HTYPE_ERROR);
        res
    }

    fn session_get(&self, pool: &OciPool, username: &str, password: &str) -> Outcome<OciSession> {
        let name = std::str::from_utf8(&pool.name).map_err(|_| Status::new(INVALID_HANDLE, 0, "connection pool name is not UTF-8"))?;
        self.logon(name, username, password, OCI_CPOOL)
    }

    fn session_release(&self, session: OciSession) -> Outcome<()> {
        let rc = unsafe { OCILogoff(session.svc, session.err) };
        let res = check(rc, session.err);
        handle_free(session.err, OCI_HTYPE_ERROR);
        res
    }

    fn commit(&self, session: &OciSession) -> Outcome<()> {
        let rc = unsafe { OCITransCommit(session.svc, session.err, OCI_DEFAULT) };
        check(rc, session.err)
    }

    fn rollback(&self, session: &OciSession) -> Outcome<()> {
        let rc = unsafe { OCITransRollback(session.svc, session.err, OCI_DEFAULT) };
        check(rc, session.err)
    }

    fn prepare(&self, session: &OciSession, sql: &str) -> Outcome<OciStmt> {
        let err = self.error_handle()?;
        let mut stmt = ptr::null_mut::<OCIStmt>();
        let rc = unsafe {
            OCIStmtPrepare2(
                session.svc, &mut stmt, err,
                sql.as_ptr(), text_len(sql)?,
                ptr::null(), 0,
                OCI_NTV_SYNTAX, OCI_DEFAULT
            )
        };
        if let Err(status) = check(rc, err) {
            handle_free(err, OCI_HTYPE_ERROR);
            return Err(status);
        }
        Ok(OciStmt { stmt, err })
    }

    fn release_statement(&self, stmt: OciStmt) -> Outcome<()> {
        let rc = unsafe { OCIStmtRelease(stmt.stmt, stmt.err, ptr::null(), 0, OCI_DEFAULT) };
        let res = check(rc, stmt.err);
        handle_free(stmt.err, OCI_HTYPE_ERROR);
        res
    }

    fn bind(&self, stmt: &mut OciStmt, name: &str, mut buf: BindBuffer<'_>) -> Outcome<()> {
        let dty = match buf.data_type {
            DataType::Text => SQLT_STR,
            DataType::Integer => SQLT_INT,
        };
        let value_size = i32::try_from(buf.value_size).map_err(|_| Status::error(1460, "bind value is too large"))?;
        let (max_len, cur_len) = match buf.array {
            Some(bounds) => (bounds.max_len, bounds.cur_len as *mut u32),
            None => (0, ptr::null_mut()),
        };
        let mut bind = ptr::null_mut::<OCIBind>();
        let rc = unsafe {
            OCIBindByName(
                stmt.stmt, &mut bind, stmt.err,
                name.as_ptr(), text_len(name)? as i32,
                buf.data.as_mut_ptr() as *mut c_void, value_size, dty,
                buf.indicators.as_mut_ptr() as *mut c_void, ptr::null_mut(), ptr::null_mut(),
                max_len, cur_len, OCI_DEFAULT
            )
        };
        check(rc, stmt.err)
    }

    fn bind_locator(&self, stmt: &mut OciStmt, name: &str, locator: &mut OciLocator) -> Outcome<()> {
        let mut bind = ptr::null_mut::<OCIBind>();
        let loc_ptr: *mut *mut OCILobLocator = &mut *locator.loc;
        let rc = unsafe {
            OCIBindByName(
                stmt.stmt, &mut bind, stmt.err,
                name.as_ptr(), text_len(name)? as i32,
                loc_ptr as *mut c_void, size_of::<*mut OCILobLocator>() as i32, SQLT_CLOB,
                ptr::null_mut(), ptr::null_mut(), ptr::null_mut(),
                0, ptr::null_mut(), OCI_DEFAULT
            )
        };
        check(rc, stmt.err)
    }

    fn execute(&self, session: &OciSession, stmt: &mut OciStmt, iterations: u32) -> Outcome<()> {
        let rc = unsafe {
            OCIStmtExecute(session.svc, stmt.stmt, stmt.err, iterations, 0, ptr::null(), ptr::null_mut(), OCI_DEFAULT)
        };
        check(rc, stmt.err)
    }

    fn locator_alloc(&self) -> Outcome<OciLocator> {
        let mut loc = ptr::null_mut::<c_void>();
        let rc = unsafe { OCIDescriptorAlloc(self.env, &mut loc, OCI_DTYPE_LOB, 0, ptr::null()) };
        if rc != OCI_SUCCESS {
            return Err(status(rc, self.env as *const c_void, OCI_HTYPE_ENV));
        }
        Ok(OciLocator { loc: Box::new(loc as *mut OCILobLocator) })
    }

    fn locator_free(&self, locator: OciLocator) -> Outcome<()> {
        let rc = unsafe { OCIDescriptorFree(*locator.loc as *mut c_void, OCI_DTYPE_LOB) };
        if rc == OCI_SUCCESS {
            Ok(())
        } else {
            Err(Status::new(rc, 0, "LOB locator was not freed"))
        }
    }

    fn lob_create_temporary(&self, session: &OciSession, locator: &mut OciLocator, kind: LobKind) -> Outcome<()> {
        let lob_type = match kind {
            LobKind::Clob => OCI_TEMP_CLOB,
            LobKind::Blob => OCI_TEMP_BLOB,
        };
        let rc = unsafe {
            OCILobCreateTemporary(session.svc, session.err, *locator.loc, 0, SQLCS_IMPLICIT, lob_type, 0, OCI_DURATION_SESSION)
        };
        check(rc, session.err)
    }

    fn lob_free_temporary(&self, session: &OciSession, locator: &mut OciLocator) -> Outcome<()> {
        let rc = unsafe { OCILobFreeTemporary(session.svc, session.err, *locator.loc) };
        check(rc, session.err)
    }

    fn lob_open(&self, session: &OciSession, locator: &OciLocator, mode: LobMode) -> Outcome<()> {
        let mode = match mode {
            LobMode::ReadOnly => OCI_LOB_READONLY,
            LobMode::ReadWrite => OCI_LOB_READWRITE,
        };
        let rc = unsafe { OCILobOpen(session.svc, session.err, *locator.loc, mode) };
        check(rc, session.err)
    }

    fn lob_close(&self, session: &OciSession, locator: &OciLocator) -> Outcome<()> {
        let rc = unsafe { OCILobClose(session.svc, session.err, *locator.loc) };
        check(rc, session.err)
    }

    fn lob_length(&self, session: &OciSession, locator: &OciLocator) -> Outcome<u64> {
        let mut len = 0u64;
        let rc = unsafe { OCILobGetLength2(session.svc, session.err, *locator.loc, &mut len) };
        check(rc, session.err)?;
        Ok(len)
    }

    fn lob_read(&self, session: &OciSession, locator: &OciLocator, offset: u64, buf: LobBuffer<'_>) -> Outcome<usize> {
        let mut byte_cnt = 0u64;
        let mut char_cnt = 0u64;
        let (buf_ptr, buf_len, csid) = match buf {
            LobBuffer::Utf16(buf) => {
                char_cnt = buf.len() as u64;
                (buf.as_mut_ptr() as *mut u8, (buf.len() * size_of::<u16>()) as u64, OCI_UTF16ID)
            }
            LobBuffer::Bytes(buf) => {
                byte_cnt = buf.len() as u64;
                (buf.as_mut_ptr(), buf.len() as u64, 0)
            }
        };
        let rc = unsafe {
            OCILobRead2(
                session.svc, session.err, *locator.loc,
                &mut byte_cnt, &mut char_cnt, offset,
                buf_ptr, buf_len, OCI_ONE_PIECE,
                ptr::null_mut(), ptr::null(),
                csid, SQLCS_IMPLICIT
            )
        };
        check(rc, session.err)?;
        let num_read = if csid == OCI_UTF16ID { char_cnt } else { byte_cnt };
        Ok(num_read as usize)
    }

    fn lob_write(&self, session: &OciSession, locator: &OciLocator, offset: u64, data: &[u8]) -> Outcome<usize> {
        let mut byte_cnt = data.len() as u64;
        let mut char_cnt = 0u64;
        let rc = unsafe {
            OCILobWrite2(
                session.svc, session.err, *locator.loc,
                &mut byte_cnt, &mut char_cnt, offset,
                data.as_ptr(), data.len() as u64, OCI_ONE_PIECE,
                ptr::null_mut(), ptr::null(),
                0, SQLCS_IMPLICIT
            )
        };
        check(rc, session.err)?;
        Ok(byte_cnt as usize)
    }
}
