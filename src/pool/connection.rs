//! Connection Pool

use std::time::Instant;

use parking_lot::{Condvar, Mutex, RwLock};

use crate::{Error, Result, catch, client::{Client, PoolSizing, Status, INVALID_HANDLE}, Environment, Connection};

/// Lease accounting guarded by the pool gate.
struct Lease {
    busy: u32,
    closed: bool,
    nowait: bool,
}

/**
    Connection pool - a shared pool of physical connections.

    Every [`Connection`] leased from the pool shares its database and sizing. The number of
    sessions checked out at the same time never exceeds the pool maximum: a lease waits on
    the pool gate until a session is returned, or fails at once in "no wait" mode.
*/
pub struct ConnectionPool<C: Client> {
    env:    Environment<C>,
    pool:   RwLock<Option<C::Pool>>,
    dbname: String,
    sizing: PoolSizing,
    gate:   Mutex<Lease>,
    cvar:   Condvar,
}

impl<C: Client> Drop for ConnectionPool<C> {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.get_mut().take() {
            if let Err(status) = self.env.client().pool_destroy(pool) {
                log::warn!("connection pool for {} was not destroyed: {}", self.dbname, status);
            }
        }
    }
}

impl<C: Client> ConnectionPool<C> {
    pub(crate) fn new(env: &Environment<C>, dbname: &str, username: &str, password: &str, min: u32, inc: u32, max: u32) -> Result<Self> {
        let sizing = PoolSizing { min, max, increment: inc };
        let pool = catch!(Pool, env.is_debug(), "connection pool create" =>
            env.client().pool_create(dbname, username, password, sizing)
        );
        if env.is_debug() {
            log::debug!("created connection pool for {}@{} ({}..{} by {})", username, dbname, min, max, inc);
        }
        Ok(Self {
            env: env.clone(),
            pool: RwLock::new(Some(pool)),
            dbname: dbname.to_owned(),
            sizing,
            gate: Mutex::new(Lease { busy: 0, closed: false, nowait: false }),
            cvar: Condvar::new(),
        })
    }

    pub(crate) fn env(&self) -> &Environment<C> {
        &self.env
    }

    /// Database this pool connects to.
    pub fn dbname(&self) -> &str {
        &self.dbname
    }

    /// Reports whether the client pool exists, i.e. it was created and not yet destroyed.
    pub fn has_pool(&self) -> bool {
        self.pool.read().is_some()
    }

    /// Maximum number of sessions that can be leased at the same time.
    pub fn max_size(&self) -> u32 {
        self.sizing.max
    }

    /// Returns pool sizing.
    pub fn sizing(&self) -> PoolSizing {
        self.sizing
    }

    /// Returns the number of (busy) leased sessions.
    pub fn busy_count(&self) -> u32 {
        self.gate.lock().busy
    }

    /**
        Reports whether a lease fails at once when all sessions are busy.

        Otherwise [`get_session()`](ConnectionPool::get_session) waits until a session is returned.
    */
    pub fn is_nowait(&self) -> bool {
        self.gate.lock().nowait
    }

    /// Sets or clears the "no wait" mode.
    pub fn set_nowait(&self, nowait: bool) {
        self.gate.lock().nowait = nowait;
    }

    /**
        Returns a new connected session that uses a virtual connection from this pool.

        # Example

        ```
        use plsql_gateway::{Environment, client::sim::SimClient};

        let oracle = Environment::new(SimClient::new());
        let pool = oracle.create_connection_pool("orcl", "demo", "demo", 1, 1, 2)?;
        let conn = pool.get_session("demo", "demo")?;
        assert!(conn.is_connected());
        assert_eq!(pool.busy_count(), 1);
        drop(conn);
        assert_eq!(pool.busy_count(), 0);
        # Ok::<(),plsql_gateway::Error>(())
        ```
    */
    pub fn get_session(&self, username: &str, password: &str) -> Result<Connection<'_, C>> {
        let mut conn = Connection::pooled(self);
        conn.connect(username, password, &self.dbname)?;
        Ok(conn)
    }

    /**
        Leases a session. Waits for a free slot until `deadline` when one is given.
    */
    pub(crate) fn acquire(&self, username: &str, password: &str, deadline: Option<Instant>) -> Result<C::Session> {
        self.enter(deadline)?;
        let res = match self.pool.read().as_ref() {
            Some(pool) => self.env.client().session_get(pool, username, password),
            None => Err(Status::new(INVALID_HANDLE, 0, "connection pool is not created")),
        };
        match res {
            Ok(session) => Ok(session),
            Err(status) => {
                self.leave();
                Err(Error::report(crate::Stage::Connection, status, "session get", file!(), line!(), self.env.is_debug()))
            }
        }
    }

    /// Returns a leased session to the pool.
    pub(crate) fn release(&self, session: C::Session) -> Result<()> {
        let res = self.env.client().session_release(session);
        self.leave();
        catch!(Connection, self.env.is_debug(), "session release" => res);
        Ok(())
    }

    fn enter(&self, deadline: Option<Instant>) -> Result<()> {
        let mut lease = self.gate.lock();
        loop {
            if lease.closed {
                return Err(Error::report(
                    crate::Stage::Connection, Status::new(INVALID_HANDLE, 0, "connection pool is closed"),
                    "session get", file!(), line!(), self.env.is_debug()
                ));
            }
            if lease.busy < self.sizing.max {
                lease.busy += 1;
                return Ok(());
            }
            if lease.nowait {
                return Err(Error::report(
                    crate::Stage::Pool, Status::error(24496, "OCISessionGet() timed out waiting for a free connection"),
                    "session get", file!(), line!(), self.env.is_debug()
                ));
            }
            match deadline {
                Some(deadline) => {
                    if self.cvar.wait_until(&mut lease, deadline).timed_out() && lease.busy >= self.sizing.max && !lease.closed {
                        return Err(Error::Timeout(format!("no free session in the pool for {}", self.dbname)));
                    }
                }
                None => self.cvar.wait(&mut lease),
            }
        }
    }

    fn leave(&self) {
        let mut lease = self.gate.lock();
        lease.busy = lease.busy.saturating_sub(1);
        drop(lease);
        self.cvar.notify_all();
    }

    /**
        Destroys the client pool.

        New leases are refused from this point on. Sessions that are still leased are waited
        for before the client pool is destroyed. Calling `destroy` again is a no-op.
    */
    pub fn destroy(&self) -> Result<()> {
        let mut lease = self.gate.lock();
        lease.closed = true;
        while lease.busy > 0 {
            self.cvar.wait(&mut lease);
        }
        drop(lease);
        self.cvar.notify_all();

        let pool = self.pool.write().take();
        if let Some(pool) = pool {
            catch!(Pool, self.env.is_debug(), "connection pool destroy" =>
                self.env.client().pool_destroy(pool)
            );
            if self.env.is_debug() {
                log::debug!("destroyed connection pool for {}", self.dbname);
            }
        }
        Ok(())
    }
}
