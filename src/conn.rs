//! User Session

use std::time::Instant;

use crate::{Error, Result, catch, client::Client, Environment, ConnectionPool, Statement};

enum Source<'a, C: Client> {
    Env(&'a Environment<C>),
    Pool(&'a ConnectionPool<C>),
}

/**
    Represents a user session, either standalone or leased from a connection pool.

    A connected session is released when the connection is dropped.
*/
pub struct Connection<'a, C: Client> {
    source:  Source<'a, C>,
    session: Option<C::Session>,
}

impl<C: Client> Drop for Connection<'_, C> {
    fn drop(&mut self) {
        if self.session.is_some() {
            if let Err(err) = self.disconnect() {
                log::warn!("session was not released: {}", err);
            }
        }
    }
}

impl<'a, C: Client> Connection<'a, C> {
    /// Returns a new, not yet connected, standalone connection.
    pub fn new(env: &'a Environment<C>) -> Self {
        Self { source: Source::Env(env), session: None }
    }

    /// Returns a new, not yet connected, connection that will lease its session from the pool.
    pub fn pooled(pool: &'a ConnectionPool<C>) -> Self {
        Self { source: Source::Pool(pool), session: None }
    }

    pub(crate) fn env(&self) -> &'a Environment<C> {
        match self.source {
            Source::Env(env) => env,
            Source::Pool(pool) => pool.env(),
        }
    }

    pub(crate) fn client(&self) -> &'a C {
        self.env().client()
    }

    pub(crate) fn is_debug(&self) -> bool {
        self.env().is_debug()
    }

    pub(crate) fn session(&self) -> Result<&C::Session> {
        self.session.as_ref().ok_or_else(|| Error::new("not connected"))
    }

    /// Reports whether the session is leased from a connection pool.
    pub fn has_pool(&self) -> bool {
        matches!(self.source, Source::Pool(_))
    }

    /// Reports whether self is connected.
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /**
        Starts a user session.

        A pooled connection leases a session from its pool; `dbname` is ignored as the
        session uses the pool's database.
    */
    pub fn connect(&mut self, username: &str, password: &str, dbname: &str) -> Result<()> {
        self.connect_until(username, password, dbname, None)
    }

    pub(crate) fn connect_until(&mut self, username: &str, password: &str, dbname: &str, deadline: Option<Instant>) -> Result<()> {
        if self.session.is_some() {
            return Err(Error::new("already connected"));
        }
        let session = match self.source {
            Source::Env(env) => catch!(Connection, env.is_debug(), "connect" =>
                env.client().connect(dbname, username, password)
            ),
            Source::Pool(pool) => pool.acquire(username, password, deadline)?,
        };
        self.session = Some(session);
        Ok(())
    }

    /// Ends a standalone session or returns the leased one to its pool.
    pub fn disconnect(&mut self) -> Result<()> {
        let session = self.session.take().ok_or_else(|| Error::new("not connected"))?;
        match self.source {
            Source::Env(env) => {
                catch!(Connection, env.is_debug(), "disconnect" =>
                    env.client().session_release(session)
                );
                Ok(())
            }
            Source::Pool(pool) => pool.release(session),
        }
    }

    /// Commits the current transaction.
    pub fn commit(&self) -> Result<()> {
        let session = self.session()?;
        catch!(Connection, self.is_debug(), "commit" =>
            self.client().commit(session)
        );
        Ok(())
    }

    /// Rolls back the current transaction.
    pub fn rollback(&self) -> Result<()> {
        let session = self.session()?;
        catch!(Connection, self.is_debug(), "rollback" =>
            self.client().rollback(session)
        );
        Ok(())
    }

    /**
        Prepares SQL or PL/SQL statement for execution.

        # Example

        ```
        use plsql_gateway::{Environment, client::sim::SimClient};

        let oracle = Environment::new(SimClient::new());
        let conn = oracle.connect("orcl", "demo", "demo")?;
        let mut stmt = conn.prepare("BEGIN NULL; END;")?;
        stmt.execute(1)?;
        # Ok::<(),plsql_gateway::Error>(())
        ```
    */
    pub fn prepare(&self, sql: &str) -> Result<Statement<'_, C>> {
        let mut stmt = Statement::new(self);
        stmt.prepare(sql)?;
        Ok(stmt)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Connection, Environment, Error, client::sim::SimClient};

    #[test]
    fn connect_disconnect() -> crate::Result<()> {
        let sim = SimClient::new();
        let oracle = Environment::new(sim.clone());
        let mut conn = Connection::new(&oracle);
        assert!(!conn.is_connected());
        assert!(!conn.has_pool());
        assert_eq!(conn.disconnect(), Err(Error::new("not connected")));

        conn.connect("demo", "demo", "orcl")?;
        assert!(conn.is_connected());
        assert_eq!(conn.connect("demo", "demo", "orcl"), Err(Error::new("already connected")));
        conn.commit()?;
        conn.rollback()?;
        assert_eq!(sim.stats().sessions_open, 1);

        conn.disconnect()?;
        assert!(!conn.is_connected());
        assert!(conn.commit().is_err());
        assert_eq!(sim.stats().sessions_open, 0);
        Ok(())
    }

    #[test]
    fn drop_releases_session() -> crate::Result<()> {
        let sim = SimClient::new();
        let oracle = Environment::new(sim.clone());
        {
            let _conn = oracle.connect("orcl", "demo", "demo")?;
            assert_eq!(sim.stats().sessions_open, 1);
        }
        assert_eq!(sim.stats().sessions_open, 0);
        assert_eq!(sim.stats().connects, sim.stats().releases);
        Ok(())
    }
}
