//! Database client environment

use std::sync::Arc;

use crate::{Result, client::Client, Connection, ConnectionPool};

/**
    Represents a database client environment.

    The environment owns the client and the debug flag. Pools and connections created from it
    share both, so a failure anywhere is reported the same way.
*/
pub struct Environment<C: Client> {
    client: Arc<C>,
    debug: bool,
}

impl<C: Client> Clone for Environment<C> {
    fn clone(&self) -> Self {
        Self { client: self.client.clone(), debug: self.debug }
    }
}

impl<C: Client> Environment<C> {
    /**
        Returns a new environment for the client.

        # Example

        ```
        use plsql_gateway::{Environment, client::sim::SimClient};

        let oracle = Environment::new(SimClient::new());
        assert!(!oracle.is_debug());
        ```
    */
    pub fn new(client: C) -> Self {
        Self::from_arc(Arc::new(client))
    }

    /// Returns an environment that shares an already shared client.
    pub fn from_arc(client: Arc<C>) -> Self {
        Self { client, debug: false }
    }

    /// Turns on logging of every failed client call.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /**
        Creates and returns a new standalone database session.

        # Example

        ```
        use plsql_gateway::{Environment, client::sim::SimClient};

        let oracle = Environment::new(SimClient::new());
        let conn = oracle.connect("orcl", "demo", "demo")?;
        assert!(conn.is_connected());
        # Ok::<(),plsql_gateway::Error>(())
        ```
    */
    pub fn connect(&self, dbname: &str, username: &str, password: &str) -> Result<Connection<'_, C>> {
        let mut conn = Connection::new(self);
        conn.connect(username, password, dbname)?;
        Ok(conn)
    }

    /**
        Creates a new connection pool.

        # Parameters

        * `dbname` - The TNS alias of the database to connect to.
        * `username` - The pool's identity.
        * `password` - The password for the pool's identity.
        * `min` - The minimum number of connections to be opened when the pool is created.
        * `inc` - The next increment for connections to be opened to the database if there are not enough connections.
        * `max` - The maximum number of connections that can be opened to the database.

        # Example

        ```
        use plsql_gateway::{Environment, client::sim::SimClient};

        let oracle = Environment::new(SimClient::new());
        let pool = oracle.create_connection_pool("orcl", "demo", "demo", 1, 1, 4)?;
        assert!(pool.has_pool());
        assert_eq!(pool.max_size(), 4);
        # Ok::<(),plsql_gateway::Error>(())
        ```
    */
    pub fn create_connection_pool(&self, dbname: &str, username: &str, password: &str, min: u32, inc: u32, max: u32) -> Result<ConnectionPool<C>> {
        ConnectionPool::new(self, dbname, username, password, min, inc, max)
    }
}
