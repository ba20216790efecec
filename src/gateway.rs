//! PL/SQL gateway engine

mod call;
mod request;

pub use call::{Call, split_properties};
pub use request::Request;

use std::{sync::Arc, time::Instant};

use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use crate::{
    Error, Result, Stage, Config, Environment, ConnectionPool, Connection, Lob,
    client::{Client, Status, INVALID_HANDLE},
    stmt::{ParameterValue, ParameterArray},
};

const PAGE_SQL : &str = "BEGIN node_plsql.get_page(:page); END;";

fn check_deadline(deadline: Option<Instant>, phase: &str) -> Result<()> {
    match deadline {
        Some(deadline) if Instant::now() >= deadline => Err(Error::Timeout(format!("request deadline passed before {}", phase))),
        _ => Ok(()),
    }
}

/**
    Runs web requests as stored procedure calls and returns the pages they generate.

    Each request leases a session from the gateway's connection pool and, on that session:
    1. seeds the CGI environment (`owa.init_cgi_env`) and resets the page buffer,
    2. calls the procedure,
    3. reads the generated page (`node_plsql.get_page`).

    The session is returned to the pool whatever the outcome.

    # Example

    ```
    use plsql_gateway::{Gateway, Config, Request, client::sim::SimClient};

    let sim = SimClient::new();
    sim.register("myapp.home", |owa, _args| {
        owa.print("<h1>Home</h1>");
        Ok(())
    });
    let gateway = Gateway::new(sim, Config::new("demo", "demo", "orcl"))?;
    gateway.create()?;
    let page = gateway.request(Request::new("myapp.home").cgi("REQUEST_METHOD", "GET"))?;
    assert_eq!(page, "<h1>Home</h1>\n");
    gateway.destroy()?;
    # Ok::<(),plsql_gateway::Error>(())
    ```
*/
pub struct Gateway<C: Client> {
    config:   Config,
    env:      Environment<C>,
    pool:     RwLock<Option<Arc<ConnectionPool<C>>>>,
    init_sql: OnceCell<String>,
}

impl<C: Client> Gateway<C> {
    /// Returns a gateway for the client. The configuration is validated here.
    pub fn new(client: C, config: Config) -> Result<Self> {
        config.validate()?;
        let env = Environment::new(client).with_debug(config.debug);
        Ok(Self { config, env, pool: RwLock::new(None), init_sql: OnceCell::new() })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn client(&self) -> &C {
        self.env.client()
    }

    fn debug(&self, args: std::fmt::Arguments) {
        if self.config.debug {
            log::debug!("{}", args);
        }
    }

    /// Creates the connection pool.
    pub fn create(&self) -> Result<()> {
        let mut pool = self.pool.write();
        if pool.is_some() {
            return Err(Error::new("connection pool is already created"));
        }
        let Config { username, password, database, pool: sizing, .. } = &self.config;
        let new_pool = self.env.create_connection_pool(database, username, password, sizing.min, sizing.increment, sizing.max)?;
        *pool = Some(Arc::new(new_pool));
        self.debug(format_args!("gateway created: {}", self.config));
        Ok(())
    }

    /**
        Destroys the connection pool.

        New requests fail from this point on; requests in flight finish first. Destroying a
        gateway without a pool does nothing.
    */
    pub fn destroy(&self) -> Result<()> {
        let pool = self.pool.write().take();
        if let Some(pool) = pool {
            pool.destroy()?;
            self.debug(format_args!("gateway destroyed"));
        }
        Ok(())
    }

    pub fn has_pool(&self) -> bool {
        self.pool.read().as_ref().map_or(false, |pool| pool.has_pool())
    }

    fn pool(&self) -> Result<Arc<ConnectionPool<C>>> {
        match self.pool.read().as_ref() {
            Some(pool) => Ok(pool.clone()),
            None => Err(Error::report(
                Stage::Connection, Status::new(INVALID_HANDLE, 0, "connection pool is not created"),
                "connect", file!(), line!(), self.config.debug
            )),
        }
    }

    /**
        Executes a single statement on a pooled session.

        An empty username or statement is rejected before the database is contacted.
    */
    pub fn execute(&self, username: &str, password: &str, sql: &str) -> Result<()> {
        if username.is_empty() {
            return Err(Error::malformed("username is empty"));
        }
        if sql.trim().is_empty() {
            return Err(Error::malformed("SQL statement is empty"));
        }
        let pool = self.pool()?;
        let mut conn = Connection::pooled(&pool);
        conn.connect(username, password, &self.config.database)?;
        self.debug(format_args!("execute: {}", sql));
        let res = conn.prepare(sql).and_then(|mut stmt| stmt.execute(1));
        let disconnected = conn.disconnect();
        res.and(disconnected)
    }

    /**
        Runs the request and returns the generated page.

        Malformed requests are rejected before a session is leased. The first failure is
        returned; the session is released in every case.
    */
    pub fn request(&self, req: Request) -> Result<String> {
        req.validate()?;
        let call = Call::build(req.procedure(), req.params())?;
        let deadline = req.get_timeout().map(|timeout| Instant::now() + timeout);

        let (username, password) = if req.username().is_empty() {
            (self.config.username.as_str(), self.config.password.as_str())
        } else {
            (req.username(), req.password())
        };
        let pool = self.pool()?;
        let mut conn = Connection::pooled(&pool);
        conn.connect_until(username, password, &self.config.database, deadline)?;
        self.debug(format_args!("request {}: connected as {}", req.procedure(), username));

        let res = self.run_phases(&conn, &req, &call, deadline);
        let disconnected = conn.disconnect();
        self.debug(format_args!("request {}: {}", req.procedure(), if res.is_ok() { "done" } else { "failed" }));
        let page = res?;
        disconnected?;
        Ok(page)
    }

    fn run_phases(&self, conn: &Connection<C>, req: &Request, call: &Call, deadline: Option<Instant>) -> Result<String> {
        check_deadline(deadline, "request_init")?;
        self.request_init(conn, req.cgi_vars())?;
        check_deadline(deadline, "request_run")?;
        self.request_run(conn, call)?;
        check_deadline(deadline, "request_page")?;
        self.request_page(conn)
    }

    fn init_sql(&self) -> &str {
        self.init_sql.get_or_init(||
            format!("BEGIN owa.init_cgi_env(:c, :n, :v); htp.init; htp.htbuf_len := {}; END;", self.config.htbuf_len())
        )
    }

    /// Seeds the CGI environment and resets the page buffer.
    pub(crate) fn request_init(&self, conn: &Connection<C>, cgi: &[(String, String)]) -> Result<()> {
        if cgi.is_empty() {
            return Err(Error::malformed("CGI environment is empty"));
        }
        let (names, values) = split_properties(cgi);
        let mut stmt = conn.prepare(self.init_sql())?;
        stmt.add_parameter(ParameterValue::int("c", cgi.len() as i64)?)?;
        stmt.add_parameter(ParameterArray::texts("n", &names)?)?;
        stmt.add_parameter(ParameterArray::texts("v", &values)?)?;
        stmt.execute(1)?;
        self.debug(format_args!("request_init: {} CGI variable(s)", cgi.len()));
        Ok(())
    }

    /// Calls the procedure.
    pub(crate) fn request_run(&self, conn: &Connection<C>, call: &Call) -> Result<()> {
        let mut stmt = conn.prepare(call.sql())?;
        if let Call::Arrays { names, values, .. } = call {
            stmt.add_parameter(ParameterArray::texts("n", names)?)?;
            stmt.add_parameter(ParameterArray::texts("v", values)?)?;
        }
        stmt.execute(1)?;
        self.debug(format_args!("request_run: {}", call.sql()));
        Ok(())
    }

    /// Reads the generated page.
    pub(crate) fn request_page(&self, conn: &Connection<C>) -> Result<String> {
        let mut lob = Lob::new(conn)?;
        let mut stmt = conn.prepare(PAGE_SQL)?;
        stmt.bind_locator("page", &mut lob)?;
        stmt.execute(1)?;
        let page = stmt.open_and_read_lob(&lob)?;
        self.debug(format_args!("request_page: {} character(s)", page.chars().count()));
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::sim::SimClient;

    fn gateway(sim: &SimClient) -> Result<Gateway<SimClient>> {
        let gateway = Gateway::new(sim.clone(), Config::new("demo", "demo", "orcl").with_pool(1, 2, 1))?;
        gateway.create()?;
        Ok(gateway)
    }

    #[test]
    fn init_sql_uses_chunk_length() -> Result<()> {
        let sim = SimClient::new();
        let gateway = Gateway::new(sim, Config::new("demo", "demo", "orcl").with_htbuf_len(127))?;
        assert_eq!(gateway.init_sql(), "BEGIN owa.init_cgi_env(:c, :n, :v); htp.init; htp.htbuf_len := 127; END;");
        Ok(())
    }

    #[test]
    fn cgi_reaches_procedure() -> Result<()> {
        let sim = SimClient::new();
        sim.register("myapp.env", |owa, _args| {
            let method = owa.cgi_var("REQUEST_METHOD").unwrap_or_default();
            let path = owa.cgi_var("PATH_INFO").unwrap_or_default();
            owa.prn(&format!("{} {}", method, path));
            Ok(())
        });
        let gateway = gateway(&sim)?;
        let page = gateway.request(Request::new("myapp.env").cgi("REQUEST_METHOD", "POST").cgi("PATH_INFO", "/form"))?;
        assert_eq!(page, "POST /form");
        Ok(())
    }

    #[test]
    fn create_twice() -> Result<()> {
        let sim = SimClient::new();
        let gateway = gateway(&sim)?;
        assert!(gateway.has_pool());
        assert_eq!(gateway.create(), Err(Error::new("connection pool is already created")));
        gateway.destroy()?;
        gateway.destroy()?;
        assert!(!gateway.has_pool());
        Ok(())
    }

    #[test]
    fn invalid_config() {
        let res = Gateway::new(SimClient::new(), Config::new("demo", "demo", "orcl").with_pool(2, 1, 1));
        assert!(matches!(res, Err(Error::Config(_))));
    }

    #[test]
    fn expired_deadline() -> Result<()> {
        let sim = SimClient::new();
        sim.register("myapp.home", |owa, _args| { owa.print("home"); Ok(()) });
        let gateway = gateway(&sim)?;
        let req = Request::new("myapp.home").cgi("REQUEST_METHOD", "GET").timeout(std::time::Duration::ZERO);
        let res = gateway.request(req);
        assert!(matches!(res, Err(Error::Timeout(_))));
        assert_eq!(sim.stats().sessions_open, 0);
        assert_eq!(sim.stats().executes, 0, "no phase ran");
        Ok(())
    }
}
