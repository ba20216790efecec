//! Async dispatch of gateway calls

use std::sync::Arc;

use crate::{Error, Result, Gateway, Request, client::Client, task};

/**
    Runs gateway calls on the blocking thread pool of the async runtime.

    Database I/O never occupies the executor threads. Every call resolves to exactly one
    result; a worker that fails is reported as an interface error.

    # Example

    ```
    use plsql_gateway::{Gateway, Dispatcher, Config, Request, client::sim::SimClient};

    let sim = SimClient::new();
    sim.register("myapp.home", |owa, _args| { owa.prn("home"); Ok(()) });
    let gateway = Gateway::new(sim, Config::new("demo", "demo", "orcl"))?;
    let dispatcher = Dispatcher::new(gateway);

    plsql_gateway::block_on(async {
        dispatcher.create().await?;
        let page = dispatcher.request(Request::new("myapp.home").cgi("REQUEST_METHOD", "GET")).await?;
        assert_eq!(page, "home");
        dispatcher.destroy().await
    })??;
    # Ok::<(),plsql_gateway::Error>(())
    ```
*/
pub struct Dispatcher<C: Client> {
    gateway: Arc<Gateway<C>>,
}

impl<C: Client> Clone for Dispatcher<C> {
    fn clone(&self) -> Self {
        Self { gateway: self.gateway.clone() }
    }
}

impl<C: Client> Dispatcher<C> {
    pub fn new(gateway: Gateway<C>) -> Self {
        Self::from_arc(Arc::new(gateway))
    }

    pub fn from_arc(gateway: Arc<Gateway<C>>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Gateway<C> {
        &self.gateway
    }

    /// Creates the connection pool.
    pub async fn create(&self) -> Result<()> {
        let gateway = self.gateway.clone();
        task::execute_blocking(move || gateway.create()).await?
    }

    /// Destroys the connection pool once the requests in flight have finished.
    pub async fn destroy(&self) -> Result<()> {
        let gateway = self.gateway.clone();
        task::execute_blocking(move || gateway.destroy()).await?
    }

    /// Executes a single statement.
    pub async fn execute(&self, username: &str, password: &str, sql: &str) -> Result<()> {
        if username.is_empty() {
            return Err(Error::malformed("username is empty"));
        }
        let gateway = self.gateway.clone();
        let (username, password, sql) = (username.to_owned(), password.to_owned(), sql.to_owned());
        task::execute_blocking(move || gateway.execute(&username, &password, &sql)).await?
    }

    /// Runs the request and returns the generated page.
    pub async fn request(&self, req: Request) -> Result<String> {
        req.validate()?;
        let gateway = self.gateway.clone();
        task::execute_blocking(move || gateway.request(req)).await?
    }

    /**
        Runs the request in a new task and hands its result to `done`.

        `done` is called exactly once. Must be called from within the runtime.
    */
    pub fn submit<F>(&self, req: Request, done: F)
    where
        F: FnOnce(Result<String>) + Send + 'static,
    {
        let dispatcher = self.clone();
        let _ = task::spawn(async move {
            let res = dispatcher.request(req).await;
            done(res);
        });
    }
}
