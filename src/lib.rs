//! A PL/SQL web gateway.
//!
//! The gateway turns a web request (a procedure name, named parameters and a CGI environment)
//! into a call of a stored procedure and returns the page that procedure generated through the
//! `htp` output buffer. Every request runs on a session leased from a connection pool:
//!
//! 1. `owa.init_cgi_env` receives the CGI environment and `htp.init` resets the page buffer,
//! 2. the procedure is called, either with named literal arguments or, for names that start
//!    with `!`, with `name_array` and `value_array`,
//! 3. `node_plsql.get_page` returns the generated page as a CLOB that is read back in full.
//!
//! Database access goes through the [`Client`](client::Client) trait. The crate ships with an
//! in-process `client::sim::SimClient` (the `sim` feature, on by default) and, with the `oci`
//! feature, a driver for the Oracle Call Interface.
//!
//! ```
//! use plsql_gateway::{Gateway, Config, Request, Page, client::sim::SimClient};
//!
//! let sim = SimClient::new();
//! sim.register("myapp.home", |owa, args| {
//!     owa.print("Content-type: text/html");
//!     owa.print("");
//!     owa.prn(&format!("<p>Hello, {}</p>", args.text("name").unwrap_or_default()));
//!     Ok(())
//! });
//!
//! let gateway = Gateway::new(sim, Config::new("demo", "demo", "orcl").with_pool(1, 4, 1))?;
//! gateway.create()?;
//! let text = gateway.request(
//!     Request::new("myapp.home").param("name", "World").cgi("REQUEST_METHOD", "GET")
//! )?;
//! let page = Page::parse(&text);
//! assert_eq!(page.header.content_type.as_deref(), Some("text/html"));
//! assert_eq!(page.body, "<p>Hello, World</p>");
//! gateway.destroy()?;
//! # Ok::<(),plsql_gateway::Error>(())
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(any(feature="tokio", feature="actix", feature="async-std"))]
mod task;

#[cfg(any(feature="tokio", feature="actix", feature="async-std"))]
#[cfg_attr(docsrs, doc(cfg(any(feature="tokio", feature="actix", feature="async-std"))))]
mod dispatch;

mod err;
mod env;
mod conn;
mod pool;
mod lob;
mod config;
mod gateway;
mod page;

pub mod client;
pub mod stmt;

#[cfg(any(feature="tokio", feature="actix", feature="async-std"))]
pub use task::{spawn, block_on};

#[cfg(any(feature="tokio", feature="actix", feature="async-std"))]
pub use dispatch::Dispatcher;

pub use err::{Error, Stage};
pub(crate) use err::catch;
pub use env::Environment;
pub use conn::Connection;
pub use pool::ConnectionPool;
pub use stmt::Statement;
pub use lob::{Lob, OpenLob};
pub use config::{Config, Charset};
pub use gateway::{Gateway, Request, Call, split_properties};
pub use page::{Page, Header, contains_http_header, split_header};

pub type Result<T> = std::result::Result<T, Error>;
