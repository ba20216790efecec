//! Connection Pool

mod connection;

pub use connection::ConnectionPool;
