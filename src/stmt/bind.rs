//! Binding of parameter placeholders

use crate::client::{Client, Outcome, BindBuffer};
use super::param::Binder;

/// Returns the bind name without an optional leading colon
pub(crate) fn strip_colon(name: &str) -> &str {
    name.strip_prefix(':').unwrap_or(name)
}

/// Attaches parameter buffers to a prepared client statement.
pub(crate) struct Params<'s, C: Client> {
    client: &'s C,
    stmt: &'s mut C::Stmt,
}

impl<'s, C: Client> Params<'s, C> {
    pub(crate) fn new(client: &'s C, stmt: &'s mut C::Stmt) -> Self {
        Self { client, stmt }
    }
}

impl<C: Client> Binder for Params<'_, C> {
    fn bind_by_name(&mut self, name: &str, buf: BindBuffer<'_>) -> Outcome<()> {
        self.client.bind(self.stmt, strip_colon(name), buf)
    }

    fn read_out(&mut self, name: &str, buf: BindBuffer<'_>) -> Outcome<()> {
        self.client.read_out(self.stmt, strip_colon(name), buf)
    }
}
