//! SQL or PL/SQL statement

mod bind;
mod param;

pub use param::{Parameter, ParameterValue, ParameterArray, Binder, Value, MAX_SCALAR_SIZE};

use crate::{Error, Result, catch, client::Client, Connection, Lob};
use bind::{Params, strip_colon};

struct Slot {
    param: Box<dyn Parameter>,
    bound: bool,
}

/**
    Represents a prepared for execution SQL or PL/SQL statement.

    The statement owns its parameters. Parameters that were added since the last execution
    are bound before the next one; already bound parameters are bound again only after
    [`rebind()`](Statement::rebind).
*/
pub struct Statement<'a, C: Client> {
    conn:   &'a Connection<'a, C>,
    stmt:   Option<C::Stmt>,
    sql:    String,
    params: Vec<Slot>,
}

impl<C: Client> Drop for Statement<'_, C> {
    fn drop(&mut self) {
        if let Some(stmt) = self.stmt.take() {
            if let Err(status) = self.conn.client().release_statement(stmt) {
                log::warn!("statement was not released: {}", status);
            }
        }
    }
}

impl<'a, C: Client> Statement<'a, C> {
    /// Returns a new statement that is not prepared yet.
    pub fn new(conn: &'a Connection<'a, C>) -> Self {
        Self { conn, stmt: None, sql: String::new(), params: Vec::new() }
    }

    /// Parses the statement text.
    pub fn prepare(&mut self, sql: &str) -> Result<()> {
        if self.stmt.is_some() {
            return Err(Error::new("statement is already prepared"));
        }
        let session = self.conn.session()?;
        let stmt = catch!(Statement, self.conn.is_debug(), "prepare" =>
            self.conn.client().prepare(session, sql)
        );
        if self.conn.is_debug() {
            log::debug!("prepared: {}", sql);
        }
        self.stmt = Some(stmt);
        self.sql = sql.to_owned();
        Ok(())
    }

    /// Returns the prepared statement text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /**
        Registers a parameter. It is bound when the statement is executed next.

        # Example

        ```
        use plsql_gateway::{Environment, client::sim::SimClient, stmt::{ParameterValue, Value}};

        let oracle = Environment::new(SimClient::new());
        let conn = oracle.connect("orcl", "demo", "demo")?;
        let mut stmt = conn.prepare("BEGIN htp.htbuf_len := :len; END;")?;
        stmt.add_parameter(ParameterValue::int("len", 63)?)?;
        stmt.execute(1)?;
        assert_eq!(stmt.parameter("len").map(|p| p.values()), Some(vec![Some(Value::Int(63))]));
        # Ok::<(),plsql_gateway::Error>(())
        ```
    */
    pub fn add_parameter<P: Parameter + 'static>(&mut self, param: P) -> Result<()> {
        if self.parameter(param.name()).is_some() {
            return Err(Error::msg(format!("parameter {} is already added", param.name())));
        }
        self.params.push(Slot { param: Box::new(param), bound: false });
        Ok(())
    }

    /// Returns the parameter registered for the placeholder.
    pub fn parameter(&self, name: &str) -> Option<&dyn Parameter> {
        let name = strip_colon(name);
        self.params.iter()
            .find(|slot| slot.param.name().eq_ignore_ascii_case(name))
            .map(|slot| slot.param.as_ref())
    }

    /// Number of registered parameters.
    pub fn parameter_count(&self) -> usize {
        self.params.len()
    }

    /// Requests that all parameters are bound again before the next execution.
    pub fn rebind(&mut self) {
        for slot in &mut self.params {
            slot.bound = false;
        }
    }

    /**
        Executes the statement `iterations` times.

        Output parameters hold the returned values afterwards.
    */
    pub fn execute(&mut self, iterations: u32) -> Result<()> {
        let debug = self.conn.is_debug();
        let client = self.conn.client();
        let session = self.conn.session()?;
        let stmt = self.stmt.as_mut().ok_or_else(|| Error::new("statement is not prepared"))?;

        for slot in self.params.iter_mut().filter(|slot| !slot.bound) {
            catch!(Statement, debug, &format!("bind {}", slot.param.name()) =>
                slot.param.bind_to(&mut Params::new(client, stmt))
            );
            slot.bound = true;
        }
        catch!(Statement, debug, "execute" =>
            client.execute(session, stmt, iterations)
        );
        for slot in self.params.iter_mut() {
            catch!(Statement, debug, &format!("read {}", slot.param.name()) =>
                slot.param.read_back(&mut Params::new(client, stmt))
            );
        }
        if debug {
            log::debug!("executed {} time(s): {}", iterations, self.sql);
        }
        Ok(())
    }

    /// Binds a LOB locator to an output placeholder.
    pub fn bind_locator(&mut self, name: &str, lob: &mut Lob<C>) -> Result<()> {
        let stmt = self.stmt.as_mut().ok_or_else(|| Error::new("statement is not prepared"))?;
        let locator = lob.locator_mut()?;
        catch!(Statement, self.conn.is_debug(), &format!("bind {}", name) =>
            self.conn.client().bind_locator(stmt, strip_colon(name), locator)
        );
        Ok(())
    }

    /// Opens the CLOB, reads all of it and closes it.
    pub fn open_and_read_lob(&self, lob: &Lob<C>) -> Result<String> {
        let open = lob.open(crate::client::LobMode::ReadOnly)?;
        let text = lob.read_text()?;
        open.close()?;
        Ok(text)
    }

    /// Opens the BLOB, writes `data` from its start and closes it.
    pub fn write_blob(&self, lob: &Lob<C>, data: &[u8]) -> Result<usize> {
        let open = lob.open(crate::client::LobMode::ReadWrite)?;
        let written = lob.write(data)?;
        open.close()?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Environment, Stage, client::{DataType, sim::SimClient}};

    #[test]
    fn bind_once_until_rebind() -> Result<()> {
        let sim = SimClient::new();
        let oracle = Environment::new(sim.clone());
        let conn = oracle.connect("orcl", "demo", "demo")?;
        let mut stmt = conn.prepare("BEGIN htp.htbuf_len := :len; END;")?;
        stmt.add_parameter(ParameterValue::int(":len", 85)?)?;
        assert!(stmt.add_parameter(ParameterValue::int("LEN", 1)?).is_err());

        stmt.execute(1)?;
        stmt.execute(1)?;
        assert_eq!(sim.stats().binds, 1);
        stmt.rebind();
        stmt.execute(1)?;
        assert_eq!(sim.stats().binds, 2);
        Ok(())
    }

    #[test]
    fn unbound_placeholder() -> Result<()> {
        let oracle = Environment::new(SimClient::new());
        let conn = oracle.connect("orcl", "demo", "demo")?;
        let mut stmt = conn.prepare("BEGIN htp.htbuf_len := :len; END;")?;
        let res = stmt.execute(1);
        assert!(matches!(res, Err(Error::Oracle { stage: Stage::Statement, code: 1008, .. })));

        stmt.add_parameter(ParameterValue::int("other", 1)?)?;
        let res = stmt.execute(1);
        assert!(matches!(res, Err(Error::Oracle { stage: Stage::Statement, code: 1036, .. })));
        Ok(())
    }

    #[test]
    fn output_values() -> Result<()> {
        let sim = SimClient::new();
        sim.register("demo.greet", |_owa, args| {
            let who = args.text("who").unwrap_or_default();
            args.set_out("msg", format!("Hello, {}", who))
        });
        let oracle = Environment::new(sim);
        let conn = oracle.connect("orcl", "demo", "demo")?;
        let mut stmt = conn.prepare("BEGIN demo.greet(who=>:who, msg=>:msg); END;")?;
        stmt.add_parameter(ParameterValue::text("who", "World")?)?;
        stmt.add_parameter(ParameterValue::output("msg", DataType::Text, 100)?)?;
        stmt.execute(1)?;
        let msg = stmt.parameter("msg").map(|p| p.values());
        assert_eq!(msg, Some(vec![Some(Value::Text("Hello, World".to_string()))]));
        Ok(())
    }

    #[test]
    fn not_prepared() -> Result<()> {
        let oracle = Environment::new(SimClient::new());
        let conn = oracle.connect("orcl", "demo", "demo")?;
        let mut stmt = Statement::new(&conn);
        assert_eq!(stmt.execute(1), Err(Error::new("statement is not prepared")));
        stmt.prepare("BEGIN NULL; END;")?;
        assert_eq!(stmt.prepare("BEGIN NULL; END;"), Err(Error::new("statement is already prepared")));
        Ok(())
    }
}
