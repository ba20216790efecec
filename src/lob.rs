//! Functions for performing operations on large objects (LOBs).

use crate::{Error, Result, catch, client::{Client, LobBuffer, LobKind, LobMode}, Connection};

/**
    LOB locator.

    The locator is freed when it goes out of scope; a temporary LOB is freed with it.
*/
pub struct Lob<'a, C: Client> {
    conn:      &'a Connection<'a, C>,
    locator:   Option<C::Locator>,
    temporary: bool,
}

impl<C: Client> Drop for Lob<'_, C> {
    fn drop(&mut self) {
        if let Some(mut locator) = self.locator.take() {
            let client = self.conn.client();
            if self.temporary {
                if let Ok(session) = self.conn.session() {
                    if let Err(status) = client.lob_free_temporary(session, &mut locator) {
                        log::warn!("temporary LOB was not freed: {}", status);
                    }
                }
            }
            if let Err(status) = client.locator_free(locator) {
                log::warn!("LOB locator was not freed: {}", status);
            }
        }
    }
}

impl<'a, C: Client> Lob<'a, C> {
    /// Allocates an empty locator, which is usually bound as an output placeholder.
    pub fn new(conn: &'a Connection<'a, C>) -> Result<Self> {
        let locator = catch!(Lob, conn.is_debug(), "locator alloc" =>
            conn.client().locator_alloc()
        );
        Ok(Self { conn, locator: Some(locator), temporary: false })
    }

    /**
        Creates a temporary LOB.

        # Example

        ```
        use plsql_gateway::{Environment, Lob, client::{LobKind, sim::SimClient}};

        let oracle = Environment::new(SimClient::new());
        let conn = oracle.connect("orcl", "demo", "demo")?;
        let lob = Lob::temporary(&conn, LobKind::Blob)?;
        assert_eq!(lob.len()?, 0);
        # Ok::<(),plsql_gateway::Error>(())
        ```
    */
    pub fn temporary(conn: &'a Connection<'a, C>, kind: LobKind) -> Result<Self> {
        let mut lob = Self::new(conn)?;
        let session = conn.session()?;
        let locator = lob.locator_mut()?;
        catch!(Lob, conn.is_debug(), "create temporary" =>
            conn.client().lob_create_temporary(session, locator, kind)
        );
        lob.temporary = true;
        Ok(lob)
    }

    fn locator(&self) -> Result<&C::Locator> {
        self.locator.as_ref().ok_or_else(|| Error::new("LOB locator is freed"))
    }

    pub(crate) fn locator_mut(&mut self) -> Result<&mut C::Locator> {
        self.locator.as_mut().ok_or_else(|| Error::new("LOB locator is freed"))
    }

    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    /**
        Opens the LOB. The returned guard closes it when dropped.

        Use [`OpenLob::close`] to learn whether closing succeeded.
    */
    pub fn open(&self, mode: LobMode) -> Result<OpenLob<'_, C>> {
        let session = self.conn.session()?;
        catch!(Lob, self.conn.is_debug(), "open" =>
            self.conn.client().lob_open(session, self.locator()?, mode)
        );
        Ok(OpenLob { lob: self, is_open: true })
    }

    /// Returns the length of the LOB: characters for a CLOB, bytes for a BLOB.
    pub fn len(&self) -> Result<u64> {
        let session = self.conn.session()?;
        let len = catch!(Lob, self.conn.is_debug(), "length" =>
            self.conn.client().lob_length(session, self.locator()?)
        );
        Ok(len)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn buffer_len(&self) -> Result<usize> {
        let len = self.len()?;
        usize::try_from(len).map_err(|_| Error::msg(format!("LOB of {} units does not fit in memory", len)))
    }

    /**
        Reads the whole CLOB.

        The content is read in one pass into a UTF-16 buffer of exactly the LOB length.
    */
    pub fn read_text(&self) -> Result<String> {
        let len = self.buffer_len()?;
        if len == 0 {
            return Ok(String::new());
        }
        let session = self.conn.session()?;
        let mut buf = vec![0u16; len];
        let num_read = catch!(Lob, self.conn.is_debug(), "read" =>
            self.conn.client().lob_read(session, self.locator()?, 1, LobBuffer::Utf16(&mut buf))
        );
        buf.truncate(num_read);
        String::from_utf16(&buf).map_err(|err| Error::msg(format!("LOB content is not valid UTF-16: {}", err)))
    }

    /// Reads the whole BLOB.
    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        let len = self.buffer_len()?;
        let mut buf = vec![0u8; len];
        if len > 0 {
            let session = self.conn.session()?;
            let num_read = catch!(Lob, self.conn.is_debug(), "read" =>
                self.conn.client().lob_read(session, self.locator()?, 1, LobBuffer::Bytes(&mut buf))
            );
            buf.truncate(num_read);
        }
        Ok(buf)
    }

    /// Writes `data` at the start of the LOB. Returns the number of bytes written.
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        let session = self.conn.session()?;
        let written = catch!(Lob, self.conn.is_debug(), "write" =>
            self.conn.client().lob_write(session, self.locator()?, 1, data)
        );
        Ok(written)
    }
}

/// Open LOB guard
pub struct OpenLob<'l, C: Client> {
    lob: &'l Lob<'l, C>,
    is_open: bool,
}

impl<C: Client> Drop for OpenLob<'_, C> {
    fn drop(&mut self) {
        if self.is_open {
            if let Err(err) = self.close_lob() {
                log::warn!("LOB was not closed: {}", err);
            }
        }
    }
}

impl<C: Client> OpenLob<'_, C> {
    fn close_lob(&mut self) -> Result<()> {
        self.is_open = false;
        let conn = self.lob.conn;
        let session = conn.session()?;
        catch!(Lob, conn.is_debug(), "close" =>
            conn.client().lob_close(session, self.lob.locator()?)
        );
        Ok(())
    }

    /// Closes the LOB.
    pub fn close(mut self) -> Result<()> {
        self.close_lob()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Environment, Stage, client::sim::SimClient};

    #[test]
    fn guard_closes() -> Result<()> {
        let sim = SimClient::new();
        let oracle = Environment::new(sim.clone());
        let conn = oracle.connect("orcl", "demo", "demo")?;
        {
            let lob = Lob::temporary(&conn, LobKind::Clob)?;
            let open = lob.open(LobMode::ReadWrite)?;
            assert_eq!(sim.stats().lobs_open, 1);

            let res = lob.open(LobMode::ReadOnly);
            assert!(matches!(res, Err(Error::Oracle { stage: Stage::Lob, code: 22293, .. })));
            drop(open);
            assert_eq!(sim.stats().lobs_open, 0);
            assert_eq!(sim.stats().locators_live, 1);
        }
        assert_eq!(sim.stats().locators_live, 0);
        Ok(())
    }

    #[test]
    fn empty_clob() -> Result<()> {
        let oracle = Environment::new(SimClient::new());
        let conn = oracle.connect("orcl", "demo", "demo")?;
        let lob = Lob::temporary(&conn, LobKind::Clob)?;
        assert!(lob.is_empty()?);
        assert_eq!(lob.read_text()?, "");
        Ok(())
    }
}
