use plsql_gateway::{*, client::{LobKind, LobMode, sim::SimClient}};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn blob_round_trip() -> Result<()> {
    init_logging();
    let sim = SimClient::new();
    let oracle = Environment::new(sim.clone()).with_debug(true);
    let conn = oracle.connect("orcl", "demo", "demo")?;
    let stmt = conn.prepare("BEGIN NULL; END;")?;

    let data: Vec<u8> = (0..=255u8).cycle().take(70_000).collect();
    {
        let lob = Lob::temporary(&conn, LobKind::Blob)?;
        assert!(lob.is_temporary());
        assert!(lob.is_empty()?);

        let written = stmt.write_blob(&lob, &data)?;
        assert_eq!(written, data.len());
        assert_eq!(lob.len()?, data.len() as u64);

        let open = lob.open(LobMode::ReadOnly)?;
        let bytes = lob.read_bytes()?;
        open.close()?;
        assert_eq!(bytes.len() as u64, lob.len()?);
        assert_eq!(bytes, data);
        assert_eq!(sim.stats().lobs_open, 0);
    }
    assert_eq!(sim.stats().locators_live, 0);
    Ok(())
}

#[test]
fn clob_text() -> Result<()> {
    init_logging();
    let sim = SimClient::new();
    let oracle = Environment::new(sim.clone());
    let conn = oracle.connect("orcl", "demo", "demo")?;
    let stmt = conn.prepare("BEGIN NULL; END;")?;

    let text = "Hello, \u{1f30d}! Grüße";
    let lob = Lob::temporary(&conn, LobKind::Clob)?;
    stmt.write_blob(&lob, text.as_bytes())?;
    assert_eq!(lob.len()?, text.encode_utf16().count() as u64);
    assert_eq!(stmt.open_and_read_lob(&lob)?, text);
    Ok(())
}

#[test]
fn lob_errors() -> Result<()> {
    init_logging();
    let sim = SimClient::new();
    let oracle = Environment::new(sim.clone());
    let conn = oracle.connect("orcl", "demo", "demo")?;

    let empty = Lob::new(&conn)?;
    let res = empty.len();
    assert!(matches!(res, Err(Error::Oracle { stage: Stage::Lob, code: 22275, .. })));

    let lob = Lob::temporary(&conn, LobKind::Blob)?;
    assert_eq!(lob.write(b"data")?, 4);
    sim.fail_nth(client::sim::Op::LobRead, 1);
    let res = lob.read_bytes();
    assert!(matches!(res, Err(Error::Oracle { stage: Stage::Lob, code: 3113, .. })));
    assert_eq!(lob.read_bytes()?, b"data");
    Ok(())
}

#[test]
fn page_locator_is_freed() -> Result<()> {
    init_logging();
    let sim = SimClient::new();
    let oracle = Environment::new(sim.clone());
    let conn = oracle.connect("orcl", "demo", "demo")?;
    {
        let mut lob = Lob::new(&conn)?;
        let mut stmt = conn.prepare("BEGIN htp.init; htp.prn('<p>page</p>'); node_plsql.get_page(:page); END;")?;
        stmt.bind_locator(":page", &mut lob)?;
        stmt.execute(1)?;
        assert_eq!(stmt.open_and_read_lob(&lob)?, "<p>page</p>");
        assert_eq!(sim.stats().locators_live, 1);
    }
    let stats = sim.stats();
    assert_eq!(stats.locators_live, 0);
    assert_eq!(stats.lobs_open, 0);
    assert_eq!(stats.statements_live, 0);
    Ok(())
}
