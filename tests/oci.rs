#![cfg(feature="oci")]

use plsql_gateway::{*, client::{LobKind, oci::OciClient}, stmt::{ParameterValue, Value}};

fn environment() -> Result<(Environment<OciClient>, Config)> {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = Config::from_env()?;
    Ok((Environment::new(OciClient::new()?).with_debug(config.debug), config))
}

#[test]
fn session_and_binds() -> Result<()> {
    let (oracle, config) = environment()?;
    let conn = oracle.connect(&config.database, &config.username, &config.password)?;
    let mut stmt = conn.prepare("BEGIN :out := UPPER(:txt) || ' ' || TO_CHAR(:num + 1); END;")?;
    stmt.add_parameter(ParameterValue::text("txt", "hello")?)?;
    stmt.add_parameter(ParameterValue::int("num", 41)?)?;
    stmt.add_parameter(ParameterValue::output("out", client::DataType::Text, 100)?)?;
    stmt.execute(1)?;
    assert_eq!(stmt.parameter("out").map(|p| p.values()), Some(vec![Some(Value::Text("HELLO 42".to_string()))]));
    conn.rollback()?;
    Ok(())
}

#[test]
fn temporary_blob() -> Result<()> {
    let (oracle, config) = environment()?;
    let conn = oracle.connect(&config.database, &config.username, &config.password)?;
    let stmt = conn.prepare("BEGIN NULL; END;")?;
    let lob = Lob::temporary(&conn, LobKind::Blob)?;
    let data: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
    assert_eq!(stmt.write_blob(&lob, &data)?, data.len());
    assert_eq!(lob.len()?, data.len() as u64);
    assert_eq!(lob.read_bytes()?, data);
    Ok(())
}

#[test]
fn pooled_sessions() -> Result<()> {
    let (oracle, config) = environment()?;
    let pool = oracle.create_connection_pool(&config.database, &config.username, &config.password, 1, 1, 2)?;
    {
        let conn = pool.get_session(&config.username, &config.password)?;
        let mut stmt = conn.prepare("BEGIN NULL; END;")?;
        stmt.execute(1)?;
        assert_eq!(pool.busy_count(), 1);
    }
    assert_eq!(pool.busy_count(), 0);
    pool.destroy()
}
