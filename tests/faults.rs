use plsql_gateway::{*, client::sim::{SimClient, Op, Stats}};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn assert_no_leaks(stats: &Stats, op: Op, nth: u32) {
    assert_eq!(stats.sessions_open, 0, "session leaked after {:?} #{}", op, nth);
    assert_eq!(stats.statements_live, 0, "statement leaked after {:?} #{}", op, nth);
    assert_eq!(stats.locators_live, 0, "locator leaked after {:?} #{}", op, nth);
    assert_eq!(stats.lobs_open, 0, "LOB left open after {:?} #{}", op, nth);
    assert_eq!(stats.connects, stats.releases, "unmatched connect after {:?} #{}", op, nth);
}

/// Client calls a page request makes, with the number of times each one is made.
const REQUEST_CALLS : [(Op, u32); 11] = [
    (Op::SessionGet, 1),
    (Op::Prepare, 3),
    (Op::Bind, 4),
    (Op::Execute, 3),
    (Op::ReleaseStatement, 3),
    (Op::LocatorAlloc, 1),
    (Op::LobOpen, 1),
    (Op::LobLength, 1),
    (Op::LobRead, 1),
    (Op::LobClose, 1),
    (Op::LocatorFree, 1),
];

#[test]
fn fault_at_every_step() -> Result<()> {
    init_logging();
    let sim = SimClient::new();
    sim.register("myapp.home", |owa, _args| {
        owa.print("Content-type: text/html");
        owa.print("");
        owa.prn("home");
        Ok(())
    });
    let gateway = Gateway::new(sim.clone(), Config::new("demo", "demo", "orcl").with_pool(1, 2, 1))?;
    gateway.create()?;
    let req = Request::new("myapp.home").cgi("REQUEST_METHOD", "GET");

    for (op, count) in REQUEST_CALLS {
        for nth in 1..=count {
            sim.clear_faults();
            sim.fail_nth(op, nth);
            let res = gateway.request(req.clone());
            match op {
                // Release failures are only logged
                Op::ReleaseStatement | Op::LocatorFree => assert!(res.is_ok(), "{:?} #{}: {:?}", op, nth, res),
                _ => {
                    let err = res.err().unwrap_or_else(|| panic!("{:?} #{} did not fail the request", op, nth));
                    assert_eq!(err.code(), Some(3113), "{:?} #{}: {}", op, nth, err);
                }
            }
            assert_no_leaks(&sim.stats(), op, nth);
        }
    }

    sim.clear_faults();
    sim.fail_nth(Op::SessionRelease, 1);
    let res = gateway.request(req.clone());
    assert!(matches!(res, Err(Error::Oracle { stage: Stage::Connection, code: 3113, .. })));
    assert_no_leaks(&sim.stats(), Op::SessionRelease, 1);

    let page = gateway.request(req)?;
    assert_eq!(Page::parse(&page).body, "home");
    gateway.destroy()?;
    Ok(())
}

#[test]
fn first_failure_wins() -> Result<()> {
    init_logging();
    let sim = SimClient::new();
    sim.register("myapp.home", |owa, _args| { owa.prn("home"); Ok(()) });
    let gateway = Gateway::new(sim.clone(), Config::new("demo", "demo", "orcl"))?;
    gateway.create()?;

    sim.fail_with(Op::Execute, 2, 6502, "PL/SQL: numeric or value error");
    sim.fail_nth(Op::SessionRelease, 1);
    let res = gateway.request(Request::new("myapp.home").cgi("REQUEST_METHOD", "GET"));
    assert!(matches!(res, Err(Error::Oracle { stage: Stage::Statement, code: 6502, .. })), "{:?}", res);
    assert_eq!(sim.stats().sessions_open, 0);
    Ok(())
}

#[test]
fn pool_faults() -> Result<()> {
    init_logging();
    let sim = SimClient::new();
    let gateway = Gateway::new(sim.clone(), Config::new("demo", "demo", "orcl"))?;

    sim.fail_nth(Op::PoolCreate, 1);
    let res = gateway.create();
    assert!(matches!(res, Err(Error::Oracle { stage: Stage::Pool, code: 3113, .. })));
    assert!(!gateway.has_pool());

    gateway.create()?;
    sim.fail_nth(Op::PoolDestroy, 1);
    let res = gateway.destroy();
    assert!(matches!(res, Err(Error::Oracle { stage: Stage::Pool, code: 3113, .. })));
    assert!(!gateway.has_pool());
    assert_eq!(sim.stats().pools, 0);
    Ok(())
}
