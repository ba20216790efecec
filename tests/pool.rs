use std::{sync::{Arc, Barrier}, thread, time::Duration};

use plsql_gateway::{*, client::sim::SimClient};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn leases_never_exceed_pool_size() -> Result<()> {
    init_logging();
    let sim = SimClient::new();
    sim.register("myapp.slow", |owa, args| {
        thread::sleep(Duration::from_millis(20));
        owa.prn(&format!("request {}", args.text("id").unwrap_or_default()));
        Ok(())
    });
    let gateway = Arc::new(Gateway::new(sim.clone(), Config::new("demo", "demo", "orcl").with_pool(1, 3, 1))?);
    gateway.create()?;

    let mut workers = Vec::new();
    for i in 0..12 {
        let gateway = gateway.clone();
        let handle = thread::spawn(move || -> Result<()> {
            let id = i.to_string();
            let req = Request::new("myapp.slow").param("id", &id).cgi("REQUEST_METHOD", "GET");
            let page = gateway.request(req)?;
            assert_eq!(page, format!("request {}", id));
            Ok(())
        });
        workers.push(handle);
    }
    for handle in workers {
        handle.join().expect("worker thread")?;
    }

    let stats = sim.stats();
    assert!(stats.peak_sessions <= 3, "peak sessions {}", stats.peak_sessions);
    assert_eq!(stats.connects, 12);
    assert_eq!(stats.releases, 12);
    assert_eq!(stats.sessions_open, 0);
    gateway.destroy()?;
    Ok(())
}

#[test]
fn lease_wait_times_out() -> Result<()> {
    init_logging();
    let sim = SimClient::new();
    let started = Arc::new(Barrier::new(2));
    let in_proc = started.clone();
    sim.register("myapp.slow", move |owa, _args| {
        in_proc.wait();
        thread::sleep(Duration::from_millis(300));
        owa.prn("slow");
        Ok(())
    });
    let gateway = Arc::new(Gateway::new(sim.clone(), Config::new("demo", "demo", "orcl").with_pool(1, 1, 1))?);
    gateway.create()?;

    let slow = {
        let gateway = gateway.clone();
        thread::spawn(move || gateway.request(Request::new("myapp.slow").cgi("REQUEST_METHOD", "GET")))
    };
    started.wait();

    let req = Request::new("myapp.slow").cgi("REQUEST_METHOD", "GET").timeout(Duration::from_millis(50));
    let res = gateway.request(req);
    assert!(matches!(res, Err(Error::Timeout(_))), "{:?}", res);
    assert_eq!(sim.stats().connects, 1, "the timed out request never leased a session");

    assert_eq!(slow.join().expect("slow request thread")?, "slow");
    assert_eq!(sim.stats().sessions_open, 0);
    gateway.destroy()?;
    Ok(())
}

#[test]
fn destroy_waits_for_leases() -> Result<()> {
    init_logging();
    let sim = SimClient::new();
    let oracle = Environment::new(sim.clone());
    let pool = oracle.create_connection_pool("orcl", "demo", "demo", 1, 1, 2)?;

    thread::scope(|scope| -> Result<()> {
        let conn = pool.get_session("demo", "demo")?;
        let releaser = scope.spawn(move || {
            thread::sleep(Duration::from_millis(50));
            drop(conn);
        });
        pool.destroy()?;
        assert_eq!(pool.busy_count(), 0);
        assert!(!pool.has_pool());
        releaser.join().expect("releaser thread");
        Ok(())
    })?;

    let res = pool.get_session("demo", "demo");
    assert!(matches!(res, Err(Error::Oracle { stage: Stage::Connection, .. })));
    assert_eq!(sim.stats().pools, 0);
    assert_eq!(sim.stats().sessions_open, 0);
    Ok(())
}
