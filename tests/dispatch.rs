#![cfg(any(feature="tokio", feature="actix", feature="async-std"))]

use std::{sync::mpsc, time::Duration};

use plsql_gateway::{*, client::sim::SimClient};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn dispatcher(sim: &SimClient) -> Result<Dispatcher<SimClient>> {
    sim.register("myapp.hello", |owa, args| {
        owa.prn(&format!("Hello, {}", args.text("name").unwrap_or_default()));
        Ok(())
    });
    let gateway = Gateway::new(sim.clone(), Config::new("demo", "demo", "orcl").with_pool(1, 4, 1))?;
    Ok(Dispatcher::new(gateway))
}

fn hello(name: &str) -> Request {
    Request::new("myapp.hello").param("name", name).cgi("REQUEST_METHOD", "GET")
}

#[test]
fn async_requests() -> Result<()> {
    init_logging();
    let sim = SimClient::new();
    let dispatcher = dispatcher(&sim)?;

    block_on(async {
        dispatcher.create().await?;
        let page = dispatcher.request(hello("async")).await?;
        assert_eq!(page, "Hello, async");

        dispatcher.execute("demo", "demo", "BEGIN NULL; END;").await?;
        let res = dispatcher.execute("", "demo", "BEGIN NULL; END;").await;
        assert!(matches!(res, Err(Error::Malformed(_))));

        let res = dispatcher.request(Request::new("myapp.hello")).await;
        assert!(matches!(res, Err(Error::Malformed(_))));

        dispatcher.destroy().await
    })??;

    assert!(!dispatcher.gateway().has_pool());
    assert_eq!(sim.stats().sessions_open, 0);
    Ok(())
}

// Waits for the callbacks on the thread that drives `block_on`, which needs a multi-thread runtime
#[cfg(feature="tokio")]
#[test]
fn submitted_requests_report_once() -> Result<()> {
    init_logging();
    let sim = SimClient::new();
    let dispatcher = dispatcher(&sim)?;
    dispatcher.gateway().create()?;

    let pages = block_on(async {
        let (tx, rx) = mpsc::channel();
        for i in 0..8 {
            let tx = tx.clone();
            dispatcher.submit(hello(&i.to_string()), move |res| {
                let _ = tx.send((i, res));
            });
        }
        drop(tx);
        let mut pages = Vec::new();
        while let Ok(reply) = rx.recv_timeout(Duration::from_secs(10)) {
            pages.push(reply);
        }
        pages
    })?;

    assert_eq!(pages.len(), 8);
    for (i, res) in pages {
        assert_eq!(res?, format!("Hello, {}", i));
    }

    let res = block_on(async {
        let (tx, rx) = mpsc::channel();
        dispatcher.submit(Request::new(""), move |res| {
            let _ = tx.send(res);
        });
        rx.recv_timeout(Duration::from_secs(10))
    })?;
    let res = res.map_err(|err| Error::Interface(err.to_string()))?;
    assert!(matches!(res, Err(Error::Malformed(_))));

    dispatcher.gateway().destroy()?;
    Ok(())
}
