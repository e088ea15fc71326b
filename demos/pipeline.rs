//! # Example: Nightly ingest pipeline
//!
//! Builds a small tree of actions and runs a few copies through a dispatcher:
//!
//! ```text
//! Finally (cleanup even upon abort)
//! └── Sequence
//!     ├── Retry(fetch, backoff up to 3 retries)   fails twice, then succeeds
//!     ├── TimeLimited(transform, 500ms)
//!     └── Pause(50ms)
//! cleanup: "release lock"
//! ```
//!
//! Run with `cargo run --example pipeline`; every start/finish is logged to stdout.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use actionvisor::{
    ActionError, ActionFn, ActionRef, BackoffPolicy, Dispatcher, DispatcherConfig, Finally,
    JitterPolicy, LogWriter, Monitor, Pause, Retry, Sequence, TimeLimited, monitors,
};

fn make_pipeline(n: u32) -> Result<ActionRef, ActionError> {
    let attempts = Arc::new(AtomicU32::new(0));
    let fetch = ActionFn::arc(format!("fetch-{n}"), move |ctx| {
        ctx.check_abort()?;
        if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
            return Err(ActionError::msg("upstream not ready"));
        }
        Ok(())
    });

    let policy = BackoffPolicy {
        first: Duration::from_millis(20),
        max: Duration::from_millis(200),
        factor: 2.0,
        jitter: JitterPolicy::Equal,
    };

    let transform = ActionFn::arc(format!("transform-{n}"), |ctx| {
        std::thread::sleep(Duration::from_millis(30));
        ctx.check_abort()
    });

    let body = Sequence::from_actions([
        Retry::new(fetch, policy.retry_up_to(3))? as ActionRef,
        TimeLimited::new(transform, Duration::from_millis(500))? as ActionRef,
        Pause::new(Duration::from_millis(50)) as ActionRef,
    ])?;

    let cleanup = ActionFn::arc(format!("release-lock-{n}"), |_| Ok(()));
    let pipeline: ActionRef = Finally::new(body, cleanup, true)?;
    Ok(pipeline)
}

fn main() -> Result<(), ActionError> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let writer: Arc<dyn Monitor> = Arc::new(LogWriter::stdout());
    monitors::register(Arc::clone(&writer));

    let dispatcher = Dispatcher::builder(DispatcherConfig::with_pool_size(2))
        .with_monitors(vec![Arc::new(actionvisor::TraceMonitor)])
        .build()?;

    for n in 0..4 {
        dispatcher.dispatch(make_pipeline(n)?)?;
    }
    println!(
        "running: {}, queued: {}",
        dispatcher.running(),
        dispatcher.queued()
    );

    dispatcher.wait();
    monitors::unregister(&writer);
    Ok(())
}
