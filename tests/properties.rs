use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use actionvisor::{
    Action, ActionError, ActionExt, ActionFn, ActionRef, Dispatcher, DispatcherConfig, Monitor,
    Outcome, Parallel, Pause, Sequence, Signal, UsageError, WaitGroup, monitors,
};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, thiserror::Error)]
#[error("disk {0} is full")]
struct DiskFull(u32);

/// Records finishes of a single action; the registry is process-wide.
struct Watch {
    id: u64,
    finished: Mutex<Vec<(Instant, Option<ActionError>)>>,
}

impl Watch {
    fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id,
            finished: Mutex::new(Vec::new()),
        })
    }
}

impl Monitor for Watch {
    fn on_starting(&self, _action: &dyn Action) {}

    fn on_finished(&self, action: &dyn Action, error: Option<&ActionError>) {
        if action.id() == self.id {
            self.finished.lock().push((Instant::now(), error.cloned()));
        }
    }
}

#[test]
fn test_blocking_execution_twice_in_a_row() {
    let runs = Arc::new(AtomicUsize::new(0));
    let r = Arc::clone(&runs);
    let action = ActionFn::arc("count", move |_| {
        r.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    for expected in 1..=2 {
        action.sync_execute().unwrap();
        assert!(action.done_signal().is_signaled());
        assert_eq!(runs.load(Ordering::SeqCst), expected);
    }
}

#[test]
fn test_empty_composites_complete_off_thread() {
    let composites: [ActionRef; 2] = [Sequence::new(), Parallel::new(true)];
    for composite in composites {
        let seen = Arc::new(Mutex::new(None));
        let s = Arc::clone(&seen);
        composite
            .async_execute(move |outcome: Outcome| {
                *s.lock() = Some((outcome.as_label(), thread::current().id()));
            })
            .unwrap();

        assert!(composite.wait_timeout(Duration::from_secs(5)));
        let (label, thread_id) = seen.lock().take().unwrap();
        assert_eq!(label, "succeeded");
        assert_ne!(thread_id, thread::current().id());
    }
}

#[test]
fn test_abort_is_root_only() {
    let seq = Sequence::new();
    let child: ActionRef = Pause::new(Duration::from_millis(1));
    seq.add(Arc::clone(&child)).unwrap();

    let err = child.abort().unwrap_err();
    assert!(matches!(err, UsageError::NotRoot { .. }));

    // idle root: no-op, and the next execution starts clean
    seq.abort().unwrap();
    seq.sync_execute().unwrap();
}

#[test]
fn test_sequence_abort_reaches_child_before_done() {
    let first_done = Signal::new();
    let f = Arc::clone(&first_done);
    let pause = Pause::new(DAY);
    let seq = Sequence::from_actions([
        ActionFn::arc("fast", move |_| {
            f.set();
            Ok(())
        }) as ActionRef,
        pause.clone(),
    ])
    .unwrap();

    let pause_abort = pause.abort_signal();
    let seq_done = seq.done_signal();
    let slot = Arc::new(Mutex::new(None));
    let s = Arc::clone(&slot);
    seq.async_execute(move |outcome: Outcome| {
        *s.lock() = Some((outcome.as_label(), pause_abort.is_signaled(), seq_done.is_signaled()));
    })
    .unwrap();

    assert!(first_done.wait_timeout(Duration::from_secs(5)));
    seq.abort().unwrap();
    assert!(seq.wait_timeout(Duration::from_secs(5)));

    assert_eq!(*slot.lock(), Some(("aborted", true, false)));
}

#[test]
fn test_parallel_failure_aborts_sibling() {
    let pause = Pause::new(DAY);
    let watch = Watch::new(pause.id());
    let monitor: Arc<dyn Monitor> = watch.clone();
    monitors::register(Arc::clone(&monitor));

    let failed_at = Arc::new(Mutex::new(None));
    let at = Arc::clone(&failed_at);
    let parallel = Parallel::from_actions(
        true,
        [
            ActionFn::arc("write", move |_| {
                thread::sleep(Duration::from_millis(20));
                *at.lock() = Some(Instant::now());
                Err(ActionError::failed(DiskFull(3)))
            }) as ActionRef,
            pause.clone(),
        ],
    )
    .unwrap();

    let err = parallel.sync_execute().unwrap_err();
    monitors::unregister(&monitor);

    assert_eq!(err.downcast_ref::<DiskFull>().map(|e| e.0), Some(3));
    let finished = watch.finished.lock();
    assert_eq!(finished.len(), 1);
    let (pause_finished_at, error) = &finished[0];
    assert!(error.as_ref().is_some_and(ActionError::is_aborted));

    let failed_at = failed_at.lock().unwrap();
    assert!(pause_finished_at.duration_since(failed_at) < Duration::from_secs(2));
}

#[test]
fn test_wait_group_reports_first_signaled_index() {
    let (a, b) = (Signal::new(), Signal::new_signaled());
    let group = WaitGroup::from_signals([Arc::clone(&a), Arc::clone(&b)]);
    assert_eq!(group.wait_for_any(), Some(1));

    a.set();
    assert_eq!(group.wait_for_any(), Some(0));
    group.wait_for_all();
}

#[test]
fn test_dispatcher_bounds_and_drains() {
    #[derive(Default)]
    struct Tally(AtomicUsize);
    impl Monitor for Tally {
        fn on_starting(&self, _action: &dyn Action) {}
        fn on_finished(&self, _action: &dyn Action, error: Option<&ActionError>) {
            if error.is_some_and(ActionError::is_aborted) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    let tally = Arc::new(Tally::default());
    let dispatcher = Dispatcher::builder(DispatcherConfig::with_pool_size(2))
        .with_monitors(vec![tally.clone()])
        .build()
        .unwrap();

    for _ in 0..5 {
        dispatcher.dispatch(Pause::new(DAY)).unwrap();
    }
    assert_eq!((dispatcher.running(), dispatcher.queued()), (2, 3));

    dispatcher.abort_and_wait();
    assert_eq!(tally.0.load(Ordering::SeqCst), 5);
    assert!(dispatcher.idle_signal().is_signaled());
}

#[test]
fn test_failure_keeps_concrete_type_across_threads() {
    let action = ActionFn::arc("write", |_| Err(ActionError::failed(DiskFull(7))));
    let slot = Arc::new(Mutex::new(None));
    let s = Arc::clone(&slot);
    action
        .async_execute(move |outcome: Outcome| *s.lock() = outcome.error())
        .unwrap();
    action.wait();

    let err = slot.lock().take().unwrap();
    assert_eq!(err.downcast_ref::<DiskFull>().map(|e| e.0), Some(7));
    assert_eq!(err.to_string(), "disk 7 is full");
}
