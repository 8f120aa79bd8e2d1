// Integration tests for catalog-dispatch
// These exercise the buses and the executor through the public API only

use catalog_dispatch::{
    AsyncRequestBus, AsyncResponder, DispatchContext, DispatchError, ExecutorError,
    ExecutorHandle, Listener, NotificationBus, RequestBus, Responder, ThreadAffineExecutor,
};
use crossbeam_channel::unbounded;
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

static INSTANCE_GUARD: Mutex<()> = parking_lot::const_mutex(());

fn counting_listener<A: 'static>(hits: &Arc<AtomicUsize>) -> Listener<A> {
    let hits = Arc::clone(hits);
    Listener::new(move |_: &A| {
        hits.fetch_add(1, Ordering::SeqCst);
    })
}

#[test]
fn test_raise_without_subscribers_is_silent() {
    let ctx = DispatchContext::new();

    ctx.notifications::<String>().raise("OnProductsReceived", "x".to_string());
    ctx.signals().emit("EditFail");

    let mut handled = false;
    ctx.requests::<u32, u32>().raise("ValidatePrice", 1, |_| handled = true);
    assert!(!handled);

    let (tx, rx) = unbounded::<()>();
    ctx.async_requests::<(), u32>().fetch("FetchProducts", move |_| {
        let _ = tx.send(());
    });
    assert!(rx.recv_timeout(Duration::from_millis(500)).is_err());
}

#[test]
fn test_duplicate_registration_runs_twice() {
    let bus = NotificationBus::<u8>::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let listener = counting_listener(&hits);

    bus.register("n", listener.clone());
    bus.register("n", listener.clone());
    bus.raise("n", 0);

    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[test]
fn test_unregister_removes_one_instance() {
    let bus = NotificationBus::<u8>::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let listener = counting_listener(&hits);

    bus.register("n", listener.clone());
    bus.register("n", listener.clone());
    bus.unregister("n", &listener);
    bus.raise("n", 0);

    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_request_bus_last_registered_wins() {
    let bus = RequestBus::<(), &'static str>::new();
    let ran = Arc::new(Mutex::new(Vec::new()));

    let a_log = Arc::clone(&ran);
    bus.register("n", Responder::producer(move || {
        a_log.lock().push("A");
        "A"
    }));
    let b_log = Arc::clone(&ran);
    bus.register("n", Responder::producer(move || {
        b_log.lock().push("B");
        "B"
    }));

    let mut delivered = Vec::new();
    bus.fetch("n", |value| delivered.push(value));

    assert_eq!(delivered, vec!["B"]);
    assert_eq!(*ran.lock(), vec!["A", "B"]);
}

#[test]
fn test_async_request_bus_last_registered_wins() {
    let bus = AsyncRequestBus::<(), &'static str>::new();
    let (ran_tx, ran_rx) = unbounded();

    bus.register("n", AsyncResponder::producer(move || {
        let ran_tx = ran_tx.clone();
        async move {
            let _ = ran_tx.send("A ran");
            "A"
        }
    }));
    bus.register("n", AsyncResponder::producer(|| async { "B" }));

    let (tx, rx) = unbounded();
    bus.fetch("n", move |result| {
        let _ = tx.send(result);
    });

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Ok("B"));
    assert_eq!(ran_rx.recv_timeout(Duration::from_secs(5)).unwrap(), "A ran");
    // exactly one delivery
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
}

#[test]
fn test_throwing_listener_skips_the_rest() {
    let bus = NotificationBus::<()>::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    let a = Arc::clone(&order);
    bus.register("n", Listener::signal(move || a.lock().push("A")));
    bus.register("n", Listener::signal(|| panic!("B failed")));
    let c = Arc::clone(&order);
    bus.register("n", Listener::signal(move || c.lock().push("C")));

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| bus.emit("n")));

    assert!(outcome.is_err());
    assert_eq!(*order.lock(), vec!["A"]);
}

#[test]
fn test_async_raise_failure_does_not_reach_caller() {
    let bus = NotificationBus::<()>::new();
    bus.register("n", Listener::signal(|| panic!("lost on worker")));

    // returns normally; the panic stays on the worker
    bus.emit_async("n");

    let (tx, rx) = unbounded();
    bus.raise_async_with("n", (), move |result| {
        let _ = tx.send(result);
    });
    assert!(matches!(
        rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        Err(DispatchError::SubscriberPanicked { .. })
    ));
}

#[test]
fn test_executor_runs_foreign_work_and_nested_work_in_one_drain() {
    let mut executor = ThreadAffineExecutor::new();
    let handle = executor.handle();
    let log = Arc::new(Mutex::new(Vec::new()));

    let sent_log = Arc::clone(&log);
    let sender = handle.clone();
    thread::spawn(move || {
        let nested_handle = sender.clone();
        sender.enqueue(move || {
            sent_log.lock().push(("outer", thread::current().id()));
            let inner_log = Arc::clone(&sent_log);
            nested_handle.enqueue(move || {
                inner_log.lock().push(("inner", thread::current().id()));
            });
        });
    })
    .join()
    .unwrap();

    let report = executor.drain().unwrap();
    let owner = thread::current().id();

    assert_eq!(report.items_run, 2);
    assert_eq!(*log.lock(), vec![("outer", owner), ("inner", owner)]);
    assert_eq!(handle.pending(), 0);
}

#[test]
fn test_instance_before_and_after_install() {
    let _guard = INSTANCE_GUARD.lock();

    assert!(!ExecutorHandle::exists());
    assert!(matches!(
        ExecutorHandle::instance(),
        Err(ExecutorError::NotInitialized)
    ));

    let mut executor = ThreadAffineExecutor::install();
    assert!(ExecutorHandle::exists());

    let completion = ExecutorHandle::instance().unwrap().enqueue_async(|| 5);
    executor.drain().unwrap();
    assert_eq!(completion.wait(), Ok(5));

    drop(executor);
    assert!(!ExecutorHandle::exists());
}

#[test]
fn test_async_result_hops_back_to_owner_thread() {
    let ctx = DispatchContext::new();
    let mut executor = ThreadAffineExecutor::new();
    let owner = thread::current().id();

    ctx.async_requests::<u32, u32>().register(
        "Square",
        AsyncResponder::new(|n: &u32| {
            let n = *n;
            async move { n * n }
        }),
    );

    let seen = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&seen);
    let handle = executor.handle();
    ctx.async_requests::<u32, u32>().raise("Square", 9, move |result| {
        handle.enqueue(move || *slot.lock() = Some((result, thread::current().id())));
    });

    for _ in 0..500 {
        executor.drain().unwrap();
        if seen.lock().is_some() {
            break;
        }
        thread::sleep(Duration::from_millis(2));
    }

    assert_eq!(*seen.lock(), Some((Ok(81), owner)));
}

#[test]
fn test_async_request_earlier_failure_keeps_last_value() {
    let ctx = DispatchContext::new();
    let bus = ctx.async_requests::<(), u32>();
    bus.register(
        "Price",
        AsyncResponder::<(), u32>::producer(|| async { panic!("audit log unavailable") }),
    );
    bus.register("Price", AsyncResponder::producer(|| async { 2 }));

    let (tx, rx) = unbounded();
    bus.fetch("Price", move |result| {
        let _ = tx.send(result);
    });

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Ok(2));
}

#[test]
fn test_drain_leaves_mid_drain_foreign_work_for_next_tick() {
    let mut executor = ThreadAffineExecutor::new();
    let handle = executor.handle();
    let ran = Arc::new(AtomicUsize::new(0));

    let remote = handle.clone();
    let counter = Arc::clone(&ran);
    handle.enqueue(move || {
        thread::spawn(move || {
            remote.enqueue(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        })
        .join()
        .unwrap();
    });

    executor.drain().unwrap();
    assert_eq!(ran.load(Ordering::SeqCst), 0);

    executor.drain().unwrap();
    assert_eq!(ran.load(Ordering::SeqCst), 1);
}
