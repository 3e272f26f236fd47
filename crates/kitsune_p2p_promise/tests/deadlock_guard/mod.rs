use kitsune_p2p_promise::*;
use std::time::Duration;

fn on_io_thread<R: 'static + Send>(f: impl FnOnce() -> R + 'static + Send) -> R {
    std::thread::Builder::new()
        .name(format!("{}-worker-0", DEFAULT_IO_THREAD_NAME_PREFIX))
        .spawn(f)
        .unwrap()
        .join()
        .unwrap()
}

#[test]
fn await_on_io_thread_is_refused_in_any_state() {
    kitsune_p2p_trace::test_run().unwrap();

    let pending = <FutureDone<u32>>::new();
    let completed = <FutureDone<u32>>::new();
    completed.done(1);

    for f in [pending, completed] {
        let res = on_io_thread(move || {
            let guard = IoThreadGuard::default();
            (
                f.await_done(&guard),
                f.await_uninterruptibly(&guard),
                f.await_timeout(&guard, Duration::from_secs(10)),
                f.await_listeners(&guard),
            )
        });
        assert!(matches!(res.0, Err(PromiseError::DeadlockGuard { .. })));
        assert!(matches!(res.1, Err(PromiseError::DeadlockGuard { .. })));
        assert!(matches!(res.2, Err(PromiseError::DeadlockGuard { .. })));
        assert!(matches!(res.3, Err(PromiseError::DeadlockGuard { .. })));
    }
}

#[test]
fn listener_on_io_thread_is_fine() {
    let f = <FutureDone<u32>>::new();
    let (s, r) = std::sync::mpsc::channel();
    let f2 = f.clone();
    on_io_thread(move || {
        f2.add_listener(move |f| {
            s.send(f.object()).unwrap();
        });
    });
    f.done(9);
    assert_eq!(Some(9), r.recv().unwrap());
}

#[test]
fn guard_prefix_from_tuning_params() {
    let mut tp = tuning_params_struct::PromiseTuningParams::default();
    tp.io_thread_name_prefix = "netty-io".to_string();
    let guard = IoThreadGuard::from_tuning(&std::sync::Arc::new(tp));

    let f = <FutureDone<u32>>::new();
    f.done(1);
    let res = std::thread::Builder::new()
        .name("netty-io-3".to_string())
        .spawn(move || f.await_done(&guard))
        .unwrap()
        .join()
        .unwrap();
    match res {
        Err(PromiseError::DeadlockGuard { thread }) => assert_eq!("netty-io-3", thread),
        oth => panic!("unexpected {:?}", oth),
    }
}
