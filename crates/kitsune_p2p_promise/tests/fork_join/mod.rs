use kitsune_p2p_promise::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

/// Over-provisioned read: 8 peers queried, 3 answers needed,
/// answers arriving from worker threads.
#[test]
fn threaded_read_fan_out() {
    kitsune_p2p_trace::test_run().unwrap();

    let peers: Vec<FutureDone<u32>> = (0..8).map(|_| FutureDone::new()).collect();
    let cancelled = Arc::new(AtomicUsize::new(0));
    for p in peers.iter() {
        let cancelled = cancelled.clone();
        p.add_cancel(move || {
            cancelled.fetch_add(1, Ordering::SeqCst);
        });
    }

    let fj = FutureForkJoin::with_threshold(3, true, peers.iter().cloned().map(Some).collect());

    let handles: Vec<_> = peers
        .iter()
        .take(3)
        .cloned()
        .enumerate()
        .map(|(i, p)| {
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(5 * i as u64));
                p.done(i as u32);
            })
        })
        .collect();

    fj.await_done(&NoGuard).unwrap();
    for h in handles {
        h.join().unwrap();
    }

    assert!(fj.is_success());
    assert_eq!(3, fj.success_count());
    assert_eq!(5, cancelled.load(Ordering::SeqCst));
    for p in peers.iter().skip(3) {
        assert!(p.is_cancel_requested());
        assert!(!p.is_completed());
    }
}

/// Many siblings completing at the same instant as the threshold
/// is crossed: exactly one transition, no bookkeeping after it.
#[test]
fn concurrent_threshold_crossing() {
    kitsune_p2p_trace::test_run().unwrap();

    const N: usize = 64;
    const K: usize = 32;

    for _ in 0..20 {
        let subs: Vec<FutureDone<usize>> = (0..N).map(|_| FutureDone::new()).collect();
        let fj = FutureForkJoin::with_threshold(K, true, subs.iter().cloned().map(Some).collect());

        let fired = Arc::new(AtomicUsize::new(0));
        let f2 = fired.clone();
        fj.add_listener(move |_| {
            f2.fetch_add(1, Ordering::SeqCst);
        });

        let barrier = Arc::new(Barrier::new(N));
        let handles: Vec<_> = subs
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, s)| {
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    s.done(i);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert!(fj.is_success());
        assert_eq!(1, fired.load(Ordering::SeqCst));
        assert_eq!(K, fj.success_count());
        assert_eq!(K, fj.completed().len());
        assert_eq!(K - 1, fj.evaluated_count());
    }
}

/// Every slot failing from different threads ends in a single failure.
#[test]
fn concurrent_all_fail() {
    const N: usize = 16;
    let subs: Vec<FutureDone<()>> = (0..N).map(|_| FutureDone::new()).collect();
    let fj = FutureForkJoin::with_threshold(2, false, subs.iter().cloned().map(Some).collect());

    let barrier = Arc::new(Barrier::new(N));
    let handles: Vec<_> = subs
        .iter()
        .cloned()
        .map(|s| {
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                s.complete_failure("unreachable");
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    fj.await_listeners(&NoGuard).unwrap();
    assert!(fj.is_failed());
    assert_eq!(N, fj.evaluated_count());
    assert_eq!(0, fj.success_count());
}

#[tokio::test(flavor = "multi_thread")]
async fn fork_join_over_response_futures() {
    let reqs: Vec<FutureResponse<u8, String>> =
        (0..3u8).map(FutureResponse::new).collect();
    let fj = FutureForkJoin::with_threshold(2, false, reqs.iter().cloned().map(Some).collect());

    for r in reqs.iter().cloned() {
        tokio::task::spawn(async move {
            let n = *r.request();
            r.respond(format!("reply-{}", n));
        });
    }

    let fj = fj.wait().await;
    assert!(fj.is_success());
    for r in fj.completed() {
        assert_eq!(Some(format!("reply-{}", r.request())), r.response());
    }
}
