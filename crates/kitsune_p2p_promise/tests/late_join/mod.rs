use kitsune_p2p_promise::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
/// Routing keeps registering requests to newly learned peers
/// until enough of them answered.
#[test]
fn three_of_five_with_late_registration() {
    kitsune_p2p_trace::test_run().unwrap();

    let lj = <FutureLateJoin<u32>>::new(5, 3);
    let mut subs = Vec::new();
    for i in 0..3u32 {
        let s = FutureDone::new();
        assert!(lj.register(s.clone()));
        subs.push((i, s));
    }

    let handles: Vec<_> = subs
        .into_iter()
        .map(|(i, s)| std::thread::spawn(move || s.done(i)))
        .collect();
    for h in handles {
        assert!(h.join().unwrap());
    }

    lj.await_done(&NoGuard).unwrap();
    assert!(lj.is_success());
    assert_eq!(3, lj.success_count());

    let fourth = FutureDone::new();
    assert!(!lj.register(fourth));
    assert_eq!(3, lj.submitted().len());
}

#[test]
fn registering_from_many_threads_respects_max() {
    let lj = <FutureLateJoin<()>>::new(10, 10);
    let handles: Vec<_> = (0..32)
        .map(|_| {
            let lj = lj.clone();
            std::thread::spawn(move || lj.register(FutureDone::new()))
        })
        .collect();
    let accepted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|a| *a)
        .count();
    assert_eq!(10, accepted);
    assert_eq!(10, lj.submitted().len());
    assert!(!lj.is_completed());
}

/// Many registered requests answering at the same instant as the
/// success threshold is crossed: one transition, no bookkeeping after it.
#[test]
fn concurrent_threshold_crossing() {
    kitsune_p2p_trace::test_run().unwrap();

    const N: usize = 64;
    const MIN: usize = 8;

    for _ in 0..20 {
        let lj = <FutureLateJoin<usize>>::new(N, MIN);
        let subs: Vec<FutureDone<usize>> = (0..N).map(|_| FutureDone::new()).collect();
        for s in subs.iter() {
            assert!(lj.register(s.clone()));
        }

        let fired = Arc::new(AtomicUsize::new(0));
        let f2 = fired.clone();
        lj.add_listener(move |_| {
            f2.fetch_add(1, Ordering::SeqCst);
        });

        let barrier = Arc::new(Barrier::new(N));
        let handles: Vec<_> = subs
            .into_iter()
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

        assert!(lj.is_success());
        assert_eq!(1, fired.load(Ordering::SeqCst));
        assert_eq!(MIN, lj.success_count());
        assert_eq!(MIN, lj.evaluated_count());
        assert_eq!(MIN, lj.completed().len());
        assert_eq!(N, lj.submitted().len());
    }
}
