use kitsune_p2p_promise::*;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread")]
async fn all_success_does_not_wait_for_stragglers() {
    kitsune_p2p_trace::test_run().unwrap();

    let c: Vec<FutureDone<u32>> = (0..3).map(|_| FutureDone::new()).collect();
    let out = when_all_success(c.clone());

    let second = c[1].clone();
    tokio::task::spawn(async move {
        second.complete_failure("peer offline");
    });

    let out = tokio::time::timeout(Duration::from_secs(5), out.wait())
        .await
        .unwrap();
    assert!(out.is_failed());
    assert!(!c[2].is_completed());
}

#[test]
fn any_success_across_threads() {
    let c: Vec<FutureDone<u32>> = (0..4).map(|_| FutureDone::new()).collect();
    let out = when_any_success(c.clone());

    let handles: Vec<_> = c
        .iter()
        .cloned()
        .enumerate()
        .map(|(i, f)| {
            std::thread::spawn(move || {
                if i == 2 {
                    f.done(42);
                } else {
                    f.complete_failure("nope");
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    out.await_done(&NoGuard).unwrap();
    assert!(out.is_success());
    assert_eq!(Some(42), out.object().unwrap().object());
}

#[test]
fn all_then_fork_join() {
    let c: Vec<FutureDone<u32>> = (0..2).map(|_| FutureDone::new()).collect();
    let all = when_all(c.clone());
    let fj = FutureForkJoin::new(vec![Some(all.clone())]);
    c[0].complete_failure("x");
    assert!(!fj.is_completed());
    c[1].done(1);
    assert!(fj.is_success());
}
