use kitsune_p2p_promise::*;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// The stream owner hands over its push callback, the consumer pushes
/// chunks, the transport publishes the deferred reply once the channel
/// closed.
#[test]
fn streamed_reply_then_deferred_publish() {
    kitsune_p2p_trace::test_run().unwrap();

    let chunks = Arc::new(Mutex::new(Vec::new()));
    let c2 = chunks.clone();
    let f: FutureResponse<String, Vec<u8>> = FutureResponse::with_progress(
        "fetch op data".to_string(),
        CommunicationEvaluator,
        Some(Arc::new(move |chunk: &Vec<u8>| c2.lock().push(chunk.clone()))),
    );

    let pushed = Arc::new(AtomicUsize::new(0));

    // the consumer blocks until the handler is visible
    let consumer = {
        let f = f.clone();
        let pushed = pushed.clone();
        std::thread::spawn(move || {
            f.progress_first(&NoGuard).unwrap();
            for _ in 0..3 {
                f.progress(&NoGuard).unwrap();
            }
            pushed.load(Ordering::SeqCst)
        })
    };

    {
        let f2 = f.clone();
        let pushed = pushed.clone();
        f.set_progress_handler(move || {
            let n = pushed.fetch_add(1, Ordering::SeqCst) as u8;
            f2.report_progress(&vec![n]);
        });
    }

    assert_eq!(4, consumer.join().unwrap());
    assert_eq!(vec![vec![0], vec![1], vec![2], vec![3]], *chunks.lock());

    assert!(f.respond_later(vec![0, 1, 2, 3]));
    assert!(!f.is_completed());

    let transport = {
        let f = f.clone();
        std::thread::spawn(move || f.respond_now().unwrap())
    };
    f.await_done(&NoGuard).unwrap();
    assert!(transport.join().unwrap());
    assert_eq!(Some(vec![0, 1, 2, 3]), f.response());
}

#[tokio::test(flavor = "multi_thread")]
async fn response_times_out() {
    let f = <FutureResponse<&'static str, String>>::new("ping");
    fail_on_timeout(&f, std::time::Duration::from_millis(10));
    let f = f.wait().await;
    assert!(f.is_failed());
    assert_eq!(Some(FailReason::timeout()), f.fail_reason());
    assert!(f.failed_reason().contains("timeout"));
}
