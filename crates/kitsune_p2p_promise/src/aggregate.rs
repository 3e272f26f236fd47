//! Aggregate combinators over an existing set of promises.
//!
//! Each returns a fresh [`FutureDone`]. Member listeners may race, the
//! first completion of the returned cell wins and later ones are no-ops.

use crate::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Succeeds with all members once every member completed, whatever the
/// outcome. An empty input succeeds immediately.
pub fn when_all<T, X>(all: Vec<CompletionCell<T, X>>) -> FutureDone<Vec<CompletionCell<T, X>>>
where
    T: 'static + Send,
    X: Extension,
{
    let out = FutureDone::new();
    if all.is_empty() {
        out.done(all);
        return out;
    }

    let size = all.len();
    let counter = Arc::new(AtomicUsize::new(0));
    let all = Arc::new(all);
    for member in all.iter() {
        let out = out.clone();
        let all = all.clone();
        let counter = counter.clone();
        member.add_listener(move |_| {
            if counter.fetch_add(1, Ordering::AcqRel) + 1 == size {
                out.done((*all).clone());
            }
        });
    }
    out
}

/// Fails as soon as any member fails, without waiting for the others.
/// Succeeds with all members once every member succeeded.
pub fn when_all_success<T, X>(
    all: Vec<CompletionCell<T, X>>,
) -> FutureDone<Vec<CompletionCell<T, X>>>
where
    T: 'static + Send,
    X: Extension,
{
    let out = FutureDone::new();
    if all.is_empty() {
        out.done(all);
        return out;
    }

    let size = all.len();
    let counter = Arc::new(AtomicUsize::new(0));
    let all = Arc::new(all);
    for member in all.iter() {
        if out.is_completed() {
            break;
        }
        let out = out.clone();
        let all = all.clone();
        let counter = counter.clone();
        member.add_listener(move |member| {
            if out.is_completed() {
                return;
            }
            if member.is_failed() {
                out.complete_failure_from("member failed", member);
            } else if counter.fetch_add(1, Ordering::AcqRel) + 1 == size {
                out.done((*all).clone());
            }
        });
    }
    out
}

/// Completes with the first member to complete, whatever its outcome.
/// An empty input fails immediately.
pub fn when_any<T, X>(all: Vec<CompletionCell<T, X>>) -> FutureDone<CompletionCell<T, X>>
where
    T: 'static + Send,
    X: Extension,
{
    let out = FutureDone::new();
    if all.is_empty() {
        out.complete_failure("no futures to wait on");
        return out;
    }

    for member in all {
        if out.is_completed() {
            break;
        }
        let out = out.clone();
        member.add_listener(move |member| {
            out.done(member.clone());
        });
    }
    out
}

/// Completes with the first member to succeed.
/// Fails once every member failed.
pub fn when_any_success<T, X>(
    all: Vec<CompletionCell<T, X>>,
) -> FutureDone<CompletionCell<T, X>>
where
    T: 'static + Send,
    X: Extension,
{
    let out = FutureDone::new();
    if all.is_empty() {
        out.complete_failure("no futures to wait on");
        return out;
    }

    let size = all.len();
    let counter = Arc::new(AtomicUsize::new(0));
    for member in all {
        if out.is_completed() {
            break;
        }
        let out = out.clone();
        let counter = counter.clone();
        member.add_listener(move |member| {
            if out.is_completed() {
                return;
            }
            if member.is_success() {
                out.done(member.clone());
            } else if counter.fetch_add(1, Ordering::AcqRel) + 1 == size {
                out.complete_failure_from("not a single future was successful", member);
            }
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(n: usize) -> Vec<FutureDone<u32>> {
        (0..n).map(|_| FutureDone::new()).collect()
    }

    #[test]
    fn all_waits_for_every_outcome() {
        let c = cells(3);
        let out = when_all(c.clone());
        c[0].done(0);
        c[1].complete_failure("gone");
        assert!(!out.is_completed());
        c[2].complete_cancelled("shutdown");
        assert!(out.is_success());
        let all = out.object().unwrap();
        assert_eq!(3, all.len());
        assert!(all[1].ptr_eq(&c[1]));
    }

    #[test]
    fn all_success_short_circuits() {
        let c = cells(3);
        let out = when_all_success(c.clone());
        c[0].done(0);
        c[1].complete_failure("peer offline");
        assert!(out.is_failed());
        assert!(!c[2].is_completed());
        assert_eq!(
            "member failed <-> peer offline",
            out.fail_reason().unwrap().to_display_string()
        );

        // late success changes nothing
        c[2].done(2);
        assert!(out.is_failed());
    }

    #[test]
    fn all_success_succeeds() {
        let c = cells(2);
        let out = when_all_success(c.clone());
        c[1].done(1);
        c[0].done(0);
        assert!(out.is_success());
        assert_eq!(2, out.object().unwrap().len());
    }

    #[test]
    fn any_takes_first_completion() {
        let c = cells(3);
        let out = when_any(c.clone());
        c[2].complete_failure("nope");
        c[0].done(0);
        assert!(out.is_success());
        assert!(out.object().unwrap().ptr_eq(&c[2]));
    }

    #[test]
    fn any_success_skips_failures() {
        let c = cells(3);
        let out = when_any_success(c.clone());
        c[0].complete_failure("a");
        c[1].done(1);
        assert!(out.is_success());
        assert_eq!(Some(1), out.object().unwrap().object());
    }

    #[test]
    fn any_success_fails_when_all_fail() {
        let c = cells(2);
        let out = when_any_success(c.clone());
        c[0].complete_failure("a");
        assert!(!out.is_completed());
        c[1].complete_failure("b");
        assert_eq!(
            "not a single future was successful <-> b",
            out.fail_reason().unwrap().to_display_string()
        );
    }

    #[test]
    fn empty_inputs_complete_immediately() {
        assert!(when_all(cells(0)).is_success());
        assert!(when_all_success(cells(0)).is_success());
        assert!(when_any(cells(0)).is_failed());
        assert!(when_any_success(cells(0)).is_failed());
    }
}
