mod aggregate;
mod deadlock_guard;
mod fork_join;
mod late_join;
mod streaming_response;
