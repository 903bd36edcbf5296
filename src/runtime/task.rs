//! Detached task spawning for go-statements. Tasks share the environment
//! graph through the cells they capture; their results are discarded.

use std::thread;

fn debug_enabled() -> bool {
    std::env::var_os("EBB_DEBUG_TASKS").is_some()
}

pub fn spawn_task<F>(f: F)
where
    F: FnOnce() + Send + 'static,
{
    if debug_enabled() {
        eprintln!("[ebb-debug] spawning task");
    }
    thread::Builder::new()
        .name("ebb-task".into())
        .spawn(move || {
            f();
            if debug_enabled() {
                eprintln!("[ebb-debug] task finished");
            }
        })
        .expect("spawn task thread");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn spawned_task_runs_detached() {
        let (tx, rx) = mpsc::channel();
        spawn_task(move || {
            tx.send(41 + 1).expect("send result");
        });
        assert_eq!(rx.recv().expect("task result"), 42);
    }
}
