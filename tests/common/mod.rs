#![allow(dead_code)]

use std::sync::mpsc;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use distributed_matrix_multiplication::engine::{self, Inputs, Outcome};
use distributed_matrix_multiplication::local;
use distributed_matrix_multiplication::matrix::Matrix;
use distributed_matrix_multiplication::Communicator;

/// Deterministic matrix with a mix of signs, so products exercise negatives.
pub fn patterned(rows: usize, cols: usize, salt: i32) -> Matrix {
    let data = (0..rows * cols)
        .map(|i| ((i as i32 * 37 + salt * 11) % 199) - 99)
        .collect();
    Matrix::from_vec(data, rows, cols).unwrap()
}

/// Run one task on `processes` thread ranks. Returns every rank's outcome in
/// rank order.
pub fn run_task(processes: usize, inputs: Inputs) -> Vec<Outcome> {
    let inputs = Mutex::new(Some(inputs));
    local::run(processes, |comm| {
        let mine = if comm.is_root() {
            inputs.lock().unwrap().take()
        } else {
            None
        };
        engine::multiply(&comm, mine).unwrap()
    })
    .unwrap()
}

/// Coordinator's result from a task that is expected to complete.
pub fn coordinator_result(outcomes: Vec<Outcome>) -> Matrix {
    match outcomes.into_iter().next() {
        Some(Outcome::Completed {
            result: Some(result),
            ..
        }) => result,
        other => panic!("coordinator did not complete: {:?}", other),
    }
}

/// Run `f` on its own thread and fail the test if it has not returned within
/// `limit`. A deadlocked run leaves the thread behind.
pub fn within<T, F>(limit: Duration, f: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(f());
    });
    match rx.recv_timeout(limit) {
        Ok(value) => value,
        Err(err) => panic!("did not finish within {:?}: {}", limit, err),
    }
}
