mod common;

use distributed_matrix_multiplication::comm::CommError;
use distributed_matrix_multiplication::config::{GenerateConfig, RunConfig};
use distributed_matrix_multiplication::engine::EngineError;
use distributed_matrix_multiplication::generator;
use distributed_matrix_multiplication::local;
use distributed_matrix_multiplication::matrix::{Matrix, MatrixError};
use distributed_matrix_multiplication::runner::{self, RunError, TaskReport, TaskStatus};
use distributed_matrix_multiplication::source::FileSource;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn run_config(root: &Path, sizes: Vec<usize>, processes: usize) -> RunConfig {
    RunConfig {
        data_dir: root.join("data"),
        results_dir: root.join("results"),
        sizes,
        processes,
        verify: true,
        baseline: true,
    }
}

fn run_all(config: &RunConfig) -> Vec<TaskReport> {
    let per_rank = local::run(config.processes, |comm| runner::run(&comm, config)).unwrap();
    let mut ranks = per_rank.into_iter();
    let coordinator = ranks.next().unwrap().unwrap();
    for worker in ranks {
        assert!(worker.unwrap().is_empty(), "workers do not report");
    }
    coordinator
}

fn generate(root: &Path, sizes: Vec<usize>, seed: u64) {
    generator::generate(&GenerateConfig {
        data_dir: root.join("data"),
        sizes,
        seed,
    })
    .unwrap();
}

#[test]
fn test_generated_inputs_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    generate(temp_dir.path(), vec![5, 12], 42);

    let config = run_config(temp_dir.path(), vec![5, 12], 3);
    let reports = run_all(&config);
    assert_eq!(reports.len(), 2);

    let source = FileSource::new(&config.data_dir, &config.results_dir);
    for report in &reports {
        match &report.status {
            TaskStatus::Completed {
                output,
                verified,
                baseline,
                ..
            } => {
                assert_eq!(*verified, Some(true));
                assert!(baseline.is_some());
                assert_eq!(*output, source.result_path(report.size));

                let (a, b) = source.load(report.size).unwrap();
                let written = Matrix::load_from_file(output).unwrap();
                assert_eq!(written, a.multiply(&b).unwrap());
            }
            other => panic!("size {} not completed: {:?}", report.size, other),
        }
    }
}

#[test]
fn test_rerun_is_byte_identical() {
    let temp_dir = TempDir::new().unwrap();
    generate(temp_dir.path(), vec![20], 7);

    let config = run_config(temp_dir.path(), vec![20], 4);
    let result_path = FileSource::new(&config.data_dir, &config.results_dir).result_path(20);

    run_all(&config);
    let first = fs::read(&result_path).unwrap();
    run_all(&config);
    let second = fs::read(&result_path).unwrap();
    assert_eq!(first, second);

    let single = run_config(temp_dir.path(), vec![20], 1);
    run_all(&single);
    assert_eq!(fs::read(&result_path).unwrap(), first);
}

#[test]
fn test_missing_inputs_skip_and_continue() {
    let temp_dir = TempDir::new().unwrap();
    generate(temp_dir.path(), vec![4], 1);

    let config = run_config(temp_dir.path(), vec![3, 4], 2);
    let reports = run_all(&config);

    assert_eq!(reports.len(), 2);
    assert!(matches!(reports[0].status, TaskStatus::Skipped { .. }));
    assert!(matches!(reports[1].status, TaskStatus::Completed { .. }));

    let source = FileSource::new(&config.data_dir, &config.results_dir);
    assert!(!source.result_path(3).exists());
    assert!(source.result_path(4).exists());
}

#[test]
fn test_dimension_mismatch_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let config = run_config(temp_dir.path(), vec![2], 3);
    let source = FileSource::new(&config.data_dir, &config.results_dir);

    fs::create_dir_all(&config.data_dir).unwrap();
    fs::write(source.matrix_a_path(2), "1 2 3 \n4 5 6 \n").unwrap();
    fs::write(source.matrix_b_path(2), "1 2 \n3 4 \n").unwrap();

    let reports = run_all(&config);
    assert_eq!(reports.len(), 1);
    match &reports[0].status {
        TaskStatus::Skipped { reason } => assert!(reason.contains("dimension mismatch")),
        other => panic!("expected skip, got {:?}", other),
    }
    assert!(!source.result_path(2).exists());
}

#[test]
fn test_scenario_files() {
    let temp_dir = TempDir::new().unwrap();
    let config = run_config(temp_dir.path(), vec![2], 2);
    let source = FileSource::new(&config.data_dir, &config.results_dir);

    fs::create_dir_all(&config.data_dir).unwrap();
    fs::write(source.matrix_a_path(2), "1 2 3 \n4 5 6 \n").unwrap();
    fs::write(source.matrix_b_path(2), "7 8 \n9 10 \n11 12 \n").unwrap();

    run_all(&config);
    let text = fs::read_to_string(source.result_path(2)).unwrap();
    assert_eq!(text, "58 64 \n139 154 \n");
}

#[test]
fn test_generator_is_seeded() {
    let a = generator::random_matrix(10, 10, 99);
    let b = generator::random_matrix(10, 10, 99);
    let c = generator::random_matrix(10, 10, 100);
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert!(a
        .data
        .iter()
        .all(|v| (generator::MIN_VALUE..=generator::MAX_VALUE).contains(v)));
}

#[test]
fn test_generator_uses_fresh_seeds_per_size() {
    assert_eq!(generator::seeds_for(10, 0), (10, 11));
    assert_eq!(generator::seeds_for(10, 2), (14, 15));
    assert_eq!(generator::seeds_for(u64::MAX, 1), (1, 2));

    let temp_dir = TempDir::new().unwrap();
    generate(temp_dir.path(), vec![3, 4], 5);
    let source = FileSource::new(temp_dir.path().join("data"), temp_dir.path().join("results"));

    let (a3, b3) = source.load(3).unwrap();
    let (a4, b4) = source.load(4).unwrap();
    assert_ne!(a3.data, b3.data);
    // The smaller size must not be a prefix of the larger one's stream.
    assert_ne!(a3.data[..], a4.data[..9]);
    assert_ne!(b3.data[..], b4.data[..9]);
    assert_eq!(a4, generator::random_matrix(4, 4, 7));
}

#[test]
fn test_unwritable_results_dir_fails_every_rank() {
    let temp_dir = TempDir::new().unwrap();
    generate(temp_dir.path(), vec![3, 4], 11);

    let mut config = run_config(temp_dir.path(), vec![3, 4], 2);
    config.results_dir = temp_dir.path().join("not_a_dir");
    fs::write(&config.results_dir, "occupied").unwrap();

    let per_rank = common::within(Duration::from_secs(10), move || {
        local::run(config.processes, |comm| runner::run(&comm, &config)).unwrap()
    });

    match &per_rank[0] {
        Err(RunError::Output {
            source: MatrixError::CreateDir { path, .. },
            ..
        }) => assert!(path.ends_with("not_a_dir")),
        other => panic!("coordinator: {:?}", other),
    }
    assert!(matches!(
        per_rank[1],
        Err(RunError::Engine(EngineError::Comm(CommError::Disconnected {
            rank: 1,
            peer: 0
        })))
    ));
}

#[test]
fn test_store_reports_directory_failure() {
    let temp_dir = TempDir::new().unwrap();
    let blocker = temp_dir.path().join("results");
    fs::write(&blocker, "").unwrap();

    let source = FileSource::new(temp_dir.path(), &blocker);
    let err = source.store(2, &Matrix::new(2, 2)).unwrap_err();
    match err {
        MatrixError::CreateDir { path, .. } => assert_eq!(path, blocker),
        other => panic!("expected CreateDir, got {:?}", other),
    }
}

#[test]
fn test_report_display() {
    let temp_dir = TempDir::new().unwrap();
    generate(temp_dir.path(), vec![6], 3);
    let reports = run_all(&run_config(temp_dir.path(), vec![6], 2));

    let text = reports[0].to_string();
    assert!(text.starts_with("Matrix size: 6x6"));
    assert!(text.contains("Processes: 2"));
    assert!(text.contains("Verified: match"));
    assert!(text.contains("Task volume: 36 elements"));
}
