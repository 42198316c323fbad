// Integration tests for the batch driver

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use ast_dump::batch::{self, plan_jobs, BatchDriver, Outcome};
use ast_dump::compilation::Compilation;
use ast_dump::config::invocation::Invocation;
use ast_dump::config::options::ParserOptions;
use ast_dump::config::RunConfig;
use ast_dump::error::FrontendError;
use ast_dump::parser::{CFrontend, CancelToken, Frontend};
use ast_dump::Error;
use pretty_assertions::assert_eq;
use serde_json::Value;
use tempfile::{tempdir, TempDir};

fn source_tree() -> TempDir {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    fs::create_dir_all(src.join("include")).unwrap();
    fs::write(src.join("include").join("point.h"), "struct point { int x; int y; };\n").unwrap();
    fs::write(
        src.join("good.c"),
        "#include \"point.h\"\nint norm(struct point *p) { return p->x * p->x + p->y * p->y; }\n",
    )
    .unwrap();
    fs::write(src.join("other.c"), "enum color { RED, GREEN };\nenum color current = GREEN;\n").unwrap();
    fs::write(src.join("broken.c"), "int value = ;\n").unwrap();
    dir
}

fn config_for(dir: &Path) -> RunConfig {
    RunConfig {
        source_dir: dir.join("src"),
        output_dir: dir.join("out"),
        workers: Some(2),
        ..RunConfig::default()
    }
}

fn invocation(inputs: &[&str]) -> Invocation {
    Invocation {
        cmd: "cl.exe".to_string(),
        include: vec!["include".to_string()],
        input: inputs.iter().map(|s| s.to_string()).collect(),
        ..Invocation::default()
    }
}

fn driver(config: &RunConfig) -> BatchDriver {
    BatchDriver::new(Arc::new(CFrontend), config).unwrap().echo(false)
}

#[test]
fn test_batch_dumps_then_skips() {
    let dir = source_tree();
    let config = config_for(dir.path());
    let jobs = plan_jobs(vec![invocation(&["good.c", "other.c"])], &config);

    let first = driver(&config).run(&jobs).unwrap();
    assert_eq!(first.dumped, 2);
    assert_eq!(first.exit_code(), 0);
    assert_eq!(first.reports[0].trace.to_string(), "pending -> parsing -> parsed -> dumping -> done");

    let artifact = dir.path().join("out").join("good.obj");
    let doc: Value = serde_json::from_str(&fs::read_to_string(&artifact).unwrap()).unwrap();
    assert_eq!(doc["classes"][0]["name"], "point");
    assert_eq!(doc["functions"][0]["name"], "norm");
    assert_eq!(doc["func_map"]["norm"][0]["kind"], "return");

    let before = fs::read_to_string(&artifact).unwrap();
    let second = driver(&config).run(&jobs).unwrap();
    assert_eq!(second.skipped, 2);
    assert_eq!(second.dumped, 0);
    assert_eq!(second.reports[1].trace.to_string(), "pending -> skipped");
    assert!(second.reports.iter().all(|r| r.parse_time.is_none()));
    assert_eq!(fs::read_to_string(&artifact).unwrap(), before);
}

#[test]
fn test_parse_errors_leave_no_artifact() {
    let dir = source_tree();
    let config = config_for(dir.path());
    let jobs = plan_jobs(vec![invocation(&["broken.c", "other.c"])], &config);

    let summary = driver(&config).run(&jobs).unwrap();
    assert_eq!(summary.parse_failed, 1);
    assert_eq!(summary.dumped, 1);
    assert_eq!(summary.exit_code(), 2);

    let broken = &summary.reports[0];
    assert!(matches!(broken.outcome, Outcome::ParseFailed { errors } if errors > 0));
    assert_eq!(broken.trace.to_string(), "pending -> parsing -> parse_failed -> done");
    assert!(broken.messages.contains("error"));
    assert!(!dir.path().join("out").join("broken.obj").exists());
    assert!(dir.path().join("out").join("other.obj").exists());
}

#[test]
fn test_missing_input_is_scoped_to_file() {
    let dir = source_tree();
    let config = config_for(dir.path());
    let jobs = plan_jobs(vec![invocation(&["missing.c", "good.c"])], &config);

    let summary = driver(&config).run(&jobs).unwrap();
    assert_eq!(summary.io_failed, 1);
    assert_eq!(summary.dumped, 1);
    assert!(matches!(summary.reports[0].outcome, Outcome::IoFailed { .. }));
    assert_eq!(summary.to_string(), "2 files: 1 dumped, 0 skipped, 0 parse failed, 0 timed out, 1 i/o failed");
}

#[test]
fn test_reports_follow_job_order() {
    let dir = source_tree();
    let config = RunConfig {
        workers: Some(4),
        ..config_for(dir.path())
    };
    let jobs = plan_jobs(
        vec![invocation(&["good.c", "broken.c"]), invocation(&["other.c"])],
        &config,
    );

    let summary = driver(&config).run(&jobs).unwrap();
    let inputs: Vec<PathBuf> = summary.reports.iter().map(|r| r.input.clone()).collect();
    let expected: Vec<PathBuf> = ["good.c", "broken.c", "other.c"]
        .iter()
        .map(|f| dir.path().join("src").join(f))
        .collect();
    assert_eq!(inputs, expected);
}

#[test]
fn test_info_lists_declarations() {
    let dir = source_tree();
    let config = RunConfig {
        print_info: true,
        ..config_for(dir.path())
    };
    let jobs = plan_jobs(vec![invocation(&["other.c"])], &config);

    let summary = driver(&config).run(&jobs).unwrap();
    let messages = &summary.reports[0].messages;
    assert!(messages.contains("Enums (1)"), "{}", messages);
    assert!(messages.contains("color"), "{}", messages);
}

/// Frontend that runs until cancelled, counting the parses still in flight
struct StallingFrontend {
    live: Arc<AtomicUsize>,
    started: Arc<AtomicUsize>,
}

impl Frontend for StallingFrontend {
    fn name(&self) -> &'static str {
        "stalling"
    }

    fn parse_file(&self, path: &Path, _options: &ParserOptions, cancel: &CancelToken) -> Result<Compilation, FrontendError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        let start = Instant::now();
        while !cancel.is_cancelled() && start.elapsed() < Duration::from_secs(10) {
            thread::sleep(Duration::from_millis(10));
        }
        self.live.fetch_sub(1, Ordering::SeqCst);
        Err(FrontendError::Cancelled {
            path: path.to_path_buf(),
        })
    }
}

#[test]
fn test_timeout_marks_file_and_writes_nothing() {
    let dir = source_tree();
    let config = RunConfig {
        timeout_secs: Some(1),
        ..config_for(dir.path())
    };
    let jobs = plan_jobs(vec![invocation(&["good.c"])], &config);
    let live = Arc::new(AtomicUsize::new(0));
    let started = Arc::new(AtomicUsize::new(0));
    let frontend = StallingFrontend {
        live: Arc::clone(&live),
        started: Arc::clone(&started),
    };

    let summary = BatchDriver::new(Arc::new(frontend), &config)
        .unwrap()
        .echo(false)
        .run(&jobs)
        .unwrap();
    assert_eq!(summary.timed_out, 1);
    assert_eq!(summary.reports[0].outcome, Outcome::TimedOut);
    assert_eq!(summary.exit_code(), 2);
    assert!(!dir.path().join("out").join("good.obj").exists());
    assert_eq!(started.load(Ordering::SeqCst), 1);
    assert_eq!(live.load(Ordering::SeqCst), 0);
}

#[test]
fn test_timed_out_parses_are_stopped() {
    let dir = source_tree();
    let config = RunConfig {
        timeout_secs: Some(1),
        workers: Some(3),
        ..config_for(dir.path())
    };
    let jobs = plan_jobs(vec![invocation(&["good.c", "other.c", "broken.c"])], &config);
    let live = Arc::new(AtomicUsize::new(0));
    let started = Arc::new(AtomicUsize::new(0));
    let frontend = StallingFrontend {
        live: Arc::clone(&live),
        started: Arc::clone(&started),
    };

    let start = Instant::now();
    let summary = BatchDriver::new(Arc::new(frontend), &config)
        .unwrap()
        .echo(false)
        .run(&jobs)
        .unwrap();

    assert_eq!(summary.timed_out, 3);
    assert_eq!(started.load(Ordering::SeqCst), 3);
    // every parse thread has returned by the time the run does
    assert_eq!(live.load(Ordering::SeqCst), 0);
    assert!(start.elapsed() < Duration::from_secs(10));
}

/// Real frontend that holds every parse until `parties` of them are running
struct LockstepFrontend {
    barrier: Barrier,
}

impl Frontend for LockstepFrontend {
    fn name(&self) -> &'static str {
        "lockstep"
    }

    fn parse_file(&self, path: &Path, options: &ParserOptions, cancel: &CancelToken) -> Result<Compilation, FrontendError> {
        self.barrier.wait();
        CFrontend.parse_file(path, options, cancel)
    }
}

#[test]
fn test_racing_workers_dump_once() {
    let dir = source_tree();
    fs::create_dir_all(dir.path().join("src").join("a")).unwrap();
    fs::create_dir_all(dir.path().join("src").join("b")).unwrap();
    fs::write(dir.path().join("src").join("a").join("x.c"), "int from_a;\n").unwrap();
    fs::write(dir.path().join("src").join("b").join("x.c"), "int from_b;\n").unwrap();

    let config = config_for(dir.path());
    let jobs = plan_jobs(vec![invocation(&["a/x.c"]), invocation(&["b/x.c"])], &config);
    assert_eq!(jobs[0].artifact, jobs[1].artifact);

    let driver = BatchDriver::new(Arc::new(LockstepFrontend { barrier: Barrier::new(2) }), &config)
        .unwrap()
        .echo(false);
    let driver = &driver;
    // both workers are past the existence check before either writes
    let reports = thread::scope(|scope| {
        let handles: Vec<_> = jobs.iter().map(|job| scope.spawn(move || driver.process(job))).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect::<Vec<_>>()
    });

    let dumped: Vec<_> = reports
        .iter()
        .filter(|r| matches!(r.outcome, Outcome::Dumped { .. }))
        .collect();
    let skipped: Vec<_> = reports.iter().filter(|r| r.outcome == Outcome::Skipped).collect();
    assert_eq!(dumped.len(), 1);
    assert_eq!(skipped.len(), 1);
    assert_eq!(
        skipped[0].trace.to_string(),
        "pending -> parsing -> parsed -> dumping -> skipped"
    );

    let text = fs::read_to_string(&jobs[0].artifact).unwrap();
    let doc: Value = serde_json::from_str(&text).unwrap();
    let winner = if dumped[0].input.ends_with("a/x.c") { "from_a" } else { "from_b" };
    assert_eq!(doc["fields"][0]["name"], winner);
}

#[test]
fn test_unwritable_output_dir_fails_every_file() {
    let dir = source_tree();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "not a directory").unwrap();
    let config = RunConfig {
        output_dir: blocker.join("out"),
        ..config_for(dir.path())
    };
    let jobs = plan_jobs(vec![invocation(&["good.c", "other.c"])], &config);

    let summary = driver(&config).run(&jobs).unwrap();
    assert_eq!(summary.reports.len(), 2);
    assert_eq!(summary.io_failed, 2);
    assert_eq!(summary.exit_code(), 2);
    for report in &summary.reports {
        assert!(matches!(report.outcome, Outcome::IoFailed { .. }));
        assert_eq!(report.trace.to_string(), "pending -> parsing -> parsed -> dumping -> done");
    }
}

#[test]
fn test_invalid_config_aborts_before_any_file() {
    let dir = source_tree();
    let config = RunConfig {
        workers: Some(0),
        ..config_for(dir.path())
    };
    assert!(BatchDriver::new(Arc::new(CFrontend), &config).is_err());

    let missing = RunConfig {
        invocations: dir.path().join("nope.json"),
        ..config_for(dir.path())
    };
    assert!(matches!(batch::run_batch(&missing), Err(Error::Config(_))));
    assert!(!dir.path().join("out").exists());
}

#[test]
fn test_run_batch_from_config_file() {
    let dir = source_tree();
    fs::write(
        dir.path().join("invocations.json"),
        r#"[{"cmd": "cl.exe", "include": ["include"], "input": ["good.c", "other.c"], "define": {"NDEBUG": null}}]"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("run.json"),
        r#"{"source_dir": "src", "output_dir": "build", "artifact_extension": "json", "split": ["good.c"]}"#,
    )
    .unwrap();

    let config = RunConfig::load(&dir.path().join("run.json")).unwrap();
    let summary = batch::run_batch(&config).unwrap();
    assert_eq!(summary.dumped, 2);
    // the split input runs after the shrunk invocation
    assert_eq!(summary.reports[0].input, dir.path().join("src").join("other.c"));
    assert!(dir.path().join("build").join("good.json").exists());
    assert!(dir.path().join("build").join("other.json").exists());
}
