//! Service context bundling all port trait objects.

use crate::ports::{Clock, FileSystem, Operator, Oracle, OracleKind, ProcessRunner};

/// Bundles all port trait objects into a single context.
///
/// Each field provides access to one external boundary. The engine and
/// command layer only ever talk to these traits, so tests swap in the
/// doubles from [`test_support`] without touching engine code.
pub struct ServiceContext {
    /// Clock for obtaining the current time.
    pub clock: Box<dyn Clock>,
    /// Filesystem for file I/O.
    pub fs: Box<dyn FileSystem>,
    /// Process runner for subprocess capabilities.
    pub process: Box<dyn ProcessRunner>,
    /// Oracle for planning task batches.
    pub oracle: Box<dyn Oracle>,
    /// Operator channel for end-of-iteration review.
    pub operator: Box<dyn Operator>,
}

impl ServiceContext {
    /// Creates a live context with real adapters for every port.
    #[must_use]
    pub fn live(kind: OracleKind) -> Self {
        use crate::adapters::live::clock::LiveClock;
        use crate::adapters::live::filesystem::LiveFileSystem;
        use crate::adapters::live::operator::LiveOperator;
        use crate::adapters::live::oracle::LiveOracle;
        use crate::adapters::live::process::LiveProcessRunner;

        Self {
            clock: Box::new(LiveClock),
            fs: Box::new(LiveFileSystem),
            process: Box::new(LiveProcessRunner),
            oracle: Box::new(LiveOracle::new(kind)),
            operator: Box::new(LiveOperator),
        }
    }
}

/// In-memory and scripted port doubles for tests.
#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use std::collections::{BTreeMap, VecDeque};
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    use chrono::{DateTime, TimeZone, Utc};

    use super::ServiceContext;
    use crate::ports::{
        Clock, FileSystem, IterationReview, Operator, OperatorSignal, Oracle, OracleError,
        PlanFuture, PlanRequest, PlanResponse, ProcessOutput, ProcessRunner,
    };

    type BoxError = Box<dyn std::error::Error + Send + Sync>;

    /// An in-memory filesystem keyed by exact paths.
    #[derive(Default)]
    pub struct MemFs {
        files: Mutex<BTreeMap<PathBuf, String>>,
        dirs: Mutex<Vec<PathBuf>>,
    }

    impl FileSystem for MemFs {
        fn read_to_string(&self, path: &Path) -> Result<String, BoxError> {
            self.files
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| format!("no such file: {}", path.display()).into())
        }

        fn write(&self, path: &Path, contents: &str) -> Result<(), BoxError> {
            self.files.lock().unwrap().insert(path.to_path_buf(), contents.to_string());
            Ok(())
        }

        fn exists(&self, path: &Path) -> bool {
            let files = self.files.lock().unwrap();
            files.contains_key(path)
                || files.keys().any(|p| p.starts_with(path))
                || self.dirs.lock().unwrap().iter().any(|d| d == path || d.starts_with(path))
        }

        fn create_dir_all(&self, path: &Path) -> Result<(), BoxError> {
            self.dirs.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }

        fn remove_file(&self, path: &Path) -> Result<(), BoxError> {
            self.files
                .lock()
                .unwrap()
                .remove(path)
                .map(|_| ())
                .ok_or_else(|| format!("no such file: {}", path.display()).into())
        }

        fn rename(&self, from: &Path, to: &Path) -> Result<(), BoxError> {
            let mut files = self.files.lock().unwrap();
            let contents = files
                .remove(from)
                .ok_or_else(|| format!("no such file: {}", from.display()))?;
            files.insert(to.to_path_buf(), contents);
            Ok(())
        }
    }

    /// One recorded subprocess invocation.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct ProcessCall {
        /// Program name as invoked.
        pub program: String,
        /// Arguments as invoked.
        pub args: Vec<String>,
        /// Working directory, if one was set.
        pub cwd: Option<PathBuf>,
    }

    /// A process runner replaying a queue of scripted outputs.
    ///
    /// Every invocation is recorded; once the queue runs dry each call
    /// succeeds with empty output, so tests only script the outputs
    /// they care about.
    #[derive(Default)]
    pub struct ProcessScript {
        outputs: Mutex<VecDeque<ProcessOutput>>,
        calls: Arc<Mutex<Vec<ProcessCall>>>,
    }

    impl ProcessScript {
        /// Queues the next output to return.
        pub fn push(&mut self, output: ProcessOutput) {
            self.outputs.lock().unwrap().push_back(output);
        }

        /// A handle to the recorded invocations.
        #[must_use]
        pub fn calls(&self) -> Arc<Mutex<Vec<ProcessCall>>> {
            Arc::clone(&self.calls)
        }
    }

    impl ProcessRunner for ProcessScript {
        fn run(
            &self,
            program: &str,
            args: &[&str],
            cwd: Option<&Path>,
        ) -> Result<ProcessOutput, BoxError> {
            self.calls.lock().unwrap().push(ProcessCall {
                program: program.to_string(),
                args: args.iter().map(ToString::to_string).collect(),
                cwd: cwd.map(Path::to_path_buf),
            });
            Ok(self.outputs.lock().unwrap().pop_front().unwrap_or(ProcessOutput {
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
            }))
        }
    }

    /// A clock pinned to a fixed instant.
    pub struct FixedClock(pub DateTime<Utc>);

    impl Default for FixedClock {
        fn default() -> Self {
            Self(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default())
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    /// An oracle replaying a queue of scripted plan results.
    ///
    /// Requests are recorded for assertion. An exhausted queue yields
    /// empty responses, which the engine reads as completion.
    #[derive(Default)]
    pub struct ScriptedOracle {
        responses: Mutex<VecDeque<Result<PlanResponse, OracleError>>>,
        requests: Arc<Mutex<Vec<PlanRequest>>>,
    }

    impl ScriptedOracle {
        /// Queues a successful response with the given raw tasks.
        pub fn push_tasks(&mut self, tasks: Vec<serde_json::Value>) {
            self.responses.lock().unwrap().push_back(Ok(PlanResponse { tasks }));
        }

        /// Queues a planning failure.
        pub fn push_error(&mut self, error: OracleError) {
            self.responses.lock().unwrap().push_back(Err(error));
        }

        /// A handle to the recorded requests.
        #[must_use]
        pub fn requests(&self) -> Arc<Mutex<Vec<PlanRequest>>> {
            Arc::clone(&self.requests)
        }
    }

    impl Oracle for ScriptedOracle {
        fn plan(&self, request: &PlanRequest) -> PlanFuture<'_> {
            self.requests.lock().unwrap().push(request.clone());
            let result = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(PlanResponse::default()));
            Box::pin(async move { result })
        }
    }

    /// An operator replaying a queue of scripted signals.
    ///
    /// Reviews are recorded for assertion. An exhausted queue answers
    /// `Stop`, so scripted runs always terminate.
    #[derive(Default)]
    pub struct ScriptedOperator {
        signals: Mutex<VecDeque<OperatorSignal>>,
        reviews: Arc<Mutex<Vec<IterationReview>>>,
    }

    impl ScriptedOperator {
        /// Queues the next signal to answer with.
        pub fn push(&mut self, signal: OperatorSignal) {
            self.signals.lock().unwrap().push_back(signal);
        }

        /// A handle to the recorded reviews.
        #[must_use]
        pub fn reviews(&self) -> Arc<Mutex<Vec<IterationReview>>> {
            Arc::clone(&self.reviews)
        }
    }

    impl Operator for ScriptedOperator {
        fn review(&self, review: &IterationReview) -> Result<OperatorSignal, BoxError> {
            self.reviews.lock().unwrap().push(review.clone());
            Ok(self
                .signals
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(OperatorSignal::Stop))
        }
    }

    /// An oracle that panics if reached; for tests that never plan.
    pub struct PanickingOracle;

    impl Oracle for PanickingOracle {
        fn plan(&self, _request: &PlanRequest) -> PlanFuture<'_> {
            panic!("oracle should not be called in this test");
        }
    }

    /// An operator that panics if reached; for tests that never review.
    pub struct PanickingOperator;

    impl Operator for PanickingOperator {
        fn review(&self, _review: &IterationReview) -> Result<OperatorSignal, BoxError> {
            panic!("operator should not be called in this test");
        }
    }

    /// A context wired entirely with test doubles: empty [`MemFs`], an
    /// unscripted [`ProcessScript`] (every call succeeds), a fixed
    /// clock, and panicking oracle and operator stubs.
    #[must_use]
    pub fn scripted_context() -> ServiceContext {
        ServiceContext {
            clock: Box::new(FixedClock::default()),
            fs: Box::new(MemFs::default()),
            process: Box::new(ProcessScript::default()),
            oracle: Box::new(PanickingOracle),
            operator: Box::new(PanickingOperator),
        }
    }

    impl ServiceContext {
        /// Replaces the process runner.
        #[must_use]
        pub fn with_process(mut self, script: ProcessScript) -> Self {
            self.process = Box::new(script);
            self
        }

        /// Replaces the oracle.
        #[must_use]
        pub fn with_oracle(mut self, oracle: ScriptedOracle) -> Self {
            self.oracle = Box::new(oracle);
            self
        }

        /// Replaces the operator.
        #[must_use]
        pub fn with_operator(mut self, operator: ScriptedOperator) -> Self {
            self.operator = Box::new(operator);
            self
        }

        /// Seeds one file into the context's filesystem.
        ///
        /// # Panics
        ///
        /// Panics if the underlying filesystem rejects the write.
        #[must_use]
        pub fn with_file(self, path: &str, contents: &str) -> Self {
            self.fs.write(Path::new(path), contents).unwrap();
            self
        }
    }
}
