//! A single optimization running on its own thread.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::buffer::{PopOutcome, ResultBuffer};
use crate::config::EndPolicy;
use crate::design::DesignSpec;
use crate::errors::{JobError, SolverError};
use crate::result::OptimizationResult;
use crate::solver::{DesignProblem, Solver};

/// Opaque identifier of a job.
///
/// # Examples
/// ```
/// use topoptx::JobId;
///
/// let id = JobId::new(0x18f, 2);
/// assert_eq!(id.to_string(), "18f-2");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Id built from a millisecond timestamp and a sequence number, both hex encoded.
    #[must_use]
    pub fn new(millis: u128, sequence: u64) -> Self {
        Self(format!("{millis:x}-{sequence:x}"))
    }

    /// The id as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Lifecycle of a job as seen by its owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    /// Accepted and not yet ended by a client.
    Running,
    /// Ended by a client; the worker thread has been released.
    Ended,
}

/// Forwards to the wrapped problem and streams every evaluation into a buffer.
struct Recorder<'a> {
    /// Problem being optimized.
    problem: &'a mut dyn DesignProblem,
    /// Destination of the snapshots.
    buffer: &'a ResultBuffer,
    /// Job the snapshots belong to.
    id: &'a JobId,
    /// Evaluations so far.
    iteration: usize,
    /// Latest evaluated snapshot, the basis of the final result.
    last: Option<OptimizationResult>,
}

impl DesignProblem for Recorder<'_> {
    fn element_count(&self) -> usize {
        self.problem.element_count()
    }

    fn volume_limit(&self) -> f64 {
        self.problem.volume_limit()
    }

    fn physical(&self, x: &[f64]) -> Vec<f64> {
        self.problem.physical(x)
    }

    fn evaluate(&mut self, x: &[f64], gradient: &mut [f64]) -> Result<f64, SolverError> {
        let objective = self.problem.evaluate(x, gradient)?;
        self.iteration += 1;

        let result = OptimizationResult::new(self.problem.physical(x), objective, self.iteration);
        debug!(
            job_id = %self.id,
            iteration = self.iteration,
            objective,
            volume = result.volume,
            "iteration complete"
        );
        self.last = Some(result.clone());
        self.buffer.push(result);
        Ok(objective)
    }
}

/// Closes the buffer when the worker exits, panics included.
struct CloseOnExit(Arc<ResultBuffer>);

impl Drop for CloseOnExit {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Body of the worker thread.
fn run(
    id: &JobId,
    initial: Vec<f64>,
    mut problem: Box<dyn DesignProblem + Send>,
    solver: &dyn Solver,
    buffer: &Arc<ResultBuffer>,
    cancel: &CancellationToken,
) {
    let _close = CloseOnExit(Arc::clone(buffer));
    let mut recorder = Recorder {
        problem: problem.as_mut(),
        buffer,
        id,
        iteration: 0,
        last: None,
    };

    match solver.optimize(initial, &mut recorder, cancel) {
        Ok(_) => {
            // The last evaluated densities, not the post-update design, so the
            // objective and volume describe the same field.
            let Some(last) = recorder.last.take() else {
                warn!(job_id = %id, "job stopped before its first iteration");
                return;
            };
            let result = OptimizationResult::finished(last.densities, last.objective, last.iteration);
            info!(
                job_id = %id,
                iteration = result.iteration,
                objective = result.objective,
                volume = result.volume,
                cancelled = cancel.is_cancelled(),
                "optimization finished"
            );
            buffer.push(result);
        }
        Err(err) => {
            error!(job_id = %id, iteration = recorder.iteration, error = %err, "optimization failed");
        }
    }
}

/// One solver invocation against one design, run on a dedicated thread.
///
/// Every solver iteration pushes an intermediate [`OptimizationResult`] into
/// the job's [`ResultBuffer`]; termination pushes a final result flagged
/// `finished`. A solver failure is logged and leaves the last intermediate
/// result in place.
#[derive(Debug)]
pub struct OptimizationJob {
    /// Registry key.
    id: JobId,
    /// Accepted design, read-only.
    spec: Arc<DesignSpec>,
    /// Snapshots shared with the worker.
    buffer: Arc<ResultBuffer>,
    /// Stops the solver between iterations.
    cancel: CancellationToken,
    /// Lifecycle state.
    state: Mutex<JobState>,
    /// Worker handle, taken by the first join.
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl OptimizationJob {
    /// Launch `solver` on `problem` from the design variables `initial`.
    ///
    /// The thread is named `topopt-job-<id>`. The call returns as soon as the
    /// thread is running.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Spawn`] when the operating system refuses the thread.
    pub fn spawn(
        id: JobId,
        spec: Arc<DesignSpec>,
        initial: Vec<f64>,
        problem: Box<dyn DesignProblem + Send>,
        solver: Arc<dyn Solver>,
    ) -> Result<Self, JobError> {
        let buffer = Arc::new(ResultBuffer::new());
        let cancel = CancellationToken::new();

        let worker = {
            let worker_id = id.clone();
            let buffer = Arc::clone(&buffer);
            let cancel = cancel.clone();
            thread::Builder::new()
                .name(format!("topopt-job-{id}"))
                .spawn(move || run(&worker_id, initial, problem, solver.as_ref(), &buffer, &cancel))
                .map_err(|err| JobError::Spawn {
                    id: id.clone(),
                    reason: err.to_string(),
                })?
        };
        info!(job_id = %id, elements = spec.element_count(), "job started");

        Ok(Self {
            id,
            spec,
            buffer,
            cancel,
            state: Mutex::new(JobState::Running),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Identifier of the job.
    #[must_use]
    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// The design being optimized.
    #[must_use]
    pub fn spec(&self) -> &DesignSpec {
        &self.spec
    }

    /// Results produced so far.
    #[must_use]
    pub fn buffer(&self) -> &ResultBuffer {
        &self.buffer
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> JobState {
        *self.state.lock()
    }

    /// Whether the worker thread has exited.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .map_or(true, JoinHandle::is_finished)
    }

    /// Oldest unconsumed result, waiting for the first one if needed.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NoResult`] when the job stopped without producing one.
    pub fn poll(&self) -> Result<Arc<OptimizationResult>, JobError> {
        self.buffer
            .pop()
            .ok_or_else(|| JobError::NoResult(self.id.clone()))
    }

    /// Like [`poll`](Self::poll) but waits at most `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Pending`] on timeout and [`JobError::NoResult`] when
    /// the job stopped without producing a result.
    pub fn poll_timeout(&self, timeout: Duration) -> Result<Arc<OptimizationResult>, JobError> {
        match self.buffer.pop_timeout(timeout) {
            PopOutcome::Ready(result) => Ok(result),
            PopOutcome::TimedOut => Err(JobError::Pending(self.id.clone())),
            PopOutcome::Closed => Err(JobError::NoResult(self.id.clone())),
        }
    }

    /// Ask the solver to stop after its current iteration.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the worker thread to exit. Later calls return immediately.
    pub fn join(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        if worker.join().is_err() {
            error!(job_id = %self.id, "worker thread panicked");
        }
    }

    /// Mark the job ended and release its thread according to `policy`.
    pub fn end(&self, policy: EndPolicy) {
        *self.state.lock() = JobState::Ended;
        if policy == EndPolicy::Cancel && !self.is_complete() {
            debug!(job_id = %self.id, "cancelling running job");
            self.cancel();
        }
        self.join();
        info!(job_id = %self.id, ?policy, "job ended");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::design::fixtures::clamped_beam;
    use crate::solver::{OptimalityCriteria, SolverSettings};

    /// Problem whose objective halves every evaluation.
    struct Halving {
        objective: f64,
        fail_at: Option<usize>,
        calls: Arc<AtomicUsize>,
    }

    impl DesignProblem for Halving {
        fn element_count(&self) -> usize {
            2
        }

        fn volume_limit(&self) -> f64 {
            1.0
        }

        fn physical(&self, x: &[f64]) -> Vec<f64> {
            x.to_vec()
        }

        fn evaluate(&mut self, _x: &[f64], gradient: &mut [f64]) -> Result<f64, SolverError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_at == Some(call) {
                return Err(SolverError::SingularStiffness);
            }
            gradient.fill(-1.0);
            self.objective *= 0.5;
            Ok(self.objective)
        }
    }

    fn launch(fail_at: Option<usize>, max_iterations: usize) -> (OptimizationJob, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let problem = Halving {
            objective: 1.0,
            fail_at,
            calls: Arc::clone(&calls),
        };
        let solver = OptimalityCriteria::new(SolverSettings {
            max_iterations,
            tolerance: 0.0,
            ..SolverSettings::default()
        });
        let job = OptimizationJob::spawn(
            JobId::from("test"),
            Arc::new(clamped_beam(2, 2)),
            vec![0.5; 2],
            Box::new(problem),
            Arc::new(solver),
        )
        .expect("thread spawns");
        (job, calls)
    }

    #[test]
    fn streams_iterations_then_a_finished_result() {
        let (job, _) = launch(None, 4);
        job.join();
        assert!(job.is_complete());

        let iterations: Vec<(usize, bool)> = (0..5)
            .map(|_| job.poll().expect("result available"))
            .map(|result| (result.iteration, result.finished))
            .collect();
        assert_eq!(
            iterations,
            vec![(1, false), (2, false), (3, false), (4, false), (4, true)]
        );
        let last = job.poll().expect("final result retained");
        assert!(last.finished);
        assert_eq!(last.objective, 0.0625);
    }

    #[test]
    fn finished_result_repeats_the_last_evaluated_field() {
        let (job, _) = launch(None, 3);
        job.join();
        let results: Vec<_> = (0..4).map(|_| job.poll().expect("result")).collect();
        let (evaluated, finished) = (&results[2], &results[3]);
        assert!(!evaluated.finished && finished.finished);
        assert_eq!(finished.densities, evaluated.densities);
        assert_eq!(finished.volume, evaluated.volume);
        assert_eq!(finished.objective, evaluated.objective);
        assert_eq!(finished.iteration, evaluated.iteration);
    }

    #[test]
    fn failure_keeps_last_intermediate_result() {
        let (job, _) = launch(Some(3), 10);
        job.join();
        let results: Vec<_> = (0..3).map(|_| job.poll().expect("result")).collect();
        assert_eq!(results[1].iteration, 2);
        assert!(results.iter().all(|r| !r.finished));
        assert!(job.buffer().is_closed());
    }

    #[test]
    fn failure_before_first_iteration_yields_no_result() {
        let (job, _) = launch(Some(1), 10);
        assert_eq!(job.poll(), Err(JobError::NoResult(JobId::from("test"))));
    }

    #[test]
    fn end_marks_job_ended_and_joins() {
        let (job, calls) = launch(None, usize::MAX);
        job.poll().expect("first result");
        job.end(EndPolicy::Cancel);
        assert_eq!(job.state(), JobState::Ended);
        assert!(job.is_complete());
        assert!(calls.load(Ordering::SeqCst) >= 1);
        assert!(job.buffer().latest().expect("result").finished);
    }

    #[test]
    fn worker_thread_is_named_after_job() {
        let calls = Arc::new(AtomicUsize::new(0));
        let names = Arc::new(Mutex::new(Vec::new()));

        struct ThreadNameRecorder {
            names: Arc<Mutex<Vec<String>>>,
            inner: Halving,
        }
        impl DesignProblem for ThreadNameRecorder {
            fn element_count(&self) -> usize {
                self.inner.element_count()
            }
            fn volume_limit(&self) -> f64 {
                self.inner.volume_limit()
            }
            fn physical(&self, x: &[f64]) -> Vec<f64> {
                self.inner.physical(x)
            }
            fn evaluate(&mut self, x: &[f64], gradient: &mut [f64]) -> Result<f64, SolverError> {
                let name = thread::current().name().unwrap_or_default().to_owned();
                self.names.lock().push(name);
                self.inner.evaluate(x, gradient)
            }
        }

        let problem = ThreadNameRecorder {
            names: Arc::clone(&names),
            inner: Halving {
                objective: 1.0,
                fail_at: None,
                calls,
            },
        };
        let job = OptimizationJob::spawn(
            JobId::from("abc-1"),
            Arc::new(clamped_beam(2, 2)),
            vec![0.5; 2],
            Box::new(problem),
            Arc::new(OptimalityCriteria::new(SolverSettings {
                max_iterations: 1,
                ..SolverSettings::default()
            })),
        )
        .expect("thread spawns");
        job.join();
        assert_eq!(*names.lock(), vec!["topopt-job-abc-1".to_owned()]);
    }
}
