//! Tracking of concurrent optimization jobs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use tracing::{info, warn};

use crate::boundary::BoundaryMapper;
use crate::config::{EndPolicy, RegistryConfig};
use crate::design::DesignSpec;
use crate::errors::JobError;
use crate::fem::ComplianceProblem;
use crate::job::{JobId, OptimizationJob};
use crate::mesh::Mesh;
use crate::result::OptimizationResult;
use crate::solver::{OptimalityCriteria, Solver};

/// Entry point for clients: starts, polls and ends optimization jobs.
///
/// Any number of threads may share a registry. Each job runs on its own
/// thread and is removed from the registry only by [`end`](Self::end) or
/// [`shutdown`](Self::shutdown).
///
/// # Examples
/// ```
/// use topoptx::design::{
///     Axis, BoundaryConditions, Dimensions, Domain, Extent, Force, MaterialProperties,
///     Position, Support, SupportKind,
/// };
/// use topoptx::{DesignSpec, JobRegistry, RegistryConfig, SolverSettings};
///
/// let spec = DesignSpec {
///     domain: Domain {
///         material_properties: MaterialProperties { poisson_ratio: 0.3, young_modulus: 1.0 },
///         dimensions: Dimensions::new(4, 2),
///         volume_fraction: 0.5,
///     },
///     boundary_conditions: BoundaryConditions {
///         supports: vec![Support {
///             position: Position::new(0, 0),
///             kind: SupportKind::Fixed,
///             extent: Some(Extent { axis: Axis::Y, length: 3 }),
///             dimensions: Some(Dimensions::new(1, 2)),
///         }],
///         forces: vec![Force {
///             position: Position::new(4, 0),
///             orientation: Axis::Y,
///             load: -1.0,
///             size: 0,
///         }],
///         constant_regions: Vec::new(),
///     },
///     penalization: 3.0,
///     filter_radius: 1.4,
/// };
///
/// let registry = JobRegistry::new(RegistryConfig {
///     solver: SolverSettings { max_iterations: 5, ..SolverSettings::default() },
///     ..RegistryConfig::default()
/// });
/// let id = registry.start(spec).expect("design is valid");
/// let first = registry.poll(&id).expect("job exists");
/// assert_eq!(first.densities.len(), 8);
/// registry.end(&id).expect("job exists");
/// assert!(registry.is_empty());
/// ```
pub struct JobRegistry {
    /// Tracked jobs by id.
    jobs: DashMap<JobId, Arc<OptimizationJob>>,
    /// Source of the id suffix.
    sequence: AtomicU64,
    /// Settings applied to every job.
    config: RegistryConfig,
    /// Optimizer shared by all jobs.
    solver: Arc<dyn Solver>,
}

impl JobRegistry {
    /// Registry running the optimality criteria solver configured by `config`.
    #[must_use]
    pub fn new(config: RegistryConfig) -> Self {
        Self::with_solver(config, Arc::new(OptimalityCriteria::new(config.solver)))
    }

    /// Registry running a custom solver.
    #[must_use]
    pub fn with_solver(config: RegistryConfig, solver: Arc<dyn Solver>) -> Self {
        Self {
            jobs: DashMap::new(),
            sequence: AtomicU64::new(0),
            config,
            solver,
        }
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Validate `spec` and launch an optimization for it.
    ///
    /// Returns once the worker thread is running, without waiting for any
    /// iteration.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Invalid`] with every violated rule when the design is
    /// not well posed; nothing is registered in that case. Returns
    /// [`JobError::Spawn`] when the worker thread cannot be created.
    pub fn start(&self, spec: DesignSpec) -> Result<JobId, JobError> {
        if let Err(errors) = spec.validate() {
            warn!(violations = errors.len(), %errors, "rejected design");
            return Err(JobError::Invalid(errors));
        }

        let mesh = Mesh::from_dimensions(spec.domain.dimensions);
        let boundary = BoundaryMapper::new(mesh, spec.boundary_conditions.clone());
        let problem = ComplianceProblem::new(&spec, &boundary, &self.config.solver);
        let initial = vec![spec.domain.volume_fraction.min(1.0); mesh.element_count()];

        let id = self.next_id();
        let job = OptimizationJob::spawn(
            id.clone(),
            Arc::new(spec),
            initial,
            Box::new(problem),
            Arc::clone(&self.solver),
        )?;
        self.jobs.insert(id.clone(), Arc::new(job));
        Ok(id)
    }

    /// Oldest unconsumed result of a job.
    ///
    /// Blocks until the job has produced its first result. Once a job has
    /// caught up, repeated polls return its newest result.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`] for an unknown id and
    /// [`JobError::NoResult`] when the job stopped without producing a result.
    pub fn poll(&self, id: &JobId) -> Result<Arc<OptimizationResult>, JobError> {
        self.job(id)?.poll()
    }

    /// Like [`poll`](Self::poll) but waits at most `timeout` for a first result.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Pending`] on timeout, in addition to the errors of
    /// [`poll`](Self::poll).
    pub fn poll_timeout(
        &self,
        id: &JobId,
        timeout: Duration,
    ) -> Result<Arc<OptimizationResult>, JobError> {
        self.job(id)?.poll_timeout(timeout)
    }

    /// Stop tracking a job and release its thread.
    ///
    /// Under [`EndPolicy::Cancel`](crate::EndPolicy::Cancel) a running solver
    /// is asked to stop first; under [`EndPolicy::Wait`](crate::EndPolicy::Wait)
    /// the call waits for it to finish on its own.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`] for an unknown id; the registry is left
    /// unchanged.
    pub fn end(&self, id: &JobId) -> Result<(), JobError> {
        let Some((_, job)) = self.jobs.remove(id) else {
            warn!(job_id = %id, "end requested for unknown job");
            return Err(JobError::NotFound(id.clone()));
        };
        job.end(self.config.end_policy);
        Ok(())
    }

    /// Whether the job's worker thread has exited.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`] for an unknown id.
    pub fn is_complete(&self, id: &JobId) -> Result<bool, JobError> {
        Ok(self.job(id)?.is_complete())
    }

    /// Number of tracked jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether no job is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Ids of the tracked jobs, sorted.
    #[must_use]
    pub fn job_ids(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self.jobs.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    /// End every tracked job, cancelling those still running.
    pub fn shutdown(&self) {
        let ids = self.job_ids();
        if !ids.is_empty() {
            info!(jobs = ids.len(), "shutting down registry");
        }
        for id in ids {
            if let Some((_, job)) = self.jobs.remove(&id) {
                job.end(EndPolicy::Cancel);
            }
        }
    }

    /// Shared handle to a tracked job.
    fn job(&self, id: &JobId) -> Result<Arc<OptimizationJob>, JobError> {
        // Clone out so the map shard is not locked while the caller blocks.
        let job = self.jobs.get(id).map(|entry| Arc::clone(entry.value()));
        job.ok_or_else(|| {
            warn!(job_id = %id, "unknown job");
            JobError::NotFound(id.clone())
        })
    }

    /// Fresh id: wall-clock milliseconds plus the registry sequence.
    fn next_id(&self) -> JobId {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis());
        JobId::new(millis, self.sequence.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl Drop for JobRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}
