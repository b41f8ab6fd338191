//! Error types produced while validating designs, running solvers and managing jobs.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::job::JobId;

/// A single breach of the structural well-posedness rules.
///
/// Indices refer to the position of the offending entry in the submitted list.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum Violation {
    /// Returned when the Poisson ratio is zero.
    #[error("poisson ratio must not be zero")]
    ZeroPoissonRatio,
    /// Returned when the Poisson ratio lies outside `(-1, 0.5]`.
    #[error("poisson ratio must lie in (-1, 0.5] (received {0})")]
    PoissonRatioOutOfRange(f64),
    /// Returned when Young's modulus is zero or negative.
    #[error("young modulus must be positive (received {0})")]
    NonPositiveYoungModulus(f64),
    /// Returned when the volume fraction is zero or negative.
    #[error("volume fraction must be positive (received {0})")]
    NonPositiveVolumeFraction(f64),
    /// Returned when the domain is smaller than one element in either direction.
    #[error("domain must be at least 1x1 (received {width}x{height})")]
    DomainTooSmall {
        /// Rejected width.
        width: i64,
        /// Rejected height.
        height: i64,
    },
    /// Returned when the SIMP penalization does not exceed one.
    #[error("penalization must be greater than 1 (received {0})")]
    PenalizationTooLow(f64),
    /// Returned when the filter radius is not a positive finite number.
    #[error("filter radius must be positive and finite (received {0})")]
    NonPositiveFilterRadius(f64),
    /// Returned when no support is given.
    #[error("at least one support is required")]
    MissingSupports,
    /// Returned when a support sits outside the node grid.
    #[error("support {index} at ({x}, {y}) lies outside the domain")]
    SupportOutOfBounds {
        /// Position of the support in the submitted list.
        index: usize,
        /// Rejected column.
        x: i64,
        /// Rejected row.
        y: i64,
    },
    /// Returned when a line support runs past the node grid or has no nodes.
    #[error("line support {index} does not fit inside the domain")]
    SupportExtentOutOfBounds {
        /// Position of the support in the submitted list.
        index: usize,
    },
    /// Returned when no combination of supports makes the structure determinate.
    #[error(
        "supports are kinematically undetermined: provide a mobile or fixed support with \
         dimensions of at least 1x1, or supports of differing types with dimensions"
    )]
    UndeterminedSupports,
    /// Returned when no force is given.
    #[error("at least one force is required")]
    MissingForces,
    /// Returned when a force carries no load.
    #[error("force {index} must carry a non-zero finite load (received {load})")]
    InvalidLoad {
        /// Position of the force in the submitted list.
        index: usize,
        /// Rejected load.
        load: f64,
    },
    /// Returned when a force sits outside the node grid.
    #[error("force {index} at ({x}, {y}) lies outside the domain")]
    ForceOutOfBounds {
        /// Position of the force in the submitted list.
        index: usize,
        /// Rejected column.
        x: i64,
        /// Rejected row.
        y: i64,
    },
    /// Returned when a line force runs past the node grid.
    #[error("line force {index} of size {size} does not fit inside the domain")]
    ForceExtentOutOfBounds {
        /// Position of the force in the submitted list.
        index: usize,
        /// Rejected number of nodes.
        size: i64,
    },
    /// Returned when a constant region is smaller than one element.
    #[error("constant region {index} must be at least 1x1 (received {width}x{height})")]
    RegionTooSmall {
        /// Position of the region in the submitted list.
        index: usize,
        /// Rejected width.
        width: i64,
        /// Rejected height.
        height: i64,
    },
    /// Returned when a constant region leaves the element grid.
    #[error("constant region {index} does not fit inside the domain")]
    RegionOutOfBounds {
        /// Position of the region in the submitted list.
        index: usize,
    },
}

/// Every violation found in a rejected design.
///
/// # Examples
/// ```
/// use topoptx::{ValidationErrors, Violation};
///
/// let errors = ValidationErrors::new(vec![Violation::MissingSupports, Violation::MissingForces]);
/// assert_eq!(errors.len(), 2);
/// assert_eq!(errors.messages()[1], "at least one force is required");
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidationErrors(Vec<Violation>);

impl ValidationErrors {
    /// Wrap a list of violations.
    #[must_use]
    pub fn new(violations: Vec<Violation>) -> Self {
        Self(violations)
    }

    /// The violations in rule order.
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        &self.0
    }

    /// Human readable message for each violation.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }

    /// Number of violations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no violation was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.messages().join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Error returned by the job registry.
#[derive(Debug, Error, PartialEq)]
pub enum JobError {
    /// Returned by `start` when the design is not well posed.
    #[error("invalid design: {0}")]
    Invalid(ValidationErrors),
    /// Returned when the id does not name a tracked job.
    #[error("job {0} does not exist")]
    NotFound(JobId),
    /// Returned when a job terminated before producing any result.
    #[error("job {0} stopped before producing a result")]
    NoResult(JobId),
    /// Returned by bounded polls when no result arrived in time.
    #[error("job {0} has not produced a result yet")]
    Pending(JobId),
    /// Returned when the background thread could not be spawned.
    #[error("failed to spawn worker for job {id}: {reason}")]
    Spawn {
        /// Job that could not be launched.
        id: JobId,
        /// Operating system error message.
        reason: String,
    },
}

/// Error returned when the numerical solver cannot continue.
#[derive(Clone, Copy, Debug, Error, PartialEq)]
pub enum SolverError {
    /// Returned when the reduced stiffness matrix cannot be factorized.
    #[error("stiffness matrix is singular; check supports")]
    SingularStiffness,
    /// Returned when a density or gradient buffer has the wrong length.
    #[error("expected {expected} design variables, received {actual}")]
    DimensionMismatch {
        /// Number of elements in the mesh.
        expected: usize,
        /// Length of the supplied buffer.
        actual: usize,
    },
    /// Returned when the objective evaluates to NaN or infinity.
    #[error("objective is not finite ({0})")]
    NonFiniteObjective(f64),
}

/// Error returned while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Returned when the configuration file cannot be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// Returned when the configuration is not valid JSON for the expected shape.
    #[error("cannot parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
