#![warn(clippy::all)]
#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]
#![warn(rustdoc::missing_doc_code_examples)]
#![doc = include_str!("../README.md")]

pub mod boundary;
pub mod buffer;
pub mod config;
pub mod design;
pub mod errors;
pub mod fem;
pub mod filter;
pub mod job;
pub mod mesh;
pub mod registry;
pub mod result;
pub mod solver;
pub mod validate;

pub use boundary::BoundaryMapper;
pub use buffer::{PopOutcome, ResultBuffer};
pub use config::{EndPolicy, RegistryConfig};
pub use design::DesignSpec;
pub use errors::{ConfigError, JobError, SolverError, ValidationErrors, Violation};
pub use fem::ComplianceProblem;
pub use filter::DensityFilter;
pub use job::{JobId, JobState, OptimizationJob};
pub use mesh::Mesh;
pub use registry::JobRegistry;
pub use result::OptimizationResult;
pub use solver::{DesignProblem, OptimalityCriteria, Solver, SolverSettings};
