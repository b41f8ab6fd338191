//! Snapshots streamed by a running optimization.

use serde::{Deserialize, Serialize, Serializer};

/// Decimal places kept for densities on the wire.
const DENSITY_DECIMALS: i32 = 5;

/// State of the design after one solver iteration.
///
/// The JSON form rounds densities to five decimals and only carries `finished`
/// on the final result of a job.
///
/// # Examples
/// ```
/// use topoptx::OptimizationResult;
///
/// let result = OptimizationResult::new(vec![0.123456, 1.0], 7.5, 3);
/// assert!((result.volume - 1.123456).abs() < 1.0e-12);
/// let json = serde_json::to_value(&result).expect("serializable");
/// assert_eq!(json["densities"][0], 0.12346);
/// assert!(json.get("finished").is_none());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Physical density of every element in mesh order.
    #[serde(serialize_with = "serialize_rounded")]
    pub densities: Vec<f64>,
    /// Sum of the densities.
    pub volume: f64,
    /// Compliance at these densities.
    pub objective: f64,
    /// Solver iteration that produced the snapshot, starting at 1.
    pub iteration: usize,
    /// Set only on the last result of a job.
    #[serde(default, skip_serializing_if = "is_false")]
    pub finished: bool,
}

impl OptimizationResult {
    /// Snapshot of an intermediate iteration; the volume is derived from `densities`.
    #[must_use]
    pub fn new(densities: Vec<f64>, objective: f64, iteration: usize) -> Self {
        let volume = densities.iter().sum();
        Self {
            densities,
            volume,
            objective,
            iteration,
            finished: false,
        }
    }

    /// Final snapshot of a job.
    #[must_use]
    pub fn finished(densities: Vec<f64>, objective: f64, iteration: usize) -> Self {
        Self {
            finished: true,
            ..Self::new(densities, objective, iteration)
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn serialize_rounded<S: Serializer>(densities: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
    let scale = 10_f64.powi(DENSITY_DECIMALS);
    serializer.collect_seq(densities.iter().map(|d| (d * scale).round() / scale))
}
