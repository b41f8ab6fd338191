use std::sync::Arc;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use topoptx::{JobError, JobId, JobRegistry, OptimizationResult};

/// Failure while following a job to completion.
#[derive(Debug, Error)]
pub enum FollowError {
    /// The registry rejected a poll.
    #[error(transparent)]
    Job(#[from] JobError),
    /// The worker exited without pushing a final result.
    #[error("job {0} stopped without a final result")]
    Stalled(JobId),
}

/// Poll `id` until its finished result arrives.
///
/// `on_progress` sees every newly observed intermediate result. The call
/// sleeps for `interval` only when nothing new is available.
pub fn follow(
    registry: &JobRegistry,
    id: &JobId,
    interval: Duration,
    mut on_progress: impl FnMut(&OptimizationResult),
) -> Result<Arc<OptimizationResult>, FollowError> {
    let mut last_iteration = 0;
    loop {
        let complete = registry.is_complete(id)?;
        let result = registry.poll(id)?;
        if result.finished {
            return Ok(result);
        }
        if result.iteration != last_iteration {
            last_iteration = result.iteration;
            on_progress(&result);
        } else if complete {
            return Err(FollowError::Stalled(id.clone()));
        } else {
            thread::sleep(interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use topoptx::{RegistryConfig, SolverSettings};

    fn beam() -> topoptx::DesignSpec {
        serde_json::from_str(
            r#"{
                "domain": {
                    "materialProperties": { "poissonRatio": 0.3, "youngModulus": 1.0 },
                    "dimensions": { "width": 3, "height": 2 },
                    "volumeFraction": 0.5
                },
                "boundaryConditions": {
                    "supports": [{
                        "position": { "x": 0, "y": 0 },
                        "type": "FIXED",
                        "extent": { "axis": "Y", "length": 3 },
                        "dimensions": { "width": 1, "height": 2 }
                    }],
                    "forces": [{
                        "position": { "x": 3, "y": 2 },
                        "orientation": "Y",
                        "load": -1.0
                    }]
                },
                "penalization": 3.0,
                "filterRadius": 1.4
            }"#,
        )
        .expect("design parses")
    }

    #[test]
    fn follows_job_to_finished_result() {
        let registry = JobRegistry::new(RegistryConfig {
            solver: SolverSettings {
                max_iterations: 4,
                ..SolverSettings::default()
            },
            ..RegistryConfig::default()
        });
        let id = registry.start(beam()).expect("valid design");

        let mut seen = Vec::new();
        let result = follow(&registry, &id, Duration::from_millis(1), |progress| {
            seen.push(progress.iteration);
        })
        .expect("job finishes");

        assert!(result.finished);
        assert_eq!(result.densities.len(), 6);
        assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(seen.len() <= 4);
    }
}
