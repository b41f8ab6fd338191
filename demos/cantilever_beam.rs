use topoptx::design::{
    Axis, BoundaryConditions, Dimensions, Domain, Extent, Force, MaterialProperties, Position,
    Support, SupportKind,
};
use topoptx::{DesignSpec, JobRegistry, RegistryConfig, SolverSettings};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let spec = DesignSpec {
        domain: Domain {
            material_properties: MaterialProperties {
                poisson_ratio: 0.3,
                young_modulus: 1.0,
            },
            dimensions: Dimensions::new(30, 10),
            volume_fraction: 0.4,
        },
        boundary_conditions: BoundaryConditions {
            supports: vec![Support {
                position: Position::new(0, 0),
                kind: SupportKind::Fixed,
                extent: Some(Extent {
                    axis: Axis::Y,
                    length: 11,
                }),
                dimensions: Some(Dimensions::new(1, 10)),
            }],
            forces: vec![Force {
                position: Position::new(30, 10),
                orientation: Axis::Y,
                load: -1.0,
                size: 0,
            }],
            constant_regions: Vec::new(),
        },
        penalization: 3.0,
        filter_radius: 1.5,
    };

    let registry = JobRegistry::new(RegistryConfig {
        solver: SolverSettings {
            max_iterations: 100,
            tolerance: 1.0e-2,
            ..SolverSettings::default()
        },
        ..RegistryConfig::default()
    });
    let id = registry.start(spec)?;

    loop {
        let result = registry.poll(&id)?;
        if result.finished {
            println!(
                "finished after {} iterations: compliance = {:.4}, volume = {:.1}",
                result.iteration, result.objective, result.volume
            );
            break;
        }
        println!("iteration {:>3}: compliance = {:.4}", result.iteration, result.objective);
    }

    registry.end(&id)?;
    Ok(())
}
