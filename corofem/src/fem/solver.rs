use na::Matrix3;

use super::explicit::ExplicitIntegrator;
use super::implicit::ImplicitIntegrator;
use super::state::State;
use super::{Integrator, SimParams, StepResult};
use crate::elements::{normalize_volume, TetElements};
use crate::energy_models::Gravity;
use crate::material::{ElasticityParameters, Material};
use crate::matrix::inf_norm;
use crate::mesh::TetMesh;
use crate::Error;

/// Constructs a [`Solver`] from a mesh, its material and the simulation parameters.
#[derive(Clone, Debug)]
pub struct SolverBuilder {
    sim_params: SimParams,
    solid: Option<(TetMesh, Material)>,
}

impl SolverBuilder {
    /// Create a `SolverBuilder` with the minimum required parameters, which are the simulation
    /// parameters, `SimParams`.
    pub fn new(sim_params: SimParams) -> Self {
        SolverBuilder {
            sim_params,
            solid: None,
        }
    }

    /// Set the tetmesh representing the simulated soft solid.
    ///
    /// Replaces any previously set solid.
    pub fn set_solid(&mut self, mesh: TetMesh, material: Material) -> &mut Self {
        self.solid = Some((mesh, material));
        self
    }

    /// Validate the configuration, precompute the reference configuration and build the solver.
    ///
    /// The mesh is rescaled first if volume normalization is requested.
    pub fn build(&self) -> Result<Solver, Error> {
        let SolverBuilder { sim_params, solid } = self;
        let (mut mesh, material) = solid.clone().ok_or(Error::NoSimulationMesh)?;

        sim_params.validate()?;
        material.validate()?;

        log::info!("Simulation Parameters:\n{:#?}", sim_params);
        log::info!("Material:\n{:#?}", material);

        if let Some(target_volume) = sim_params.volume_normalization {
            normalize_volume(&mut mesh, target_volume)?;
        }

        let elements = TetElements::new(&mesh, material.density)?;
        let elasticity = material.elasticity();

        log::info!(
            "Built {} elements over {} vertices: volume = {}, mass = {}",
            mesh.num_cells(),
            mesh.num_vertices(),
            elements.total_volume,
            elements.total_mass()
        );
        log::debug!(
            "Lamé parameters: λ = {}, μ = {}",
            elasticity.lambda,
            elasticity.mu
        );

        let integrator = match sim_params.integrator {
            Integrator::Explicit { damping_scale } => {
                TimeIntegrator::Explicit(ExplicitIntegrator::new(damping_scale))
            }
            Integrator::Implicit {
                max_iterations,
                tolerance,
            } => TimeIntegrator::Implicit(ImplicitIntegrator::new(
                mesh.num_vertices(),
                max_iterations,
                tolerance,
            )),
        };

        Ok(Solver {
            state: State::new(mesh, elements),
            gravity: Gravity::new(sim_params.gravity),
            integrator,
            sim_params: sim_params.clone(),
            material,
            elasticity,
            step_count: 0,
            reported_non_finite: false,
        })
    }
}

/// The time integration strategy selected at build time.
#[derive(Clone, Debug)]
enum TimeIntegrator {
    Explicit(ExplicitIntegrator),
    Implicit(ImplicitIntegrator),
}

/// Finite element engine.
#[derive(Clone, Debug)]
pub struct Solver {
    state: State,
    gravity: Gravity,
    integrator: TimeIntegrator,
    /// Simulation parameters. This is kept around for convenience.
    sim_params: SimParams,
    material: Material,
    elasticity: ElasticityParameters,
    /// Counts the number of substeps taken.
    step_count: u64,
    reported_non_finite: bool,
}

impl Solver {
    /// Advance the simulation by a single substep.
    ///
    /// Fails if an element collapses during force evaluation, in which case positions and
    /// velocities are left untouched.
    pub fn step(&mut self) -> Result<StepResult, Error> {
        let dt = self.sim_params.time_step;
        let mu = self.elasticity.mu;

        self.state.compute_forces(&self.gravity, mu)?;
        self.step_count += 1;

        let mut result = StepResult {
            substeps: 1,
            ..StepResult::default()
        };

        match &mut self.integrator {
            TimeIntegrator::Explicit(integrator) => integrator.advance(&mut self.state, dt),
            TimeIntegrator::Implicit(integrator) => {
                let solve = integrator.advance(&mut self.state, dt, mu);
                result.linear_solves.push(solve);
            }
        }

        if let Some(bounds) = self.sim_params.bounds.as_ref() {
            let TetMesh {
                positions,
                velocities,
                ..
            } = &mut self.state.mesh;
            result.contacts = bounds.apply(positions, velocities);
        }

        if !self.reported_non_finite && !self.state.is_finite() {
            log::warn!(
                "Non-finite vertex state detected at step {}; time step may be unstable",
                self.step_count
            );
            self.reported_non_finite = true;
        }

        if log::log_enabled!(log::Level::Debug) {
            let max_speed = inf_norm(self.state.mesh.velocities().iter().flatten().cloned());
            log::debug!(
                "Step {}: max velocity component = {:e}\n{}",
                self.step_count,
                max_speed,
                result
            );
        }
        Ok(result)
    }

    /// Advance the simulation by `n` substeps.
    pub fn substep(&mut self, n: u32) -> Result<StepResult, Error> {
        let mut result = StepResult::default();
        for _ in 0..n {
            result.merge(self.step()?);
        }
        Ok(result)
    }

    /// Run `frames` frames of `substeps` substeps each.
    ///
    /// The callback is invoked after every frame with the frame index and the frame result.
    /// If it returns `false`, the simulation is interrupted. Returns the number of frames
    /// completed.
    pub fn run<F>(&mut self, frames: u64, substeps: u32, mut callback: F) -> Result<u64, Error>
    where
        F: FnMut(u64, &StepResult, &Solver) -> bool,
    {
        for frame in 0..frames {
            let result = self.substep(substeps)?;
            if !result.converged() {
                log::warn!("Frame {}: linear solve did not converge", frame);
            }
            if !callback(frame, &result, self) {
                log::info!("Simulation interrupted after frame {}", frame);
                return Ok(frame + 1);
            }
        }
        Ok(frames)
    }

    /// Simulation parameters used by this solver.
    pub fn params(&self) -> &SimParams {
        &self.sim_params
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    /// Lamé parameters derived from the material.
    pub fn elasticity(&self) -> ElasticityParameters {
        self.elasticity
    }

    /// Time step size of a single substep.
    pub fn time_step(&self) -> f64 {
        self.sim_params.time_step
    }

    /// Number of substeps completed so far. Aborted steps are not counted.
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn mesh(&self) -> &TetMesh {
        &self.state.mesh
    }

    pub fn vertex_positions(&self) -> &[[f64; 3]] {
        self.state.mesh.vertex_positions()
    }

    pub fn velocities(&self) -> &[[f64; 3]] {
        self.state.mesh.velocities()
    }

    pub fn elements(&self) -> &TetElements {
        &self.state.elements
    }

    /// Green strain of the given cell from the last force evaluation.
    pub fn strain(&self, cell: usize) -> Option<&Matrix3<f64>> {
        self.state.strain.get(cell)
    }

    pub fn strains(&self) -> &[Matrix3<f64>] {
        &self.state.strain
    }

    /// Total rest volume after any normalization.
    pub fn total_volume(&self) -> f64 {
        self.state.elements.total_volume
    }

    pub fn total_mass(&self) -> f64 {
        self.state.elements.total_mass()
    }

    pub fn kinetic_energy(&self) -> f64 {
        self.state.kinetic_energy()
    }
}
