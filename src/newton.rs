use crate::equation_system::EquationSystem;
use crate::jacobian::{JacobianMatrix, LuSolver};
use crate::lf_network::LfNetwork;
use crate::observer::AcLoadFlowObserver;
use crate::voltage_init::VoltageInitializer;
use anyhow::Result;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewtonRaphsonStatus {
    Converged,
    MaxIterationReached,
    SolverFailed,
}

impl fmt::Display for NewtonRaphsonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NewtonRaphsonStatus::Converged => write!(f, "CONVERGED"),
            NewtonRaphsonStatus::MaxIterationReached => write!(f, "MAX_ITERATION_REACHED"),
            NewtonRaphsonStatus::SolverFailed => write!(f, "SOLVER_FAILED"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NewtonRaphsonParameters {
    pub max_iterations: usize,
    /// Convergence threshold on the 2-norm of the residual (pu).
    pub epsilon: f64,
}

impl Default for NewtonRaphsonParameters {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            epsilon: 1e-4,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NewtonRaphsonResult {
    pub status: NewtonRaphsonStatus,
    pub iterations: usize,
    /// Active power (pu) the slack bus injects beyond its target.
    pub slack_bus_active_power_mismatch: f64,
}

pub(crate) fn norm2(f: &[f64]) -> f64 {
    f.iter().map(|v| v * v).sum::<f64>().sqrt()
}

/// Full Newton-Raphson solution of the AC power balance of a snapshot.
pub struct NewtonRaphson<'a> {
    parameters: NewtonRaphsonParameters,
    solver: &'a LuSolver,
    observer: &'a dyn AcLoadFlowObserver,
}

impl<'a> NewtonRaphson<'a> {
    pub fn new(
        parameters: NewtonRaphsonParameters,
        solver: &'a LuSolver,
        observer: &'a dyn AcLoadFlowObserver,
    ) -> Self {
        Self {
            parameters,
            solver,
            observer,
        }
    }

    /// Solves the system from the voltages given by `initializer`.
    ///
    /// On convergence the solved voltages, injections and branch flows are
    /// written to `network`, otherwise its state is reset to NaN. Singular
    /// Jacobians and non-convergence are reported through the status.
    pub fn run(
        &self,
        network: &mut LfNetwork,
        system: &mut EquationSystem,
        initializer: &dyn VoltageInitializer,
    ) -> Result<NewtonRaphsonResult> {
        let observer = self.observer;

        // bus modes may have changed since the last run
        system.index(network);

        observer.before_voltage_initializer_preparation(initializer.name());
        let (v, ph) = initializer.initialize(network);
        observer.after_voltage_initializer_preparation();

        let mut x = system.state_vector(&v, &ph);
        observer.state_vector_initialized(&x);

        let mut iteration = 0;
        let status = loop {
            observer.before_equation_evaluation(iteration);
            let mut fx = system.evaluate(network, &x);
            observer.after_equation_evaluation(&fx, system, iteration);

            let norm = norm2(&fx);
            observer.norm(norm, iteration);
            if norm <= self.parameters.epsilon {
                break NewtonRaphsonStatus::Converged;
            }
            if iteration >= self.parameters.max_iterations {
                break NewtonRaphsonStatus::MaxIterationReached;
            }

            observer.begin_iteration(iteration);

            observer.before_jacobian_build(iteration);
            let jacobian = JacobianMatrix::build(system, network, &x)?;
            observer.after_jacobian_build(&jacobian, system, iteration);

            if let Err(err) = self.solve(&jacobian, &mut fx, iteration) {
                log::debug!("linear system failed at iteration {}: {}", iteration, err);
                break NewtonRaphsonStatus::SolverFailed;
            }

            observer.before_state_update(iteration);
            x.iter_mut().zip(&fx).for_each(|(x, dx)| *x -= dx);
            observer.after_state_update(&x, system, iteration);

            observer.end_iteration(iteration);
            iteration += 1;
        };

        let slack_bus_active_power_mismatch = match status {
            NewtonRaphsonStatus::Converged => {
                observer.before_network_update();
                system.update_network(network, &x);
                observer.after_network_update();
                system.slack_bus_active_power_mismatch(network, &x)
            }
            _ => {
                network.reset_state();
                f64::NAN
            }
        };

        log::debug!(
            "Newton-Raphson: {} after {} iterations, slack bus active power mismatch {} pu",
            status,
            iteration,
            slack_bus_active_power_mismatch
        );

        Ok(NewtonRaphsonResult {
            status,
            iterations: iteration,
            slack_bus_active_power_mismatch,
        })
    }

    // The LU handle is released on every path out of this scope.
    fn solve(&self, jacobian: &JacobianMatrix, fx: &mut [f64], iteration: usize) -> Result<()> {
        self.observer.before_lu_decomposition(iteration);
        let lu = jacobian.decompose_lu(self.solver)?;
        self.observer.after_lu_decomposition(iteration);

        self.observer.before_lu_solve(iteration);
        lu.solve(fx)?;
        self.observer.after_lu_solve(iteration);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NoopAcLoadFlowObserver;
    use crate::slack::FirstSlackBusSelector;
    use crate::tests::networks;
    use crate::voltage_init::{PreviousValueVoltageInitializer, UniformValueVoltageInitializer};
    use spsolve::rlu::RLU;
    use std::cell::RefCell;

    #[derive(Default)]
    struct NormRecorder {
        norms: RefCell<Vec<(usize, f64)>>,
        network_updates: RefCell<usize>,
    }

    impl AcLoadFlowObserver for NormRecorder {
        fn norm(&self, norm: f64, iteration: usize) {
            self.norms.borrow_mut().push((iteration, norm));
        }

        fn after_network_update(&self) {
            *self.network_updates.borrow_mut() += 1;
        }
    }

    #[test]
    fn test_two_bus() {
        let network = networks::two_bus();
        let mut lf = LfNetwork::create(&network, &FirstSlackBusSelector).unwrap();
        let mut system = EquationSystem::create(&lf).unwrap();
        let solver = RLU::default();
        let recorder = NormRecorder::default();
        let nr = NewtonRaphson::new(NewtonRaphsonParameters::default(), &solver, &recorder);

        let result = nr
            .run(&mut lf, &mut system, &UniformValueVoltageInitializer)
            .unwrap();
        assert_eq!(result.status, NewtonRaphsonStatus::Converged);
        assert_eq!(result.iterations, 3);
        assert!(result.slack_bus_active_power_mismatch.abs() < 1e-3);

        let norms = recorder.norms.borrow();
        assert_eq!(norms.len(), 4);
        assert!(norms.windows(2).all(|w| w[1].1 < w[0].1));
        assert_eq!(*recorder.network_updates.borrow(), 1);

        let b2 = lf.bus_by_id("b2").unwrap();
        assert!((b2.v - 0.855).abs() < 1e-3);
        assert!((b2.angle.to_degrees() + 13.521852).abs() < 1e-2);
    }

    #[test]
    fn test_restart_from_previous_values() {
        let network = networks::two_bus();
        let mut lf = LfNetwork::create(&network, &FirstSlackBusSelector).unwrap();
        let mut system = EquationSystem::create(&lf).unwrap();
        let solver = RLU::default();
        let nr = NewtonRaphson::new(
            NewtonRaphsonParameters::default(),
            &solver,
            &NoopAcLoadFlowObserver,
        );

        nr.run(&mut lf, &mut system, &UniformValueVoltageInitializer)
            .unwrap();
        let result = nr
            .run(&mut lf, &mut system, &PreviousValueVoltageInitializer)
            .unwrap();
        assert_eq!(result.status, NewtonRaphsonStatus::Converged);
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn test_max_iterations() {
        let network = networks::two_bus();
        let mut lf = LfNetwork::create(&network, &FirstSlackBusSelector).unwrap();
        let mut system = EquationSystem::create(&lf).unwrap();
        let solver = RLU::default();
        let parameters = NewtonRaphsonParameters {
            max_iterations: 1,
            ..Default::default()
        };
        let nr = NewtonRaphson::new(parameters, &solver, &NoopAcLoadFlowObserver);

        let result = nr
            .run(&mut lf, &mut system, &UniformValueVoltageInitializer)
            .unwrap();
        assert_eq!(result.status, NewtonRaphsonStatus::MaxIterationReached);
        assert_eq!(result.iterations, 1);
        assert!(lf.buses().iter().all(|b| b.v.is_nan() && b.angle.is_nan()));
        assert!(lf.branches().iter().all(|b| b.p1.is_nan()));
    }

    #[test]
    fn test_solver_failure() {
        let network = networks::two_bus();
        let mut lf = LfNetwork::create(&network, &FirstSlackBusSelector).unwrap();
        let mut system = EquationSystem::create(&lf).unwrap();
        let solver = RLU::default();
        let nr = NewtonRaphson::new(
            NewtonRaphsonParameters::default(),
            &solver,
            &NoopAcLoadFlowObserver,
        );

        // a collapsed load bus voltage makes the jacobian singular
        lf.buses_mut()[1].v = 0.0;
        lf.buses_mut()[1].angle = 0.0;
        let result = nr
            .run(&mut lf, &mut system, &PreviousValueVoltageInitializer)
            .unwrap();
        assert_eq!(result.status, NewtonRaphsonStatus::SolverFailed);
        assert_eq!(result.iterations, 0);
        assert!(result.slack_bus_active_power_mismatch.is_nan());
        assert!(lf.buses().iter().all(|b| b.v.is_nan()));
    }

    #[test]
    fn test_norm2() {
        assert_eq!(norm2(&[]), 0.0);
        assert!((norm2(&[3.0, 4.0]) - 5.0).abs() < 1e-15);
    }
}
