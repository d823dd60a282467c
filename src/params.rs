use crate::newton::NewtonRaphsonParameters;
use crate::slack::SlackBusSelectionMode;
use crate::voltage_init::{
    PreviousValueVoltageInitializer, UniformValueVoltageInitializer, VoltageInitializer,
};
use clap::ValueEnum;
use derive_builder::Builder;

#[derive(Debug, PartialEq, Copy, Clone, Default, ValueEnum)]
pub enum VoltageInitMode {
    /// Flat start.
    #[default]
    Uniform,
    /// Voltages currently held by the network.
    PreviousValues,
}

impl VoltageInitMode {
    pub fn initializer(&self) -> Box<dyn VoltageInitializer> {
        match self {
            VoltageInitMode::Uniform => Box::new(UniformValueVoltageInitializer),
            VoltageInitMode::PreviousValues => Box::new(PreviousValueVoltageInitializer),
        }
    }
}

#[derive(Debug, Clone, Builder)]
#[builder(default, build_fn(validate = "Self::validate"))]
pub struct LoadFlowParameters {
    /// Newton-Raphson iteration limit of each solve.
    pub max_iterations: usize,
    /// Convergence threshold on the residual 2-norm (pu).
    pub epsilon: f64,
    pub slack_bus_selection: SlackBusSelectionMode,
    #[builder(setter(into, strip_option))]
    pub slack_bus_id: Option<String>,
    pub distributed_slack: bool,
    pub reactive_limits: bool,
    pub voltage_init_mode: VoltageInitMode,
    /// Limit on the solves triggered by macro actions.
    pub max_macro_iterations: usize,
}

impl Default for LoadFlowParameters {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            epsilon: 1e-4,
            slack_bus_selection: SlackBusSelectionMode::default(),
            slack_bus_id: None,
            distributed_slack: false,
            reactive_limits: false,
            voltage_init_mode: VoltageInitMode::default(),
            max_macro_iterations: 20,
        }
    }
}

impl LoadFlowParameters {
    pub fn newton_raphson(&self) -> NewtonRaphsonParameters {
        NewtonRaphsonParameters {
            max_iterations: self.max_iterations,
            epsilon: self.epsilon,
        }
    }
}

impl LoadFlowParametersBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(epsilon) = self.epsilon {
            if !(epsilon > 0.0) {
                return Err(format!("epsilon ({}) must be positive", epsilon));
            }
        }
        if self.slack_bus_selection == Some(SlackBusSelectionMode::Name)
            && !matches!(self.slack_bus_id, Some(Some(_)))
        {
            return Err("slack bus selection by name requires a slack bus id".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = LoadFlowParametersBuilder::default().build().unwrap();
        assert_eq!(params.max_iterations, 30);
        assert_eq!(params.epsilon, 1e-4);
        assert_eq!(params.max_macro_iterations, 20);
        assert_eq!(params.slack_bus_selection, SlackBusSelectionMode::First);
        assert_eq!(params.voltage_init_mode, VoltageInitMode::Uniform);
        assert!(!params.distributed_slack);
        assert!(!params.reactive_limits);
        assert!(params.slack_bus_id.is_none());
    }

    #[test]
    fn test_validation() {
        let err = LoadFlowParametersBuilder::default()
            .epsilon(0.0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("must be positive"));

        assert!(LoadFlowParametersBuilder::default()
            .slack_bus_selection(SlackBusSelectionMode::Name)
            .build()
            .is_err());

        let params = LoadFlowParametersBuilder::default()
            .slack_bus_selection(SlackBusSelectionMode::Name)
            .slack_bus_id("b2")
            .distributed_slack(true)
            .build()
            .unwrap();
        assert_eq!(params.slack_bus_id.as_deref(), Some("b2"));
        assert!(params.distributed_slack);
    }
}
