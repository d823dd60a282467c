use super::{assert_near, networks};
use crate::lf_bus::BusMode;
use crate::loadflow::run_ac;
use crate::network::{ReactiveCapabilityCurvePoint, ReactiveLimits};
use crate::params::{LoadFlowParameters, LoadFlowParametersBuilder};
use anyhow::Result;
use spsolve::rlu::RLU;

#[test]
fn test_distributed_slack() -> Result<()> {
    let mut network = networks::three_generators();
    let solver = RLU::default();

    let parameters = LoadFlowParametersBuilder::default()
        .distributed_slack(true)
        .build()?;
    let result = run_ac(&mut network, &parameters, &solver)?;
    assert!(result.converged);
    assert_eq!(result.macro_iterations, 2);
    assert!(result.slack_bus_active_power_mismatch.abs() < 1.0);

    for id in ["g1", "g2", "g3"] {
        assert_near(network.generator(id).unwrap().p, -20.0, 1e-2);
    }
    Ok(())
}

#[test]
fn test_distributed_slack_exhausted() -> Result<()> {
    let mut network = networks::three_generators();
    for gen in network.generators.iter_mut() {
        gen.max_p = 15.0;
    }
    let solver = RLU::default();
    run_ac(&mut network, &LoadFlowParameters::default(), &solver)?;
    assert!(!network.bus("bl").unwrap().v.is_nan());

    let parameters = LoadFlowParametersBuilder::default()
        .distributed_slack(true)
        .build()?;
    let err = run_ac(&mut network, &parameters, &solver).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Failed to distribute slack bus active power mismatch, 15.0 MW remains"
    );

    // values of the first run are not left behind
    assert!(network.bus("bl").unwrap().v.is_nan());
    assert!(network.generator("g1").unwrap().p.is_nan());
    assert!(network.line("l1").unwrap().p1.is_nan());
    Ok(())
}

#[test]
fn test_reactive_limits() -> Result<()> {
    let mut network = networks::two_bus();
    let mut gen = networks::generator("g2", "b2", 0.0, 1.0);
    gen.reactive_limits = Some(ReactiveLimits::MinMax {
        min_q: -0.5,
        max_q: 0.5,
    });
    network.generators.push(gen);
    let solver = RLU::default();

    let parameters = LoadFlowParametersBuilder::default()
        .reactive_limits(true)
        .build()?;
    let result = run_ac(&mut network, &parameters, &solver)?;
    assert!(result.converged);
    assert_eq!(result.macro_iterations, 2);
    assert_eq!(result.transitions.len(), 1);
    let transition = &result.transitions[0];
    assert_eq!(transition.bus_id, "b2");
    assert_eq!((transition.from, transition.to), (BusMode::Pv, BusMode::Pq));

    assert_near(network.generator("g2").unwrap().q, -0.5, 1e-2);
    assert!(network.bus("b2").unwrap().v < 1.0);
    Ok(())
}

#[test]
fn test_reactive_limits_min_q() -> Result<()> {
    let mut network = networks::two_bus();
    // held below the 0.855 kV it would reach unregulated, absorbing 0.35 MVar
    let mut gen = networks::generator("g2", "b2", 0.0, 0.8);
    gen.reactive_limits = Some(ReactiveLimits::MinMax {
        min_q: -0.2,
        max_q: 5.0,
    });
    network.generators.push(gen);
    let solver = RLU::default();

    let parameters = LoadFlowParametersBuilder::default()
        .reactive_limits(true)
        .build()?;
    let result = run_ac(&mut network, &parameters, &solver)?;
    assert!(result.converged);
    assert_eq!(result.macro_iterations, 2);
    assert_eq!(result.transitions.len(), 1);
    let transition = &result.transitions[0];
    assert_eq!((transition.from, transition.to), (BusMode::Pv, BusMode::Pq));
    assert!(transition.reason.contains("< minQ=-0.200"));

    assert_near(network.generator("g2").unwrap().q, 0.2, 1e-2);
    assert_near(network.bus("b2").unwrap().v, 0.82462, 1e-3);
    Ok(())
}

#[test]
fn test_reactive_limits_slack_bus() -> Result<()> {
    let mut network = networks::two_bus();
    // 1.687 MVar needed to hold 1 kV
    network.generators[0].reactive_limits = Some(ReactiveLimits::MinMax {
        min_q: -5.0,
        max_q: 1.5,
    });
    let solver = RLU::default();

    let parameters = LoadFlowParametersBuilder::default()
        .reactive_limits(true)
        .build()?;
    let result = run_ac(&mut network, &parameters, &solver)?;
    assert!(result.converged);
    assert_eq!(result.macro_iterations, 2);
    assert_eq!(result.transitions.len(), 1);
    let transition = &result.transitions[0];
    assert_eq!(transition.bus_id, "b1");
    assert_eq!(
        (transition.from, transition.to),
        (
            BusMode::Slack {
                voltage_control: true
            },
            BusMode::Slack {
                voltage_control: false
            }
        )
    );

    // less reactive supply means less current, so higher voltages
    let g1 = network.generator("g1").unwrap();
    assert_near(g1.q, -1.5, 1e-2);
    assert_near(g1.p, -2.0, 1e-2);
    assert_near(network.bus("b1").unwrap().v, 1.11803, 1e-3);
    assert_near(network.bus("b1").unwrap().angle, 0.0, 1e-12);
    assert_near(network.bus("b2").unwrap().v, 1.0, 1e-3);
    Ok(())
}

#[test]
fn test_reactive_capability_curve() -> Result<()> {
    let mut network = networks::two_bus();
    // 1.05 MVar needed to hold 1 kV, within the 1.6 MVar of the curve at
    // 0 MW but beyond the 0.8 MVar at 1 MW
    let mut gen = networks::generator("g2", "b2", 1.0, 1.0);
    gen.reactive_limits = Some(ReactiveLimits::Curve {
        points: vec![
            ReactiveCapabilityCurvePoint {
                p: 2.0,
                min_q: -1.6,
                max_q: 0.0,
            },
            ReactiveCapabilityCurvePoint {
                p: 0.0,
                min_q: -1.6,
                max_q: 1.6,
            },
        ],
    });
    network.generators.push(gen);
    let solver = RLU::default();

    let parameters = LoadFlowParametersBuilder::default()
        .reactive_limits(true)
        .build()?;
    let result = run_ac(&mut network, &parameters, &solver)?;
    assert!(result.converged);
    assert_eq!(result.macro_iterations, 2);
    assert_eq!(result.transitions.len(), 1);
    assert_eq!(result.transitions[0].bus_id, "b2");
    assert!(result.transitions[0].reason.contains("> maxQ=0.800"));

    let g2 = network.generator("g2").unwrap();
    assert_near(g2.q, -0.8, 1e-2);
    assert_near(g2.p, -1.0, 1e-9);
    assert_near(network.bus("b2").unwrap().v, 0.97419, 1e-3);
    Ok(())
}

#[test]
fn test_reactive_limits_then_distributed_slack() -> Result<()> {
    let mut network = networks::three_generators();
    network.generators[1].reactive_limits = Some(ReactiveLimits::MinMax {
        min_q: -1.0,
        max_q: 1.0,
    });
    let solver = RLU::default();

    let parameters = LoadFlowParametersBuilder::default()
        .reactive_limits(true)
        .distributed_slack(true)
        .build()?;
    let result = run_ac(&mut network, &parameters, &solver)?;
    assert!(result.converged);
    assert_eq!(result.macro_iterations, 3);
    assert_eq!(result.transitions.len(), 1);
    assert_eq!(result.transitions[0].bus_id, "b2");

    assert_near(network.generator("g2").unwrap().q, -1.0, 1e-2);
    for id in ["g1", "g2", "g3"] {
        assert_near(network.generator(id).unwrap().p, -20.0, 1e-2);
    }
    Ok(())
}
