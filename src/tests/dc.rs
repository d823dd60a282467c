use super::{assert_near, networks};
use crate::loadflow::run_dc;
use crate::params::LoadFlowParameters;
use anyhow::Result;
use spsolve::rlu::RLU;

#[test]
fn test_three_generators() -> Result<()> {
    let mut network = networks::three_generators();
    let solver = RLU::default();

    let result = run_dc(&mut network, &LoadFlowParameters::default(), &solver)?;
    assert!(result.ok);
    assert_near(result.slack_bus_active_power_mismatch, 30.0, 1e-9);

    // 0.4 pu over x = 0.1 pu
    assert_near(network.bus("bl").unwrap().angle, (-0.04f64).to_degrees(), 1e-9);
    for bus in &network.buses {
        assert_eq!(bus.v, 100.0);
    }
    let l1 = network.line("l1").unwrap();
    assert_near(l1.p1, 40.0, 1e-9);
    assert_near(l1.p2, -40.0, 1e-9);
    assert!(l1.q1.is_nan() && l1.q2.is_nan());
    assert_near(network.line("l2").unwrap().p1, 10.0, 1e-9);
    assert_near(network.generator("g1").unwrap().p, -40.0, 1e-9);
    Ok(())
}

#[test]
fn test_open_branch() -> Result<()> {
    let mut network = networks::eurostag();
    network.lines[0].connected2 = false;
    let solver = RLU::default();

    let result = run_dc(&mut network, &LoadFlowParameters::default(), &solver)?;
    assert!(result.ok);
    // lossless: the generator covers the load exactly
    assert_near(result.slack_bus_active_power_mismatch, -7.0, 1e-9);
    let open = network.line("NHV1_NHV2_1").unwrap();
    assert_eq!(open.p1, 0.0);
    assert!(open.p2.is_nan());
    assert_near(network.line("NHV1_NHV2_2").unwrap().p1, 600.0, 1e-9);
    Ok(())
}
