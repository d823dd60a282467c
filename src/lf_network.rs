use crate::lf_branch::{BranchConnection, BranchSource, LfBranch, PiModel};
use crate::lf_bus::{BusMode, LfBus, ModeTransition, ReactiveDiagram};
use crate::network::{ConvertersMode, Line, Network, ReactiveLimits, TwoWindingsTransformer};
use crate::slack::SlackBusSelector;
use anyhow::{bail, format_err, Result};
use petgraph::unionfind::UnionFind;
use std::collections::{HashMap, HashSet};

/// Base power (MVA) of the per-unit system.
pub const SB: f64 = 100.0;

const TARGET_V_EPSILON: f64 = 1e-8;

/// Per-unit computation view of the main connected component of a network.
#[derive(Debug, Clone)]
pub struct LfNetwork {
    buses: Vec<LfBus>,
    branches: Vec<LfBranch>,
    slack_bus: usize,

    /// External bus index of each snapshot bus.
    bus_index: Vec<usize>,
    /// Generation target (pu) of each bus as built.
    initial_generation_target_p: Vec<f64>,
    /// VSC station index and its active target (MW).
    vsc_targets: Vec<(usize, f64)>,

    transitions: Vec<ModeTransition>,
}

struct Endpoints {
    bus1: Option<usize>,
    bus2: Option<usize>,
}

impl LfNetwork {
    pub fn create(network: &Network, selector: &dyn SlackBusSelector) -> Result<Self> {
        let ids: HashMap<&str, usize> = network
            .buses
            .iter()
            .enumerate()
            .map(|(i, b)| (b.id.as_str(), i))
            .collect();
        let find_bus = |id: &str, element: &str| -> Result<usize> {
            ids.get(id)
                .copied()
                .ok_or_else(|| format_err!("bus '{}' of '{}' not found", id, element))
        };

        let mut endpoints = Vec::with_capacity(network.lines.len());
        for line in &network.lines {
            let bus1 = find_bus(line.bus1.as_str(), line.id.as_str())?;
            let bus2 = find_bus(line.bus2.as_str(), line.id.as_str())?;
            endpoints.push(Endpoints {
                bus1: Some(bus1).filter(|_| line.connected1),
                bus2: Some(bus2).filter(|_| line.connected2),
            });
        }
        for tr in &network.two_windings_transformers {
            let bus1 = find_bus(tr.bus1.as_str(), tr.id.as_str())?;
            let bus2 = find_bus(tr.bus2.as_str(), tr.id.as_str())?;
            endpoints.push(Endpoints {
                bus1: Some(bus1).filter(|_| tr.connected1),
                bus2: Some(bus2).filter(|_| tr.connected2),
            });
        }

        let component = main_component(network.buses.len(), &endpoints);
        if component.is_empty() {
            bail!("network '{}' has no bus", network.id);
        }

        let mut num: Vec<Option<usize>> = vec![None; network.buses.len()];
        let mut buses = Vec::with_capacity(component.len());
        for (n, &i) in component.iter().enumerate() {
            let bus = &network.buses[i];
            num[i] = Some(n);
            let mut lf_bus = LfBus::new(&bus.id, n, bus.nominal_v);
            lf_bus.v = bus.v / bus.nominal_v;
            lf_bus.angle = bus.angle.to_radians();
            buses.push(lf_bus);
        }
        let in_main = |id: &str| ids.get(id).and_then(|&i| num[i]);

        for sc in &network.shunt_compensators {
            if sc.connected && in_main(sc.bus.as_str()).is_some() {
                bail!("shunt compensator '{}' is not supported", sc.id);
            }
        }
        for dl in &network.dangling_lines {
            if dl.connected && in_main(dl.bus.as_str()).is_some() {
                bail!("dangling line '{}' is not supported", dl.id);
            }
        }
        for tr in &network.three_windings_transformers {
            if [&tr.bus1, &tr.bus2, &tr.bus3]
                .iter()
                .any(|id| in_main(id.as_str()).is_some())
            {
                bail!("three windings transformer '{}' is not supported", tr.id);
            }
        }

        // regulating source limits (pu) with their active target, per bus
        let mut diagrams: Vec<Vec<(Option<ReactiveLimits>, f64)>> =
            vec![Vec::new(); buses.len()];

        for (i, gen) in network.generators.iter().enumerate() {
            let n = match in_main(gen.bus.as_str()) {
                Some(n) if gen.connected => n,
                _ => continue,
            };
            let bus = &mut buses[n];
            bus.generators.push(i);
            bus.generation_target_p += gen.target_p / SB;
            bus.min_p += gen.min_p / SB;
            bus.max_p += gen.max_p / SB;
            bus.participation_factor += gen.participation_factor();
            if gen.voltage_regulator_on {
                set_target_v(bus, gen.target_v, &gen.id)?;
                diagrams[n].push((
                    gen.reactive_limits.as_ref().map(|l| l.scaled(SB)),
                    gen.target_p / SB,
                ));
            } else {
                bus.generation_target_q += gen.target_q / SB;
            }
        }

        let mut vsc_targets = Vec::new();
        for (i, station) in network.vsc_converter_stations.iter().enumerate() {
            let n = match in_main(station.bus.as_str()) {
                Some(n) if station.connected => n,
                _ => continue,
            };
            let (target_p, max_p) = vsc_target_p(network, i)?;
            vsc_targets.push((i, target_p));

            let bus = &mut buses[n];
            bus.vsc_stations.push(i);
            bus.generation_target_p += target_p / SB;
            bus.min_p -= max_p / SB;
            bus.max_p += max_p / SB;
            if station.voltage_regulator_on {
                set_target_v(bus, station.voltage_setpoint, &station.id)?;
                diagrams[n].push((
                    station.reactive_limits.as_ref().map(|l| l.scaled(SB)),
                    target_p / SB,
                ));
            } else {
                bus.generation_target_q += station.reactive_power_setpoint / SB;
            }
        }

        for (i, load) in network.loads.iter().enumerate() {
            let n = match in_main(load.bus.as_str()) {
                Some(n) if load.connected => n,
                _ => continue,
            };
            let bus = &mut buses[n];
            bus.loads.push(i);
            bus.load_target_p += load.p0 / SB;
            bus.load_target_q += load.q0 / SB;
        }

        for (bus, parts) in buses.iter_mut().zip(diagrams) {
            bus.reactive_diagram = reactive_diagram(parts);
        }

        if buses.iter().all(|b| b.target_v.is_nan()) {
            bail!("connected component without any voltage regulating source");
        }

        let mut branches = Vec::new();
        let mut neighbours: Vec<HashSet<usize>> = vec![HashSet::new(); buses.len()];
        let sources = (0..network.lines.len())
            .map(BranchSource::Line)
            .chain((0..network.two_windings_transformers.len()).map(BranchSource::Transformer));
        for (source, ends) in sources.zip(&endpoints) {
            let bus1 = ends.bus1.and_then(|i| num[i]);
            let bus2 = ends.bus2.and_then(|i| num[i]);
            let connection = match (bus1, bus2) {
                (Some(bus1), Some(bus2)) => {
                    neighbours[bus1].insert(bus2);
                    neighbours[bus2].insert(bus1);
                    BranchConnection::Closed { bus1, bus2 }
                }
                (Some(bus1), None) => BranchConnection::OpenSide2 { bus1 },
                (None, Some(bus2)) => BranchConnection::OpenSide1 { bus2 },
                (None, None) => continue,
            };
            let (id, pi) = match source {
                BranchSource::Line(i) => {
                    let line = &network.lines[i];
                    let (nv1, nv2) = nominal_voltages(network, &ids, &line.bus1, &line.bus2);
                    (&line.id, line_pi_model(line, nv1, nv2))
                }
                BranchSource::Transformer(i) => {
                    let tr = &network.two_windings_transformers[i];
                    let (nv1, nv2) = nominal_voltages(network, &ids, &tr.bus1, &tr.bus2);
                    (&tr.id, transformer_pi_model(tr, nv1, nv2)?)
                }
            };
            let branch_num = branches.len();
            branches.push(LfBranch::new(id, branch_num, source, connection, pi));
        }

        let neighbours: Vec<usize> = neighbours.iter().map(|n| n.len()).collect();
        let slack_bus = selector.select(&buses, &neighbours)?;
        for bus in buses.iter_mut() {
            let mode = if bus.num == slack_bus {
                BusMode::Slack {
                    voltage_control: !bus.target_v.is_nan(),
                }
            } else if !bus.target_v.is_nan() {
                BusMode::Pv
            } else {
                BusMode::Pq
            };
            bus.set_initial_mode(mode);
        }

        log::info!(
            "network '{}': {} buses, {} branches, slack bus '{}'",
            network.id,
            buses.len(),
            branches.len(),
            buses[slack_bus].id
        );

        Ok(Self {
            initial_generation_target_p: buses.iter().map(|b| b.generation_target_p).collect(),
            bus_index: component,
            buses,
            branches,
            slack_bus,
            vsc_targets,
            transitions: Vec::default(),
        })
    }

    pub fn buses(&self) -> &[LfBus] {
        &self.buses
    }

    pub fn buses_mut(&mut self) -> &mut [LfBus] {
        &mut self.buses
    }

    pub fn bus(&self, num: usize) -> &LfBus {
        &self.buses[num]
    }

    pub fn bus_by_id(&self, id: &str) -> Option<&LfBus> {
        self.buses.iter().find(|b| b.id == id)
    }

    pub fn branches(&self) -> &[LfBranch] {
        &self.branches
    }

    pub fn branches_mut(&mut self) -> &mut [LfBranch] {
        &mut self.branches
    }

    pub fn branch_by_id(&self, id: &str) -> Option<&LfBranch> {
        self.branches.iter().find(|b| b.id == id)
    }

    pub fn slack_bus(&self) -> &LfBus {
        &self.buses[self.slack_bus]
    }

    pub fn slack_bus_num(&self) -> usize {
        self.slack_bus
    }

    /// Bus mode changes applied since the snapshot was built.
    pub fn transitions(&self) -> &[ModeTransition] {
        &self.transitions
    }

    pub fn record_transition(&mut self, transition: Option<ModeTransition>) {
        if let Some(t) = transition {
            self.transitions.push(t);
        }
    }

    /// Marks the whole snapshot state as unset.
    pub fn reset_state(&mut self) {
        self.buses.iter_mut().for_each(|b| b.reset_state());
        self.branches.iter_mut().for_each(|b| b.reset_state());
    }

    /// Writes the snapshot state to the terminals of `network` in physical
    /// units.
    pub fn write_to_network(&self, network: &mut Network) {
        for bus in &self.buses {
            let ext = &mut network.buses[self.bus_index[bus.num]];
            ext.v = bus.v * bus.nominal_v;
            ext.angle = bus.angle.to_degrees();
        }

        for branch in &self.branches {
            let (p1, q1, p2, q2) = (
                branch.p1 * SB,
                branch.q1 * SB,
                branch.p2 * SB,
                branch.q2 * SB,
            );
            match branch.source {
                BranchSource::Line(i) => {
                    let line = &mut network.lines[i];
                    (line.p1, line.q1, line.p2, line.q2) = (p1, q1, p2, q2);
                }
                BranchSource::Transformer(i) => {
                    let tr = &mut network.two_windings_transformers[i];
                    (tr.p1, tr.q1, tr.p2, tr.q2) = (p1, q1, p2, q2);
                }
            }
        }

        for bus in &self.buses {
            self.write_sources(bus, network);
            for &i in &bus.loads {
                let load = &mut network.loads[i];
                load.p = load.p0;
                load.q = load.q0;
            }
        }
    }

    fn write_sources(&self, bus: &LfBus, network: &mut Network) {
        let generation_p = if bus.num == self.slack_bus {
            bus.calculated_p + bus.load_target_p
        } else {
            bus.generation_target_p
        };
        let delta_p = (generation_p - self.initial_generation_target_p[bus.num]) * SB;

        let generation_q = (bus.calculated_q + bus.load_target_q) * SB;
        let mut regulating = 0;
        let mut fixed_q = 0.0;
        for &i in &bus.generators {
            let gen = &network.generators[i];
            if gen.voltage_regulator_on {
                regulating += 1;
            } else {
                fixed_q += gen.target_q;
            }
        }
        for &i in &bus.vsc_stations {
            let station = &network.vsc_converter_stations[i];
            if station.voltage_regulator_on {
                regulating += 1;
            } else {
                fixed_q += station.reactive_power_setpoint;
            }
        }
        let regulating_q = if regulating > 0 {
            (generation_q - fixed_q) / regulating as f64
        } else {
            0.0
        };

        let total_factor = bus.participation_factor;
        let n_gens = bus.generators.len() as f64;
        for &i in &bus.generators {
            let gen = &mut network.generators[i];
            let share = if total_factor > 0.0 {
                gen.participation_factor() / total_factor
            } else {
                1.0 / n_gens
            };
            gen.p = -(gen.target_p + delta_p * share);
            gen.q = if gen.voltage_regulator_on {
                -regulating_q
            } else {
                -gen.target_q
            };
        }
        for &i in &bus.vsc_stations {
            let target_p = self
                .vsc_targets
                .iter()
                .find(|(s, _)| *s == i)
                .map_or(0.0, |(_, p)| *p);
            let station = &mut network.vsc_converter_stations[i];
            // the slack share goes to generators first
            station.p = if bus.generators.is_empty() {
                -(target_p + delta_p / bus.vsc_stations.len() as f64)
            } else {
                -target_p
            };
            station.q = if station.voltage_regulator_on {
                -regulating_q
            } else {
                -station.reactive_power_setpoint
            };
        }
    }

    /// Marks the terminals of the main component of `network` as unset.
    pub fn reset_network(&self, network: &mut Network) {
        for bus in &self.buses {
            let ext = &mut network.buses[self.bus_index[bus.num]];
            ext.v = f64::NAN;
            ext.angle = f64::NAN;
            for &i in &bus.generators {
                let gen = &mut network.generators[i];
                (gen.p, gen.q) = (f64::NAN, f64::NAN);
            }
            for &i in &bus.vsc_stations {
                let station = &mut network.vsc_converter_stations[i];
                (station.p, station.q) = (f64::NAN, f64::NAN);
            }
            for &i in &bus.loads {
                let load = &mut network.loads[i];
                (load.p, load.q) = (f64::NAN, f64::NAN);
            }
        }
        for branch in &self.branches {
            match branch.source {
                BranchSource::Line(i) => {
                    let line = &mut network.lines[i];
                    (line.p1, line.q1) = (f64::NAN, f64::NAN);
                    (line.p2, line.q2) = (f64::NAN, f64::NAN);
                }
                BranchSource::Transformer(i) => {
                    let tr = &mut network.two_windings_transformers[i];
                    (tr.p1, tr.q1, tr.p2, tr.q2) = (f64::NAN, f64::NAN, f64::NAN, f64::NAN);
                }
            }
        }
    }
}

/// Buses (external indices, in network order) of the largest set connected
/// by branches closed at both ends.
fn main_component(n: usize, endpoints: &[Endpoints]) -> Vec<usize> {
    let mut uf = UnionFind::<usize>::new(n);
    for ends in endpoints {
        if let (Some(bus1), Some(bus2)) = (ends.bus1, ends.bus2) {
            uf.union(bus1, bus2);
        }
    }
    let labels = uf.into_labeling();

    let mut sizes: HashMap<usize, usize> = HashMap::new();
    for &label in &labels {
        *sizes.entry(label).or_insert(0) += 1;
    }
    let mut main: Option<(usize, usize)> = None;
    for &label in &labels {
        let size = sizes[&label];
        if main.map_or(true, |(_, s)| size > s) {
            main = Some((label, size));
        }
    }
    match main {
        Some((main, _)) => (0..n).filter(|&i| labels[i] == main).collect(),
        None => Vec::default(),
    }
}

fn set_target_v(bus: &mut LfBus, target_v: f64, source: &str) -> Result<()> {
    if !target_v.is_finite() || target_v <= 0.0 {
        bail!("invalid target voltage {} kV of '{}'", target_v, source);
    }
    let target_v = target_v / bus.nominal_v;
    if !bus.target_v.is_nan() && (bus.target_v - target_v).abs() > TARGET_V_EPSILON {
        bail!(
            "multiple voltage regulating sources connected to bus '{}' with different target voltages ({} and {} kV)",
            bus.id,
            bus.target_v * bus.nominal_v,
            target_v * bus.nominal_v
        );
    }
    bus.target_v = target_v;
    Ok(())
}

fn reactive_diagram(parts: Vec<(Option<ReactiveLimits>, f64)>) -> Option<ReactiveDiagram> {
    if parts.is_empty() {
        return None;
    }
    let total_p: f64 = parts.iter().map(|(_, p)| p).sum();
    let n = parts.len() as f64;
    let mut weighted = Vec::with_capacity(parts.len());
    for (limits, p) in parts {
        // a source without limits leaves the bus unbounded
        let limits = limits?;
        let weight = if total_p != 0.0 { p / total_p } else { 1.0 / n };
        weighted.push((limits, weight));
    }
    Some(ReactiveDiagram::new(weighted))
}

/// Active target (MW, generator convention) and limit of a VSC station.
fn vsc_target_p(network: &Network, station: usize) -> Result<(f64, f64)> {
    let id = &network.vsc_converter_stations[station].id;
    let hvdc = network
        .hvdc_lines
        .iter()
        .find(|h| &h.converter_station1 == id || &h.converter_station2 == id)
        .ok_or_else(|| format_err!("converter station '{}' is not linked to an HVDC line", id))?;

    let rectifier = match hvdc.converters_mode {
        ConvertersMode::Side1RectifierSide2Inverter => &hvdc.converter_station1 == id,
        ConvertersMode::Side1InverterSide2Rectifier => &hvdc.converter_station2 == id,
    };
    let target_p = if rectifier {
        -hvdc.active_power_setpoint
    } else {
        hvdc.active_power_setpoint
    };
    Ok((target_p, hvdc.max_p))
}

fn nominal_voltages(
    network: &Network,
    ids: &HashMap<&str, usize>,
    bus1: &str,
    bus2: &str,
) -> (f64, f64) {
    let nominal_v = |id: &str| ids.get(id).map_or(f64::NAN, |&i| network.buses[i].nominal_v);
    (nominal_v(bus1), nominal_v(bus2))
}

fn line_pi_model(line: &Line, nominal_v1: f64, nominal_v2: f64) -> PiModel {
    let zb = nominal_v2 * nominal_v2 / SB;
    PiModel::new(line.r / zb, line.x / zb)
        .with_shunts(line.g1 * zb, line.b1 * zb, line.g2 * zb, line.b2 * zb)
        .with_ratio(nominal_v1 / nominal_v2, 0.0)
}

fn transformer_pi_model(
    tr: &TwoWindingsTransformer,
    nominal_v1: f64,
    nominal_v2: f64,
) -> Result<PiModel> {
    // rho, alpha and r, x, g, b corrections (%) of the current steps
    let mut rho = 1.0;
    let mut alpha = 0.0;
    let mut corrections = [1.0; 4];
    if let Some(rtc) = &tr.ratio_tap_changer {
        let step = rtc.current_step().ok_or_else(|| {
            format_err!(
                "tap position {} of ratio tap changer of '{}' is out of range",
                rtc.tap_position,
                tr.id
            )
        })?;
        rho *= step.rho;
        for (c, v) in corrections.iter_mut().zip([step.r, step.x, step.g, step.b]) {
            *c *= 1.0 + v / 100.0;
        }
    }
    if let Some(ptc) = &tr.phase_tap_changer {
        let step = ptc.current_step().ok_or_else(|| {
            format_err!(
                "tap position {} of phase tap changer of '{}' is out of range",
                ptc.tap_position,
                tr.id
            )
        })?;
        rho *= step.rho;
        alpha += step.alpha;
        for (c, v) in corrections.iter_mut().zip([step.r, step.x, step.g, step.b]) {
            *c *= 1.0 + v / 100.0;
        }
    }
    let [cr, cx, cg, cb] = corrections;

    let zb = nominal_v2 * nominal_v2 / SB;
    let ratio = rho * tr.rated_u2 / tr.rated_u1 * nominal_v1 / nominal_v2;
    Ok(PiModel::new(tr.r * cr / zb, tr.x * cx / zb)
        .with_shunts(tr.g * cg * zb, tr.b * cb * zb, 0.0, 0.0)
        .with_ratio(ratio, alpha.to_radians()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{
        PhaseTapChanger, PhaseTapChangerStep, RatioTapChanger, RatioTapChangerStep,
    };
    use crate::slack::FirstSlackBusSelector;
    use crate::tests::networks;

    #[test]
    fn test_two_bus_snapshot() {
        let network = networks::two_bus();
        let lf = LfNetwork::create(&network, &FirstSlackBusSelector).unwrap();

        assert_eq!(lf.buses().len(), 2);
        assert_eq!(lf.branches().len(), 1);
        assert_eq!(lf.slack_bus().id, "b1");
        assert_eq!(
            lf.slack_bus().mode(),
            BusMode::Slack {
                voltage_control: true
            }
        );
        let b2 = lf.bus_by_id("b2").unwrap();
        assert_eq!(b2.mode(), BusMode::Pq);
        assert!((b2.target_p() + 0.02).abs() < 1e-12);
        assert!((b2.target_q() + 0.01).abs() < 1e-12);

        // 0.1 ohm on a 1 kV, 100 MVA base
        let pi = lf.branches()[0].pi;
        assert!((pi.x - 10.0).abs() < 1e-9);
        assert!((pi.r1 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_islands_are_excluded() {
        let mut network = networks::two_bus();
        network.buses.push(networks::bus("island", 1.0));
        network.loads.push(networks::load("island-load", "island", 1.0, 0.0));

        let lf = LfNetwork::create(&network, &FirstSlackBusSelector).unwrap();
        assert_eq!(lf.buses().len(), 2);
        assert!(lf.bus_by_id("island").is_none());
    }

    #[test]
    fn test_open_branch() {
        let mut network = networks::two_bus();
        network.lines.push(Line {
            connected2: false,
            ..networks::line("l12-open", "b1", "b2", 0.0, 0.1)
        });

        let lf = LfNetwork::create(&network, &FirstSlackBusSelector).unwrap();
        let open = lf.branch_by_id("l12-open").unwrap();
        assert_eq!(open.connection, BranchConnection::OpenSide2 { bus1: 0 });
        assert_eq!(open.bus2(), None);
    }

    #[test]
    fn test_unsupported_elements() {
        let mut network = networks::two_bus();
        network.shunt_compensators.push(crate::network::ShuntCompensator {
            id: "sc".to_string(),
            bus: "b2".to_string(),
            connected: true,
            b: 1e-3,
        });
        let err = LfNetwork::create(&network, &FirstSlackBusSelector).unwrap_err();
        assert!(err.to_string().contains("not supported"));

        let mut network = networks::two_bus();
        network.dangling_lines.push(crate::network::DanglingLine {
            id: "dl".to_string(),
            bus: "b1".to_string(),
            connected: true,
        });
        assert!(LfNetwork::create(&network, &FirstSlackBusSelector).is_err());
    }

    #[test]
    fn test_conflicting_target_v() {
        let mut network = networks::two_bus();
        network
            .generators
            .push(networks::generator("g2", "b1", 0.0, 1.05));

        let err = LfNetwork::create(&network, &FirstSlackBusSelector).unwrap_err();
        assert!(err.to_string().contains("different target voltages"));

        // same target is accepted
        network.generators[1].target_v = 1.0;
        assert!(LfNetwork::create(&network, &FirstSlackBusSelector).is_ok());
    }

    #[test]
    fn test_no_regulating_source() {
        let mut network = networks::two_bus();
        network.generators[0].voltage_regulator_on = false;
        let err = LfNetwork::create(&network, &FirstSlackBusSelector).unwrap_err();
        assert!(err.to_string().contains("without any voltage regulating source"));
    }

    #[test]
    fn test_transformer_tap_corrections() {
        let mut tr = networks::transformer("t", "b1", "b2", 1.0, 10.0, 400.0, 400.0);
        let base = transformer_pi_model(&tr, 400.0, 400.0).unwrap();
        assert!((base.r1 - 1.0).abs() < 1e-12);

        tr.ratio_tap_changer = Some(RatioTapChanger {
            low_tap: 0,
            tap_position: 1,
            steps: vec![
                RatioTapChangerStep {
                    rho: 0.9,
                    ..Default::default()
                },
                RatioTapChangerStep {
                    rho: 1.1,
                    r: 10.0,
                    x: -10.0,
                    g: 0.0,
                    b: 0.0,
                },
            ],
        });
        tr.phase_tap_changer = Some(PhaseTapChanger {
            low_tap: 0,
            tap_position: 0,
            steps: vec![PhaseTapChangerStep {
                rho: 1.0,
                alpha: 30.0,
                ..Default::default()
            }],
        });
        let pi = transformer_pi_model(&tr, 400.0, 400.0).unwrap();
        assert!((pi.r - base.r * 1.1).abs() < 1e-12);
        assert!((pi.x - base.x * 0.9).abs() < 1e-12);
        assert!((pi.r1 - 1.1).abs() < 1e-12);
        assert!((pi.a1 - 30f64.to_radians()).abs() < 1e-12);

        tr.phase_tap_changer = Some(PhaseTapChanger {
            low_tap: 0,
            tap_position: 3,
            steps: vec![PhaseTapChangerStep::default()],
        });
        assert!(transformer_pi_model(&tr, 400.0, 400.0).is_err());
    }

    #[test]
    fn test_transformer_ratio_per_unit() {
        let tr = networks::transformer("t", "b1", "b2", 0.0, 1.0, 24.0, 400.0);
        let pi = transformer_pi_model(&tr, 24.0, 380.0).unwrap();
        assert!((pi.r1 - 400.0 / 380.0).abs() < 1e-12);
    }
}
