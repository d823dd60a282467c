use crate::network::ReactiveLimits;
use std::fmt;

/// Control mode of a snapshot bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusMode {
    /// Angle reference. Holds its voltage while it regulates.
    Slack { voltage_control: bool },
    /// Voltage magnitude held by a regulating source.
    Pv,
    /// Fixed active and reactive injection.
    Pq,
}

impl fmt::Display for BusMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusMode::Slack {
                voltage_control: true,
            } => write!(f, "SLACK(V)"),
            BusMode::Slack {
                voltage_control: false,
            } => write!(f, "SLACK"),
            BusMode::Pv => write!(f, "PV"),
            BusMode::Pq => write!(f, "PQ"),
        }
    }
}

/// Entry of the bus mode transition log.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeTransition {
    pub bus_id: String,
    pub from: BusMode,
    pub to: BusMode,
    pub reason: String,
}

/// Reactive capability of all regulating sources of a bus.
///
/// Each source diagram is evaluated at its share of the bus generation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReactiveDiagram {
    parts: Vec<(ReactiveLimits, f64)>,
}

impl ReactiveDiagram {
    /// `parts` holds the source limits (per-unit) with their share of the
    /// bus active generation.
    pub fn new(parts: Vec<(ReactiveLimits, f64)>) -> Self {
        Self { parts }
    }

    pub fn min_q(&self, p: f64) -> f64 {
        self.parts.iter().map(|(l, w)| l.min_q(p * w)).sum()
    }

    pub fn max_q(&self, p: f64) -> f64 {
        self.parts.iter().map(|(l, w)| l.max_q(p * w)).sum()
    }
}

/// Bus of the per-unit snapshot.
#[derive(Debug, Clone)]
pub struct LfBus {
    pub id: String,
    /// Position in the snapshot.
    pub num: usize,
    /// Nominal voltage (kV).
    pub nominal_v: f64,

    mode: BusMode,

    pub v: f64,
    pub angle: f64,

    /// Target voltage (pu), NaN when nothing regulates.
    pub target_v: f64,
    pub generation_target_p: f64,
    pub generation_target_q: f64,
    pub load_target_p: f64,
    pub load_target_q: f64,
    pub min_p: f64,
    pub max_p: f64,
    pub participation_factor: f64,
    pub reactive_diagram: Option<ReactiveDiagram>,

    /// Net injections computed from the last solved state.
    pub calculated_p: f64,
    pub calculated_q: f64,

    /// Indices of the external generators, VSC stations and loads.
    pub generators: Vec<usize>,
    pub vsc_stations: Vec<usize>,
    pub loads: Vec<usize>,
}

impl LfBus {
    pub fn new(id: &str, num: usize, nominal_v: f64) -> Self {
        Self {
            id: id.to_string(),
            num,
            nominal_v,
            mode: BusMode::Pq,
            v: f64::NAN,
            angle: f64::NAN,
            target_v: f64::NAN,
            generation_target_p: 0.0,
            generation_target_q: 0.0,
            load_target_p: 0.0,
            load_target_q: 0.0,
            min_p: 0.0,
            max_p: 0.0,
            participation_factor: 0.0,
            reactive_diagram: None,
            calculated_p: f64::NAN,
            calculated_q: f64::NAN,
            generators: Vec::default(),
            vsc_stations: Vec::default(),
            loads: Vec::default(),
        }
    }

    pub fn mode(&self) -> BusMode {
        self.mode
    }

    pub fn is_slack(&self) -> bool {
        matches!(self.mode, BusMode::Slack { .. })
    }

    pub fn has_voltage_control(&self) -> bool {
        matches!(
            self.mode,
            BusMode::Pv
                | BusMode::Slack {
                    voltage_control: true
                }
        )
    }

    /// Net active injection target (generation minus load).
    pub fn target_p(&self) -> f64 {
        self.generation_target_p - self.load_target_p
    }

    pub fn target_q(&self) -> f64 {
        self.generation_target_q - self.load_target_q
    }

    pub(crate) fn set_initial_mode(&mut self, mode: BusMode) {
        self.mode = mode;
    }

    /// Moves the bus to `to`, returning the log entry when the mode changed.
    pub fn switch_mode(&mut self, to: BusMode, reason: &str) -> Option<ModeTransition> {
        let from = self.mode;
        if from == to {
            return None;
        }
        self.mode = to;
        log::debug!("bus '{}' switched from {} to {}: {}", self.id, from, to, reason);
        Some(ModeTransition {
            bus_id: self.id.clone(),
            from,
            to,
            reason: reason.to_string(),
        })
    }

    /// Stops voltage regulation: PV becomes PQ and a regulating slack keeps
    /// only its angle reference role.
    pub fn deactivate_voltage_control(&mut self, reason: &str) -> Option<ModeTransition> {
        match self.mode {
            BusMode::Pv => self.switch_mode(BusMode::Pq, reason),
            BusMode::Slack {
                voltage_control: true,
            } => self.switch_mode(
                BusMode::Slack {
                    voltage_control: false,
                },
                reason,
            ),
            _ => None,
        }
    }

    pub(crate) fn reset_state(&mut self) {
        self.v = f64::NAN;
        self.angle = f64::NAN;
        self.calculated_p = f64::NAN;
        self.calculated_q = f64::NAN;
    }
}
