use anyhow::{format_err, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

fn unset() -> f64 {
    f64::NAN
}

fn connected() -> bool {
    true
}

// State values are written as `null` by serde_json when NaN.
fn nan_if_null<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

/// Grid model consumed by the load flow.
///
/// Electrical parameters are physical values (kV, ohm, siemens, MW, MVAr,
/// degrees). Terminal state (`v`, `angle`, `p`, `q`, ...) is written back by the
/// solver using the load sign convention.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Network {
    pub id: String,
    pub buses: Vec<Bus>,
    pub lines: Vec<Line>,
    pub two_windings_transformers: Vec<TwoWindingsTransformer>,
    pub generators: Vec<Generator>,
    pub loads: Vec<Load>,
    pub shunt_compensators: Vec<ShuntCompensator>,
    pub three_windings_transformers: Vec<ThreeWindingsTransformer>,
    pub dangling_lines: Vec<DanglingLine>,
    pub vsc_converter_stations: Vec<VscConverterStation>,
    pub hvdc_lines: Vec<HvdcLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bus {
    pub id: String,
    /// Nominal voltage (kV).
    pub nominal_v: f64,
    #[serde(default = "unset", deserialize_with = "nan_if_null")]
    pub v: f64,
    #[serde(default = "unset", deserialize_with = "nan_if_null")]
    pub angle: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Line {
    pub id: String,
    pub bus1: String,
    pub bus2: String,
    #[serde(default = "connected")]
    pub connected1: bool,
    #[serde(default = "connected")]
    pub connected2: bool,
    pub r: f64,
    pub x: f64,
    #[serde(default)]
    pub g1: f64,
    #[serde(default)]
    pub b1: f64,
    #[serde(default)]
    pub g2: f64,
    #[serde(default)]
    pub b2: f64,
    #[serde(default = "unset", deserialize_with = "nan_if_null")]
    pub p1: f64,
    #[serde(default = "unset", deserialize_with = "nan_if_null")]
    pub q1: f64,
    #[serde(default = "unset", deserialize_with = "nan_if_null")]
    pub p2: f64,
    #[serde(default = "unset", deserialize_with = "nan_if_null")]
    pub q2: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RatioTapChangerStep {
    pub rho: f64,
    #[serde(default)]
    pub r: f64,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub g: f64,
    #[serde(default)]
    pub b: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhaseTapChangerStep {
    pub rho: f64,
    /// Phase shift (degrees).
    pub alpha: f64,
    #[serde(default)]
    pub r: f64,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub g: f64,
    #[serde(default)]
    pub b: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TapChanger<S> {
    #[serde(default)]
    pub low_tap: i32,
    pub tap_position: i32,
    pub steps: Vec<S>,
}

pub type RatioTapChanger = TapChanger<RatioTapChangerStep>;
pub type PhaseTapChanger = TapChanger<PhaseTapChangerStep>;

impl<S> TapChanger<S> {
    /// Step selected by the current tap position.
    pub fn current_step(&self) -> Option<&S> {
        let i = self.tap_position.checked_sub(self.low_tap)?;
        usize::try_from(i).ok().and_then(|i| self.steps.get(i))
    }
}

/// Two-winding transformer, series and magnetizing parameters given on side 2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwoWindingsTransformer {
    pub id: String,
    pub bus1: String,
    pub bus2: String,
    #[serde(default = "connected")]
    pub connected1: bool,
    #[serde(default = "connected")]
    pub connected2: bool,
    pub r: f64,
    pub x: f64,
    #[serde(default)]
    pub g: f64,
    #[serde(default)]
    pub b: f64,
    pub rated_u1: f64,
    pub rated_u2: f64,
    #[serde(default)]
    pub ratio_tap_changer: Option<RatioTapChanger>,
    #[serde(default)]
    pub phase_tap_changer: Option<PhaseTapChanger>,
    #[serde(default = "unset", deserialize_with = "nan_if_null")]
    pub p1: f64,
    #[serde(default = "unset", deserialize_with = "nan_if_null")]
    pub q1: f64,
    #[serde(default = "unset", deserialize_with = "nan_if_null")]
    pub p2: f64,
    #[serde(default = "unset", deserialize_with = "nan_if_null")]
    pub q2: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReactiveCapabilityCurvePoint {
    pub p: f64,
    pub min_q: f64,
    pub max_q: f64,
}

/// Reactive capability of a generating unit (MVAr as a function of MW).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReactiveLimits {
    MinMax { min_q: f64, max_q: f64 },
    Curve { points: Vec<ReactiveCapabilityCurvePoint> },
}

impl ReactiveLimits {
    pub fn min_q(&self, p: f64) -> f64 {
        match self {
            ReactiveLimits::MinMax { min_q, .. } => *min_q,
            ReactiveLimits::Curve { points } => interpolate(points, p, |pt| pt.min_q),
        }
    }

    pub fn max_q(&self, p: f64) -> f64 {
        match self {
            ReactiveLimits::MinMax { max_q, .. } => *max_q,
            ReactiveLimits::Curve { points } => interpolate(points, p, |pt| pt.max_q),
        }
    }

    /// Same limits with every power divided by `base`.
    pub fn scaled(&self, base: f64) -> ReactiveLimits {
        match self {
            ReactiveLimits::MinMax { min_q, max_q } => ReactiveLimits::MinMax {
                min_q: min_q / base,
                max_q: max_q / base,
            },
            ReactiveLimits::Curve { points } => ReactiveLimits::Curve {
                points: points
                    .iter()
                    .map(|pt| ReactiveCapabilityCurvePoint {
                        p: pt.p / base,
                        min_q: pt.min_q / base,
                        max_q: pt.max_q / base,
                    })
                    .collect(),
            },
        }
    }
}

// Linear interpolation between curve points, clamped to the end points.
fn interpolate<F>(points: &[ReactiveCapabilityCurvePoint], p: f64, q: F) -> f64
where
    F: Fn(&ReactiveCapabilityCurvePoint) -> f64,
{
    let mut sorted: Vec<&ReactiveCapabilityCurvePoint> = points.iter().collect();
    sorted.sort_by(|a, b| a.p.total_cmp(&b.p));

    let (first, last) = match (sorted.first(), sorted.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return f64::NAN,
    };
    if p <= first.p {
        return q(first);
    }
    if p >= last.p {
        return q(last);
    }
    for pair in sorted.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if p <= b.p {
            let t = (p - a.p) / (b.p - a.p);
            return q(a) + t * (q(b) - q(a));
        }
    }
    q(last)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivePowerControl {
    pub participate: bool,
    pub droop: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generator {
    pub id: String,
    pub bus: String,
    #[serde(default = "connected")]
    pub connected: bool,
    pub target_p: f64,
    #[serde(default)]
    pub target_q: f64,
    #[serde(default = "unset", deserialize_with = "nan_if_null")]
    pub target_v: f64,
    #[serde(default)]
    pub voltage_regulator_on: bool,
    #[serde(default = "Generator::default_min_p")]
    pub min_p: f64,
    #[serde(default = "Generator::default_max_p")]
    pub max_p: f64,
    #[serde(default)]
    pub reactive_limits: Option<ReactiveLimits>,
    #[serde(default)]
    pub active_power_control: Option<ActivePowerControl>,
    #[serde(default = "unset", deserialize_with = "nan_if_null")]
    pub p: f64,
    #[serde(default = "unset", deserialize_with = "nan_if_null")]
    pub q: f64,
}

impl Generator {
    fn default_min_p() -> f64 {
        -f64::MAX
    }

    fn default_max_p() -> f64 {
        f64::MAX
    }

    /// Share of the slack mismatch this unit takes when distributing.
    pub fn participation_factor(&self) -> f64 {
        match self.active_power_control {
            Some(apc) if apc.participate && apc.droop > 0.0 => self.max_p / apc.droop,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Load {
    pub id: String,
    pub bus: String,
    #[serde(default = "connected")]
    pub connected: bool,
    pub p0: f64,
    #[serde(default)]
    pub q0: f64,
    #[serde(default = "unset", deserialize_with = "nan_if_null")]
    pub p: f64,
    #[serde(default = "unset", deserialize_with = "nan_if_null")]
    pub q: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShuntCompensator {
    pub id: String,
    pub bus: String,
    #[serde(default = "connected")]
    pub connected: bool,
    #[serde(default)]
    pub b: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreeWindingsTransformer {
    pub id: String,
    pub bus1: String,
    pub bus2: String,
    pub bus3: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DanglingLine {
    pub id: String,
    pub bus: String,
    #[serde(default = "connected")]
    pub connected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VscConverterStation {
    pub id: String,
    pub bus: String,
    #[serde(default = "connected")]
    pub connected: bool,
    #[serde(default)]
    pub voltage_regulator_on: bool,
    #[serde(default = "unset", deserialize_with = "nan_if_null")]
    pub voltage_setpoint: f64,
    #[serde(default)]
    pub reactive_power_setpoint: f64,
    #[serde(default)]
    pub reactive_limits: Option<ReactiveLimits>,
    #[serde(default = "unset", deserialize_with = "nan_if_null")]
    pub p: f64,
    #[serde(default = "unset", deserialize_with = "nan_if_null")]
    pub q: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConvertersMode {
    Side1RectifierSide2Inverter,
    Side1InverterSide2Rectifier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HvdcLine {
    pub id: String,
    pub converter_station1: String,
    pub converter_station2: String,
    pub converters_mode: ConvertersMode,
    /// Active power transmitted (MW).
    pub active_power_setpoint: f64,
    pub max_p: f64,
}

impl Network {
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|err| format_err!("invalid network: {}", err))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reads a network from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|err| format_err!("unable to open {}: {}", path.display(), err))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|err| format_err!("invalid network {}: {}", path.display(), err))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn bus(&self, id: &str) -> Option<&Bus> {
        self.buses.iter().find(|b| b.id == id)
    }

    pub fn line(&self, id: &str) -> Option<&Line> {
        self.lines.iter().find(|l| l.id == id)
    }

    pub fn transformer(&self, id: &str) -> Option<&TwoWindingsTransformer> {
        self.two_windings_transformers.iter().find(|t| t.id == id)
    }

    pub fn generator(&self, id: &str) -> Option<&Generator> {
        self.generators.iter().find(|g| g.id == id)
    }

    pub fn load_by_id(&self, id: &str) -> Option<&Load> {
        self.loads.iter().find(|l| l.id == id)
    }
}
