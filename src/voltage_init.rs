use crate::lf_network::LfNetwork;

/// Initial bus voltages of a Newton-Raphson run.
pub trait VoltageInitializer {
    fn name(&self) -> &str;

    /// Returns per-bus voltage magnitudes (pu) and angles (radians).
    fn initialize(&self, network: &LfNetwork) -> (Vec<f64>, Vec<f64>);
}

/// Flat start: V = 1 pu, angle = 0.
pub struct UniformValueVoltageInitializer;

impl VoltageInitializer for UniformValueVoltageInitializer {
    fn name(&self) -> &str {
        "uniform"
    }

    fn initialize(&self, network: &LfNetwork) -> (Vec<f64>, Vec<f64>) {
        let n = network.buses().len();
        (vec![1.0; n], vec![0.0; n])
    }
}

/// Starts from the voltages currently held by the snapshot, falling back to
/// flat values where they are unset.
pub struct PreviousValueVoltageInitializer;

impl VoltageInitializer for PreviousValueVoltageInitializer {
    fn name(&self) -> &str {
        "previous values"
    }

    fn initialize(&self, network: &LfNetwork) -> (Vec<f64>, Vec<f64>) {
        network
            .buses()
            .iter()
            .map(|bus| {
                if bus.v.is_nan() || bus.angle.is_nan() {
                    (1.0, 0.0)
                } else {
                    (bus.v, bus.angle)
                }
            })
            .unzip()
    }
}
