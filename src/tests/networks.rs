use crate::network::{
    ActivePowerControl, Bus, ConvertersMode, Generator, HvdcLine, Line, Load, Network,
    RatioTapChanger, RatioTapChangerStep, ReactiveLimits, TwoWindingsTransformer,
    VscConverterStation,
};

pub fn bus(id: &str, nominal_v: f64) -> Bus {
    Bus {
        id: id.to_string(),
        nominal_v,
        v: f64::NAN,
        angle: f64::NAN,
    }
}

pub fn line(id: &str, bus1: &str, bus2: &str, r: f64, x: f64) -> Line {
    Line {
        id: id.to_string(),
        bus1: bus1.to_string(),
        bus2: bus2.to_string(),
        connected1: true,
        connected2: true,
        r,
        x,
        g1: 0.0,
        b1: 0.0,
        g2: 0.0,
        b2: 0.0,
        p1: f64::NAN,
        q1: f64::NAN,
        p2: f64::NAN,
        q2: f64::NAN,
    }
}

pub fn transformer(
    id: &str,
    bus1: &str,
    bus2: &str,
    r: f64,
    x: f64,
    rated_u1: f64,
    rated_u2: f64,
) -> TwoWindingsTransformer {
    TwoWindingsTransformer {
        id: id.to_string(),
        bus1: bus1.to_string(),
        bus2: bus2.to_string(),
        connected1: true,
        connected2: true,
        r,
        x,
        g: 0.0,
        b: 0.0,
        rated_u1,
        rated_u2,
        ratio_tap_changer: None,
        phase_tap_changer: None,
        p1: f64::NAN,
        q1: f64::NAN,
        p2: f64::NAN,
        q2: f64::NAN,
    }
}

/// Voltage regulating generator without limits.
pub fn generator(id: &str, bus: &str, target_p: f64, target_v: f64) -> Generator {
    Generator {
        id: id.to_string(),
        bus: bus.to_string(),
        connected: true,
        target_p,
        target_q: 0.0,
        target_v,
        voltage_regulator_on: true,
        min_p: -f64::MAX,
        max_p: f64::MAX,
        reactive_limits: None,
        active_power_control: None,
        p: f64::NAN,
        q: f64::NAN,
    }
}

pub fn load(id: &str, bus: &str, p0: f64, q0: f64) -> Load {
    Load {
        id: id.to_string(),
        bus: bus.to_string(),
        connected: true,
        p0,
        q0,
        p: f64::NAN,
        q: f64::NAN,
    }
}

/// 1 kV generator bus feeding a 2 MW, 1 MVar load through a 0.1 ohm line.
pub fn two_bus() -> Network {
    Network {
        id: "two-bus".to_string(),
        buses: vec![bus("b1", 1.0), bus("b2", 1.0)],
        lines: vec![line("l12", "b1", "b2", 0.0, 0.1)],
        generators: vec![generator("g1", "b1", 2.0, 1.0)],
        loads: vec![load("ld2", "b2", 2.0, 1.0)],
        ..Default::default()
    }
}

/// Slack bus feeding a 0.5 + 0.2j pu load through a 0.01 + 0.1j pu line.
pub fn slack_and_load() -> Network {
    // 100 kV: 100 ohm impedance base
    Network {
        id: "slack-and-load".to_string(),
        buses: vec![bus("slack", 100.0), bus("load", 100.0)],
        lines: vec![line("l", "slack", "load", 1.0, 10.0)],
        generators: vec![generator("g", "slack", 50.0, 100.0)],
        loads: vec![load("ld", "load", 50.0, 20.0)],
        ..Default::default()
    }
}

/// Generator, two 380 kV lines and a tap changing transformer feeding a
/// 600 MW load.
pub fn eurostag() -> Network {
    let zb380 = 380.0 * 380.0 / 100.0;
    let zb150 = 150.0 * 150.0 / 100.0;

    let ngen_nhv1 = transformer(
        "NGEN_NHV1",
        "NGEN",
        "NHV1",
        0.24 / 1300.0 * zb380,
        (10.0f64.powi(2) - 0.24f64.powi(2)).sqrt() / 1300.0 * zb380,
        24.0,
        400.0,
    );
    let mut nhv2_nload = transformer(
        "NHV2_NLOAD",
        "NHV2",
        "NLOAD",
        0.21 / 1000.0 * zb150,
        (18.0f64.powi(2) - 0.21f64.powi(2)).sqrt() / 1000.0 * zb150,
        400.0,
        158.0,
    );
    nhv2_nload.ratio_tap_changer = Some(RatioTapChanger {
        low_tap: 0,
        tap_position: 1,
        steps: [0.85, 1.0, 1.15]
            .iter()
            .map(|&rho| RatioTapChangerStep {
                rho,
                ..Default::default()
            })
            .collect(),
    });

    let hv_line = |id: &str| Line {
        b1: 386e-6 / 2.0,
        b2: 386e-6 / 2.0,
        ..line(id, "NHV1", "NHV2", 3.0, 33.0)
    };

    let mut gen = generator("GEN", "NGEN", 607.0, 24.5);
    gen.target_q = 301.0;
    gen.min_p = -9999.99;
    gen.max_p = 9999.99;
    gen.reactive_limits = Some(ReactiveLimits::MinMax {
        min_q: -9999.99,
        max_q: 9999.99,
    });

    Network {
        id: "eurostag".to_string(),
        buses: vec![
            bus("NGEN", 24.0),
            bus("NHV1", 380.0),
            bus("NHV2", 380.0),
            bus("NLOAD", 150.0),
        ],
        lines: vec![hv_line("NHV1_NHV2_1"), hv_line("NHV1_NHV2_2")],
        two_windings_transformers: vec![ngen_nhv1, nhv2_nload],
        generators: vec![gen],
        loads: vec![load("LOAD", "NLOAD", 600.0, 200.0)],
        ..Default::default()
    }
}

/// Three 10 MW participating units at 100 kV, each linked by a lossless line
/// to a 60 MW load bus.
pub fn three_generators() -> Network {
    let gen = |id: &str, bus: &str| Generator {
        max_p: 100.0,
        min_p: 0.0,
        active_power_control: Some(ActivePowerControl {
            participate: true,
            droop: 4.0,
        }),
        ..generator(id, bus, 10.0, 100.0)
    };
    Network {
        id: "three-generators".to_string(),
        buses: vec![
            bus("b1", 100.0),
            bus("b2", 100.0),
            bus("b3", 100.0),
            bus("bl", 100.0),
        ],
        lines: vec![
            line("l1", "b1", "bl", 0.0, 10.0),
            line("l2", "b2", "bl", 0.0, 10.0),
            line("l3", "b3", "bl", 0.0, 10.0),
        ],
        generators: vec![gen("g1", "b1"), gen("g2", "b2"), gen("g3", "b3")],
        loads: vec![load("ld", "bl", 60.0, 10.0)],
        ..Default::default()
    }
}

/// Chain of four 100 kV buses fed from `a1`, with a VSC HVDC link carrying
/// 20 MW from `a2` to `b2` in parallel to the lines.
pub fn hvdc() -> Network {
    let station = |id: &str, bus: &str| VscConverterStation {
        id: id.to_string(),
        bus: bus.to_string(),
        connected: true,
        voltage_regulator_on: false,
        voltage_setpoint: f64::NAN,
        reactive_power_setpoint: 0.0,
        reactive_limits: None,
        p: f64::NAN,
        q: f64::NAN,
    };
    Network {
        id: "hvdc".to_string(),
        buses: vec![
            bus("a1", 100.0),
            bus("a2", 100.0),
            bus("b1", 100.0),
            bus("b2", 100.0),
        ],
        lines: vec![
            line("la", "a1", "a2", 0.0, 10.0),
            line("lab", "a2", "b1", 0.0, 10.0),
            line("lb", "b1", "b2", 0.0, 10.0),
        ],
        generators: vec![generator("ga", "a1", 50.0, 100.0)],
        loads: vec![load("ldb", "b2", 50.0, 0.0)],
        vsc_converter_stations: vec![station("cs1", "a2"), station("cs2", "b2")],
        hvdc_lines: vec![HvdcLine {
            id: "hvdc".to_string(),
            converter_station1: "cs1".to_string(),
            converter_station2: "cs2".to_string(),
            converters_mode: ConvertersMode::Side1RectifierSide2Inverter,
            active_power_setpoint: 20.0,
            max_p: 100.0,
        }],
        ..Default::default()
    }
}
