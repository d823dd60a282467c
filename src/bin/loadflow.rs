use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use loadflow::debug::format_polar_vec;
use loadflow::{
    run_ac, run_dc, Bus, LoadFlowParametersBuilder, Network, SlackBusSelectionMode,
    VoltageInitMode,
};
use num_complex::Complex64;
use spsolve::rlu::RLU;
use std::path::PathBuf;

/// Load flow of JSON network models.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Newton-Raphson AC load flow
    #[clap(name = "ac")]
    Ac(AcArgs),

    /// Linearized DC load flow
    #[clap(name = "dc")]
    Dc(DcArgs),
}

#[derive(Args)]
struct CommonArgs {
    /// The input network file
    #[arg(required = true)]
    input: PathBuf,

    /// Output file, written with the solved state.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Slack bus selection.
    #[arg(long, value_enum)]
    slack_bus_selection: Option<SlackBusSelectionMode>,

    /// Slack bus id. Implies selection by name.
    #[arg(long)]
    slack_bus: Option<String>,
}

#[derive(Args)]
struct AcArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Maximum number of Newton-Raphson iterations.
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Termination tolerance on the per unit mismatch 2-norm.
    #[arg(long)]
    epsilon: Option<f64>,

    /// Voltage initialization.
    #[arg(long, value_enum)]
    voltage_init_mode: Option<VoltageInitMode>,

    /// Distribute the slack bus active power over participating generators.
    #[arg(long, default_value_t = false)]
    distributed_slack: bool,

    /// Enforce generator reactive power limits at expense of |V|.
    #[arg(long, default_value_t = false)]
    reactive_limits: bool,

    /// Maximum number of macro iterations.
    #[arg(long)]
    max_macro_iterations: Option<usize>,
}

type DcArgs = CommonArgs;

fn main() {
    env_logger::Builder::from_default_env()
        .format_level(false)
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    match execute(&cli) {
        Ok(_) => {
            std::process::exit(0);
        }
        Err(err) => {
            eprintln!("error: {}", err);
            std::process::exit(2);
        }
    }
}

fn execute(cli: &Cli) -> Result<()> {
    let common = match &cli.command {
        Commands::Ac(args) => &args.common,
        Commands::Dc(args) => args,
    };

    let mut network = Network::load(&common.input)?;

    let mut builder = LoadFlowParametersBuilder::default();
    if let Some(mode) = common.slack_bus_selection {
        builder.slack_bus_selection(mode);
    }
    if let Some(id) = &common.slack_bus {
        builder
            .slack_bus_selection(SlackBusSelectionMode::Name)
            .slack_bus_id(id.as_str());
    }
    if let Commands::Ac(args) = &cli.command {
        if let Some(max_iterations) = args.max_iterations {
            builder.max_iterations(max_iterations);
        }
        if let Some(epsilon) = args.epsilon {
            builder.epsilon(epsilon);
        }
        if let Some(mode) = args.voltage_init_mode {
            builder.voltage_init_mode(mode);
        }
        if let Some(max_macro_iterations) = args.max_macro_iterations {
            builder.max_macro_iterations(max_macro_iterations);
        }
        builder
            .distributed_slack(args.distributed_slack)
            .reactive_limits(args.reactive_limits);
    }
    let parameters = builder.build()?;

    let solver = RLU::default();

    match &cli.command {
        Commands::Ac(_) => {
            let result = run_ac(&mut network, &parameters, &solver)?;
            if !result.converged {
                return Err(anyhow::anyhow!(
                    "AC load flow did not converge ({})",
                    result.status
                ));
            }
            println!(
                "converged in {} iterations, {} macro iterations",
                result.iterations, result.macro_iterations
            );
            for transition in &result.transitions {
                println!(
                    "{}: {} -> {} ({})",
                    transition.bus_id, transition.from, transition.to, transition.reason
                );
            }
            println!(
                "slack bus active power mismatch: {:.3} MW",
                result.slack_bus_active_power_mismatch
            );
        }
        Commands::Dc(_) => {
            let result = run_dc(&mut network, &parameters, &solver)?;
            if !result.ok {
                return Err(anyhow::anyhow!("DC load flow did not succeed"));
            }
            println!(
                "slack bus active power mismatch: {:.3} MW",
                result.slack_bus_active_power_mismatch
            );
        }
    }

    let solved: Vec<&Bus> = network.buses.iter().filter(|b| b.v.is_finite()).collect();
    for bus in &solved {
        println!("{:<16} {:>10.3} kV {:>9.3} deg", bus.id, bus.v, bus.angle);
    }
    let voltages: Vec<Complex64> = solved
        .iter()
        .map(|b| Complex64::from_polar(b.v / b.nominal_v, b.angle.to_radians()))
        .collect();
    log::debug!("bus voltages (pu): {}", format_polar_vec(&voltages));

    if let Some(out_path) = &common.output {
        network.save(out_path)?;
    }

    Ok(())
}
