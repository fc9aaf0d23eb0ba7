use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, LevelFilter};
use simple_logger::SimpleLogger;

use torch::config::Parameters;
use torch::driver::Torch;
use torch::message::channel::NullCommunicator;
use torch::message::comm::Communicator;
use torch::message::tcp::TcpCommunicator;

#[derive(Debug, Parser)]
#[clap(version, about = "Radiation hydrodynamics of ionised hydrogen on a Cartesian grid")]
struct Opts {
    /// Parameters file (TOML)
    parameters: PathBuf,

    /// Rank of this process within the group
    #[clap(long, default_value = "0")]
    rank: usize,

    /// Listen addresses of every rank, in rank order; more than one address
    /// switches on the TCP communicator
    #[clap(long)]
    peer: Vec<SocketAddr>,

    #[clap(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let opts = Opts::parse();
    init_logging(opts.verbose);

    match run(&opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(opts: &Opts) -> Result<(), Box<dyn std::error::Error>> {
    let parameters = Parameters::from_file(&opts.parameters)?;

    let comm: Box<dyn Communicator> = if opts.peer.len() > 1 {
        Box::new(TcpCommunicator::new(opts.rank, opts.peer.clone()))
    } else {
        Box::new(NullCommunicator)
    };

    let mut torch = Torch::initialise(&parameters, comm, None)?;
    torch.run()?;
    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    SimpleLogger::new().with_level(level).init().unwrap();
}
