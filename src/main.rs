use clap::Parser;
use tracing_subscriber::EnvFilter;

use hiercc_assign::{cli, web};

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Initialize logging based on verbosity flag
    let filter = if cli.verbose {
        EnvFilter::new("hiercc_assign=debug,info")
    } else {
        EnvFilter::new("hiercc_assign=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    match cli.command {
        cli::Commands::Assign(args) => {
            cli::assign::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Database(args) => {
            cli::database::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Serve(args) => {
            web::server::run(args)?;
        }
    }

    Ok(())
}
