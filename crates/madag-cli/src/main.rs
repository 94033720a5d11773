pub mod cli;
pub mod cmd;
pub mod error;
pub mod io;
pub mod log;

pub use cli::{Cli, Command};

use clap::Parser;

fn main() {
    let cli = Cli::parse();

    let result = dispatch(&cli);

    if let Err(e) = result {
        eprintln!("{}", e.message());
        std::process::exit(e.exit_code());
    }
}

/// Dispatches the parsed CLI arguments to the appropriate command handler.
///
/// Returns `Ok(())` on success or a [`error::CliError`] on failure. The
/// caller is responsible for printing the error message and exiting with the
/// appropriate exit code.
fn dispatch(cli: &Cli) -> Result<(), error::CliError> {
    match &cli.command {
        Command::Optimize {
            input,
            output,
            ref_seq,
            iterations,
            vcf,
            acceptance,
            alpha,
            beta,
            sample,
            subtree_min,
            subtree_max,
            seed,
            threads,
            log,
        } => cmd::optimize::run(
            input,
            output,
            ref_seq.as_ref(),
            *iterations,
            vcf.as_ref(),
            *acceptance,
            *alpha,
            *beta,
            *sample,
            *subtree_min,
            *subtree_max,
            *seed,
            *threads,
            log.as_ref(),
            cli.max_file_size,
        ),

        Command::Build { input, output, ref_seq, vcf } => {
            cmd::build::run(input, output, ref_seq.as_ref(), vcf.as_ref(), cli.max_file_size)
        }

        Command::Convert { input, output } => cmd::convert::run(input, output, cli.max_file_size),

        Command::Inspect { input, node } => cmd::inspect::run(input, *node, cli.max_file_size),

        Command::Score { input } => cmd::score::run(input, cli.max_file_size),
    }
}
