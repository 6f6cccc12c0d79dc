use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use wclite::cmd::{Args, Commands};
use wclite::codec::OutputFormat;
use wclite::error::error_chain;
use wclite::workload::wc;
use wclite::{telemetry, Context, Result};

fn show(ctx: &Context, output: &str, format: OutputFormat, top: usize) -> Result<()> {
    let ranked = wc::load(ctx, output, format)?;
    let mut printed = 0;
    for (rank, (count, words)) in wc::tie_groups(&ranked).into_iter().enumerate() {
        for word in words {
            if printed == top {
                return Ok(());
            }
            println!("{}\t{}\t{}", rank + 1, count, word);
            printed += 1;
        }
    }
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let ctx = Context::acquire(args.context.into())?;

    let outcome = match args.command {
        Commands::Submit(submit) => wc::run(&ctx, &submit.into()).map(|report| {
            println!(
                "wrote {} distinct words ({} total) to {} in {} part(s)",
                report.distinct_words, report.total_words, report.output, report.parts
            );
        }),
        Commands::Show {
            output,
            format,
            top,
        } => show(&ctx, &output, format, top),
    };

    // release the context on success and failure alike
    ctx.shutdown();
    outcome
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(err) = telemetry::init_tracing(args.verbose) {
        eprintln!("failed to initialise logging: {err:#}");
        return ExitCode::FAILURE;
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(code = err.exit_code(), "{}", error_chain(&err));
            ExitCode::from(err.exit_code())
        }
    }
}
