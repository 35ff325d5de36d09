use std::path::Path;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    let cli = bookcovers::cli::Cli::parse();
    bookcovers::logging::init(cli.verbose).context("init logging")?;
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        bookcovers::cli::Command::Fetch(args) => {
            let out_dir = args.out.clone();
            let summary = bookcovers::pipeline::run(args).await.context("fetch")?;
            print!(
                "{}",
                bookcovers::pipeline::render_summary(&summary, Path::new(&out_dir))
            );
        }
        bookcovers::cli::Command::Status(args) => {
            print!("{}", bookcovers::status::run(args).context("status")?);
        }
    }

    Ok(())
}
