use clap::Parser;
use tracing_subscriber::EnvFilter;

use sqlite_shell::Client;
use sqlite_shell::cli::Args;
use sqlite_shell::config::ConfigFile;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let Args {
        bin,
        db,
        config,
        format,
        command,
    } = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match config {
        Some(path) => ConfigFile::load(&path)?,
        None => ConfigFile::load_default()?,
    };
    let options = config.shell.to_client_options(bin, db);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let output = runtime.block_on(async {
        let client = Client::connect(options).await?;
        command.run(&client, format).await
    })?;

    println!("{}", output.text);
    if output.failed {
        std::process::exit(1);
    }
    Ok(())
}
