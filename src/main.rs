use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use kubegate::config::PathSet;
use kubegate::server::config::ServerConfig;
use kubegate::server::factory::ServerFactory;
use log::{error, info};

#[derive(Parser, Debug)]
#[command(author, version = env!("KUBEGATE_VERSION"), about)]
struct ServerArgs {
    /// Directory holding `server.toml` and the `pki` directory.
    #[arg(long)]
    pub config_dir: Option<PathBuf>,

    /// Print server configuration data (JSON) and exit.
    #[arg(long)]
    pub print_config: bool,
}

async fn run(args: ServerArgs) -> Result<()> {
    let ps = PathSet::new(args.config_dir)?;
    let cfg: ServerConfig = ps.load_config("server")?;

    if args.print_config {
        let json = serde_json::to_string_pretty(&cfg).context("encode config")?;
        println!("{json}");
        return Ok(());
    }

    cfg.logs.init()?;
    info!(
        "Starting kubegate {} ({})",
        env!("KUBEGATE_VERSION"),
        env!("KUBEGATE_TARGET")
    );

    let factory = ServerFactory::new(cfg);
    let srv = factory.build_server().context("init server")?;
    srv.run().await.context("run restful server")?;

    info!("Server exited by user");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = ServerArgs::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
