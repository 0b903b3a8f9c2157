pub mod manifest;
pub mod output;

use std::{
    env,
    io::{stdout, IsTerminal},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use manifest::{host_manifest, to_daemon_path};
use output::format_sites;
use tracing::level_filters::LevelFilter;

use crate::{
    daemon::{
        reset::{DailyReset, ResetOutcome},
        schedule::CommitLock,
        sites::{add_site, list_sites, remove_site},
        storage::file_store::FileSiteStore,
    },
    utils::{
        clock::DefaultClock,
        dir::resolve_application_path,
        logging::{enable_logging, CLI_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "tabtally", version, long_about = None)]
#[command(about = "Track daily time spent on selected websites", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default $XDG_STATE_HOME/tabtally or $HOME/.local/state/tabtally"
    )]
    dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Show minutes spent on every tracked site today")]
    List {},
    #[command(about = "Start tracking a site. Subdomains are folded into their root domain")]
    Add { address: String },
    #[command(about = "Stop tracking a site")]
    Remove { site: String },
    #[command(about = "Run the daily reset now. Does nothing if today's reset already happened")]
    Reset {},
    #[command(about = "Print the native messaging manifest that registers the daemon with a browser")]
    Manifest {
        #[arg(long = "extension-id")]
        extension_id: String,
        #[arg(long, help = "Daemon executable. Defaults to tabtally-daemon next to this binary")]
        path: Option<PathBuf>,
        #[arg(long, help = "Emit a Firefox manifest instead of a Chrome one")]
        firefox: bool,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    let app_dir = resolve_application_path(args.dir)?;
    enable_logging(CLI_PREFIX, &app_dir, logging_level, args.log)?;

    let store = Arc::new(FileSiteStore::new(app_dir)?);

    match args.commands {
        Commands::List {} => {
            let sites = list_sites(store.as_ref()).await?;
            if sites.is_empty() {
                println!("No tracked sites yet. Add one with `tabtally add <address>`");
            }
            for line in format_sites(&sites, stdout().is_terminal()) {
                println!("{line}");
            }
            Ok(())
        }
        Commands::Add { address } => {
            let outcome = add_site(store.as_ref(), &address).await?;
            if outcome.added {
                println!("Tracking {}", outcome.site);
            } else {
                println!("{} is already tracked", outcome.site);
            }
            Ok(())
        }
        Commands::Remove { site } => match remove_site(store.as_ref(), &site).await? {
            Some(removed) => {
                println!("Stopped tracking {removed}");
                Ok(())
            }
            None => Err(anyhow!("{site} isn't tracked")),
        },
        Commands::Reset {} => {
            let reset = DailyReset::new(store, Box::new(DefaultClock), CommitLock::default());
            match reset.run_cycle().await? {
                ResetOutcome::FirstRun(date) => println!("Recorded {date} as the first day"),
                ResetOutcome::AlreadyCurrent => println!("Counters were already reset today"),
                ResetOutcome::Reset { sites, .. } => println!("Reset {sites} sites"),
            }
            Ok(())
        }
        Commands::Manifest {
            extension_id,
            path,
            firefox,
        } => {
            let daemon = match path {
                Some(path) => path,
                None => to_daemon_path(env::current_exe()?),
            };
            let manifest = host_manifest(&daemon, &extension_id, firefox);
            println!("{}", serde_json::to_string_pretty(&manifest)?);
            Ok(())
        }
    }
}
