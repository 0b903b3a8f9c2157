// The browser starts this process and talks to it over stdin/stdout. Hide the console on windows.
#![windows_subsystem = "windows"]

use std::env::args;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tabtally::{
    daemon::{args::DaemonArgs, start_daemon},
    utils::{
        dir::resolve_application_path,
        logging::{enable_logging, DAEMON_PREFIX},
        runtime::single_thread_runtime,
    },
};

fn main() -> Result<()> {
    run_service(args().collect::<Vec<_>>())
}

fn run_service(command_args: Vec<String>) -> Result<()> {
    let args = DaemonArgs::parse_from(&command_args);
    let app_dir = resolve_application_path(args.dir.clone())?;
    enable_logging(DAEMON_PREFIX, &app_dir, args.log, args.log_console)?;
    info!("Started by {:?}", args.caller);

    let config = args.tracker_config();
    single_thread_runtime()?
        .block_on(async move { start_daemon(app_dir, config).await })
        .inspect_err(|e| error!("Daemon stopped with an error {e:?}"))?;
    Ok(())
}
