use std::{path::PathBuf, time::Duration};

use clap::Parser;
use tracing::level_filters::LevelFilter;

use super::config::{TrackerConfig, DEFAULT_NOTIFY_EVERY};

#[derive(Parser, Debug)]
#[command(name = "tabtally-daemon", version, about = "Native messaging host for tabtally")]
pub struct DaemonArgs {
  #[arg(long)]
  pub dir: Option<PathBuf>,
  /// This option is for debugging purposes only. Logs go to stderr, stdout belongs to the browser.
  #[arg(long = "log-console")]
  pub log_console: bool,
  #[arg(long = "log-filter")]
  pub log: Option<LevelFilter>,
  /// Seconds between accrual cycles.
  #[arg(long = "accrual-period", default_value_t = 30)]
  pub accrual_period: u64,
  /// Minutes between daily reset checks.
  #[arg(long = "reset-period", default_value_t = 60)]
  pub reset_period: u64,
  /// Notify every time a site crosses this many minutes. 0 disables notifications.
  #[arg(long = "notify-every", default_value_t = DEFAULT_NOTIFY_EVERY)]
  pub notify_every: u32,
  /// Browsers identify the caller when starting a native host: Chrome passes the extension
  /// origin, Firefox the manifest path and the extension id.
  pub caller: Vec<String>,
  /// Chrome on Windows passes the handle of the calling window.
  #[arg(long = "parent-window", hide = true)]
  pub parent_window: Option<String>,
}

impl DaemonArgs {
  pub fn tracker_config(&self) -> TrackerConfig {
    TrackerConfig::new(
      Duration::from_secs(self.accrual_period),
      Duration::from_secs(self.reset_period.saturating_mul(60)),
      self.notify_every,
    )
  }
}
