use ansi_term::Style;

use crate::daemon::storage::entities::TrackedSiteSet;

/// One line per site, the same wording the extension popup uses.
pub fn format_sites(sites: &TrackedSiteSet, colored: bool) -> Vec<String> {
    let bold = if colored { Style::new().bold() } else { Style::new() };
    sites
        .iter()
        .map(|(site, record)| {
            format!(
                "{}: {} min today",
                bold.paint(site.as_str()),
                record.time_spent_today
            )
        })
        .collect()
}
