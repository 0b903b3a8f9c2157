use std::path::{Path, PathBuf};

use serde_json::{json, Value};

pub const HOST_NAME: &str = "com.tabtally.host";

pub fn to_daemon_path(mut path: PathBuf) -> PathBuf {
    path.set_file_name("tabtally-daemon");
    #[cfg(windows)]
    {
        path.set_extension("exe");
    }
    path
}

/// Builds the manifest a browser needs to find and launch the daemon. Chrome lists allowed
/// extensions by origin, Firefox by extension id.
pub fn host_manifest(daemon: &Path, extension_id: &str, firefox: bool) -> Value {
    let mut manifest = json!({
        "name": HOST_NAME,
        "description": "Tracks time spent on selected websites",
        "path": daemon,
        "type": "stdio",
    });
    if firefox {
        manifest["allowed_extensions"] = json!([extension_id]);
    } else {
        manifest["allowed_origins"] = json!([format!("chrome-extension://{extension_id}/")]);
    }
    manifest
}
