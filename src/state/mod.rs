// State persistence - history, explicit playlist and play counts survive
// restarts in a flat, hand-editable text file.
//
// Format, one record per line:
//   -<key>          history entry (oldest first)
//   +<key>          explicit playlist entry
//   =<count>*<key>  play count
//   # or ;          comment; blank lines ignored
// Anything else is a syntax error: logged with its line number, load
// continues.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::Result;
use tracing::{debug, warn};

use crate::library::make_key;

/// Raw contents of a state file. Names are stored as written; resolving
/// them against the catalog is the caller's job (stale names are expected
/// after file deletions and skipped there).
#[derive(Debug, Default, PartialEq)]
pub struct StateFile {
    pub history: Vec<String>,
    pub playlist: Vec<String>,
    pub counts: Vec<(String, u32)>,
}

/// Read a state file. A missing or unreadable file is simply no prior
/// state, not an error.
pub fn load(path: &Path) -> Option<StateFile> {
    match fs::read_to_string(path) {
        Ok(text) => Some(parse(&text, path)),
        Err(e) => {
            debug!("no prior state loaded from {}: {e}", path.display());
            None
        }
    }
}

pub fn parse(text: &str, source: &Path) -> StateFile {
    let mut state = StateFile::default();
    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if let Some(name) = line.strip_prefix('-') {
            state.history.push(name.to_string());
        } else if let Some(name) = line.strip_prefix('+') {
            state.playlist.push(name.to_string());
        } else if let Some((count, name)) = line.strip_prefix('=').and_then(|r| r.split_once('*')) {
            // unparseable counts are silently dropped, like stale names
            if let Ok(count) = count.trim().parse::<u32>() {
                state.counts.push((make_key(name.trim()), count));
            }
        } else if !line.is_empty() && !line.starts_with(['#', ';']) {
            warn!(
                "syntax error in {}:{}: '{}'",
                source.display(),
                lineno + 1,
                line
            );
        }
    }
    state
}

/// Write the state file. `playlist` is `None` for auto playlists, which are
/// regenerable and never persisted. Counts of zero are dropped; `sort`
/// orders them by key for deterministic output.
pub fn save(
    path: &Path,
    history: &[String],
    playlist: Option<&[String]>,
    counts: &HashMap<String, u32>,
    sort: bool,
) -> Result<()> {
    let mut out = String::new();
    out.push_str(&format!(
        "# calliope {} state [{}]\n\n",
        env!("CARGO_PKG_VERSION"),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    ));

    if !history.is_empty() || playlist.map_or(false, |p| !p.is_empty()) {
        out.push_str("# history and playlist\n");
    }
    for key in history {
        out.push_str(&format!("-{key}\n"));
    }
    if let Some(playlist) = playlist {
        for key in playlist {
            out.push_str(&format!("+{key}\n"));
        }
    }

    let mut counted: Vec<(&String, &u32)> = counts.iter().filter(|(_, &c)| c > 0).collect();
    if !counted.is_empty() {
        out.push_str("\n# play count information\n");
    }
    if sort {
        counted.sort_by_key(|(key, _)| key.clone());
    }
    for (key, count) in counted {
        out.push_str(&format!("={count}*{key}\n"));
    }

    fs::write(path, out)?;
    Ok(())
}
