use std::env;
use std::path::{Path, PathBuf};

/// Token that the track path is substituted for at launch time.
pub const PATH_PLACEHOLDER: &str = "$";

/// Known players, keyed by binary basename. Tokens ending in `?` are only
/// included in fullscreen mode (with the `?` stripped). Order matters:
/// autodetection takes the first binary found on the system.
const PLAYER_TABLE: &[&str] = &[
    "omxplayer.bin -b $",
    "omxplayer -b $",
    "mpc-hc64 $ /play /fullscreen? /close",
    "mpc-hc $ /play /fullscreen? /close",
    "mpv --really-quiet --fs? $",
    "vlc --quiet --fullscreen? --no-random --no-repeat --no-video-title-show $ vlc://quit",
    "mplayer -fs? $",
];

/// Names of all known players, for help text.
pub fn known_players() -> Vec<&'static str> {
    PLAYER_TABLE
        .iter()
        .map(|row| row.split_whitespace().next().unwrap())
        .collect()
}

/// Resolve the player invocation into a ready-to-exec argv template with one
/// `$` placeholder. `spec` may name a binary (with optional extra arguments,
/// spliced in at the placeholder position); with no spec the table is probed
/// in order. Returns `None` when no usable player exists.
pub fn resolve(spec: Option<&str>, fullscreen: bool) -> Option<Vec<String>> {
    let (binary, extra_args) = match spec {
        Some(spec) => match find_binary(spec) {
            Some(full) => (full, Vec::new()),
            None => {
                let mut words: Vec<String> =
                    spec.split_whitespace().map(str::to_string).collect();
                if words.is_empty() {
                    return None;
                }
                let first = words.remove(0);
                (find_binary(&first)?, words)
            }
        },
        None => {
            let binary = PLAYER_TABLE.iter().find_map(|row| {
                find_binary(row.split_whitespace().next().unwrap())
            })?;
            (binary, Vec::new())
        }
    };

    let base = binary
        .file_stem()
        .and_then(|s| s.to_str())?
        .to_ascii_lowercase();
    let mut cmdline = vec![binary.to_string_lossy().into_owned()];
    cmdline.extend(template_for(&base, fullscreen)?);

    let placeholder = cmdline.iter().position(|t| t == PATH_PLACEHOLDER)?;
    cmdline.splice(placeholder..placeholder, extra_args);
    Some(cmdline)
}

/// Argument template for a known binary basename; exact match, no guessing.
fn template_for(base: &str, fullscreen: bool) -> Option<Vec<String>> {
    for row in PLAYER_TABLE {
        let mut tokens = row.split_whitespace();
        if tokens.next() != Some(base) {
            continue;
        }
        let args = tokens
            .filter_map(|tok| match tok.strip_suffix('?') {
                Some(stripped) if fullscreen => Some(stripped.to_string()),
                Some(_) => None,
                None => Some(tok.to_string()),
            })
            .collect();
        return Some(args);
    }
    None
}

/// Locate an executable: direct path, next to the current exe, or on PATH.
/// `.exe` is appended on Windows when missing.
pub fn find_binary(name: &str) -> Option<PathBuf> {
    let direct = Path::new(name);
    if is_executable(direct) {
        return direct.canonicalize().ok().or(Some(direct.to_path_buf()));
    }

    let name = if cfg!(windows) && !name.to_ascii_lowercase().ends_with(".exe") {
        format!("{name}.exe")
    } else {
        name.to_string()
    };

    let mut bases = vec![PathBuf::from(".")];
    if let Some(dir) = env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        bases.push(dir);
    }
    if let Some(path_var) = env::var_os("PATH") {
        bases.extend(env::split_paths(&path_var));
    }

    bases
        .into_iter()
        .map(|base| base.join(&name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
