use std::path::is_separator;

/// One playable media entry. Identity is the `key`: the relative path minus
/// its extension, backslashes folded to slashes, lowercased. The key stays
/// stable across rescans as long as the file keeps its path.
#[derive(Debug, Clone)]
pub struct Track {
    /// Opaque numeric id handed to the control surface.
    pub id: u64,
    /// Relative path under the content root, as last discovered on disk.
    pub path: String,
    pub key: String,
    pub label: String,
    /// Scan reconciliation flag: cleared at scan start, set on rediscovery.
    pub(crate) present: bool,
}

impl Track {
    pub fn new(id: u64, path: String) -> Self {
        let key = make_path_key(&path);
        let label = make_label(&path);
        Self {
            id,
            path,
            key,
            label,
            present: true,
        }
    }

    /// Rediscovered during a rescan; the stored path follows the file so that
    /// case or separator drift on disk doesn't break playback.
    pub(crate) fn mark_present(&mut self, new_path: &str) {
        self.path = new_path.to_string();
        self.present = true;
    }

    /// One control-surface line: `id<TAB>label`, with an optional marker
    /// prefix (`+` for the current track, `-` for auto-picked entries).
    pub fn fmt(&self, prefix: &str) -> String {
        format!("{}{}\t{}", prefix, self.id, self.label)
    }
}

/// Normalize a bare name (e.g. from the state file) into key form.
pub fn make_key(name: &str) -> String {
    name.replace('\\', "/").to_lowercase()
}

/// Normalize a file path into key form, dropping the extension first.
pub fn make_path_key(path: &str) -> String {
    make_key(strip_extension(path))
}

/// Human-readable label: path minus extension, with directory separators
/// rendered as a small arrow and double dashes as an em dash.
fn make_label(path: &str) -> String {
    strip_extension(path)
        .replace('\\', "/")
        .replace('/', "\u{a0}\u{25ba} ")
        .replace("--", "\u{2014}")
}

/// Drop the final extension, leaving directory components untouched.
/// A leading dot (dotfile) doesn't count as an extension.
fn strip_extension(path: &str) -> &str {
    let stem_start = path
        .rfind(|c: char| is_separator(c) || c == '\\')
        .map(|i| i + 1)
        .unwrap_or(0);
    match path[stem_start..].rfind('.') {
        Some(0) | None => path,
        Some(dot) => &path[..stem_start + dot],
    }
}
