use std::path::Path;
use walkdir::WalkDir;

/// Walks the content root and yields relative paths whose extensions are on
/// the allow-list. Dotfiles are skipped; everything else is fair game, the
/// registry decides what is new or gone.
#[derive(Debug, Clone)]
pub struct MediaScanner {
    extensions: Vec<String>,
}

impl MediaScanner {
    pub fn new(extensions: &[String]) -> Self {
        Self {
            extensions: extensions.iter().map(|e| e.to_ascii_lowercase()).collect(),
        }
    }

    pub fn scan(&self, root: &Path) -> Vec<String> {
        let mut found = Vec::new();

        for entry in WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.starts_with('.'))
            {
                continue;
            }
            if !self.is_allowed(path) {
                continue;
            }
            if let Ok(rel) = path.strip_prefix(root) {
                found.push(rel.to_string_lossy().into_owned());
            }
        }

        found
    }

    fn is_allowed(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.contains(&ext.to_ascii_lowercase()))
            .unwrap_or(false)
    }
}
