// Console "now playing" screen - renders the previous/next track labels
// between separator rules. Kept dumb on purpose: the queue engine hands it
// labels and never looks at the result.

use std::env;
use std::io::Write;

#[derive(Debug)]
pub struct StatusScreen {
    width: usize,
    clear: bool,
}

impl StatusScreen {
    pub fn new() -> Self {
        let width = env::var("COLUMNS")
            .ok()
            .and_then(|c| c.parse::<usize>().ok())
            .map(|w| w.saturating_sub(1))
            .filter(|&w| w >= 20)
            .unwrap_or(79);
        Self { width, clear: true }
    }

    /// Redraw the screen with the given track labels; either may be absent.
    pub fn update(&self, prev: Option<&str>, next: Option<&str>) {
        let mut out = String::new();
        if self.clear {
            out.push_str("\x1b[2J\x1b[H");
        }
        self.section(&mut out, " PREVIOUSLY ", '-', prev);
        out.push('\n');
        self.section(&mut out, " UP NOW ", '=', next);
        let mut stdout = std::io::stdout();
        let _ = stdout.write_all(out.as_bytes());
        let _ = stdout.flush();
    }

    fn section(&self, out: &mut String, caption: &str, fill: char, label: Option<&str>) {
        let Some(label) = label else {
            out.push_str("\n\n\n");
            return;
        };
        let name = printable(label);
        let name = if name.chars().count() > self.width {
            let tail: String = name
                .chars()
                .rev()
                .take(self.width - 3)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            format!("...{tail}")
        } else {
            let pad = (self.width - name.chars().count()) / 2;
            format!("{}{}", " ".repeat(pad), name)
        };
        out.push_str(&center(caption, self.width, fill));
        out.push('\n');
        out.push_str(&name);
        out.push('\n');
        out.push_str(&fill.to_string().repeat(self.width));
        out.push('\n');
    }
}

impl Default for StatusScreen {
    fn default() -> Self {
        Self::new()
    }
}

/// Collapse the label's typographic separators back to plain ASCII, which
/// survives any terminal encoding.
fn printable(label: &str) -> String {
    label
        .replace('\u{a0}', " ")
        .replace('\u{25ba}', ">")
        .replace('\u{2014}', "--")
}

fn center(text: &str, width: usize, fill: char) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.to_string();
    }
    let left = (width - len) / 2;
    let right = width - len - left;
    format!(
        "{}{}{}",
        fill.to_string().repeat(left),
        text,
        fill.to_string().repeat(right)
    )
}
