// Track catalog - entity model, directory scanning, scan reconciliation

pub mod registry;
pub mod scanner;
pub mod track;

pub use registry::TrackRegistry;
pub use scanner::MediaScanner;
pub use track::{make_key, make_path_key, Track};
