use std::collections::HashMap;
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use tracing::info;

use super::track::{make_key, make_path_key, Track};

/// Catalog of known tracks. Reconciles itself against scan results with a
/// mark-sweep pass, hands out stable numeric ids, and keeps a pre-rendered
/// tracklist (plus a deflated copy) for the control surface, tagged with a
/// scan tag the surface can use as a cache token.
#[derive(Debug, Default)]
pub struct TrackRegistry {
    tracks: Vec<Track>,
    next_id: u64,
    scan_tag: Option<String>,
    tracklist: Option<String>,
    tracklist_deflated: Option<Vec<u8>>,
}

impl TrackRegistry {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Self::default()
        }
    }

    /// Fold a scan result into the catalog. Known tracks are re-marked
    /// present (their stored path refreshed), unknown paths become new
    /// tracks, and anything not rediscovered is pruned. Returns the
    /// (added, removed) counts; the cached tracklist and the scan tag are
    /// regenerated only when either is non-zero.
    pub fn reconcile(&mut self, discovered: &[String]) -> (usize, usize) {
        let mut index: HashMap<String, usize> = HashMap::new();
        for (i, track) in self.tracks.iter_mut().enumerate() {
            track.present = false;
            index.insert(track.key.clone(), i);
        }

        let mut n_new = 0;
        for path in discovered {
            let key = make_path_key(path);
            match index.get(&key) {
                Some(&i) => self.tracks[i].mark_present(path),
                None => {
                    let track = Track::new(self.next_id, path.clone());
                    self.next_id += 1;
                    index.insert(key, self.tracks.len());
                    self.tracks.push(track);
                    n_new += 1;
                }
            }
        }

        let before = self.tracks.len();
        self.tracks.retain(|t| t.present);
        let n_del = before - self.tracks.len();
        self.tracks.sort_by(|a, b| a.key.cmp(&b.key));

        if n_new > 0 || n_del > 0 {
            info!("rescan finished: {n_new} new track(s), {n_del} track(s) deleted");
            self.scan_tag = Some(chrono::Utc::now().timestamp().to_string());
            self.rebuild_tracklist();
        }
        (n_new, n_del)
    }

    fn rebuild_tracklist(&mut self) {
        let listing = self
            .tracks
            .iter()
            .map(|t| t.fmt(""))
            .collect::<Vec<_>>()
            .join("\n");
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        self.tracklist_deflated = encoder
            .write_all(listing.as_bytes())
            .and_then(|_| encoder.finish())
            .ok();
        self.tracklist = Some(listing);
    }

    pub fn lookup(&self, id: u64) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// Exact, case-insensitive, path-normalized match. Used to resolve
    /// persisted names whose on-disk casing may have shifted since.
    pub fn find_by_key(&self, name: &str) -> Option<&Track> {
        let key = make_key(name);
        self.tracks.iter().find(|t| t.key == key)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn scan_tag(&self) -> Option<&str> {
        self.scan_tag.as_deref()
    }

    pub fn tracklist(&self) -> Option<&str> {
        self.tracklist.as_deref()
    }

    pub fn tracklist_deflated(&self) -> Option<&[u8]> {
        self.tracklist_deflated.as_deref()
    }
}
