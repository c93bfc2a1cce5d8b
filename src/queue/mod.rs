// Queue and history engine - the heart of the jukebox. One Jukebox instance
// owns the track catalog, the current/playlist/history state, the play
// counts and the player supervisor; everything mutable is reached through
// the single SharedJukebox lock, and each public method is one atomic
// operation from the point of view of the web remote and the poll timer.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::prelude::*;
use tracing::{error, info, warn};

use crate::library::{MediaScanner, Track, TrackRegistry};
use crate::player::PlayerSupervisor;
use crate::state;
use crate::status::StatusScreen;

/// The one exclusive lock every caller goes through: web handlers, the poll
/// timer and shutdown all serialize here, so no operation ever observes
/// another halfway done.
pub type SharedJukebox = Arc<Mutex<Jukebox>>;

/// Knobs the engine needs; everything else stays in `Config`.
#[derive(Debug, Clone)]
pub struct JukeboxOptions {
    pub state_file: PathBuf,
    pub autosave: bool,
    pub autoscan: bool,
    pub max_history: usize,
    pub min_play_time: Duration,
}

#[derive(Debug)]
pub struct Jukebox {
    root: PathBuf,
    scanner: MediaScanner,
    registry: TrackRegistry,
    player: PlayerSupervisor,
    status: StatusScreen,

    /// Track key assigned to the player right now. Never also in the
    /// playlist or the history.
    current: Option<String>,
    /// Front is next to play. No duplicate keys.
    playlist: Vec<String>,
    /// Oldest first, duplicates allowed, capped at `max_history`.
    history: Vec<String>,
    /// Counts persist independently of the catalog; keys outlive deleted
    /// files and rejoin when the file reappears.
    playcounts: HashMap<String, u32>,
    /// An auto playlist is a disposable system pick: a single entry,
    /// replaced wholesale rather than appended to, never persisted.
    auto_playlist: bool,
    /// Auto-advance session: when set, a finished track starts the next.
    running: bool,
    first_in_session: bool,

    state_file: PathBuf,
    autosave: bool,
    autoscan: bool,
    max_history: usize,
    min_play_time: Duration,
    exit_code: Option<i32>,
}

impl Jukebox {
    pub fn new(
        root: PathBuf,
        scanner: MediaScanner,
        player: PlayerSupervisor,
        options: JukeboxOptions,
    ) -> Self {
        Self {
            root,
            scanner,
            registry: TrackRegistry::new(),
            player,
            status: StatusScreen::new(),
            current: None,
            playlist: Vec::new(),
            history: Vec::new(),
            playcounts: HashMap::new(),
            auto_playlist: false,
            running: false,
            first_in_session: true,
            state_file: options.state_file,
            autosave: options.autosave,
            autoscan: options.autoscan,
            max_history: options.max_history,
            min_play_time: options.min_play_time,
            exit_code: None,
        }
    }

    // ------------------------------------------------------------------
    // catalog
    // ------------------------------------------------------------------

    /// Re-walk the content root and reconcile the catalog; playlist entries
    /// whose files are gone drop out with it.
    pub fn rescan(&mut self) {
        let discovered = self.scanner.scan(&self.root);
        self.registry.reconcile(&discovered);
        let registry = &self.registry;
        self.playlist.retain(|k| registry.find_by_key(k).is_some());
        self.refill_if_empty();
    }

    pub fn registry(&self) -> &TrackRegistry {
        &self.registry
    }

    // ------------------------------------------------------------------
    // persistence
    // ------------------------------------------------------------------

    /// Replace history and playlist with the persisted state, resolving
    /// names against the catalog (stale names are expected after deletions
    /// and skipped silently). Play counts are seeded straight from their
    /// keys, no catalog needed.
    pub fn load_state(&mut self) {
        self.history.clear();
        self.playlist.clear();
        self.auto_playlist = false;
        if let Some(file) = state::load(&self.state_file) {
            for name in &file.history {
                if let Some(track) = self.registry.find_by_key(name) {
                    self.history.push(track.key.clone());
                }
            }
            for name in &file.playlist {
                if let Some(track) = self.registry.find_by_key(name) {
                    if !self.playlist.contains(&track.key) {
                        self.playlist.push(track.key.clone());
                    }
                }
            }
            for (key, count) in file.counts {
                self.playcounts.insert(key, count);
            }
            if self.history.len() > self.max_history {
                let excess = self.history.len() - self.max_history;
                self.history.drain(..excess);
            }
        }
        self.refill_if_empty();
    }

    pub fn save_state(&mut self, sort: bool) {
        let playlist = if self.auto_playlist {
            None
        } else {
            Some(self.playlist.as_slice())
        };
        let start = self.history.len().saturating_sub(self.max_history);
        let capped = &self.history[start..];
        if let Err(e) = state::save(&self.state_file, capped, playlist, &self.playcounts, sort) {
            warn!("failed to save state - {e}");
        }
    }

    /// The conditional side effects run at track transitions, not on every
    /// operation.
    fn checkpoint(&mut self) {
        if self.autosave {
            self.save_state(true);
        }
        if self.autoscan {
            self.rescan();
        }
    }

    // ------------------------------------------------------------------
    // queue operations
    // ------------------------------------------------------------------

    /// Top the playlist back up with one auto-picked track. The candidate
    /// pool excludes the current track and everything already heard; if
    /// that leaves nothing, history stops counting; if the catalog itself
    /// is empty there is nothing to do. A sqrt-sized random sample is drawn
    /// from the pool and the least-played sampled track wins, random draw
    /// breaking ties, so lesser-played tracks get priority without the
    /// selection collapsing onto a single global minimum.
    pub fn refill_if_empty(&mut self) {
        if !self.playlist.is_empty() {
            return;
        }
        let current = self.current.as_deref();
        let mut pool: Vec<String> = self
            .registry
            .tracks()
            .iter()
            .filter(|t| Some(t.key.as_str()) != current && !self.history.contains(&t.key))
            .map(|t| t.key.clone())
            .collect();
        if pool.is_empty() {
            pool = self
                .registry
                .tracks()
                .iter()
                .filter(|t| Some(t.key.as_str()) != current)
                .map(|t| t.key.clone())
                .collect();
        }
        if pool.is_empty() {
            return;
        }

        let sample_size = (((pool.len() as f64).sqrt() + 0.9) as usize).max(1);
        let mut rng = rand::thread_rng();
        let pick = pool
            .choose_multiple(&mut rng, sample_size)
            .map(|key| {
                let count = self.playcounts.get(key).copied().unwrap_or(0);
                (count, rng.gen::<f64>(), key)
            })
            .min_by(|a, b| {
                a.0.cmp(&b.0)
                    .then(a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            })
            .map(|(_, _, key)| key.clone());

        if let Some(key) = pick {
            self.playlist = vec![key];
            self.auto_playlist = true;
        }
    }

    pub fn add_to_front(&mut self, id: u64) {
        if let Some(key) = self.registry.lookup(id).map(|t| t.key.clone()) {
            self.push_front(key);
        }
    }

    fn push_front(&mut self, key: String) {
        self.playlist.retain(|k| k != &key);
        if self.auto_playlist {
            self.playlist = vec![key];
            self.auto_playlist = false;
        } else {
            self.playlist.insert(0, key);
        }
    }

    pub fn add_to_back(&mut self, id: u64) {
        let Some(key) = self.registry.lookup(id).map(|t| t.key.clone()) else {
            return;
        };
        if self.auto_playlist || self.playlist.is_empty() {
            self.playlist = vec![key];
            self.auto_playlist = false;
        } else {
            // move-to-back rather than append, keeping the playlist
            // duplicate-free
            self.playlist.retain(|k| k != &key);
            self.playlist.push(key);
        }
    }

    pub fn remove(&mut self, id: u64) {
        let Some(key) = self.registry.lookup(id).map(|t| t.key.clone()) else {
            return;
        };
        if Some(&key) == self.current.as_ref() {
            self.advance(false);
            return;
        }
        match self.playlist.iter().position(|k| k == &key) {
            Some(pos) => {
                self.playlist.remove(pos);
            }
            None => return,
        }
        self.refill_if_empty();
    }

    // ------------------------------------------------------------------
    // playback transitions
    // ------------------------------------------------------------------

    /// Stop whatever is current, then start the playlist head if playback
    /// was already running (or unconditionally when forced).
    pub fn advance(&mut self, force_play: bool) {
        self.stop_current(false, false);
        if force_play || self.running {
            self.start_playback(true);
        }
    }

    /// Step back to the most recent history entry.
    pub fn go_back(&mut self) {
        if self.history.is_empty() {
            return;
        }
        self.stop_current(true, false);
        if let Some(prev) = self.history.pop() {
            self.playlist.insert(0, prev);
        }
        self.auto_playlist = false;
        self.start_playback(true);
    }

    /// Start (or restart) playback of the playlist head.
    pub fn play(&mut self) {
        self.stop_current(true, false);
        self.start_playback(true);
    }

    /// Stop playback and leave the auto-advance session.
    pub fn halt(&mut self) {
        self.running = false;
        self.stop_current(false, false);
    }

    /// Force one specific track to play immediately.
    pub fn play_now(&mut self, id: u64) {
        let Some(key) = self.registry.lookup(id).map(|t| t.key.clone()) else {
            return;
        };
        self.push_front(key);
        self.running = true;
        self.stop_current(false, false);
        self.start_playback(false);
    }

    /// Replay from a point in history: everything from the most recent
    /// occurrence of the track onward moves to the playlist front in its
    /// original order.
    pub fn rewind_to(&mut self, id: u64) {
        let Some(key) = self.registry.lookup(id).map(|t| t.key.clone()) else {
            return;
        };
        if !self.history.contains(&key) {
            return;
        }
        self.stop_current(true, false);
        if let Some(idx) = self.history.iter().rposition(|k| k == &key) {
            let tail = self.history.split_off(idx);
            self.playlist.splice(0..0, tail);
        }
        self.auto_playlist = false;
        if self.running {
            self.start_playback(false);
        }
    }

    /// The transition into playing. Concurrent starts are a logic error:
    /// this is only reachable with nothing current and no live player, and
    /// a violation is reported rather than papered over.
    fn start_playback(&mut self, set_running: bool) {
        if self.current.is_some() || self.player.is_active() {
            error!("internal error: attempt to play a track while another is still playing");
            return;
        }
        self.refill_if_empty();
        let Some(head) = self.playlist.first().cloned() else {
            self.running = false;
            return;
        };
        let Some((path, label)) = self
            .registry
            .find_by_key(&head)
            .map(|t| (t.path.clone(), t.label.clone()))
        else {
            // the head went stale under us (file pruned); drop it and retry
            self.playlist.retain(|k| k != &head);
            return self.start_playback(set_running);
        };

        self.current = Some(head.clone());
        let prev_label = if self.first_in_session {
            None
        } else {
            self.history
                .last()
                .and_then(|k| self.registry.find_by_key(k))
                .map(|t| t.label.clone())
        };
        self.status.update(prev_label.as_deref(), Some(label.as_str()));
        self.first_in_session = false;
        info!("playing '{path}'");
        self.checkpoint();
        if let Some(pos) = self.playlist.iter().position(|k| k == &head) {
            self.playlist.remove(pos);
        }
        self.refill_if_empty();
        if set_running {
            self.running = true;
        }

        let abs_path = self.root.join(&path);
        if self.player.launch(&abs_path).is_err() {
            self.running = false;
            self.stop_current(true, false);
        }
    }

    /// Tear down the current track. It moves to the history (or back to the
    /// playlist front when `return_to_playlist`), its play count bumps if
    /// it ran long enough (or when forced, or when it never got a start
    /// time), and any live player process is terminated.
    fn stop_current(&mut self, return_to_playlist: bool, force_count: bool) {
        if let Some(key) = self.current.clone() {
            let track_path = self
                .registry
                .find_by_key(&key)
                .map(|t| t.path.clone())
                .unwrap_or_else(|| key.clone());
            info!("stopping '{track_path}'");

            if !return_to_playlist {
                self.history.push(key.clone());
                if self.history.len() > self.max_history {
                    let excess = self.history.len() - self.max_history;
                    self.history.drain(..excess);
                }
            } else if self.auto_playlist {
                self.playlist = vec![key.clone()];
            } else {
                self.playlist.insert(0, key.clone());
            }

            if !self.running {
                let label = self.registry.find_by_key(&key).map(|t| t.label.clone());
                self.status.update(label.as_deref(), None);
            }

            let elapsed = self.player.elapsed_since_start();
            if force_count || elapsed.map_or(true, |e| e >= self.min_play_time) {
                *self.playcounts.entry(key.clone()).or_insert(0) += 1;
            } else if let Some(e) = elapsed {
                info!(
                    "not adding to play counts (only played for {:.1} seconds)",
                    e.as_secs_f64()
                );
            }

            if !self.running {
                self.checkpoint();
            }
            self.current = None;
        }

        self.player.terminate();
        self.player.clear_start();
    }

    /// Driven by the poll timer: reap a finished player and move on. An
    /// implausibly fast exit bumps the failure streak; the streak cap turns
    /// the running session off instead of retrying forever.
    pub fn tick(&mut self) {
        let Some(report) = self.player.poll() else {
            return;
        };
        if report.halt_playback {
            self.running = false;
        }
        self.stop_current(false, report.acceptable);
        self.advance(false);
    }

    // ------------------------------------------------------------------
    // control-surface views
    // ------------------------------------------------------------------

    pub fn playlist_lines(&self) -> String {
        let mut lines = Vec::new();
        if let Some(track) = self.current_track() {
            lines.push(track.fmt("+"));
        }
        let prefix = if self.auto_playlist { "-" } else { "" };
        for key in &self.playlist {
            if let Some(track) = self.registry.find_by_key(key) {
                lines.push(track.fmt(prefix));
            }
        }
        lines.join("\n")
    }

    pub fn history_lines(&self) -> String {
        let mut lines = Vec::new();
        for key in &self.history {
            if let Some(track) = self.registry.find_by_key(key) {
                lines.push(track.fmt(""));
            }
        }
        if let Some(track) = self.current_track() {
            lines.push(track.fmt("+"));
        }
        lines.join("\n")
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current
            .as_deref()
            .and_then(|key| self.registry.find_by_key(key))
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_auto_playlist(&self) -> bool {
        self.auto_playlist
    }

    pub fn playlist_len(&self) -> usize {
        self.playlist.len()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn render_idle(&self) {
        self.status.update(None, None);
    }

    // ------------------------------------------------------------------
    // lifecycle
    // ------------------------------------------------------------------

    /// Quit-command entry point; the highest requested code wins.
    pub fn request_exit(&mut self, code: i32) {
        info!("exit with return code {code} requested");
        if self.exit_code.map_or(true, |c| code > c) {
            self.exit_code = Some(code);
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const MIN_PLAY: Duration = Duration::from_secs(120);

    fn seed_dir(tracks: &[&str]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in tracks {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, b"x").unwrap();
        }
        dir
    }

    fn make(dir: &TempDir, min_play_time: Duration) -> Jukebox {
        let scanner = MediaScanner::new(&["mp3".to_string()]);
        let player = PlayerSupervisor::new(
            vec!["true".to_string(), "$".to_string()],
            None,
            Duration::from_secs(3),
            5,
        );
        let options = JukeboxOptions {
            state_file: dir.path().join("state"),
            autosave: false,
            autoscan: false,
            max_history: 250,
            min_play_time,
        };
        let mut jb = Jukebox::new(dir.path().to_path_buf(), scanner, player, options);
        jb.rescan();
        jb
    }

    fn id_of(jb: &Jukebox, key: &str) -> u64 {
        jb.registry.find_by_key(key).unwrap().id
    }

    fn assert_invariants(jb: &Jukebox) {
        let mut seen = std::collections::HashSet::new();
        for key in &jb.playlist {
            assert!(seen.insert(key.clone()), "duplicate playlist entry {key}");
        }
        if let Some(current) = &jb.current {
            assert!(!jb.playlist.contains(current), "current is also queued");
        }
        if jb.auto_playlist {
            assert!(jb.playlist.len() <= 1, "auto playlist grew past one entry");
        }
    }

    #[test]
    fn refill_yields_an_auto_singleton() {
        let dir = seed_dir(&["a.mp3", "b.mp3", "c.mp3"]);
        let mut jb = make(&dir, MIN_PLAY);
        jb.playlist.clear();
        jb.auto_playlist = false;
        jb.refill_if_empty();
        assert_eq!(jb.playlist.len(), 1);
        assert!(jb.auto_playlist);
        assert_invariants(&jb);
    }

    #[test]
    fn refill_on_empty_catalog_is_a_noop() {
        let dir = seed_dir(&[]);
        let mut jb = make(&dir, MIN_PLAY);
        jb.refill_if_empty();
        assert!(jb.playlist.is_empty());
        assert!(!jb.auto_playlist);
    }

    #[test]
    fn refill_falls_back_to_heard_tracks_when_everything_is_history() {
        let dir = seed_dir(&["a.mp3", "b.mp3"]);
        let mut jb = make(&dir, MIN_PLAY);
        jb.playlist.clear();
        jb.history = vec!["a".to_string(), "b".to_string()];
        jb.refill_if_empty();
        assert_eq!(jb.playlist.len(), 1);
    }

    #[test]
    fn refill_never_picks_the_heavily_played_track() {
        let dir = seed_dir(&["a.mp3", "b.mp3", "c.mp3"]);
        let mut jb = make(&dir, MIN_PLAY);
        jb.playcounts.insert("a".to_string(), 5);

        let mut picked_b = 0;
        let mut picked_c = 0;
        for _ in 0..300 {
            jb.playlist.clear();
            jb.auto_playlist = false;
            jb.refill_if_empty();
            match jb.playlist[0].as_str() {
                "a" => panic!("picked the heavily played track over fresh ones"),
                "b" => picked_b += 1,
                "c" => picked_c += 1,
                other => panic!("unexpected pick {other}"),
            }
        }
        // roughly even split between the two unplayed tracks
        assert!(picked_b > 100, "b only picked {picked_b} times");
        assert!(picked_c > 100, "c only picked {picked_c} times");
    }

    #[test]
    fn queue_edits_keep_the_playlist_duplicate_free() {
        let dir = seed_dir(&["a.mp3", "b.mp3", "c.mp3", "d.mp3", "e.mp3"]);
        let mut jb = make(&dir, MIN_PLAY);
        let (a, b, c) = (id_of(&jb, "a"), id_of(&jb, "b"), id_of(&jb, "c"));

        // rescan left an auto pick behind; the first explicit add replaces it
        assert!(jb.auto_playlist);
        jb.add_to_back(a);
        assert_invariants(&jb);
        assert_eq!(jb.playlist, vec!["a"]);
        assert!(!jb.auto_playlist);

        jb.add_to_back(b);
        jb.add_to_front(c);
        assert_invariants(&jb);
        assert_eq!(jb.playlist, vec!["c", "a", "b"]);

        jb.add_to_back(a);
        assert_invariants(&jb);
        assert_eq!(jb.playlist, vec!["c", "b", "a"]);

        jb.add_to_front(a);
        assert_invariants(&jb);
        assert_eq!(jb.playlist, vec!["a", "c", "b"]);

        jb.remove(b);
        assert_eq!(jb.playlist, vec!["a", "c"]);
        jb.remove(b); // absent: accepted no-op
        assert_eq!(jb.playlist, vec!["a", "c"]);

        jb.add_to_back(99999); // unknown id: accepted no-op
        assert_eq!(jb.playlist, vec!["a", "c"]);
    }

    #[test]
    fn removing_the_last_entry_triggers_a_refill() {
        let dir = seed_dir(&["a.mp3", "b.mp3", "c.mp3"]);
        let mut jb = make(&dir, MIN_PLAY);
        let a = id_of(&jb, "a");
        jb.add_to_back(a);
        jb.remove(a);
        assert_eq!(jb.playlist.len(), 1);
        assert!(jb.auto_playlist);
    }

    #[test]
    fn rewind_moves_the_latest_occurrence_onward() {
        let dir = seed_dir(&["a.mp3", "b.mp3", "c.mp3"]);
        let mut jb = make(&dir, MIN_PLAY);
        jb.playlist.clear();
        jb.auto_playlist = false;
        jb.history = vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
            "c".to_string(),
        ];

        jb.rewind_to(id_of(&jb, "a"));
        assert_eq!(jb.playlist, vec!["a", "c"]);
        assert_eq!(jb.history, vec!["a", "b"]);
        assert!(!jb.auto_playlist);
    }

    #[test]
    fn rewind_to_a_track_not_in_history_is_a_noop() {
        let dir = seed_dir(&["a.mp3", "b.mp3"]);
        let mut jb = make(&dir, MIN_PLAY);
        jb.history = vec!["a".to_string()];
        let before = jb.playlist.clone();
        jb.rewind_to(id_of(&jb, "b"));
        assert_eq!(jb.playlist, before);
        assert_eq!(jb.history, vec!["a"]);
    }

    #[test]
    fn history_cap_applies_in_memory() {
        let dir = seed_dir(&["a.mp3", "b.mp3", "c.mp3"]);
        let mut jb = make(&dir, MIN_PLAY);
        jb.max_history = 2;
        for key in ["a", "b", "c"] {
            jb.current = Some(key.to_string());
            jb.stop_current(false, true);
        }
        assert_eq!(jb.history, vec!["b", "c"]);
    }

    #[test]
    fn stop_without_a_start_time_always_counts() {
        let dir = seed_dir(&["a.mp3"]);
        let mut jb = make(&dir, MIN_PLAY);
        jb.current = Some("a".to_string());
        jb.player.clear_start();
        jb.stop_current(false, false);
        assert_eq!(jb.playcounts.get("a"), Some(&1));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = seed_dir(&["a.mp3", "b.mp3", "c.mp3"]);
        let mut jb = make(&dir, MIN_PLAY);
        jb.history = vec!["a".to_string(), "b".to_string()];
        jb.playlist = vec!["c".to_string()];
        jb.auto_playlist = false;
        jb.playcounts.insert("a".to_string(), 3);
        jb.playcounts.insert("c".to_string(), 7);
        jb.save_state(true);

        let mut restored = make(&dir, MIN_PLAY);
        restored.load_state();
        assert_eq!(restored.history, vec!["a", "b"]);
        assert_eq!(restored.playlist, vec!["c"]);
        assert!(!restored.auto_playlist);
        assert_eq!(restored.playcounts.get("a"), Some(&3));
        assert_eq!(restored.playcounts.get("c"), Some(&7));
    }

    #[test]
    fn loading_an_auto_saved_state_refills() {
        let dir = seed_dir(&["a.mp3", "b.mp3"]);
        let mut jb = make(&dir, MIN_PLAY);
        // auto playlists are never written out
        assert!(jb.auto_playlist);
        jb.save_state(true);

        let mut restored = make(&dir, MIN_PLAY);
        restored.load_state();
        assert_eq!(restored.playlist.len(), 1);
        assert!(restored.auto_playlist);
    }

    #[test]
    fn listing_views_mark_current_and_auto_entries() {
        let dir = seed_dir(&["a.mp3", "b.mp3"]);
        let mut jb = make(&dir, MIN_PLAY);
        jb.playlist = vec!["a".to_string()];
        jb.auto_playlist = true;
        jb.current = Some("b".to_string());

        let playlist = jb.playlist_lines();
        let mut lines = playlist.lines();
        assert!(lines.next().unwrap().starts_with('+'));
        assert!(lines.next().unwrap().starts_with('-'));

        let history = jb.history_lines();
        assert!(history.lines().last().unwrap().starts_with('+'));
        jb.current = None;
    }

    #[cfg(unix)]
    mod with_stub_player {
        use super::*;

        #[test]
        fn short_play_does_not_count_but_still_lands_in_history() {
            let dir = seed_dir(&["a.mp3", "b.mp3"]);
            let mut jb = make(&dir, MIN_PLAY);
            let a = id_of(&jb, "a");
            jb.play_now(a);
            assert_eq!(jb.current.as_deref(), Some("a"));
            assert!(jb.is_running());

            jb.halt();
            assert!(jb.current.is_none());
            assert_eq!(jb.history, vec!["a"]);
            assert_eq!(jb.playcounts.get("a"), None);
        }

        #[test]
        fn play_past_the_threshold_counts_exactly_once() {
            let dir = seed_dir(&["a.mp3", "b.mp3"]);
            let mut jb = make(&dir, Duration::ZERO);
            let a = id_of(&jb, "a");
            jb.play_now(a);
            jb.halt();
            assert_eq!(jb.playcounts.get("a"), Some(&1));
        }

        #[test]
        fn removing_the_current_track_advances() {
            let dir = seed_dir(&["a.mp3", "b.mp3"]);
            let mut jb = make(&dir, MIN_PLAY);
            let a = id_of(&jb, "a");
            jb.play_now(a);
            jb.remove(a);
            assert_eq!(jb.current.as_deref(), Some("b"));
            assert_eq!(jb.history, vec!["a"]);
            assert_invariants(&jb);
        }

        #[test]
        fn go_back_replays_the_previous_track() {
            let dir = seed_dir(&["a.mp3", "b.mp3"]);
            let mut jb = make(&dir, MIN_PLAY);
            jb.play_now(id_of(&jb, "a"));
            jb.play_now(id_of(&jb, "b"));
            assert_eq!(jb.history, vec!["a"]);

            jb.go_back();
            assert_eq!(jb.current.as_deref(), Some("a"));
            assert!(jb.history.is_empty());
            assert_eq!(jb.playlist, vec!["b"]);
            assert!(!jb.auto_playlist);
            assert_invariants(&jb);
        }

        #[test]
        fn fast_exit_streak_halts_the_running_session() {
            let dir = seed_dir(&["a.mp3", "b.mp3", "c.mp3"]);
            let mut jb = make(&dir, MIN_PLAY);
            jb.play_now(id_of(&jb, "a"));
            assert!(jb.is_running());

            // `true` exits instantly, far below the 3 s acceptance floor;
            // every tick reaps one failed run and relaunches until the
            // streak cap turns the session off.
            for _ in 0..500 {
                jb.tick();
                if !jb.is_running() {
                    break;
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            assert!(!jb.is_running());
            assert_eq!(jb.player.fail_count(), 5);
            assert!(jb.current.is_none());
            // none of the aborted runs counted as a play
            assert_eq!(jb.playcounts.values().sum::<u32>(), 0);
        }
    }
}
