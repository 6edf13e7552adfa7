//! The recognition-dispatch loop.
//!
//! One long-lived blocking actor: poll the camera, classify the frame
//! against the current identity snapshot, consult the entrance ledger,
//! and fan out audio + notification side effects. Every iteration
//! walks the explicit state machine in [`Step`]; no two iterations
//! overlap, and every failure is handled locally — nothing propagates
//! out and terminates the loop.

use crate::notify::{self, Notifier};
use crate::pause::PauseControl;
use chime_core::{Biometrics, KnownIdentity, MatchPolicy, RecognitionResult};
use chime_hw::{AudioError, CameraError, Frame};
use chime_store::StoreError;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Granularity of the idle wait; the shutdown flag is observed at this
/// interval while sleeping.
const IDLE_SLICE: Duration = Duration::from_millis(200);

/// Camera seam: anything that can produce a frame on demand.
pub trait FrameSource {
    fn capture(&mut self) -> Result<Frame, CameraError>;
}

impl FrameSource for chime_hw::Camera {
    fn capture(&mut self) -> Result<Frame, CameraError> {
        chime_hw::Camera::capture(self)
    }
}

/// Identity-directory seam: yields the per-cycle snapshot.
pub trait IdentitySource {
    fn snapshot(&mut self) -> Result<Vec<KnownIdentity>, StoreError>;
}

impl IdentitySource for chime_store::IdentityStore {
    fn snapshot(&mut self) -> Result<Vec<KnownIdentity>, StoreError> {
        chime_store::IdentityStore::snapshot(self)
    }
}

/// Entrance-ledger seam.
pub trait EntranceLog {
    fn has_entered_recently(
        &mut self,
        name: &str,
        now: chrono::DateTime<Utc>,
    ) -> Result<bool, StoreError>;
    fn record(&mut self, name: &str, now: chrono::DateTime<Utc>) -> Result<(), StoreError>;
}

impl EntranceLog for chime_store::EntranceLedger {
    fn has_entered_recently(
        &mut self,
        name: &str,
        now: chrono::DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        chime_store::EntranceLedger::has_entered_recently(self, name, now)
    }

    fn record(&mut self, name: &str, now: chrono::DateTime<Utc>) -> Result<(), StoreError> {
        chime_store::EntranceLedger::record(self, name, now)
    }
}

/// Audio-output seam. Playback is exclusive and best-effort.
pub trait AudioOut {
    fn play(&mut self, clip: &[u8]) -> Result<(), AudioError>;
}

impl AudioOut for chime_hw::Speaker {
    fn play(&mut self, clip: &[u8]) -> Result<(), AudioError> {
        chime_hw::Speaker::play(self, clip)
    }
}

/// States of one polling iteration. Each cycle starts at `CheckPause`
/// and terminates at `Idle`; the fixed inter-cycle wait happens
/// between cycles.
enum Step {
    CheckPause,
    Capture,
    Classify(Frame),
    CheckLedger {
        name: String,
        clip: Option<Vec<u8>>,
    },
    NotifyKnown {
        name: String,
        clip: Option<Vec<u8>>,
    },
    NotifyUnknown,
    Idle,
}

pub struct DispatchLoop<C, I, L, A, B> {
    pub camera: C,
    pub identities: I,
    pub ledger: L,
    pub audio: A,
    pub engine: B,
    pub policy: MatchPolicy,
    pub channels: Vec<Box<dyn Notifier>>,
    pub pause: PauseControl,
    /// Default chime bytes; `None` when the configured file was
    /// missing at startup (audio is then skipped with a warning).
    pub default_chime: Option<Vec<u8>>,
    pub poll_interval: Duration,
    pub shutdown: Arc<AtomicBool>,
}

impl<C, I, L, A, B> DispatchLoop<C, I, L, A, B>
where
    C: FrameSource,
    I: IdentitySource,
    L: EntranceLog,
    A: AudioOut,
    B: Biometrics,
{
    /// Run until the shutdown flag is raised. Checked at the
    /// CHECK_PAUSE boundary and throughout the idle wait.
    pub fn run(&mut self) {
        tracing::info!("dispatch loop started");
        while !self.shutdown.load(Ordering::SeqCst) {
            self.run_cycle();
            self.idle_wait();
        }
        tracing::info!("dispatch loop stopped");
    }

    /// Walk the state machine for exactly one polling iteration.
    pub fn run_cycle(&mut self) {
        let mut step = Step::CheckPause;
        loop {
            step = match step {
                Step::CheckPause => self.check_pause(),
                Step::Capture => self.capture(),
                Step::Classify(frame) => self.classify(frame),
                Step::CheckLedger { name, clip } => self.check_ledger(name, clip),
                Step::NotifyKnown { name, clip } => self.notify_known(name, clip),
                Step::NotifyUnknown => self.notify_unknown(),
                Step::Idle => return,
            };
        }
    }

    fn check_pause(&mut self) -> Step {
        // Re-read the durable flag so toggles from the admin CLI take
        // effect by the next iteration. Fall back to the mirrored
        // value when the store is unreadable.
        if let Err(err) = self.pause.refresh() {
            tracing::warn!(error = %err, "pause state re-read failed; using last known value");
        }
        if self.pause.is_paused() {
            tracing::debug!("paused; skipping cycle");
            Step::Idle
        } else {
            Step::Capture
        }
    }

    fn capture(&mut self) -> Step {
        match self.camera.capture() {
            Ok(frame) if frame.is_dark() => {
                tracing::debug!(sequence = frame.sequence, "dark frame; skipping cycle");
                Step::Idle
            }
            Ok(frame) => Step::Classify(frame),
            Err(err) => {
                tracing::warn!(error = %err, "capture failed; skipping cycle");
                Step::Idle
            }
        }
    }

    fn classify(&mut self, frame: Frame) -> Step {
        let snapshot = match self.identities.snapshot() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::error!(error = %err, "identity snapshot read failed; skipping cycle");
                return Step::Idle;
            }
        };

        let result = self.policy.classify(
            &mut self.engine,
            &frame.data,
            frame.width,
            frame.height,
            &snapshot,
        );

        match result {
            RecognitionResult::NoOne => {
                tracing::debug!("no one at the door");
                Step::Idle
            }
            RecognitionResult::Unknown => Step::NotifyUnknown,
            RecognitionResult::Identified(name) => {
                let clip = snapshot
                    .iter()
                    .find(|id| id.name == name)
                    .and_then(|id| id.audio_clip.clone());
                Step::CheckLedger { name, clip }
            }
        }
    }

    fn check_ledger(&mut self, name: String, clip: Option<Vec<u8>>) -> Step {
        match self.ledger.has_entered_recently(&name, Utc::now()) {
            Ok(true) => {
                tracing::info!(name = %name, "already entered today; skipping notification");
                Step::Idle
            }
            Ok(false) => Step::NotifyKnown { name, clip },
            Err(err) => {
                tracing::error!(name = %name, error = %err, "entrance ledger read failed; skipping cycle");
                Step::Idle
            }
        }
    }

    fn notify_known(&mut self, name: String, clip: Option<Vec<u8>>) -> Step {
        tracing::info!(name = %name, "recognized entrance");

        // Audio and notification are independent best-effort actions:
        // a failure in one never blocks the other.
        match clip.as_deref() {
            Some(clip) => self.play(clip),
            None => {
                tracing::debug!(name = %name, "no registered clip; falling back to default chime");
                self.play_default_chime();
            }
        }
        notify::send_all(&self.channels, &format!("{name} is in the building!"));

        if let Err(err) = self.ledger.record(&name, Utc::now()) {
            // Distinct from other failures: an unrecorded entrance
            // means the next cycle may notify again.
            tracing::error!(
                name = %name,
                error = %err,
                "entrance ledger write failed; duplicate notifications possible next cycle"
            );
        }
        Step::Idle
    }

    fn notify_unknown(&mut self) -> Step {
        tracing::info!("unknown person at the door");
        self.play_default_chime();
        notify::send_all(&self.channels, "Unknown person at the door");
        Step::Idle
    }

    fn play_default_chime(&mut self) {
        match self.default_chime.clone() {
            Some(clip) => self.play(&clip),
            None => tracing::warn!("no default chime loaded; skipping audio"),
        }
    }

    fn play(&mut self, clip: &[u8]) {
        if let Err(err) = self.audio.play(clip) {
            tracing::warn!(error = %err, "audio playback failed");
        }
    }

    /// Fixed inter-cycle delay, sliced so a shutdown request wakes the
    /// loop promptly.
    fn idle_wait(&self) {
        let mut remaining = self.poll_interval;
        while remaining > Duration::ZERO && !self.shutdown.load(Ordering::SeqCst) {
            let slice = remaining.min(IDLE_SLICE);
            std::thread::sleep(slice);
            remaining = remaining.saturating_sub(slice);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotifyError;
    use chime_core::{BiometricsError, FaceEncoding, FaceRegion};
    use chime_store::PauseStore;
    use chrono::{DateTime, Duration as ChronoDuration};
    use std::cell::RefCell;
    use std::path::Path;
    use std::rc::Rc;

    // --- fakes ----------------------------------------------------

    struct FakeCamera {
        frames: Vec<Result<Frame, CameraError>>,
        captures: usize,
    }

    impl FakeCamera {
        fn lit() -> Self {
            Self {
                frames: vec![],
                captures: 0,
            }
        }
    }

    impl FrameSource for FakeCamera {
        fn capture(&mut self) -> Result<Frame, CameraError> {
            self.captures += 1;
            if self.frames.is_empty() {
                Ok(Frame {
                    data: vec![128u8; 16],
                    width: 4,
                    height: 4,
                    sequence: self.captures as u32,
                })
            } else {
                self.frames.remove(0)
            }
        }
    }

    struct FakeIdentities {
        snapshot: Vec<KnownIdentity>,
    }

    impl IdentitySource for FakeIdentities {
        fn snapshot(&mut self) -> Result<Vec<KnownIdentity>, StoreError> {
            Ok(self.snapshot.clone())
        }
    }

    /// In-memory ledger honoring the rolling 24-hour window.
    #[derive(Default)]
    struct FakeLedger {
        rows: Rc<RefCell<Vec<(String, DateTime<Utc>)>>>,
        fail_writes: bool,
    }

    impl EntranceLog for FakeLedger {
        fn has_entered_recently(
            &mut self,
            name: &str,
            now: DateTime<Utc>,
        ) -> Result<bool, StoreError> {
            let cutoff = now - ChronoDuration::hours(24);
            Ok(self
                .rows
                .borrow()
                .iter()
                .any(|(n, ts)| n == name && *ts > cutoff))
        }

        fn record(&mut self, name: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
            if self.fail_writes {
                return Err(StoreError::CorruptTimestamp("injected failure".into()));
            }
            self.rows.borrow_mut().push((name.to_string(), now));
            Ok(())
        }
    }

    struct FakeAudio {
        played: Rc<RefCell<Vec<Vec<u8>>>>,
    }

    impl AudioOut for FakeAudio {
        fn play(&mut self, clip: &[u8]) -> Result<(), AudioError> {
            self.played.borrow_mut().push(clip.to_vec());
            Ok(())
        }
    }

    struct RecordingNotifier {
        sent: Rc<RefCell<Vec<String>>>,
    }

    impl Notifier for RecordingNotifier {
        fn channel(&self) -> &'static str {
            "recording"
        }

        fn send(&self, text: &str) -> Result<(), NotifyError> {
            self.sent.borrow_mut().push(text.to_string());
            Ok(())
        }
    }

    /// Biometrics fake that always sees one face with a fixed probe
    /// encoding, or nothing at all.
    struct FakeEngine {
        probe: Option<Vec<f32>>,
    }

    impl Biometrics for FakeEngine {
        fn locate(
            &mut self,
            _frame: &[u8],
            _w: u32,
            _h: u32,
        ) -> Result<Vec<FaceRegion>, BiometricsError> {
            Ok(match self.probe {
                Some(_) => vec![FaceRegion {
                    x: 0.0,
                    y: 0.0,
                    width: 4.0,
                    height: 4.0,
                    confidence: 0.9,
                }],
                None => vec![],
            })
        }

        fn encode(
            &mut self,
            _frame: &[u8],
            _w: u32,
            _h: u32,
            _regions: &[FaceRegion],
        ) -> Result<Vec<FaceEncoding>, BiometricsError> {
            Ok(self
                .probe
                .iter()
                .map(|p| FaceEncoding::new(p.clone()))
                .collect())
        }
    }

    // --- harness --------------------------------------------------

    struct Harness {
        played: Rc<RefCell<Vec<Vec<u8>>>>,
        sent: Rc<RefCell<Vec<String>>>,
        ledger_rows: Rc<RefCell<Vec<(String, DateTime<Utc>)>>>,
        dispatch: DispatchLoop<FakeCamera, FakeIdentities, FakeLedger, FakeAudio, FakeEngine>,
    }

    fn alice() -> KnownIdentity {
        KnownIdentity {
            name: "Alice".into(),
            encoding: FaceEncoding::new(vec![1.0, 0.0]),
            audio_clip: Some(b"alice-clip".to_vec()),
        }
    }

    fn harness(snapshot: Vec<KnownIdentity>, probe: Option<Vec<f32>>) -> Harness {
        let played = Rc::new(RefCell::new(vec![]));
        let sent = Rc::new(RefCell::new(vec![]));
        let ledger_rows = Rc::new(RefCell::new(vec![]));

        let dispatch = DispatchLoop {
            camera: FakeCamera::lit(),
            identities: FakeIdentities { snapshot },
            ledger: FakeLedger {
                rows: ledger_rows.clone(),
                fail_writes: false,
            },
            audio: FakeAudio {
                played: played.clone(),
            },
            engine: FakeEngine { probe },
            policy: MatchPolicy::default(),
            channels: vec![Box::new(RecordingNotifier { sent: sent.clone() })],
            pause: PauseControl::load(PauseStore::open(Path::new(":memory:")).unwrap()).unwrap(),
            default_chime: Some(b"default-chime".to_vec()),
            poll_interval: Duration::from_millis(1),
            shutdown: Arc::new(AtomicBool::new(false)),
        };

        Harness {
            played,
            sent,
            ledger_rows,
            dispatch,
        }
    }

    // --- scenarios ------------------------------------------------

    #[test]
    fn test_known_person_first_entrance() {
        let mut h = harness(vec![alice()], Some(vec![1.0, 0.0]));
        h.dispatch.run_cycle();

        assert_eq!(h.played.borrow().as_slice(), &[b"alice-clip".to_vec()]);
        assert_eq!(
            h.sent.borrow().as_slice(),
            &["Alice is in the building!".to_string()]
        );
        assert_eq!(h.ledger_rows.borrow().len(), 1);
        assert_eq!(h.ledger_rows.borrow()[0].0, "Alice");
    }

    #[test]
    fn test_second_sighting_within_window_is_deduped() {
        let mut h = harness(vec![alice()], Some(vec![1.0, 0.0]));
        h.dispatch.run_cycle();
        h.dispatch.run_cycle();

        // Exactly one clip, one notification, one ledger row.
        assert_eq!(h.played.borrow().len(), 1);
        assert_eq!(h.sent.borrow().len(), 1);
        assert_eq!(h.ledger_rows.borrow().len(), 1);
    }

    #[test]
    fn test_entrance_after_window_notifies_again() {
        let mut h = harness(vec![alice()], Some(vec![1.0, 0.0]));
        h.dispatch.run_cycle();

        // Age the recorded entrance past the window.
        {
            let mut rows = h.ledger_rows.borrow_mut();
            rows[0].1 = rows[0].1 - ChronoDuration::hours(25);
        }
        h.dispatch.run_cycle();

        assert_eq!(h.sent.borrow().len(), 2);
        assert_eq!(h.ledger_rows.borrow().len(), 2);
    }

    #[test]
    fn test_unknown_person_plays_chime_no_ledger_write() {
        // Probe orthogonal to Alice: outside tolerance.
        let mut h = harness(vec![alice()], Some(vec![0.0, 1.0]));
        h.dispatch.run_cycle();

        assert_eq!(h.played.borrow().as_slice(), &[b"default-chime".to_vec()]);
        assert_eq!(
            h.sent.borrow().as_slice(),
            &["Unknown person at the door".to_string()]
        );
        assert!(h.ledger_rows.borrow().is_empty());
    }

    #[test]
    fn test_no_face_is_silent() {
        let mut h = harness(vec![alice()], None);
        h.dispatch.run_cycle();

        assert!(h.played.borrow().is_empty());
        assert!(h.sent.borrow().is_empty());
        assert!(h.ledger_rows.borrow().is_empty());
    }

    #[test]
    fn test_empty_snapshot_treated_as_unknown() {
        let mut h = harness(vec![], Some(vec![1.0, 0.0]));
        h.dispatch.run_cycle();

        assert_eq!(
            h.sent.borrow().as_slice(),
            &["Unknown person at the door".to_string()]
        );
        assert!(h.ledger_rows.borrow().is_empty());
    }

    #[test]
    fn test_capture_failure_skips_cycle() {
        let mut h = harness(vec![alice()], Some(vec![1.0, 0.0]));
        h.dispatch.camera.frames = vec![Err(CameraError::CaptureFailed("gone".into()))];
        h.dispatch.run_cycle();

        assert!(h.played.borrow().is_empty());
        assert!(h.sent.borrow().is_empty());
        assert!(h.ledger_rows.borrow().is_empty());
    }

    #[test]
    fn test_dark_frame_skips_cycle() {
        let mut h = harness(vec![alice()], Some(vec![1.0, 0.0]));
        h.dispatch.camera.frames = vec![Ok(Frame {
            data: vec![0u8; 16],
            width: 4,
            height: 4,
            sequence: 1,
        })];
        h.dispatch.run_cycle();

        assert!(h.sent.borrow().is_empty());
    }

    #[test]
    fn test_paused_loop_does_nothing() {
        let mut h = harness(vec![alice()], Some(vec![1.0, 0.0]));
        h.dispatch.pause.set_paused(true).unwrap();
        h.dispatch.run_cycle();

        assert_eq!(h.dispatch.camera.captures, 0);
        assert!(h.played.borrow().is_empty());
        assert!(h.sent.borrow().is_empty());
    }

    #[test]
    fn test_unpausing_resumes_next_cycle() {
        let mut h = harness(vec![alice()], Some(vec![1.0, 0.0]));
        h.dispatch.pause.set_paused(true).unwrap();
        h.dispatch.run_cycle();
        assert!(h.sent.borrow().is_empty());

        h.dispatch.pause.set_paused(false).unwrap();
        h.dispatch.run_cycle();
        assert_eq!(h.sent.borrow().len(), 1);
    }

    #[test]
    fn test_missing_clip_falls_back_to_default_chime() {
        let mut id = alice();
        id.audio_clip = None;
        let mut h = harness(vec![id], Some(vec![1.0, 0.0]));
        h.dispatch.run_cycle();

        assert_eq!(h.played.borrow().as_slice(), &[b"default-chime".to_vec()]);
        assert_eq!(h.sent.borrow().len(), 1);
    }

    #[test]
    fn test_ledger_write_failure_does_not_kill_cycle() {
        let mut h = harness(vec![alice()], Some(vec![1.0, 0.0]));
        h.dispatch.ledger.fail_writes = true;
        h.dispatch.run_cycle();

        // Side effects still happened; only the row is missing.
        assert_eq!(h.played.borrow().len(), 1);
        assert_eq!(h.sent.borrow().len(), 1);
        assert!(h.ledger_rows.borrow().is_empty());

        // Next cycle notifies again — the documented duplicate risk.
        h.dispatch.run_cycle();
        assert_eq!(h.sent.borrow().len(), 2);
    }

    #[test]
    fn test_missing_default_chime_still_notifies() {
        let mut h = harness(vec![alice()], Some(vec![0.0, 1.0]));
        h.dispatch.default_chime = None;
        h.dispatch.run_cycle();

        assert!(h.played.borrow().is_empty());
        assert_eq!(h.sent.borrow().len(), 1);
    }

    #[test]
    fn test_shutdown_stops_run() {
        let mut h = harness(vec![], None);
        h.dispatch.shutdown.store(true, Ordering::SeqCst);
        // Must return promptly instead of looping forever.
        h.dispatch.run();
    }
}
