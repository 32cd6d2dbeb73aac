use crate::annotate::Annotator;
use crate::ring::SharedRing;
use chrono::{DateTime, Local, TimeDelta};
use image::RgbImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tunetrap_core::{Classification, EmotionClassifier};
use tunetrap_hw::{Frame, FrameSource};

/// Pause after a failed camera read.
pub const READ_RETRY_PAUSE: Duration = Duration::from_millis(50);
/// Pause after each published result when rendering on the loop thread.
pub const INLINE_PAUSE: Duration = Duration::from_millis(30);
/// Pause after each published result on the capture thread.
pub const THREADED_PAUSE: Duration = Duration::from_millis(10);

/// Shared running/stopped switch for a frame loop.
#[derive(Debug, Clone)]
pub struct RunFlag(Arc<AtomicBool>);

impl Default for RunFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl RunFlag {
    /// A flag in the running state.
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One classified frame, ready to render.
#[derive(Debug, Clone)]
pub struct FrameResult {
    /// 1-based count of frames read.
    pub frame_number: u64,
    /// Driver sequence number of the source frame.
    pub sequence: u32,
    pub classification: Classification,
    pub annotated: RgbImage,
    pub captured_at: DateTime<Local>,
}

/// Wall-clock time at which `frame` was captured.
fn capture_time(frame: &Frame) -> DateTime<Local> {
    let age = TimeDelta::from_std(frame.timestamp.elapsed()).unwrap_or(TimeDelta::zero());
    Local::now() - age
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoopStats {
    pub frames_read: u64,
    pub classified: u64,
    pub read_failures: u64,
    pub detect_failures: u64,
}

/// Capture → skip → classify → annotate → publish, until the flag stops.
///
/// The loop owns its frame source, so the camera is released when
/// [`FrameLoop::run`] returns or unwinds.
pub struct FrameLoop<S, D> {
    source: S,
    detector: D,
    annotator: Annotator,
    flag: RunFlag,
    skip: u64,
    pause: Duration,
}

impl<S: FrameSource, D: EmotionClassifier> FrameLoop<S, D> {
    /// Classify every `skip`-th frame; zero is treated as one.
    pub fn new(source: S, detector: D, annotator: Annotator, flag: RunFlag, skip: u64) -> Self {
        Self {
            source,
            detector,
            annotator,
            flag,
            skip: skip.max(1),
            pause: INLINE_PAUSE,
        }
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn run(mut self, mut publish: impl FnMut(FrameResult)) -> LoopStats {
        let mut stats = LoopStats::default();
        let mut counter = 0u64;
        tracing::info!(skip = self.skip, "frame loop started");

        while self.flag.is_running() {
            let frame = match self.source.read_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    stats.read_failures += 1;
                    tracing::debug!(error = %e, "frame read failed, retrying");
                    thread::sleep(READ_RETRY_PAUSE);
                    continue;
                }
            };

            let captured_at = capture_time(&frame);
            counter += 1;
            stats.frames_read += 1;
            if counter % self.skip != 0 {
                continue;
            }

            match self.detector.classify(&frame.image) {
                Ok(classification) => {
                    stats.classified += 1;
                    let mut annotated = frame.image;
                    self.annotator.annotate(&mut annotated, &classification);
                    publish(FrameResult {
                        frame_number: counter,
                        sequence: frame.sequence,
                        classification,
                        annotated,
                        captured_at,
                    });
                }
                Err(e) => {
                    stats.detect_failures += 1;
                    tracing::warn!(
                        frame = counter,
                        sequence = frame.sequence,
                        error = %e,
                        "emotion detection failed"
                    );
                }
            }

            if !self.pause.is_zero() {
                thread::sleep(self.pause);
            }
        }

        tracing::info!(
            frames_read = stats.frames_read,
            classified = stats.classified,
            read_failures = stats.read_failures,
            detect_failures = stats.detect_failures,
            "frame loop stopped"
        );
        stats
    }
}

impl<S, D> FrameLoop<S, D>
where
    S: FrameSource + Send + 'static,
    D: EmotionClassifier + Send + 'static,
{
    /// Run on a dedicated capture thread, publishing into `ring`.
    ///
    /// A full ring drops its oldest unread result.
    pub fn spawn(self, ring: SharedRing<FrameResult>) -> std::io::Result<JoinHandle<LoopStats>> {
        thread::Builder::new()
            .name("tunetrap-capture".into())
            .spawn(move || {
                self.run(|result| {
                    if let Some(dropped) = ring.push(result) {
                        tracing::trace!(
                            frame = dropped.frame_number,
                            sequence = dropped.sequence,
                            "renderer behind, dropped result"
                        );
                    }
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::collections::VecDeque;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Instant;
    use tunetrap_core::{DetectError, FaceBox, Label, Prediction};
    use tunetrap_hw::{CameraError, Frame};

    /// Replays scripted reads, then stops the loop. Counts its own drops.
    struct ScriptedSource {
        reads: VecDeque<Option<u8>>,
        flag: RunFlag,
        age: Duration,
        drops: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn frames(values: impl IntoIterator<Item = u8>, flag: &RunFlag) -> Self {
            Self::script(values.into_iter().map(Some), flag)
        }

        fn script(reads: impl IntoIterator<Item = Option<u8>>, flag: &RunFlag) -> Self {
            Self {
                reads: reads.into_iter().collect(),
                flag: flag.clone(),
                age: Duration::ZERO,
                drops: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn read_frame(&mut self) -> Result<Frame, CameraError> {
            match self.reads.pop_front() {
                Some(Some(n)) => {
                    let image = RgbImage::from_pixel(1, 1, Rgb([n, n, n]));
                    let mut frame = Frame::new(image, 100 + n as u32);
                    frame.timestamp = Instant::now() - self.age;
                    Ok(frame)
                }
                Some(None) => Err(CameraError::CaptureFailed("scripted failure".into())),
                None => {
                    self.flag.stop();
                    Err(CameraError::CaptureFailed("end of script".into()))
                }
            }
        }
    }

    impl Drop for ScriptedSource {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Records the pixel value of every classified frame.
    struct RecordingDetector {
        seen: Arc<Mutex<Vec<u8>>>,
        fail_on: Option<u8>,
        panic_on: Option<u8>,
        face: Option<FaceBox>,
    }

    impl RecordingDetector {
        fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let detector = Self {
                seen: Arc::clone(&seen),
                fail_on: None,
                panic_on: None,
                face: None,
            };
            (detector, seen)
        }
    }

    impl EmotionClassifier for RecordingDetector {
        fn classify(&mut self, frame: &RgbImage) -> Result<Classification, DetectError> {
            let value = frame.get_pixel(0, 0).0[0];
            self.seen.lock().unwrap().push(value);
            if self.panic_on == Some(value) {
                panic!("detector crashed on frame {value}");
            }
            if self.fail_on == Some(value) {
                return Err(DetectError::Backend("inference exploded".into()));
            }
            Ok(Classification::from_prediction(
                Prediction::new(Label::Happy, 0.9),
                self.face,
            ))
        }
    }

    fn frame_loop(
        source: ScriptedSource,
        detector: RecordingDetector,
        flag: &RunFlag,
        skip: u64,
    ) -> FrameLoop<ScriptedSource, RecordingDetector> {
        FrameLoop::new(source, detector, Annotator::without_text(), flag.clone(), skip)
            .with_pause(Duration::ZERO)
    }

    #[test]
    fn test_skip_three_classifies_every_third_frame() {
        let flag = RunFlag::new();
        let (detector, seen) = RecordingDetector::new();
        let mut published = Vec::new();

        let stats = frame_loop(ScriptedSource::frames(1..=9, &flag), detector, &flag, 3)
            .run(|r| published.push(r.frame_number));

        assert_eq!(*seen.lock().unwrap(), vec![3, 6, 9]);
        assert_eq!(published, vec![3, 6, 9]);
        assert_eq!(stats.frames_read, 9);
        assert_eq!(stats.classified, 3);
    }

    #[test]
    fn test_zero_skip_is_one() {
        let flag = RunFlag::new();
        let (detector, seen) = RecordingDetector::new();
        frame_loop(ScriptedSource::frames(1..=3, &flag), detector, &flag, 0).run(|_| {});
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_read_failures_are_retried() {
        let flag = RunFlag::new();
        let (detector, seen) = RecordingDetector::new();
        let source = ScriptedSource::script([None, Some(1), None, Some(2)], &flag);

        let stats = frame_loop(source, detector, &flag, 1).run(|_| {});

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        // Two scripted failures plus the read that ends the script.
        assert_eq!(stats.read_failures, 3);
        assert_eq!(stats.frames_read, 2);
    }

    #[test]
    fn test_detector_error_does_not_stop_loop() {
        let flag = RunFlag::new();
        let (mut detector, _) = RecordingDetector::new();
        detector.fail_on = Some(4);
        let mut published = Vec::new();

        let stats = frame_loop(ScriptedSource::frames(1..=5, &flag), detector, &flag, 1)
            .run(|r| published.push(r.frame_number));

        assert_eq!(published, vec![1, 2, 3, 5]);
        assert_eq!(stats.detect_failures, 1);
    }

    #[test]
    fn test_stopped_flag_reads_nothing() {
        let flag = RunFlag::new();
        flag.stop();
        let (detector, seen) = RecordingDetector::new();
        let stats =
            frame_loop(ScriptedSource::frames(1..=3, &flag), detector, &flag, 1).run(|_| {});
        assert_eq!(stats, LoopStats::default());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_published_frame_is_annotated() {
        let flag = RunFlag::new();
        let (mut detector, _) = RecordingDetector::new();
        let face = FaceBox {
            x: 0,
            y: 0,
            width: 1,
            height: 1,
        };
        detector.face = Some(face);
        let mut published = Vec::new();

        frame_loop(ScriptedSource::frames([7], &flag), detector, &flag, 1)
            .run(|r| published.push(r));

        assert_eq!(published.len(), 1);
        assert_eq!(published[0].classification.face, Some(face));
        assert_eq!(*published[0].annotated.get_pixel(0, 0), Rgb([0, 255, 0]));
    }

    #[test]
    fn test_spawn_keeps_newest_results() {
        let flag = RunFlag::new();
        let (detector, _) = RecordingDetector::new();
        let ring = SharedRing::new(2);

        let handle = frame_loop(ScriptedSource::frames(1..=5, &flag), detector, &flag, 1)
            .spawn(ring.clone())
            .unwrap();
        let stats = handle.join().unwrap();

        assert_eq!(stats.classified, 5);
        assert_eq!(ring.pop().map(|r| r.frame_number), Some(4));
        assert_eq!(ring.pop().map(|r| r.frame_number), Some(5));
        assert!(ring.pop().is_none());
    }

    #[test]
    fn test_published_result_carries_frame_sequence() {
        let flag = RunFlag::new();
        let (detector, _) = RecordingDetector::new();
        let mut published = Vec::new();

        frame_loop(ScriptedSource::frames(1..=4, &flag), detector, &flag, 2)
            .run(|r| published.push((r.frame_number, r.sequence)));

        assert_eq!(published, vec![(2, 102), (4, 104)]);
    }

    #[test]
    fn test_captured_at_is_read_time() {
        let flag = RunFlag::new();
        let (detector, _) = RecordingDetector::new();
        let mut source = ScriptedSource::frames([1], &flag);
        source.age = Duration::from_millis(500);
        let mut published = Vec::new();

        let before = Local::now();
        frame_loop(source, detector, &flag, 1).run(|r| published.push(r.captured_at));

        assert_eq!(published.len(), 1);
        let lag = before - published[0];
        assert!(lag >= TimeDelta::milliseconds(400), "lag {lag}");
        assert!(lag <= TimeDelta::milliseconds(600), "lag {lag}");
    }

    #[test]
    fn test_source_released_when_loop_stops() {
        let flag = RunFlag::new();
        let (detector, _) = RecordingDetector::new();
        let source = ScriptedSource::frames(1..=3, &flag);
        let drops = Arc::clone(&source.drops);

        frame_loop(source, detector, &flag, 1).run(|_| {});

        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_source_released_on_detector_panic() {
        let flag = RunFlag::new();
        let (mut detector, _) = RecordingDetector::new();
        detector.panic_on = Some(2);
        let source = ScriptedSource::frames(1..=3, &flag);
        let drops = Arc::clone(&source.drops);
        let frame_loop = frame_loop(source, detector, &flag, 1);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| frame_loop.run(|_| {})));

        assert!(outcome.is_err());
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_spawned_loop_releases_source() {
        let flag = RunFlag::new();
        let (detector, _) = RecordingDetector::new();
        let source = ScriptedSource::frames(1..=2, &flag);
        let drops = Arc::clone(&source.drops);

        let handle = frame_loop(source, detector, &flag, 1)
            .spawn(SharedRing::new(2))
            .unwrap();
        handle.join().unwrap();

        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
}
