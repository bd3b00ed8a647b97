// tests/test_tracking.rs — End-to-end tracking with the CenSurE detector.

use std::time::Duration;

use censure_track::detection::{
    CensureConfig, CensureDetector, Detections, FeatureDetector, FilterKind, MatcherConfig,
};
use censure_track::input::{convert_to_gray, gray_intensity};
use censure_track::{
    Annotator, CaptureDevice, ExitReason, FrameSink, PatternCapture, Result, TrackerConfig,
    TrackingLoop,
};
use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

const W: u32 = 200;
const H: u32 = 160;

/// Well separated bright squares moving right by `shift` pixels per frame.
struct ShiftingSquares {
    frame: RgbImage,
    shift: i32,
    served: i32,
}

impl ShiftingSquares {
    fn new(shift: i32) -> Self {
        Self {
            frame: RgbImage::new(W, H),
            shift,
            served: 0,
        }
    }
}

impl CaptureDevice for ShiftingSquares {
    fn configure(&mut self, width: u32, height: u32) -> Result<()> {
        self.frame = RgbImage::new(width, height);
        Ok(())
    }

    fn query_frame(&mut self) -> Option<&mut RgbImage> {
        let dx = self.shift * self.served;
        self.served += 1;
        for p in self.frame.pixels_mut() {
            *p = Rgb([20, 20, 20]);
        }
        for &(cx, cy, half) in &[(60, 50, 3), (130, 60, 4), (80, 115, 5)] {
            let side = 2 * half as u32 + 1;
            let rect = Rect::at(cx + dx - half, cy - half).of_size(side, side);
            draw_filled_rect_mut(&mut self.frame, rect, Rgb([230, 230, 230]));
        }
        Some(&mut self.frame)
    }
}

/// Counts how many shown frames contain the tracked colour.
#[derive(Default)]
struct CountingSink {
    shown: u32,
    with_tracked: u32,
}

impl FrameSink for CountingSink {
    fn show(&mut self, frame: &RgbImage) -> Result<()> {
        self.shown += 1;
        if frame.pixels().any(|p| p.0 == [0, 255, 0]) {
            self.with_tracked += 1;
        }
        Ok(())
    }

    fn poll_key(&mut self, _timeout: Duration) -> Option<u32> {
        None
    }
}

fn config(width: u32, height: u32) -> TrackerConfig {
    let mut config = TrackerConfig::default();
    config.capture.width = width;
    config.capture.height = height;
    config.display.poll_ms = 0;
    config
}

fn censure(config: &TrackerConfig) -> impl FnOnce(FilterKind, u32, u32) -> Result<CensureDetector> {
    let detector = config.detector.clone();
    let matcher = config.matcher.clone();
    move |filter, w, h| CensureDetector::new(CensureConfig { filter, ..detector }, matcher, w, h)
}

// ===== Detector + matcher directly =====

#[test]
fn shifted_squares_are_matched() {
    let mut detector =
        CensureDetector::new(CensureConfig::default(), MatcherConfig::default(), W, H).unwrap();
    let mut capture = ShiftingSquares::new(2);
    let mut gray = GrayImage::new(W, H);

    convert_to_gray(capture.query_frame().unwrap(), &mut gray);
    let mut past = detector.detect(gray_intensity, &gray).unwrap();
    let mut table = None;
    detector.track(&mut past, None, &mut table).unwrap();
    assert!(past.features().iter().all(|f| f.mtable_id.is_none()));

    convert_to_gray(capture.query_frame().unwrap(), &mut gray);
    let mut current = detector.detect(gray_intensity, &gray).unwrap();
    detector.track(&mut current, Some(&past), &mut table).unwrap();

    let table = table.unwrap();
    assert_eq!(table.past_sequence(), past.sequence);

    // every square moved two pixels to the right
    let consistent = current
        .features()
        .iter()
        .filter(|f| {
            f.mtable_id
                .and_then(|id| table.resolve(id, past.features.len()))
                .is_some_and(|j| {
                    let g = &past.features[j];
                    f.x.abs_diff(g.x + 2) <= 1 && f.y.abs_diff(g.y) <= 1
                })
        })
        .count();
    assert!(consistent >= 3, "consistent matches: {}", consistent);
}

// ===== Full loop =====

#[test]
fn loop_tracks_from_second_frame() {
    let config = config(W, H);
    let init = censure(&config);
    let tracking =
        TrackingLoop::init(config, Annotator::default(), init, |_| Ok(ShiftingSquares::new(2)))
            .unwrap()
            .with_frame_limit(4);
    let mut sink = CountingSink::default();

    let outcome = tracking.run(&mut sink).unwrap();

    assert_eq!(outcome.exit, ExitReason::FrameLimit);
    assert_eq!(sink.shown, 4);
    // frame 1 has nothing to track against
    assert_eq!(sink.with_tracked, 3);
    assert!(outcome.stats.tracked >= 9);
    assert!(outcome.stats.features >= outcome.stats.tracked);
}

#[test]
fn pattern_source_runs_to_exhaustion() {
    let config = config(176, 144);
    let init = censure(&config);
    let tracking = TrackingLoop::init(config, Annotator::default(), init, |_| {
        Ok(PatternCapture::new(3, 176, 144).with_frame_limit(5))
    })
    .unwrap();
    let mut sink = CountingSink::default();

    let err = tracking.run(&mut sink).unwrap_err();

    assert!(err.is_fatal());
    assert_eq!(sink.shown, 5);
}

#[test]
fn undersized_capture_fails_detector_init() {
    let config = config(64, 48);
    let init = censure(&config);
    let result =
        TrackingLoop::init(config, Annotator::default(), init, |_| Ok(ShiftingSquares::new(0)));
    assert!(result.is_err());
}
