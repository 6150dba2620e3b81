extern crate bvr_ball;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use async_trait::async_trait;
use image::{GrayImage, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use bvr_ball::common::{BallCenter, BallFrame, DetectorConfig, DetectorKind, Estimate, SimulatorConfig};
use bvr_ball::data::frame_queue;
use bvr_ball::detection_runners::{spawn_detector_worker, BallDetector, CircleCandidate, WorkerStatus};
use bvr_ball::relay::{run_relay, Blackhole, FrameRelay};
use bvr_ball::side_channel::SideChannelNegotiator;
use bvr_ball::simulator::BallSimulator;
use bvr_ball::transport::{LoopbackPeer, MemorySignaling, VideoTrack};

mod colours;

struct FixedDetector {
    candidate: CircleCandidate,
    calls: Arc<AtomicUsize>,
}

impl BallDetector for FixedDetector {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn inference(&mut self, _gray: &GrayImage) -> anyhow::Result<Vec<CircleCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![self.candidate])
    }
}

struct BrokenDetector;

impl BallDetector for BrokenDetector {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn inference(&mut self, _gray: &GrayImage) -> anyhow::Result<Vec<CircleCandidate>> {
        anyhow::bail!("model exploded")
    }
}

// Finds the ball on the first frame only.
struct FirstHitDetector {
    calls: Arc<AtomicUsize>,
}

impl BallDetector for FirstHitDetector {
    fn name(&self) -> &'static str {
        "first-hit"
    }

    fn inference(&mut self, _gray: &GrayImage) -> anyhow::Result<Vec<CircleCandidate>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Ok(vec![CircleCandidate { x: 50.0, y: 60.0, radius: 20.0, votes: 80 }]);
        }
        Ok(Vec::new())
    }
}

struct SlowDetector {
    calls: Arc<AtomicUsize>,
}

impl BallDetector for SlowDetector {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn inference(&mut self, _gray: &GrayImage) -> anyhow::Result<Vec<CircleCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(300));
        Ok(Vec::new())
    }
}

// Endless stream of small blank frames.
struct BlankTrack {
    next_pts: u64,
}

#[async_trait]
impl VideoTrack for BlankTrack {
    fn id(&self) -> &str {
        "blank"
    }

    async fn recv(&mut self) -> anyhow::Result<BallFrame> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        let frame = BallFrame::new(RgbImage::new(8, 8), self.next_pts, Default::default());
        self.next_pts += 3000;
        Ok(frame)
    }
}

fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    done()
}

#[test]
fn detection_on_simulated_frames() {
    /////////////////////
    // Testing variables
    let frame_count = 40;
    let config = SimulatorConfig::default();
    /////////////////////

    for kind in [DetectorKind::Hough, DetectorKind::Centroid] {
        let detector_config = DetectorConfig::new().with_kind(kind).with_radius_range(15, 25);
        let mut detector = bvr_ball::init_detector(&detector_config).unwrap();
        let mut sim = BallSimulator::new(config.clone());
        let ledger = sim.ledger();

        let mut worst = 0.0f64;
        for _ in 0..frame_count {
            let frame = sim.produce_next_frame();
            let actual = ledger.take(frame.pts).unwrap();
            let found = bvr_ball::run_detection(detector.as_mut(), &frame)
                .unwrap()
                .unwrap_or_else(|| panic!("{} missed the ball at {}", kind, actual));
            worst = worst.max(actual.distance(&found));
        }
        println!("{}: worst error {:.3} px over {} frames", kind, worst, frame_count);
        assert!(worst <= 3.0, "{} worst error {}", kind, worst);
    }
}

#[test]
fn hough_at_random_positions() {
    let mut rng = StdRng::seed_from_u64(42);
    let config = DetectorConfig::new().with_radius_range(15, 25);
    let mut detector = bvr_ball::init_detector(&config).unwrap();

    for _ in 0..10 {
        let center = (rng.gen_range(30..290), rng.gen_range(30..210));
        let frame = BallFrame::from(colours::ball_on_black(320, 240, center, 20));
        let found = bvr_ball::run_detection(detector.as_mut(), &frame)
            .unwrap()
            .unwrap_or_else(|| panic!("missed ball at {:?}", center));
        let error = found.distance(&BallCenter::from(center));
        assert!(error <= 3.0, "ball at {:?} found at {} ({:.2} px)", center, found, error);
    }
}

#[test]
fn centroid_ignores_dim_background() {
    let mut image = colours::ball_on_black(320, 240, (200, 90), 20);
    colours::dim_speckle(&mut image, 2_000, 7);

    let config = DetectorConfig::new().with_kind(DetectorKind::Centroid);
    let mut detector = bvr_ball::init_detector(&config).unwrap();
    let found = bvr_ball::run_detection(detector.as_mut(), &BallFrame::from(image)).unwrap();
    assert_eq!(found, Some(BallCenter::new(200, 90)));
}

#[test]
fn worker_publishes_latest_detection() {
    let calls = Arc::new(AtomicUsize::new(0));
    let detector = FixedDetector {
        candidate: CircleCandidate { x: 41.6, y: 17.2, radius: 20.0, votes: 100 },
        calls: Arc::clone(&calls),
    };
    let (send, detect) = frame_queue(2);
    let worker = spawn_detector_worker(Box::new(detector), detect, Duration::from_millis(5)).unwrap();

    assert!(send.estimate.get().is_sentinel());
    assert!(send.offer(BallFrame::new(image::RgbImage::new(8, 8), 3000, Default::default())));

    assert!(wait_until(Duration::from_secs(5), || !send.estimate.get().is_sentinel()));
    assert_eq!(send.estimate.get(), Estimate::new(3000, BallCenter::new(42, 17)));
    assert_eq!(worker.status(), WorkerStatus::Running);

    worker.shutdown().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn worker_failure_is_reported() {
    let (send, detect) = frame_queue(2);
    let worker = spawn_detector_worker(Box::new(BrokenDetector), detect, Duration::from_millis(5)).unwrap();
    let mut status = worker.subscribe();

    send.offer(BallFrame::default().with_pts(0));
    let failed = tokio::time::timeout(Duration::from_secs(5), status.wait_for(|s| *s == WorkerStatus::Failed))
        .await
        .expect("worker did not report failure")
        .is_ok();
    assert!(failed);

    let err = tokio::task::spawn_blocking(move || worker.shutdown()).await.unwrap().unwrap_err();
    assert!(format!("{:#}", err).contains("model exploded"));
    // Sentinel stays in place.
    assert!(send.estimate.get().is_sentinel());
}

#[test]
fn worker_stops_when_queue_is_dropped() {
    let calls = Arc::new(AtomicUsize::new(0));
    let detector = FixedDetector {
        candidate: CircleCandidate { x: 1.0, y: 1.0, radius: 1.0, votes: 1 },
        calls,
    };
    let (send, detect) = frame_queue(1);
    let worker = spawn_detector_worker(Box::new(detector), detect, Duration::from_millis(5)).unwrap();

    drop(send);
    assert!(wait_until(Duration::from_secs(5), || worker.status() == WorkerStatus::Stopped));
    worker.shutdown().unwrap();
}

#[test]
fn miss_keeps_previous_estimate() {
    let calls = Arc::new(AtomicUsize::new(0));
    let detector = FirstHitDetector { calls: Arc::clone(&calls) };
    let (send, detect) = frame_queue(2);
    let worker = spawn_detector_worker(Box::new(detector), detect, Duration::from_millis(5)).unwrap();

    send.offer(BallFrame::new(RgbImage::new(8, 8), 0, Default::default()));
    assert!(wait_until(Duration::from_secs(5), || !send.estimate.get().is_sentinel()));

    send.offer(BallFrame::new(RgbImage::new(8, 8), 3000, Default::default()));
    assert!(wait_until(Duration::from_secs(5), || calls.load(Ordering::SeqCst) == 2));

    worker.shutdown().unwrap();
    assert_eq!(send.estimate.get(), Estimate::new(0, BallCenter::new(50, 60)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn relay_ends_when_detector_fails() {
    let (_server_peer, client_peer) = LoopbackPeer::pair();
    let (_server_signaling, client_signaling) = MemorySignaling::pair();
    let negotiator = SideChannelNegotiator::new(Arc::new(client_peer), Arc::new(client_signaling));

    let (send, detect) = frame_queue(2);
    let worker = spawn_detector_worker(Box::new(BrokenDetector), detect, Duration::from_millis(5)).unwrap();
    let status = worker.subscribe();
    let relay = FrameRelay::new(Box::new(Blackhole), send, negotiator);

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        run_relay(Box::new(BlankTrack { next_pts: 0 }), relay, worker),
    )
    .await
    .expect("relay kept running after the detector failed");

    let err = result.unwrap_err();
    assert!(format!("{:#}", err).contains("detector worker failed"), "{:#}", err);
    assert_eq!(*status.borrow(), WorkerStatus::Failed);
}

#[tokio::test]
async fn dropping_busy_worker_does_not_block() {
    let calls = Arc::new(AtomicUsize::new(0));
    let detector = SlowDetector { calls: Arc::clone(&calls) };
    let (send, detect) = frame_queue(1);
    let worker = spawn_detector_worker(Box::new(detector), detect, Duration::from_millis(5)).unwrap();

    send.offer(BallFrame::new(RgbImage::new(8, 8), 0, Default::default()));
    assert!(wait_until(Duration::from_secs(5), || calls.load(Ordering::SeqCst) == 1));

    let start = Instant::now();
    drop(worker);
    assert!(start.elapsed() < Duration::from_millis(150), "drop waited {:?}", start.elapsed());
}
