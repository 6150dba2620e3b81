extern crate bvr_ball;

use bvr_ball::common::{BallCenter, SimulatorConfig};
use bvr_ball::data::LedgerError;
use bvr_ball::scorer::Scorer;
use bvr_ball::simulator::BallSimulator;

#[test]
fn frames_have_requested_shape() {
    let mut sim = BallSimulator::new(SimulatorConfig::new(200, 200));
    let frame = sim.produce_next_frame();
    assert_eq!(frame.shape(), (200, 200, 3));
}

#[test]
fn long_stream_keeps_ball_in_bounds() {
    /////////////////////
    // Testing variables
    let frame_count = 200;
    let config = SimulatorConfig::new(200, 200);
    /////////////////////

    let radius = config.ball_radius;
    let mut sim = BallSimulator::new(config);
    let ledger = sim.ledger();

    let mut last_pts = None;
    for _ in 0..frame_count {
        let frame = sim.produce_next_frame();
        if let Some(last) = last_pts {
            assert!(frame.pts > last, "pts {} after {}", frame.pts, last);
        }
        last_pts = Some(frame.pts);

        let center = ledger.take(frame.pts).unwrap();
        assert!(center.x >= radius - 3 && center.x <= 200 - radius + 3, "x out of bounds: {}", center);
        assert!(center.y >= radius - 2 && center.y <= 200 - radius + 2, "y out of bounds: {}", center);
    }
    assert_eq!(sim.frames_produced(), frame_count);
    assert!(ledger.is_empty());
}

#[test]
fn first_frame_scores_zero_at_start() {
    let mut sim = BallSimulator::new(SimulatorConfig::new(200, 200));
    let scorer = Scorer::new(sim.ledger());
    let frame = sim.produce_next_frame();

    let report = scorer.score(&format!("{},100,100", frame.pts)).unwrap();
    assert_eq!(report.actual, BallCenter::new(100, 100));
    assert_eq!(report.error, 0.0);
}

#[test]
fn timestamps_are_consumed_once() {
    let mut sim = BallSimulator::new(SimulatorConfig::new(200, 200));
    let ledger = sim.ledger();
    let frame = sim.produce_next_frame();

    assert!(ledger.take(frame.pts).is_ok());
    assert_eq!(ledger.take(frame.pts), Err(LedgerError::NotFound(frame.pts)));
}
