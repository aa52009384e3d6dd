use std::time::Duration;

use intercept_rs::config::TargetingConfig;
use intercept_rs::targeting::{
    EngagementContext, EngagementPhase, GlobalCooldown, RejectReason, TargetInput,
    TargetingDecision, TargetingEvaluator, TargetingState,
};
use intercept_rs::tracker::Rect;

// 0.5 m object, 1000 px focal length, 30 fps:
// a 25 px box is 20 m away and 1 px/frame there is 0.6 m/s.
fn evaluator() -> TargetingEvaluator {
    TargetingEvaluator::new(TargetingConfig {
        assumed_object_size_m: 0.5,
        focal_length_px: 1000.0,
        frame_rate: 30.0,
        ..TargetingConfig::default()
    })
}

const NEAR_PX: f32 = 25.0; // 20 m
const FAR_PX: f32 = 5.0; // 100 m
const SLOW_PX: f64 = 5.0 / 0.6; // 5 m/s at 20 m
const FAST_PX: f64 = 100.0; // 60 m/s at 20 m

fn input(confidence: f32, side_px: f32, velocity_px: f64) -> TargetInput {
    TargetInput {
        bbox: Rect::new(300.0, 200.0, side_px, side_px),
        confidence,
        velocity_px: (velocity_px, 0.0),
        matched: true,
    }
}

fn at(secs: f64) -> Duration {
    Duration::from_secs_f64(secs)
}

#[test]
fn test_sustained_confidence_reaches_ready() {
    let ev = evaluator();
    let mut global = GlobalCooldown::default();
    let ctx = EngagementContext {
        armed: true,
        now: at(0.0),
        global: &mut global,
    };
    let mut state = TargetingState::default();
    assert_eq!(state.phase(), EngagementPhase::BelowThreshold);

    for frame in 1..=12 {
        let decision = ev.evaluate(&mut state, &input(0.9, NEAR_PX, SLOW_PX), &ctx);
        if frame < 10 {
            assert_eq!(decision, TargetingDecision::Hold, "frame {frame}");
            assert_eq!(state.phase(), EngagementPhase::Tracking, "frame {frame}");
        } else {
            assert_eq!(decision, TargetingDecision::Ready, "frame {frame}");
            assert_eq!(state.phase(), EngagementPhase::ReadyToEngage, "frame {frame}");
        }
    }
    assert!((state.distance_m().unwrap() - 20.0).abs() < 1e-9);
    assert!((state.velocity_mps().unwrap() - 5.0).abs() < 1e-9);
}

#[test]
fn test_disarmed_stays_rejected() {
    let ev = evaluator();
    let mut global = GlobalCooldown::default();
    let ctx = EngagementContext {
        armed: false,
        now: at(0.0),
        global: &mut global,
    };
    let mut state = TargetingState::default();

    for frame in 1..=100 {
        let decision = ev.evaluate(&mut state, &input(0.9, NEAR_PX, SLOW_PX), &ctx);
        if frame < 10 {
            assert_eq!(decision, TargetingDecision::Hold);
        } else {
            assert_eq!(decision, TargetingDecision::Reject(RejectReason::NotArmed));
            assert_eq!(state.phase(), EngagementPhase::Tracking);
        }
    }
}

#[test]
fn test_every_failing_condition_blocks_ready() {
    let ev = evaluator();

    for mask in 0u8..16 {
        let confident = mask & 1 != 0;
        let in_range = mask & 2 != 0;
        let slow = mask & 4 != 0;
        let armed = mask & 8 != 0;

        let mut global = GlobalCooldown::default();
        let ctx = EngagementContext {
            armed,
            now: at(0.0),
            global: &mut global,
        };
        let mut state = TargetingState::default();
        let side = if in_range { NEAR_PX } else { FAR_PX };
        let velocity = if slow { SLOW_PX } else { FAST_PX };

        let mut last = TargetingDecision::Hold;
        for frame in 1..=15 {
            // a single low-confidence frame late in the run keeps the
            // consecutive counter below min_track_frames
            let confidence = if !confident && frame == 8 { 0.5 } else { 0.9 };
            last = ev.evaluate(&mut state, &input(confidence, side, velocity), &ctx);
            if !(confident && in_range && slow && armed) {
                assert!(!last.is_eligible(), "mask {mask:04b} frame {frame}: {last:?}");
            }
        }

        let expected = if !confident {
            TargetingDecision::Hold
        } else if !armed {
            TargetingDecision::Reject(RejectReason::NotArmed)
        } else if !in_range {
            TargetingDecision::Reject(RejectReason::OutOfRange)
        } else if !slow {
            TargetingDecision::Reject(RejectReason::TooFast)
        } else {
            TargetingDecision::Ready
        };
        assert_eq!(last, expected, "mask {mask:04b}");
    }
}

#[test]
fn test_range_bounds_are_inclusive() {
    let ev = evaluator();
    let mut global = GlobalCooldown::default();
    let ctx = EngagementContext {
        armed: true,
        now: at(0.0),
        global: &mut global,
    };
    // 10 px -> 50 m, 100 px -> 5 m
    for side in [10.0, 100.0] {
        let mut state = TargetingState::default();
        let mut decision = TargetingDecision::Hold;
        for _ in 0..10 {
            decision = ev.evaluate(&mut state, &input(0.9, side, 0.0), &ctx);
        }
        assert_eq!(decision, TargetingDecision::Ready, "side {side}");
    }
}

fn ready_state(ev: &TargetingEvaluator, global: &mut GlobalCooldown, now: Duration) -> TargetingState {
    let ctx = EngagementContext {
        armed: true,
        now,
        global,
    };
    let mut state = TargetingState::default();
    for _ in 0..10 {
        ev.evaluate(&mut state, &input(0.9, NEAR_PX, SLOW_PX), &ctx);
    }
    assert_eq!(state.phase(), EngagementPhase::ReadyToEngage);
    state
}

#[test]
fn test_engage_starts_cooldown() {
    let ev = evaluator();
    let mut global = GlobalCooldown::default();
    let mut state = ready_state(&ev, &mut global, at(1.0));

    let mut ctx = EngagementContext {
        armed: true,
        now: at(1.0),
        global: &mut global,
    };
    assert_eq!(ev.engage(&mut state, &mut ctx), TargetingDecision::Engage);
    assert_eq!(state.phase(), EngagementPhase::Engaged);
    assert_eq!(state.last_engaged(), Some(at(1.0)));
    assert_eq!(global.last_engaged(), Some(at(1.0)));

    // inside the 10 s window every evaluation is a cooldown reject
    for t in [1.5, 5.0, 10.9] {
        let ctx = EngagementContext {
            armed: true,
            now: at(t),
            global: &mut global,
        };
        let decision = ev.evaluate(&mut state, &input(0.9, NEAR_PX, SLOW_PX), &ctx);
        assert_eq!(decision, TargetingDecision::Reject(RejectReason::Cooldown));
        assert_eq!(state.phase(), EngagementPhase::Cooldown);
    }

    // a second fire signal inside the window is refused
    let mut ctx = EngagementContext {
        armed: true,
        now: at(6.0),
        global: &mut global,
    };
    assert_eq!(
        ev.engage(&mut state, &mut ctx),
        TargetingDecision::Reject(RejectReason::Cooldown)
    );

    // after expiry the state machine resumes; disarmed it sits in Tracking
    let ctx = EngagementContext {
        armed: false,
        now: at(11.0),
        global: &mut global,
    };
    let decision = ev.evaluate(&mut state, &input(0.9, NEAR_PX, SLOW_PX), &ctx);
    assert_eq!(decision, TargetingDecision::Reject(RejectReason::NotArmed));
    assert_eq!(state.phase(), EngagementPhase::Tracking);
}

#[test]
fn test_global_cooldown_blocks_second_track() {
    let ev = evaluator();
    let mut global = GlobalCooldown::default();
    let mut first = ready_state(&ev, &mut global, at(0.0));
    let mut second = ready_state(&ev, &mut global, at(0.0));

    let mut ctx = EngagementContext {
        armed: true,
        now: at(0.0),
        global: &mut global,
    };
    assert_eq!(ev.engage(&mut first, &mut ctx), TargetingDecision::Engage);

    let mut ctx = EngagementContext {
        armed: true,
        now: at(3.0),
        global: &mut global,
    };
    assert_eq!(
        ev.engage(&mut second, &mut ctx),
        TargetingDecision::Reject(RejectReason::Cooldown)
    );
    assert_eq!(second.phase(), EngagementPhase::ReadyToEngage);
    assert_eq!(global.last_engaged(), Some(at(0.0)));

    let mut ctx = EngagementContext {
        armed: true,
        now: at(10.0),
        global: &mut global,
    };
    assert_eq!(ev.engage(&mut second, &mut ctx), TargetingDecision::Engage);
}

#[test]
fn test_engage_requires_ready_phase() {
    let ev = evaluator();
    let mut global = GlobalCooldown::default();
    let mut state = TargetingState::default();
    let mut ctx = EngagementContext {
        armed: true,
        now: at(0.0),
        global: &mut global,
    };
    ev.evaluate(&mut state, &input(0.9, NEAR_PX, SLOW_PX), &ctx);
    assert_eq!(state.phase(), EngagementPhase::Tracking);
    assert_eq!(
        ev.engage(&mut state, &mut ctx),
        TargetingDecision::Reject(RejectReason::NotReady)
    );
    assert!(state.last_engaged().is_none());
}
