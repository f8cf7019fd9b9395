//! TUG phase machine.
//!
//! One [`Frame`] per tick moves a [`TugSession`] through nine phases in a
//! fixed order. Each phase has exactly one outgoing rule: a guard over the
//! frame's geometry and an action that stamps phase boundaries and captures
//! reference position/direction. Ticks missing required keypoints, or whose
//! geometry is degenerate, stall instead of transitioning.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::TugThresholds;
use crate::error::TugError;
use crate::geometry::{joint_angle_degrees, pixel_to_metric_scale, turn_angle_degrees, Vector2};
use crate::keypoints::{BodyPart, Frame};

// ─── Phases ──────────────────────────────────────────────────────────────────

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    #[default]
    AwaitingStart,
    AwaitingStandUp,
    AwaitingStoodUp,
    WalkingForward,
    Turning1,
    WalkingBack,
    Turning2,
    AwaitingSitDown,
    Complete,
}

impl Phase {
    pub const ALL: [Phase; 9] = [
        Phase::AwaitingStart,
        Phase::AwaitingStandUp,
        Phase::AwaitingStoodUp,
        Phase::WalkingForward,
        Phase::Turning1,
        Phase::WalkingBack,
        Phase::Turning2,
        Phase::AwaitingSitDown,
        Phase::Complete,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }

    /// Instruction shown to the subject while in this phase.
    pub fn prompt(&self) -> &'static str {
        match self {
            Phase::AwaitingStart   => "Sit down",
            Phase::AwaitingStandUp => "Sit down",
            Phase::AwaitingStoodUp => "Stand up",
            Phase::WalkingForward  => "Walk forward",
            Phase::Turning1        => "Turn",
            Phase::WalkingBack     => "Walk back",
            Phase::Turning2        => "Turn",
            Phase::AwaitingSitDown => "Sit down",
            Phase::Complete        => "Done!",
        }
    }
}

// ─── Boundaries and timed segments ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Boundary {
    StandUpStart,
    StandUpEnd,
    WalkForwardStart,
    WalkForwardEnd,
    Turn1Start,
    Turn1End,
    WalkBackStart,
    WalkBackEnd,
    Turn2Start,
    Turn2End,
    SitDownStart,
    SitDownEnd,
}

impl Boundary {
    pub fn as_str(&self) -> &'static str {
        match self {
            Boundary::StandUpStart     => "standUpStart",
            Boundary::StandUpEnd       => "standUpEnd",
            Boundary::WalkForwardStart => "walkForwardStart",
            Boundary::WalkForwardEnd   => "walkForwardEnd",
            Boundary::Turn1Start       => "turn1Start",
            Boundary::Turn1End         => "turn1End",
            Boundary::WalkBackStart    => "walkBackStart",
            Boundary::WalkBackEnd      => "walkBackEnd",
            Boundary::Turn2Start       => "turn2Start",
            Boundary::Turn2End         => "turn2End",
            Boundary::SitDownStart     => "sitDownStart",
            Boundary::SitDownEnd       => "sitDownEnd",
        }
    }

    /// The start boundary an end boundary closes.
    fn opened_by(self) -> Option<Boundary> {
        match self {
            Boundary::StandUpEnd     => Some(Boundary::StandUpStart),
            Boundary::WalkForwardEnd => Some(Boundary::WalkForwardStart),
            Boundary::Turn1End       => Some(Boundary::Turn1Start),
            Boundary::WalkBackEnd    => Some(Boundary::WalkBackStart),
            Boundary::Turn2End       => Some(Boundary::Turn2Start),
            Boundary::SitDownEnd     => Some(Boundary::SitDownStart),
            _ => None,
        }
    }
}

/// The six timed segments of the protocol, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Segment {
    StandUp,
    WalkForward,
    Turn1,
    WalkBack,
    Turn2,
    SitDown,
}

impl Segment {
    pub const ALL: [Segment; 6] = [
        Segment::StandUp,
        Segment::WalkForward,
        Segment::Turn1,
        Segment::WalkBack,
        Segment::Turn2,
        Segment::SitDown,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Segment::StandUp     => "Stand Up",
            Segment::WalkForward => "Walk Forward",
            Segment::Turn1       => "Turn 1",
            Segment::WalkBack    => "Walk Back",
            Segment::Turn2       => "Turn 2",
            Segment::SitDown     => "Sit Down",
        }
    }

    pub fn bounds(&self) -> (Boundary, Boundary) {
        match self {
            Segment::StandUp     => (Boundary::StandUpStart, Boundary::StandUpEnd),
            Segment::WalkForward => (Boundary::WalkForwardStart, Boundary::WalkForwardEnd),
            Segment::Turn1       => (Boundary::Turn1Start, Boundary::Turn1End),
            Segment::WalkBack    => (Boundary::WalkBackStart, Boundary::WalkBackEnd),
            Segment::Turn2       => (Boundary::Turn2Start, Boundary::Turn2End),
            Segment::SitDown     => (Boundary::SitDownStart, Boundary::SitDownEnd),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTimestamps {
    pub stand_up_start: Option<u64>,
    pub stand_up_end: Option<u64>,
    pub walk_forward_start: Option<u64>,
    pub walk_forward_end: Option<u64>,
    pub turn1_start: Option<u64>,
    pub turn1_end: Option<u64>,
    pub walk_back_start: Option<u64>,
    pub walk_back_end: Option<u64>,
    pub turn2_start: Option<u64>,
    pub turn2_end: Option<u64>,
    pub sit_down_start: Option<u64>,
    pub sit_down_end: Option<u64>,
}

impl PhaseTimestamps {
    pub fn get(&self, boundary: Boundary) -> Option<u64> {
        match boundary {
            Boundary::StandUpStart     => self.stand_up_start,
            Boundary::StandUpEnd       => self.stand_up_end,
            Boundary::WalkForwardStart => self.walk_forward_start,
            Boundary::WalkForwardEnd   => self.walk_forward_end,
            Boundary::Turn1Start       => self.turn1_start,
            Boundary::Turn1End         => self.turn1_end,
            Boundary::WalkBackStart    => self.walk_back_start,
            Boundary::WalkBackEnd      => self.walk_back_end,
            Boundary::Turn2Start       => self.turn2_start,
            Boundary::Turn2End         => self.turn2_end,
            Boundary::SitDownStart     => self.sit_down_start,
            Boundary::SitDownEnd       => self.sit_down_end,
        }
    }

    fn slot_mut(&mut self, boundary: Boundary) -> &mut Option<u64> {
        match boundary {
            Boundary::StandUpStart     => &mut self.stand_up_start,
            Boundary::StandUpEnd       => &mut self.stand_up_end,
            Boundary::WalkForwardStart => &mut self.walk_forward_start,
            Boundary::WalkForwardEnd   => &mut self.walk_forward_end,
            Boundary::Turn1Start       => &mut self.turn1_start,
            Boundary::Turn1End         => &mut self.turn1_end,
            Boundary::WalkBackStart    => &mut self.walk_back_start,
            Boundary::WalkBackEnd      => &mut self.walk_back_end,
            Boundary::Turn2Start       => &mut self.turn2_start,
            Boundary::Turn2End         => &mut self.turn2_end,
            Boundary::SitDownStart     => &mut self.sit_down_start,
            Boundary::SitDownEnd       => &mut self.sit_down_end,
        }
    }

    /// Stamp a boundary. An end boundary is refused while its start is unset.
    pub fn mark(&mut self, boundary: Boundary, at_ms: u64) -> Result<(), Boundary> {
        if let Some(start) = boundary.opened_by() {
            if self.get(start).is_none() {
                return Err(start);
            }
        }
        *self.slot_mut(boundary) = Some(at_ms);
        Ok(())
    }

    pub fn duration_s(&self, segment: Segment) -> Option<f64> {
        let (start, end) = segment.bounds();
        let (start, end) = (self.get(start)?, self.get(end)?);
        Some(end.saturating_sub(start) as f64 / 1000.0)
    }

    /// `sitDownEnd - standUpStart`, stalls included.
    pub fn total_s(&self) -> Option<f64> {
        let (start, end) = (self.stand_up_start?, self.sit_down_end?);
        Some(end.saturating_sub(start) as f64 / 1000.0)
    }
}

// ─── Session ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TugSession {
    pub phase: Phase,
    pub timestamps: PhaseTimestamps,
    /// Hip-to-hip vector at the start of the current segment.
    pub reference_direction: Option<Vector2>,
    /// Hip midpoint at the start of the current walk.
    pub reference_position: Option<Vector2>,
}

impl TugSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }
}

// ─── Tick results ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Transition {
    pub from: Phase,
    pub to: Phase,
    pub at_ms: u64,
    pub prompt: &'static str,
}

#[derive(Debug)]
pub enum StallReason {
    MissingKeypoints,
    Degenerate(TugError),
    /// Guard evaluated but not satisfied; carries the measured angle (deg)
    /// or displacement (m).
    GuardNotMet { measured: f64 },
}

#[derive(Debug)]
pub enum Step {
    Stalled(StallReason),
    Advanced(Transition),
    Completed(Transition),
    /// Already `Complete`; nothing to do until reset.
    Halted,
}

// ─── Transition table ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum WalkDirection {
    Forward,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Guard {
    Always,
    HipAngleAtMost(f64),
    HipAngleAbove(f64),
    Walked(WalkDirection, f64),
    TurnedPast(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Capture {
    Nothing,
    Direction,
    PositionAndDirection,
}

#[derive(Debug, Clone, Copy)]
struct Rule {
    guard: Guard,
    next: Phase,
    marks: &'static [Boundary],
    capture: Capture,
}

enum Verdict {
    Pass,
    Wait(f64),
    Missing,
}

struct Hips {
    left: Vector2,
    right: Vector2,
}

impl Hips {
    fn midpoint(&self) -> Vector2 {
        self.left.midpoint(self.right)
    }

    fn direction(&self) -> Vector2 {
        self.left.towards(self.right)
    }
}

pub struct PhaseMachine {
    thresholds: TugThresholds,
}

impl PhaseMachine {
    pub fn new(thresholds: TugThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &TugThresholds {
        &self.thresholds
    }

    /// Outgoing rule of `phase`; `None` for the terminal phase.
    fn rule(&self, phase: Phase) -> Option<Rule> {
        let t = &self.thresholds;
        let rule = match phase {
            Phase::AwaitingStart => Rule {
                guard: Guard::Always,
                next: Phase::AwaitingStandUp,
                marks: &[],
                capture: Capture::Nothing,
            },
            Phase::AwaitingStandUp => Rule {
                guard: Guard::HipAngleAtMost(t.stand_start_angle_deg),
                next: Phase::AwaitingStoodUp,
                marks: &[Boundary::StandUpStart],
                capture: Capture::Nothing,
            },
            Phase::AwaitingStoodUp => Rule {
                guard: Guard::HipAngleAbove(t.stand_end_angle_deg),
                next: Phase::WalkingForward,
                marks: &[Boundary::StandUpEnd, Boundary::WalkForwardStart],
                capture: Capture::PositionAndDirection,
            },
            Phase::WalkingForward => Rule {
                guard: Guard::Walked(WalkDirection::Forward, t.walk_distance_m),
                next: Phase::Turning1,
                marks: &[Boundary::WalkForwardEnd, Boundary::Turn1Start],
                capture: Capture::Direction,
            },
            Phase::Turning1 => Rule {
                guard: Guard::TurnedPast(t.turn_angle_deg),
                next: Phase::WalkingBack,
                marks: &[Boundary::Turn1End, Boundary::WalkBackStart],
                capture: Capture::PositionAndDirection,
            },
            Phase::WalkingBack => Rule {
                guard: Guard::Walked(WalkDirection::Back, t.walk_distance_m),
                next: Phase::Turning2,
                marks: &[Boundary::WalkBackEnd, Boundary::Turn2Start],
                capture: Capture::Direction,
            },
            Phase::Turning2 => Rule {
                guard: Guard::TurnedPast(t.turn_angle_deg),
                next: Phase::AwaitingSitDown,
                marks: &[Boundary::Turn2End, Boundary::SitDownStart],
                capture: Capture::Nothing,
            },
            Phase::AwaitingSitDown => Rule {
                guard: Guard::HipAngleAtMost(t.sit_down_angle_deg),
                next: Phase::Complete,
                marks: &[Boundary::SitDownEnd],
                capture: Capture::Nothing,
            },
            Phase::Complete => return None,
        };
        Some(rule)
    }

    /// Advance `session` by one frame.
    ///
    /// Returns `Err(UnexpectedPhase)` only when the session is internally
    /// inconsistent (a reference or start boundary the current phase relies
    /// on is missing); the session has then been reset to `AwaitingStart`.
    pub fn tick(&self, session: &mut TugSession, frame: &Frame) -> Result<Step, TugError> {
        let Some(rule) = self.rule(session.phase) else {
            return Ok(Step::Halted);
        };

        let min = self.thresholds.joint_confidence;
        let hips = match (
            frame.position(BodyPart::LeftHip, min),
            frame.position(BodyPart::RightHip, min),
        ) {
            (Some(left), Some(right)) => Hips { left, right },
            _ => {
                debug!("Hip keypoints missing in {:?}", session.phase);
                return Ok(Step::Stalled(StallReason::MissingKeypoints));
            }
        };

        let verdict = match self.evaluate(rule.guard, &hips, frame, session) {
            Ok(verdict) => verdict,
            Err(err @ TugError::UnexpectedPhase { .. }) => return Err(self.recover(session, err)),
            Err(err) => {
                debug!("Cannot evaluate {:?}: {}", session.phase, err);
                return Ok(Step::Stalled(StallReason::Degenerate(err)));
            }
        };

        match verdict {
            Verdict::Pass => {}
            Verdict::Wait(measured) => {
                return Ok(Step::Stalled(StallReason::GuardNotMet { measured }));
            }
            Verdict::Missing => {
                debug!("Joint keypoints missing in {:?}", session.phase);
                return Ok(Step::Stalled(StallReason::MissingKeypoints));
            }
        }

        let from = session.phase;
        if let Err(err) = Self::apply(&rule, &hips, session, frame.timestamp_ms) {
            return Err(self.recover(session, err));
        }

        let transition = Transition {
            from,
            to: rule.next,
            at_ms: frame.timestamp_ms,
            prompt: rule.next.prompt(),
        };
        info!(
            "Phase {:?} → {:?} at {} (\"{}\")",
            transition.from, transition.to, transition.at_ms, transition.prompt
        );

        if transition.to == Phase::Complete {
            Ok(Step::Completed(transition))
        } else {
            Ok(Step::Advanced(transition))
        }
    }

    fn evaluate(
        &self,
        guard: Guard,
        hips: &Hips,
        frame: &Frame,
        session: &TugSession,
    ) -> Result<Verdict, TugError> {
        let verdict = match guard {
            Guard::Always => Verdict::Pass,

            Guard::HipAngleAtMost(limit) | Guard::HipAngleAbove(limit) => {
                let Some(angle) = self.hip_angle(hips, frame)? else {
                    return Ok(Verdict::Missing);
                };
                let passed = match guard {
                    Guard::HipAngleAtMost(_) => angle <= limit,
                    _ => angle > limit,
                };
                if passed { Verdict::Pass } else { Verdict::Wait(angle) }
            }

            Guard::Walked(direction, distance_m) => {
                let start = session
                    .reference_position
                    .ok_or_else(|| unexpected(session.phase, "no reference position"))?;
                let scale = pixel_to_metric_scale(
                    hips.left,
                    hips.right,
                    self.thresholds.hip_separation_m,
                )?;
                let current = hips.midpoint();
                let delta_px = match direction {
                    WalkDirection::Forward => current.y - start.y,
                    WalkDirection::Back => start.y - current.y,
                };
                let walked_m = (delta_px * scale).abs();
                if walked_m >= distance_m { Verdict::Pass } else { Verdict::Wait(walked_m) }
            }

            Guard::TurnedPast(limit) => {
                let reference = session
                    .reference_direction
                    .ok_or_else(|| unexpected(session.phase, "no reference direction"))?;
                let angle = turn_angle_degrees(reference, hips.direction())?;
                if angle > limit { Verdict::Pass } else { Verdict::Wait(angle) }
            }
        };
        Ok(verdict)
    }

    /// Left shoulder–hip–knee angle, `None` when the shoulder or knee is missing.
    fn hip_angle(&self, hips: &Hips, frame: &Frame) -> Result<Option<f64>, TugError> {
        let min = self.thresholds.joint_confidence;
        let (Some(shoulder), Some(knee)) = (
            frame.position(BodyPart::LeftShoulder, min),
            frame.position(BodyPart::LeftKnee, min),
        ) else {
            return Ok(None);
        };
        joint_angle_degrees(shoulder, hips.left, knee).map(Some)
    }

    fn apply(rule: &Rule, hips: &Hips, session: &mut TugSession, at_ms: u64) -> Result<(), TugError> {
        for &boundary in rule.marks {
            session.timestamps.mark(boundary, at_ms).map_err(|start| {
                unexpected(
                    session.phase,
                    &format!("{} before {}", boundary.as_str(), start.as_str()),
                )
            })?;
        }

        match rule.capture {
            Capture::Nothing => {}
            Capture::Direction => {
                session.reference_direction = Some(hips.direction());
            }
            Capture::PositionAndDirection => {
                session.reference_position = Some(hips.midpoint());
                session.reference_direction = Some(hips.direction());
            }
        }

        session.phase = rule.next;
        Ok(())
    }

    /// Discard the in-progress session after an inconsistency.
    fn recover(&self, session: &mut TugSession, err: TugError) -> TugError {
        warn!("{}: resetting session to AwaitingStart", err);
        session.reset();
        err
    }
}

fn unexpected(phase: Phase, reason: &str) -> TugError {
    TugError::UnexpectedPhase {
        phase,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypoints::Keypoint;

    fn frame_with(t: u64, points: &[(BodyPart, f64, f64)]) -> Frame {
        let mut frame = Frame::new(t, 0.9);
        for &(part, x, y) in points {
            frame.insert(Keypoint { part, x, y, confidence: 0.95 });
        }
        frame
    }

    /// Seated/standing pose with the given left hip angle, hips 35 px apart.
    fn angle_frame(t: u64, hip_angle_deg: f64) -> Frame {
        let hip = (100.0, 200.0);
        let knee_dir = (180.0 - hip_angle_deg).to_radians();
        frame_with(
            t,
            &[
                (BodyPart::LeftShoulder, hip.0, hip.1 - 100.0),
                (BodyPart::LeftHip, hip.0, hip.1),
                (BodyPart::RightHip, hip.0 + 35.0, hip.1),
                (BodyPart::LeftKnee, hip.0 + 80.0 * knee_dir.sin(), hip.1 + 80.0 * knee_dir.cos()),
            ],
        )
    }

    fn machine() -> PhaseMachine {
        PhaseMachine::new(TugThresholds::default())
    }

    #[test]
    fn test_angle_frame_geometry() {
        for angle in [90.0, 150.0, 170.0, 180.0] {
            let f = angle_frame(0, angle);
            let measured = joint_angle_degrees(
                f.get(BodyPart::LeftShoulder).unwrap().position(),
                f.get(BodyPart::LeftHip).unwrap().position(),
                f.get(BodyPart::LeftKnee).unwrap().position(),
            )
            .unwrap();
            assert!((measured - angle).abs() < 1e-6, "{angle} vs {measured}");
        }
    }

    #[test]
    fn test_start_advances_unconditionally() {
        let m = machine();
        let mut s = TugSession::new();
        let step = m.tick(&mut s, &angle_frame(0, 170.0)).unwrap();
        assert!(matches!(step, Step::Advanced(t) if t.to == Phase::AwaitingStandUp));
        assert_eq!(s.timestamps, PhaseTimestamps::default());
    }

    #[test]
    fn test_missing_hips_stall_every_phase() {
        let m = machine();
        let only_knee = frame_with(10, &[(BodyPart::LeftKnee, 1.0, 1.0)]);
        for phase in Phase::ALL.into_iter().filter(|p| *p != Phase::Complete) {
            let mut s = TugSession { phase, ..TugSession::new() };
            let step = m.tick(&mut s, &only_knee).unwrap();
            assert!(matches!(step, Step::Stalled(StallReason::MissingKeypoints)));
            assert_eq!(s.phase, phase);
        }
    }

    #[test]
    fn test_missing_knee_stalls_angle_phase() {
        let m = machine();
        let mut s = TugSession { phase: Phase::AwaitingStandUp, ..TugSession::new() };
        let hips_only = frame_with(
            10,
            &[
                (BodyPart::LeftShoulder, 0.0, 0.0),
                (BodyPart::LeftHip, 0.0, 100.0),
                (BodyPart::RightHip, 35.0, 100.0),
            ],
        );
        let step = m.tick(&mut s, &hips_only).unwrap();
        assert!(matches!(step, Step::Stalled(StallReason::MissingKeypoints)));
        assert_eq!(s.phase, Phase::AwaitingStandUp);
    }

    #[test]
    fn test_degenerate_triangle_stalls() {
        let m = machine();
        let mut s = TugSession { phase: Phase::AwaitingStandUp, ..TugSession::new() };
        let collapsed = frame_with(
            10,
            &[
                (BodyPart::LeftShoulder, 0.0, 100.0),
                (BodyPart::LeftHip, 0.0, 100.0),
                (BodyPart::RightHip, 35.0, 100.0),
                (BodyPart::LeftKnee, 0.0, 180.0),
            ],
        );
        let step = m.tick(&mut s, &collapsed).unwrap();
        assert!(matches!(
            step,
            Step::Stalled(StallReason::Degenerate(TugError::DegenerateTriangle))
        ));
    }

    #[test]
    fn test_stand_up_thresholds() {
        let m = machine();
        let mut s = TugSession { phase: Phase::AwaitingStandUp, ..TugSession::new() };

        let step = m.tick(&mut s, &angle_frame(100, 161.0)).unwrap();
        assert!(matches!(step, Step::Stalled(StallReason::GuardNotMet { .. })));

        m.tick(&mut s, &angle_frame(200, 159.5)).unwrap();
        assert_eq!(s.phase, Phase::AwaitingStoodUp);
        assert_eq!(s.timestamps.stand_up_start, Some(200));

        m.tick(&mut s, &angle_frame(300, 174.5)).unwrap();
        assert_eq!(s.phase, Phase::AwaitingStoodUp);

        m.tick(&mut s, &angle_frame(400, 176.0)).unwrap();
        assert_eq!(s.phase, Phase::WalkingForward);
        assert_eq!(s.timestamps.stand_up_end, Some(400));
        assert_eq!(s.timestamps.walk_forward_start, Some(400));
        assert_eq!(s.reference_position, Some(Vector2::new(117.5, 200.0)));
        assert_eq!(s.reference_direction, Some(Vector2::new(35.0, 0.0)));
    }

    /// Hip angle exactly as the machine measures it from `frame`.
    fn measured_hip_angle(frame: &Frame) -> f64 {
        let at = |part| frame.get(part).unwrap().position();
        joint_angle_degrees(at(BodyPart::LeftShoulder), at(BodyPart::LeftHip), at(BodyPart::LeftKnee))
            .unwrap()
    }

    fn machine_with(adjust: impl FnOnce(&mut TugThresholds)) -> PhaseMachine {
        let mut thresholds = TugThresholds::default();
        adjust(&mut thresholds);
        PhaseMachine::new(thresholds)
    }

    #[test]
    fn test_stand_start_is_inclusive() {
        let frame = angle_frame(100, 150.0);
        let measured = measured_hip_angle(&frame);
        let m = machine_with(|t| t.stand_start_angle_deg = measured);
        let mut s = TugSession { phase: Phase::AwaitingStandUp, ..TugSession::new() };

        m.tick(&mut s, &frame).unwrap();
        assert_eq!(s.phase, Phase::AwaitingStoodUp);
    }

    #[test]
    fn test_stand_end_is_exclusive() {
        let frame = angle_frame(100, 170.0);
        let measured = measured_hip_angle(&frame);
        let m = machine_with(|t| t.stand_end_angle_deg = measured);
        let mut s = TugSession { phase: Phase::AwaitingStoodUp, ..TugSession::new() };
        s.timestamps.stand_up_start = Some(0);

        let step = m.tick(&mut s, &frame).unwrap();
        assert!(matches!(step, Step::Stalled(StallReason::GuardNotMet { measured: got }) if got == measured));
        assert_eq!(s.phase, Phase::AwaitingStoodUp);

        let m = machine_with(|t| t.stand_end_angle_deg = measured - 1e-9);
        m.tick(&mut s, &frame).unwrap();
        assert_eq!(s.phase, Phase::WalkingForward);
    }

    #[test]
    fn test_sit_down_is_inclusive() {
        let mut s = TugSession { phase: Phase::AwaitingSitDown, ..TugSession::new() };
        s.timestamps.sit_down_start = Some(9_000);

        let seated = angle_frame(10_000, 140.0);
        let measured = measured_hip_angle(&seated);
        let m = machine_with(|t| t.sit_down_angle_deg = measured - 1e-9);
        let step = m.tick(&mut s, &seated).unwrap();
        assert!(matches!(step, Step::Stalled(StallReason::GuardNotMet { .. })));

        let m = machine_with(|t| t.sit_down_angle_deg = measured);
        let step = m.tick(&mut s, &seated).unwrap();
        assert!(matches!(step, Step::Completed(t) if t.to == Phase::Complete && t.prompt == "Done!"));
        assert_eq!(s.timestamps.sit_down_end, Some(10_000));
        assert_eq!(s.timestamps.duration_s(Segment::SitDown), Some(1.0));
    }

    #[test]
    fn test_turn_is_exclusive() {
        let reference = Vector2::new(35.0, 0.0);
        let side_on = frame_with(10, &[(BodyPart::LeftHip, 0.0, 0.0), (BodyPart::RightHip, 20.0, 30.0)]);
        let measured = turn_angle_degrees(reference, Vector2::new(20.0, 30.0)).unwrap();

        for phase in [Phase::Turning1, Phase::Turning2] {
            let mut s = TugSession {
                phase,
                reference_direction: Some(reference),
                reference_position: Some(Vector2::default()),
                ..TugSession::new()
            };
            s.timestamps.turn1_start = Some(0);
            s.timestamps.turn2_start = Some(0);

            let m = machine_with(|t| t.turn_angle_deg = measured);
            let step = m.tick(&mut s, &side_on).unwrap();
            assert!(matches!(step, Step::Stalled(StallReason::GuardNotMet { .. })));
            assert_eq!(s.phase, phase);

            let m = machine_with(|t| t.turn_angle_deg = measured - 1e-9);
            assert!(matches!(m.tick(&mut s, &side_on).unwrap(), Step::Advanced(_)));
        }
    }

    #[test]
    fn test_walk_distance_is_inclusive() {
        let start = (Vector2::new(0.0, 0.0), Vector2::new(35.0, 0.0));
        let scale = pixel_to_metric_scale(start.0, start.1, 0.35).unwrap();
        let walked = (80.0 * scale).abs();

        for (phase, hip_y) in [(Phase::WalkingForward, 80.0), (Phase::WalkingBack, -80.0)] {
            let m = machine_with(|t| t.walk_distance_m = walked + 1e-9);
            let mut s = TugSession {
                phase,
                reference_position: Some(start.0.midpoint(start.1)),
                reference_direction: Some(start.0.towards(start.1)),
                ..TugSession::new()
            };
            s.timestamps.walk_forward_start = Some(0);
            s.timestamps.walk_back_start = Some(0);
            let frame = frame_with(
                500,
                &[(BodyPart::LeftHip, 0.0, hip_y), (BodyPart::RightHip, 35.0, hip_y)],
            );

            let step = m.tick(&mut s, &frame).unwrap();
            assert!(matches!(step, Step::Stalled(StallReason::GuardNotMet { .. })));

            let m = machine_with(|t| t.walk_distance_m = walked);
            assert!(matches!(m.tick(&mut s, &frame).unwrap(), Step::Advanced(_)));
        }
    }

    #[test]
    fn test_turn_guard() {
        let m = machine();
        let mut s = TugSession {
            phase: Phase::Turning1,
            reference_direction: Some(Vector2::new(35.0, 0.0)),
            reference_position: Some(Vector2::new(0.0, 0.0)),
            ..TugSession::new()
        };
        s.timestamps.turn1_start = Some(0);

        // 90° rotation of the hip line is not enough
        let side_on = frame_with(
            10,
            &[(BodyPart::LeftHip, 0.0, 0.0), (BodyPart::RightHip, 0.0, 35.0)],
        );
        let step = m.tick(&mut s, &side_on).unwrap();
        assert!(matches!(step, Step::Stalled(StallReason::GuardNotMet { measured }) if (measured - 90.0).abs() < 1e-6));

        let turned = frame_with(
            20,
            &[(BodyPart::LeftHip, 35.0, 300.0), (BodyPart::RightHip, 0.0, 300.0)],
        );
        m.tick(&mut s, &turned).unwrap();
        assert_eq!(s.phase, Phase::WalkingBack);
        assert_eq!(s.timestamps.turn1_end, Some(20));
        assert_eq!(s.timestamps.walk_back_start, Some(20));
        assert_eq!(s.reference_position, Some(Vector2::new(17.5, 300.0)));
        assert_eq!(s.reference_direction, Some(Vector2::new(-35.0, 0.0)));
    }

    #[test]
    fn test_missing_reference_resets_session() {
        let m = machine();
        let mut s = TugSession { phase: Phase::WalkingForward, ..TugSession::new() };
        s.timestamps.stand_up_start = Some(1);
        let f = frame_with(10, &[(BodyPart::LeftHip, 0.0, 0.0), (BodyPart::RightHip, 35.0, 0.0)]);

        let err = m.tick(&mut s, &f).unwrap_err();
        assert!(matches!(err, TugError::UnexpectedPhase { phase: Phase::WalkingForward, .. }));
        assert_eq!(s.phase, Phase::AwaitingStart);
        assert_eq!(s.timestamps, PhaseTimestamps::default());
    }

    #[test]
    fn test_end_without_start_is_unexpected() {
        let m = machine();
        let mut s = TugSession { phase: Phase::AwaitingSitDown, ..TugSession::new() };
        let err = m.tick(&mut s, &angle_frame(10, 90.0)).unwrap_err();
        assert!(matches!(err, TugError::UnexpectedPhase { .. }));
        assert_eq!(s.phase, Phase::AwaitingStart);
    }

    #[test]
    fn test_complete_is_terminal() {
        let m = machine();
        let mut s = TugSession { phase: Phase::Complete, ..TugSession::new() };
        assert!(matches!(m.tick(&mut s, &angle_frame(10, 90.0)).unwrap(), Step::Halted));
        assert_eq!(s.phase, Phase::Complete);
    }

    #[test]
    fn test_timestamps_mark_order() {
        let mut ts = PhaseTimestamps::default();
        assert_eq!(ts.mark(Boundary::Turn1End, 5), Err(Boundary::Turn1Start));
        assert_eq!(ts.turn1_end, None);
        ts.mark(Boundary::Turn1Start, 5).unwrap();
        ts.mark(Boundary::Turn1End, 1_255).unwrap();
        assert_eq!(ts.duration_s(Segment::Turn1), Some(1.25));
        assert_eq!(ts.total_s(), None);
    }

    #[test]
    fn test_phase_order_and_prompts() {
        for (i, phase) in Phase::ALL.iter().enumerate() {
            assert_eq!(phase.index() as usize, i);
        }
        assert_eq!(Phase::WalkingBack.prompt(), "Walk back");
        assert_eq!(Phase::Complete.prompt(), "Done!");
    }
}
