//! Boundary detection: decides, play by play, when the open moment closes.
//!
//! Decisions are taken after a play joins the open moment, with one play
//! of lookahead. HARD reasons always close; SOFT reasons close unless the
//! game flow is judged continuous (nothing scored yet in the moment and
//! the next play is in the same period).

use crate::core::classifier::{
    is_narration_worthy, is_notable, is_scoring, is_stoppage, is_turnover,
};
use crate::core::config::{SegmentationConfig, EXPLICIT_PLAY_CAP};
use crate::schema::moment::BoundaryReason;
use crate::schema::play::{Leader, Play};

/// Outcome of observing one play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryDecision {
    pub should_close: bool,
    pub reason: Option<BoundaryReason>,
    /// A SOFT reason that fired but was withdrawn for continuity.
    pub overridden: Option<BoundaryReason>,
}

impl BoundaryDecision {
    fn close(reason: BoundaryReason) -> Self {
        Self {
            should_close: true,
            reason: Some(reason),
            overridden: None,
        }
    }

    fn stay_open(overridden: Option<BoundaryReason>) -> Self {
        Self {
            should_close: false,
            reason: None,
            overridden,
        }
    }
}

/// Running state of the moment being accumulated.
#[derive(Debug, Clone, Copy, Default)]
struct OpenMoment {
    play_count: usize,
    narration_worthy: usize,
    has_scoring: bool,
}

/// One detector per game; feed plays in order.
#[derive(Debug, Clone)]
pub struct BoundaryDetector<'c> {
    config: &'c SegmentationConfig,
    open: OpenMoment,
    /// Most recent non-tied leader, so a flip through a tie still counts.
    last_leader: Option<Leader>,
}

impl<'c> BoundaryDetector<'c> {
    pub fn new(config: &'c SegmentationConfig) -> Self {
        Self {
            config,
            open: OpenMoment::default(),
            last_leader: None,
        }
    }

    /// Plays accumulated in the open moment so far.
    pub fn open_play_count(&self) -> usize {
        self.open.play_count
    }

    /// Add `play` to the open moment and decide whether it closes there.
    pub fn observe(
        &mut self,
        play: &Play,
        previous: Option<&Play>,
        next: Option<&Play>,
    ) -> BoundaryDecision {
        let scoring = is_scoring(play, previous);
        let worthy = scoring || is_notable(play);

        self.open.play_count += 1;
        if worthy {
            self.open.narration_worthy += 1;
        }
        if scoring {
            self.open.has_scoring = true;
        }

        let lead_change = self.track_leader(play);

        let decision = match self.hard_reason(play, lead_change, next) {
            Some(reason) => BoundaryDecision::close(reason),
            None => match self.soft_reason(play, scoring, worthy) {
                Some(reason) if reason.is_mergeable() && self.merge_eligible(play, next) => {
                    BoundaryDecision::stay_open(Some(reason))
                }
                Some(reason) => BoundaryDecision::close(reason),
                None => BoundaryDecision::stay_open(None),
            },
        };

        if decision.should_close {
            self.open = OpenMoment::default();
        }
        decision
    }

    fn track_leader(&mut self, play: &Play) -> bool {
        let leader = play.score().leader();
        if leader == Leader::Tied {
            return false;
        }
        let changed = matches!(self.last_leader, Some(last) if last != leader);
        self.last_leader = Some(leader);
        changed
    }

    fn hard_reason(
        &self,
        play: &Play,
        lead_change: bool,
        next: Option<&Play>,
    ) -> Option<BoundaryReason> {
        if self.open.play_count >= self.config.absolute_play_cap {
            return Some(BoundaryReason::AbsoluteCap);
        }
        if lead_change {
            return Some(BoundaryReason::LeadChange);
        }
        let Some(next) = next else {
            return Some(BoundaryReason::EndOfGame);
        };
        if self.open.narration_worthy >= EXPLICIT_PLAY_CAP && is_narration_worthy(next, Some(play))
        {
            return Some(BoundaryReason::ExplicitCap);
        }
        if next.period != play.period {
            return Some(BoundaryReason::PeriodEnd);
        }
        None
    }

    fn soft_reason(&self, play: &Play, scoring: bool, worthy: bool) -> Option<BoundaryReason> {
        if self.open.play_count >= self.config.soft_play_cap {
            Some(BoundaryReason::SoftCap)
        } else if scoring {
            Some(BoundaryReason::Scoring)
        } else if is_stoppage(play) {
            Some(BoundaryReason::Stoppage)
        } else if is_turnover(play) {
            Some(BoundaryReason::Turnover)
        } else if worthy && self.open.narration_worthy == EXPLICIT_PLAY_CAP {
            Some(BoundaryReason::SecondExplicitPlay)
        } else {
            None
        }
    }

    fn merge_eligible(&self, play: &Play, next: Option<&Play>) -> bool {
        !self.open.has_scoring && next.is_some_and(|n| n.period == play.period)
    }
}
