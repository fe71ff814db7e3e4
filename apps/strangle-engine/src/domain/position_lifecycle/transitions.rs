//! Legal lifecycle transitions.
//!
//! The table is built once on first use and never mutated. Membership is
//! an O(1) set lookup keyed by `(from, to, condition)`.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use super::condition::TransitionCondition;
use super::state::PositionState;

/// One legal move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    /// Source state.
    pub from: PositionState,
    /// Target state.
    pub to: PositionState,
    /// Authorizing condition.
    pub condition: TransitionCondition,
    /// Human-readable cause.
    pub description: &'static str,
}

/// Immutable transition table with indexed lookups.
#[derive(Debug)]
pub struct TransitionTable {
    entries: Vec<StateTransition>,
    index: HashSet<(PositionState, PositionState, TransitionCondition)>,
    by_source: HashMap<PositionState, Vec<usize>>,
}

impl TransitionTable {
    fn build(entries: Vec<StateTransition>) -> Self {
        let index = entries
            .iter()
            .map(|t| (t.from, t.to, t.condition))
            .collect();
        let mut by_source: HashMap<PositionState, Vec<usize>> = HashMap::new();
        for (i, t) in entries.iter().enumerate() {
            by_source.entry(t.from).or_default().push(i);
        }
        Self {
            entries,
            index,
            by_source,
        }
    }

    /// Whether `(from, to, condition)` is a legal move.
    #[must_use]
    pub fn is_allowed(
        &self,
        from: PositionState,
        to: PositionState,
        condition: TransitionCondition,
    ) -> bool {
        self.index.contains(&(from, to, condition))
    }

    /// Find the table entry for a move.
    #[must_use]
    pub fn find(
        &self,
        from: PositionState,
        to: PositionState,
        condition: TransitionCondition,
    ) -> Option<&StateTransition> {
        self.from_state(from)
            .find(|t| t.to == to && t.condition == condition)
    }

    /// All moves leaving `from`.
    pub fn from_state(&self, from: PositionState) -> impl Iterator<Item = &StateTransition> {
        self.by_source
            .get(&from)
            .into_iter()
            .flatten()
            .map(|&i| &self.entries[i])
    }

    /// Every entry, in definition order.
    #[must_use]
    pub fn entries(&self) -> &[StateTransition] {
        &self.entries
    }
}

/// The process-wide transition table.
pub fn transition_table() -> &'static TransitionTable {
    static TABLE: OnceLock<TransitionTable> = OnceLock::new();
    TABLE.get_or_init(|| TransitionTable::build(definitions()))
}

fn definitions() -> Vec<StateTransition> {
    use PositionState::{
        Adjusting, Closed, Error, FirstDown, FourthDown, Idle, Open, Rolling, SecondDown,
        Submitted, ThirdDown,
    };
    use TransitionCondition as C;

    const ACTIVE: [PositionState; 7] = [
        Open, FirstDown, SecondDown, ThirdDown, FourthDown, Adjusting, Rolling,
    ];

    let mut t = Vec::with_capacity(96);
    let mut add = |from, to, condition, description| {
        t.push(StateTransition {
            from,
            to,
            condition,
            description,
        });
    };

    // Entry
    add(Idle, Submitted, C::OrderPlaced, "entry order placed");
    add(Submitted, Open, C::OrderFilled, "entry order filled");
    add(Submitted, Error, C::OrderFailed, "entry order failed");
    add(Submitted, Error, C::OrderTimeout, "entry order timed out");
    add(Submitted, Closed, C::OrderTimeout, "entry order abandoned after timeout");

    // Management ladder
    add(Open, FirstDown, C::StartManagement, "management started");
    add(FirstDown, SecondDown, C::StrikeChallenged, "short strike challenged");
    add(FirstDown, Open, C::PriceRecovered, "price recovered");
    add(SecondDown, ThirdDown, C::StrikeBreached, "short strike breached");
    add(SecondDown, FirstDown, C::PriceRecovered, "price recovered");
    add(ThirdDown, FourthDown, C::AdjustmentFailed, "adjustment could not defend position");
    add(ThirdDown, SecondDown, C::PriceRecovered, "price recovered");
    add(ThirdDown, FirstDown, C::AdjustmentSuccessful, "adjustment restored position");
    add(FourthDown, FirstDown, C::RecoverySuccessful, "recovered from fourth down");
    add(FourthDown, FirstDown, C::PuntExecuted, "punt executed");

    // Rolls
    for from in [Open, FirstDown, SecondDown, ThirdDown] {
        add(from, Rolling, C::RollUntested, "rolling untested side");
    }
    add(Rolling, Open, C::RollComplete, "roll completed");
    add(Rolling, FirstDown, C::RollFailed, "roll failed, back to management");

    // Adjustments
    for from in [FirstDown, SecondDown, ThirdDown, FourthDown] {
        add(from, Adjusting, C::ExecuteAdjustment, "adjustment started");
    }
    add(Adjusting, FirstDown, C::AdjustmentComplete, "adjustment completed");
    add(Adjusting, FourthDown, C::AdjustmentFailed, "adjustment failed");

    // Exits and failures from any active state
    for from in ACTIVE {
        add(from, Closed, C::ExitConditions, "exit conditions met");
        add(from, Closed, C::HardStop, "hard stop hit");
        add(from, Closed, C::EmergencyExit, "emergency exit");
        add(from, Closed, C::ForceClose, "forced close");
        add(from, Closed, C::PositionClosed, "position closed");
        add(from, Error, C::OrderFailed, "order failed");
        add(from, Error, C::OrderTimeout, "order timed out");
        add(from, Error, C::AdjustmentFailed, "exit or adjustment failed");
    }

    // Recovery from error
    add(Error, Closed, C::ForceClose, "forced close from error");
    add(Error, Closed, C::ManualIntervention, "closed by operator");
    add(Error, Idle, C::ManualIntervention, "reset by operator");

    t
}
