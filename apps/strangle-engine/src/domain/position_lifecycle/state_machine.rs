//! Position lifecycle state machine.
//!
//! Pure and single-position: validates moves against the transition table,
//! enforces the adjustment, roll, and punt limits, and evaluates the
//! emergency-exit rules. No I/O.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::condition::TransitionCondition;
use super::errors::{LimitKind, StateMachineError};
use super::state::{FourthDownOption, PositionState};
use super::transitions::{StateTransition, transition_table};

/// Days allowed in `FourthDown` under Option A.
pub const OPTION_A_MAX_DAYS: i64 = 5;

/// Days allowed in `FourthDown` under Option B.
pub const OPTION_B_MAX_DAYS: i64 = 3;

/// Bounded-retry limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleLimits {
    /// Maximum entries into `Adjusting`.
    pub max_adjustments: u32,
    /// Maximum entries into `Rolling`.
    pub max_time_rolls: u32,
    /// Maximum punts out of `FourthDown`.
    pub max_punts: u32,
}

impl Default for LifecycleLimits {
    fn default() -> Self {
        Self {
            max_adjustments: 3,
            max_time_rolls: 1,
            max_punts: 1,
        }
    }
}

/// Per-state entry counters, one slot per `PositionState` variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct TransitionCounts([u32; PositionState::COUNT]);

impl TransitionCounts {
    const fn get(&self, state: PositionState) -> u32 {
        self.0[state.index()]
    }

    fn increment(&mut self, state: PositionState) {
        self.0[state.index()] = self.0[state.index()].saturating_add(1);
    }

    fn total(&self) -> u32 {
        self.0.iter().sum()
    }
}

/// Outcome of an emergency-exit evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EmergencyExitDecision {
    /// Whether the position should be exited now.
    pub should_exit: bool,
    /// Why. Empty when `should_exit` is false.
    pub reason: String,
}

impl EmergencyExitDecision {
    fn hold() -> Self {
        Self::default()
    }

    fn exit(reason: String) -> Self {
        Self {
            should_exit: true,
            reason,
        }
    }
}

/// State machine for one strangle position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionStateMachine {
    current: PositionState,
    previous: Option<PositionState>,
    last_transition_at: Option<DateTime<Utc>>,
    last_condition: Option<TransitionCondition>,
    counts: TransitionCounts,
    limits: LifecycleLimits,
    punt_count: u32,
    fourth_down_option: FourthDownOption,
    fourth_down_entered_at: Option<DateTime<Utc>>,
}

impl Default for PositionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionStateMachine {
    /// Create a machine in `Idle` with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(LifecycleLimits::default())
    }

    /// Create a machine in `Idle` with custom limits.
    #[must_use]
    pub fn with_limits(limits: LifecycleLimits) -> Self {
        Self {
            current: PositionState::Idle,
            previous: None,
            last_transition_at: None,
            last_condition: None,
            counts: TransitionCounts::default(),
            limits,
            punt_count: 0,
            fourth_down_option: FourthDownOption::None,
            fourth_down_entered_at: None,
        }
    }

    /// Rebuild a machine for a position loaded in `state`.
    ///
    /// The machine is treated as having made exactly one transition into
    /// `state` at `at`. History before that point is not replayed.
    #[must_use]
    pub fn restored(state: PositionState, limits: LifecycleLimits, at: DateTime<Utc>) -> Self {
        let mut machine = Self::with_limits(limits);
        machine.current = state;
        machine.last_transition_at = Some(at);
        machine.counts.increment(state);
        if state == PositionState::FourthDown {
            machine.fourth_down_entered_at = Some(at);
        }
        machine
    }

    /// Carry a persisted Fourth Down selection into a restored machine.
    ///
    /// Ignored unless the machine is in `FourthDown`.
    #[must_use]
    pub fn with_fourth_down(
        mut self,
        option: FourthDownOption,
        entered_at: Option<DateTime<Utc>>,
    ) -> Self {
        if self.current == PositionState::FourthDown {
            self.fourth_down_option = option;
            if entered_at.is_some() {
                self.fourth_down_entered_at = entered_at;
            }
        }
        self
    }

    // -------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------

    /// Current state.
    #[must_use]
    pub const fn current(&self) -> PositionState {
        self.current
    }

    /// State before the last transition.
    #[must_use]
    pub const fn previous(&self) -> Option<PositionState> {
        self.previous
    }

    /// When the last transition happened.
    #[must_use]
    pub const fn last_transition_at(&self) -> Option<DateTime<Utc>> {
        self.last_transition_at
    }

    /// Condition of the last transition made by this machine.
    #[must_use]
    pub const fn last_condition(&self) -> Option<TransitionCondition> {
        self.last_condition
    }

    /// Configured limits.
    #[must_use]
    pub const fn limits(&self) -> LifecycleLimits {
        self.limits
    }

    /// Number of recorded entries into `state`.
    #[must_use]
    pub const fn transition_count(&self, state: PositionState) -> u32 {
        self.counts.get(state)
    }

    /// Entries into `Adjusting` so far.
    #[must_use]
    pub const fn adjustment_count(&self) -> u32 {
        self.counts.get(PositionState::Adjusting)
    }

    /// Entries into `Rolling` so far.
    #[must_use]
    pub const fn roll_count(&self) -> u32 {
        self.counts.get(PositionState::Rolling)
    }

    /// Punts taken so far.
    #[must_use]
    pub const fn punt_count(&self) -> u32 {
        self.punt_count
    }

    /// Selected Fourth Down option.
    #[must_use]
    pub const fn fourth_down_option(&self) -> FourthDownOption {
        self.fourth_down_option
    }

    /// When the machine last entered `FourthDown`.
    #[must_use]
    pub const fn fourth_down_entered_at(&self) -> Option<DateTime<Utc>> {
        self.fourth_down_entered_at
    }

    /// Management phase 1-4, or 0 outside the management ladder.
    #[must_use]
    pub const fn management_phase(&self) -> u8 {
        self.current.management_phase()
    }

    /// Whether the machine is in a management phase.
    #[must_use]
    pub const fn is_management_state(&self) -> bool {
        self.current.is_management()
    }

    /// Whether another adjustment is allowed.
    #[must_use]
    pub const fn can_adjust(&self) -> bool {
        self.adjustment_count() < self.limits.max_adjustments
    }

    /// Whether another time roll is allowed.
    #[must_use]
    pub const fn can_roll(&self) -> bool {
        self.roll_count() < self.limits.max_time_rolls
    }

    /// Whether the punt is still available.
    #[must_use]
    pub const fn can_punt(&self) -> bool {
        self.punt_count < self.limits.max_punts
    }

    /// Legal moves out of the current state.
    pub fn available_transitions(&self) -> impl Iterator<Item = &'static StateTransition> {
        transition_table().from_state(self.current)
    }

    // -------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------

    /// Move to `to` under `condition`, stamped with the current time.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` if the move is not in the table, or
    /// `LimitExceeded` if it would exceed the adjustment or roll limit.
    /// The machine is unchanged on error.
    pub fn transition(
        &mut self,
        to: PositionState,
        condition: TransitionCondition,
    ) -> Result<(), StateMachineError> {
        self.transition_at(to, condition, Utc::now())
    }

    /// Move to `to` under `condition`, stamped with `at`.
    ///
    /// # Errors
    ///
    /// See [`Self::transition`].
    pub fn transition_at(
        &mut self,
        to: PositionState,
        condition: TransitionCondition,
        at: DateTime<Utc>,
    ) -> Result<(), StateMachineError> {
        if !transition_table().is_allowed(self.current, to, condition) {
            return Err(StateMachineError::InvalidTransition {
                from: self.current,
                to,
                condition,
            });
        }
        self.check_limit(to)?;
        self.apply(to, condition, at);
        Ok(())
    }

    fn check_limit(&self, to: PositionState) -> Result<(), StateMachineError> {
        match to {
            PositionState::Adjusting if !self.can_adjust() => {
                Err(StateMachineError::LimitExceeded {
                    limit: LimitKind::Adjustments,
                    max: self.limits.max_adjustments,
                })
            }
            PositionState::Rolling if !self.can_roll() => Err(StateMachineError::LimitExceeded {
                limit: LimitKind::TimeRolls,
                max: self.limits.max_time_rolls,
            }),
            _ => Ok(()),
        }
    }

    fn apply(&mut self, to: PositionState, condition: TransitionCondition, at: DateTime<Utc>) {
        if self.current == PositionState::FourthDown && to != PositionState::FourthDown {
            self.fourth_down_option = FourthDownOption::None;
            self.fourth_down_entered_at = None;
        }
        if to == PositionState::FourthDown {
            self.fourth_down_entered_at = Some(at);
        }
        self.previous = Some(self.current);
        self.current = to;
        self.last_transition_at = Some(at);
        self.last_condition = Some(condition);
        self.counts.increment(to);
    }

    /// Spend the punt: `FourthDown -> FirstDown` under `punt_executed`.
    ///
    /// # Errors
    ///
    /// `PuntAlreadyUsed` once the punt is spent, `PuntNotAllowed` outside
    /// `FourthDown`. The machine is unchanged on error.
    pub fn execute_punt(&mut self) -> Result<(), StateMachineError> {
        self.execute_punt_at(Utc::now())
    }

    /// [`Self::execute_punt`] with an explicit clock.
    ///
    /// # Errors
    ///
    /// See [`Self::execute_punt`].
    pub fn execute_punt_at(&mut self, at: DateTime<Utc>) -> Result<(), StateMachineError> {
        if !self.can_punt() {
            return Err(StateMachineError::PuntAlreadyUsed {
                used: self.punt_count,
                max: self.limits.max_punts,
            });
        }
        if self.current != PositionState::FourthDown {
            return Err(StateMachineError::PuntNotAllowed {
                state: self.current,
            });
        }
        self.transition_at(PositionState::FirstDown, TransitionCondition::PuntExecuted, at)?;
        self.punt_count += 1;
        Ok(())
    }

    /// Select the Fourth Down sub-strategy.
    ///
    /// # Errors
    ///
    /// `OptionNotAllowed` outside `FourthDown`.
    pub fn set_fourth_down_option(
        &mut self,
        option: FourthDownOption,
    ) -> Result<(), StateMachineError> {
        if self.current != PositionState::FourthDown {
            return Err(StateMachineError::OptionNotAllowed {
                state: self.current,
            });
        }
        self.fourth_down_option = option;
        Ok(())
    }

    /// Return to `Idle` with all counters, timestamps, and selections cleared.
    ///
    /// Only for recycling a machine; never call on a position with history.
    pub fn reset(&mut self) {
        *self = Self::with_limits(self.limits);
    }

    // -------------------------------------------------------------------
    // Emergency exit
    // -------------------------------------------------------------------

    /// Evaluate the loss and Fourth Down time rules against the current time.
    ///
    /// `credit_basis` and `current_pnl` must share the same absolute-dollar
    /// basis (already scaled by quantity and contract multiplier).
    #[must_use]
    pub fn should_emergency_exit(
        &self,
        credit_basis: Decimal,
        current_pnl: Decimal,
        dte: i64,
        max_dte: i64,
        escalate_loss_pct: Decimal,
    ) -> EmergencyExitDecision {
        self.should_emergency_exit_at(
            Utc::now(),
            credit_basis,
            current_pnl,
            dte,
            max_dte,
            escalate_loss_pct,
        )
    }

    /// [`Self::should_emergency_exit`] with an explicit clock.
    #[must_use]
    pub fn should_emergency_exit_at(
        &self,
        now: DateTime<Utc>,
        credit_basis: Decimal,
        current_pnl: Decimal,
        dte: i64,
        max_dte: i64,
        escalate_loss_pct: Decimal,
    ) -> EmergencyExitDecision {
        if credit_basis.is_zero() {
            return EmergencyExitDecision::hold();
        }

        let loss_pct = -Decimal::ONE_HUNDRED * current_pnl / credit_basis;
        let threshold = escalate_loss_pct * Decimal::ONE_HUNDRED;
        if loss_pct >= threshold {
            return EmergencyExitDecision::exit(format!(
                "emergency exit: loss {:.1}% >= {:.0}% threshold",
                loss_pct.round_dp(1),
                threshold.round_dp(0)
            ));
        }

        if self.current != PositionState::FourthDown {
            return EmergencyExitDecision::hold();
        }
        let Some(entered_at) = self.fourth_down_entered_at else {
            return EmergencyExitDecision::hold();
        };
        let days_in_phase = (now - entered_at).num_days();

        match self.fourth_down_option {
            FourthDownOption::OptionA if days_in_phase > OPTION_A_MAX_DAYS => {
                EmergencyExitDecision::exit(format!(
                    "Option A exceeded {OPTION_A_MAX_DAYS}-day limit ({days_in_phase} days in fourth down)"
                ))
            }
            FourthDownOption::OptionB if days_in_phase > OPTION_B_MAX_DAYS => {
                EmergencyExitDecision::exit(format!(
                    "Option B exceeded {OPTION_B_MAX_DAYS}-day limit ({days_in_phase} days in fourth down)"
                ))
            }
            FourthDownOption::OptionC if dte <= max_dte => EmergencyExitDecision::exit(format!(
                "Option C reached {max_dte} DTE limit (dte {dte})"
            )),
            _ => EmergencyExitDecision::hold(),
        }
    }

    // -------------------------------------------------------------------
    // Consistency
    // -------------------------------------------------------------------

    /// Check internal bookkeeping.
    ///
    /// # Errors
    ///
    /// `Inconsistent` if a counter exceeds its limit, transitions were
    /// recorded without a transition time, or a Fourth Down selection
    /// exists outside `FourthDown`.
    pub fn validate_state_consistency(&self) -> Result<(), StateMachineError> {
        if self.adjustment_count() > self.limits.max_adjustments {
            return Err(StateMachineError::Inconsistent(format!(
                "adjustment count {} exceeds limit {}",
                self.adjustment_count(),
                self.limits.max_adjustments
            )));
        }
        if self.roll_count() > self.limits.max_time_rolls {
            return Err(StateMachineError::Inconsistent(format!(
                "roll count {} exceeds limit {}",
                self.roll_count(),
                self.limits.max_time_rolls
            )));
        }
        if self.punt_count > self.limits.max_punts {
            return Err(StateMachineError::Inconsistent(format!(
                "punt count {} exceeds limit {}",
                self.punt_count, self.limits.max_punts
            )));
        }
        if self.counts.total() > 0 && self.last_transition_at.is_none() {
            return Err(StateMachineError::Inconsistent(
                "transitions recorded without a transition time".to_string(),
            ));
        }
        if self.current != PositionState::FourthDown
            && self.fourth_down_option != FourthDownOption::None
        {
            return Err(StateMachineError::Inconsistent(format!(
                "fourth down option {} selected in {}",
                self.fourth_down_option, self.current
            )));
        }
        Ok(())
    }
}
