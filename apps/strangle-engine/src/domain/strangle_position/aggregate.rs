//! Strangle position aggregate.
//!
//! `PositionRecord` is the persisted shape. `Position` wraps it with the live
//! state machine, which is rebuilt from the persisted state tag on first use
//! and never serialized.

use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::errors::PositionError;
use super::value_objects::{Adjustment, CONTRACT_MULTIPLIER, ExitReason};
use crate::domain::position_lifecycle::{
    EmergencyExitDecision, FourthDownOption, LifecycleLimits, PositionState,
    PositionStateMachine, TransitionCondition, transition_table,
};
use crate::domain::shared::{OrderId, PositionId};

/// Persisted form of a strangle position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRecord {
    /// Position identifier.
    pub id: PositionId,
    /// Underlying symbol.
    pub symbol: String,
    /// Short put strike.
    pub put_strike: Decimal,
    /// Short call strike.
    pub call_strike: Decimal,
    /// Expiration date shared by both legs.
    pub expiration: NaiveDate,
    /// Contracts per leg.
    pub quantity: u32,
    /// Entry credit per share.
    pub credit_received: Decimal,
    /// Adjustment history, oldest first.
    #[serde(default)]
    pub adjustments: Vec<Adjustment>,
    /// When the entry filled.
    pub entry_date: Option<DateTime<Utc>>,
    /// When the position closed.
    pub exit_date: Option<DateTime<Utc>>,
    /// Why the position was exited.
    #[serde(default)]
    pub exit_reason: String,
    /// Working or filled entry order.
    pub entry_order_id: Option<OrderId>,
    /// Working exit order.
    pub exit_order_id: Option<OrderId>,
    /// Mark-to-market P&L in dollars.
    pub current_pnl: Decimal,
    /// Canonical lifecycle state.
    pub state: PositionState,
    /// Fourth Down selection, if any.
    #[serde(default)]
    pub fourth_down_option: FourthDownOption,
    /// When the position last entered Fourth Down.
    #[serde(default)]
    pub fourth_down_entered_at: Option<DateTime<Utc>>,
}

/// A short strangle and its lifecycle.
///
/// Mutated only through its own methods. State changes go through
/// [`Position::transition_state`], which validates against the state machine
/// before touching any data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "PositionRecord", into = "PositionRecord")]
pub struct Position {
    record: PositionRecord,
    machine: Option<PositionStateMachine>,
    limits: LifecycleLimits,
}

impl From<PositionRecord> for Position {
    fn from(record: PositionRecord) -> Self {
        Self::from_record(record, LifecycleLimits::default())
    }
}

impl From<Position> for PositionRecord {
    fn from(position: Position) -> Self {
        position.record
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.record == other.record
    }
}

impl Position {
    /// Open a new `Idle` position with default limits.
    #[must_use]
    pub fn new(
        symbol: impl Into<String>,
        put_strike: Decimal,
        call_strike: Decimal,
        expiration: NaiveDate,
    ) -> Self {
        Self::with_limits(
            symbol,
            put_strike,
            call_strike,
            expiration,
            LifecycleLimits::default(),
        )
    }

    /// Open a new `Idle` position with custom limits.
    #[must_use]
    pub fn with_limits(
        symbol: impl Into<String>,
        put_strike: Decimal,
        call_strike: Decimal,
        expiration: NaiveDate,
        limits: LifecycleLimits,
    ) -> Self {
        Self {
            record: PositionRecord {
                id: PositionId::generate(),
                symbol: symbol.into(),
                put_strike,
                call_strike,
                expiration,
                quantity: 0,
                credit_received: Decimal::ZERO,
                adjustments: Vec::new(),
                entry_date: None,
                exit_date: None,
                exit_reason: String::new(),
                entry_order_id: None,
                exit_order_id: None,
                current_pnl: Decimal::ZERO,
                state: PositionState::Idle,
                fourth_down_option: FourthDownOption::None,
                fourth_down_entered_at: None,
            },
            machine: Some(PositionStateMachine::with_limits(limits)),
            limits,
        }
    }

    /// Wrap a loaded record. The state machine is attached lazily.
    #[must_use]
    pub const fn from_record(record: PositionRecord, limits: LifecycleLimits) -> Self {
        Self {
            record,
            machine: None,
            limits,
        }
    }

    /// Replace the limits used when the machine is rebuilt.
    ///
    /// Has no effect once a machine is attached.
    pub const fn set_limits(&mut self, limits: LifecycleLimits) {
        if self.machine.is_none() {
            self.limits = limits;
        }
    }

    // -------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------

    /// Persisted data.
    #[must_use]
    pub const fn record(&self) -> &PositionRecord {
        &self.record
    }

    /// Position identifier.
    #[must_use]
    pub const fn id(&self) -> &PositionId {
        &self.record.id
    }

    /// Underlying symbol.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.record.symbol
    }

    /// Short put strike.
    #[must_use]
    pub const fn put_strike(&self) -> Decimal {
        self.record.put_strike
    }

    /// Short call strike.
    #[must_use]
    pub const fn call_strike(&self) -> Decimal {
        self.record.call_strike
    }

    /// Expiration date.
    #[must_use]
    pub const fn expiration(&self) -> NaiveDate {
        self.record.expiration
    }

    /// Contracts per leg.
    #[must_use]
    pub const fn quantity(&self) -> u32 {
        self.record.quantity
    }

    /// Entry credit per share.
    #[must_use]
    pub const fn credit_received(&self) -> Decimal {
        self.record.credit_received
    }

    /// Adjustment history.
    #[must_use]
    pub fn adjustments(&self) -> &[Adjustment] {
        &self.record.adjustments
    }

    /// Entry fill time.
    #[must_use]
    pub const fn entry_date(&self) -> Option<DateTime<Utc>> {
        self.record.entry_date
    }

    /// Close time.
    #[must_use]
    pub const fn exit_date(&self) -> Option<DateTime<Utc>> {
        self.record.exit_date
    }

    /// Stored exit reason, empty when none.
    #[must_use]
    pub fn exit_reason(&self) -> &str {
        &self.record.exit_reason
    }

    /// Entry order, if placed.
    #[must_use]
    pub const fn entry_order_id(&self) -> Option<&OrderId> {
        self.record.entry_order_id.as_ref()
    }

    /// Working exit order, if any.
    #[must_use]
    pub const fn exit_order_id(&self) -> Option<&OrderId> {
        self.record.exit_order_id.as_ref()
    }

    /// Mark-to-market P&L in dollars.
    #[must_use]
    pub const fn current_pnl(&self) -> Decimal {
        self.record.current_pnl
    }

    /// Canonical lifecycle state.
    #[must_use]
    pub const fn state(&self) -> PositionState {
        self.record.state
    }

    /// Whether a live state machine is attached.
    #[must_use]
    pub const fn has_live_machine(&self) -> bool {
        self.machine.is_some()
    }

    // -------------------------------------------------------------------
    // State machine access
    // -------------------------------------------------------------------

    fn restore_machine(record: &PositionRecord, limits: LifecycleLimits) -> PositionStateMachine {
        let restored_at = record
            .exit_date
            .or(record.entry_date)
            .unwrap_or_else(Utc::now);
        PositionStateMachine::restored(record.state, limits, restored_at)
            .with_fourth_down(record.fourth_down_option, record.fourth_down_entered_at)
    }

    fn machine_mut(&mut self) -> &mut PositionStateMachine {
        let (record, limits) = (&self.record, self.limits);
        self.machine
            .get_or_insert_with(|| Self::restore_machine(record, limits))
    }

    /// The attached machine, or an equivalent view rebuilt from the record.
    #[must_use]
    pub fn machine(&self) -> Cow<'_, PositionStateMachine> {
        self.machine.as_ref().map_or_else(
            || Cow::Owned(Self::restore_machine(&self.record, self.limits)),
            Cow::Borrowed,
        )
    }

    fn sync_from_machine(&mut self) {
        let Some(machine) = self.machine.as_ref() else {
            return;
        };
        self.record.state = machine.current();
        self.record.fourth_down_option = machine.fourth_down_option();
        self.record.fourth_down_entered_at = machine.fourth_down_entered_at();
    }

    /// Management phase 1-4, or 0.
    #[must_use]
    pub const fn management_phase(&self) -> u8 {
        self.record.state.management_phase()
    }

    /// Whether another adjustment is allowed.
    #[must_use]
    pub fn can_adjust(&self) -> bool {
        self.machine().can_adjust()
    }

    /// Whether another time roll is allowed.
    #[must_use]
    pub fn can_roll(&self) -> bool {
        self.machine().can_roll()
    }

    /// Whether the punt is still available.
    #[must_use]
    pub fn can_punt(&self) -> bool {
        self.machine().can_punt()
    }

    // -------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------

    /// Move the position to `to` under `condition`.
    ///
    /// Trade data follows the target state:
    ///
    /// - `Open` stamps `entry_date` if unset.
    /// - `Closed` stamps `exit_date` if unset. An empty `exit_reason` is set
    ///   to the condition's wire tag (e.g. `hard_stop`), so a closed
    ///   position always carries a reason.
    /// - `Submitted` and `Error` clear entry/exit dates, exit reason, credit,
    ///   quantity, and adjustments.
    ///
    /// # Errors
    ///
    /// Propagates the state machine's rejection. Nothing changes on error.
    pub fn transition_state(
        &mut self,
        to: PositionState,
        condition: TransitionCondition,
    ) -> Result<(), PositionError> {
        self.transition_state_at(to, condition, Utc::now())
    }

    /// [`Self::transition_state`] with an explicit clock.
    ///
    /// # Errors
    ///
    /// See [`Self::transition_state`].
    pub fn transition_state_at(
        &mut self,
        to: PositionState,
        condition: TransitionCondition,
        at: DateTime<Utc>,
    ) -> Result<(), PositionError> {
        let from = self.record.state;
        self.machine_mut().transition_at(to, condition, at)?;
        self.sync_from_machine();

        match to {
            PositionState::Open => {
                self.record.entry_date.get_or_insert(at);
            }
            PositionState::Closed => {
                self.record.exit_date.get_or_insert(at);
                if self.record.exit_reason.is_empty() {
                    self.record.exit_reason = condition.as_str().to_string();
                }
            }
            PositionState::Submitted | PositionState::Error => self.clear_trade_data(),
            _ => {}
        }

        let description = transition_table()
            .find(from, to, condition)
            .map_or("", |t| t.description);
        tracing::info!(
            position_id = %self.record.id,
            from = %from,
            to = %to,
            condition = %condition,
            description,
            "position transitioned"
        );
        Ok(())
    }

    fn clear_trade_data(&mut self) {
        self.record.entry_date = None;
        self.record.exit_date = None;
        self.record.exit_reason.clear();
        self.record.credit_received = Decimal::ZERO;
        self.record.quantity = 0;
        self.record.adjustments.clear();
    }

    /// Spend the one punt out of `FourthDown`.
    ///
    /// # Errors
    ///
    /// Propagates `PuntAlreadyUsed` or `PuntNotAllowed`.
    pub fn execute_punt(&mut self) -> Result<(), PositionError> {
        self.machine_mut().execute_punt()?;
        self.sync_from_machine();
        tracing::info!(position_id = %self.record.id, "punt executed");
        Ok(())
    }

    /// Select the Fourth Down sub-strategy.
    ///
    /// # Errors
    ///
    /// `OptionNotAllowed` outside `FourthDown`.
    pub fn set_fourth_down_option(&mut self, option: FourthDownOption) -> Result<(), PositionError> {
        self.machine_mut().set_fourth_down_option(option)?;
        self.sync_from_machine();
        Ok(())
    }

    // -------------------------------------------------------------------
    // Trade data
    // -------------------------------------------------------------------

    /// Record the entry fill economics.
    pub const fn record_entry_fill(&mut self, credit: Decimal, quantity: u32) {
        self.record.credit_received = credit;
        self.record.quantity = quantity;
    }

    /// Record the entry order.
    pub fn set_entry_order(&mut self, order_id: OrderId) {
        self.record.entry_order_id = Some(order_id);
    }

    /// Record a working exit order and why it was sent.
    pub fn set_exit_order(&mut self, order_id: OrderId, reason: ExitReason) {
        self.record.exit_order_id = Some(order_id);
        self.record.exit_reason = reason.as_str().to_string();
    }

    /// Abandon the working exit order.
    pub fn clear_exit_order(&mut self) {
        self.record.exit_order_id = None;
        self.record.exit_reason.clear();
    }

    /// Append an adjustment.
    pub fn add_adjustment(&mut self, adjustment: Adjustment) {
        self.record.adjustments.push(adjustment);
    }

    /// Update mark-to-market P&L.
    pub const fn update_pnl(&mut self, pnl: Decimal) {
        self.record.current_pnl = pnl;
    }

    // -------------------------------------------------------------------
    // Economics
    // -------------------------------------------------------------------

    /// Entry credit plus all adjustment credits, per share.
    #[must_use]
    pub fn net_credit(&self) -> Decimal {
        self.record.credit_received
            + self
                .record
                .adjustments
                .iter()
                .map(|a| a.credit)
                .sum::<Decimal>()
    }

    /// Net credit in dollars: per-share net credit times quantity times 100.
    #[must_use]
    pub fn credit_basis(&self) -> Decimal {
        self.net_credit() * Decimal::from(self.record.quantity) * CONTRACT_MULTIPLIER
    }

    /// P&L as a percentage of the dollar credit basis. Zero when the basis is zero.
    #[must_use]
    pub fn profit_percent(&self) -> Decimal {
        let basis = self.credit_basis().abs();
        if basis.is_zero() {
            return Decimal::ZERO;
        }
        Decimal::ONE_HUNDRED * self.record.current_pnl / basis
    }

    /// Days to expiration from today (UTC), never negative.
    #[must_use]
    pub fn calculate_dte(&self) -> i64 {
        self.calculate_dte_at(Utc::now().date_naive())
    }

    /// Days to expiration from `today`, never negative.
    #[must_use]
    pub fn calculate_dte_at(&self, today: NaiveDate) -> i64 {
        (self.record.expiration - today).num_days().max(0)
    }

    /// Evaluate the emergency-exit rules against this position's economics.
    #[must_use]
    pub fn should_emergency_exit(&self, max_dte: i64, escalate_loss_pct: Decimal) -> EmergencyExitDecision {
        self.machine().should_emergency_exit(
            self.credit_basis(),
            self.record.current_pnl,
            self.calculate_dte(),
            max_dte,
            escalate_loss_pct,
        )
    }

    // -------------------------------------------------------------------
    // Invariants
    // -------------------------------------------------------------------

    /// Check the data invariants of the current state.
    ///
    /// # Errors
    ///
    /// `InvariantViolation` naming the first failed invariant.
    pub fn validate_state(&self) -> Result<(), PositionError> {
        let r = &self.record;
        let state = r.state;
        let fail = |message: &str| Err(PositionError::invariant(state, message));

        if r.credit_received < Decimal::ZERO {
            return fail("credit_received must be >= 0");
        }

        match state {
            PositionState::Idle | PositionState::Submitted | PositionState::Error => {
                if r.entry_date.is_some() || r.exit_date.is_some() {
                    return fail("entry_date and exit_date must be unset");
                }
                if !r.exit_reason.is_empty() {
                    return fail("exit_reason must be empty");
                }
                if !r.credit_received.is_zero() {
                    return fail("credit_received must be 0");
                }
                if !r.adjustments.is_empty() {
                    return fail("adjustments must be empty");
                }
                if state == PositionState::Submitted && r.quantity != 0 {
                    return fail("quantity must be 0 while submitted");
                }
            }
            PositionState::Open
            | PositionState::FirstDown
            | PositionState::SecondDown
            | PositionState::ThirdDown
            | PositionState::FourthDown
            | PositionState::Rolling => {
                if r.entry_date.is_none() {
                    return fail("entry_date must be set");
                }
                if r.exit_date.is_some() {
                    return fail("exit_date must be unset");
                }
                if !r.exit_reason.is_empty() {
                    return fail("exit_reason must be empty");
                }
                if r.credit_received <= Decimal::ZERO {
                    return fail("credit_received must be > 0");
                }
                if r.quantity == 0 {
                    return fail("quantity must be > 0");
                }
            }
            PositionState::Adjusting => {
                if r.entry_date.is_none() {
                    return fail("entry_date must be set");
                }
                if r.adjustments.is_empty() {
                    return fail("adjustments must not be empty while adjusting");
                }
            }
            PositionState::Closed => {
                let (Some(entry), Some(exit)) = (r.entry_date, r.exit_date) else {
                    return fail("entry_date and exit_date must be set");
                };
                if entry >= exit {
                    return fail("entry_date must be before exit_date");
                }
                if r.exit_reason.is_empty() {
                    return fail("exit_reason must be set");
                }
                if r.credit_received <= Decimal::ZERO {
                    return fail("credit_received must be > 0");
                }
                if r.quantity == 0 {
                    return fail("quantity must be > 0");
                }
            }
        }
        Ok(())
    }
}
