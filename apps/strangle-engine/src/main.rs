//! Strangle Engine Status Binary
//!
//! Loads the active position from storage and reports its lifecycle state,
//! economics, invariant check, and emergency-exit evaluation.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin strangle-engine -- config.yaml
//! ```
//!
//! # Environment Variables
//!
//! - `STRANGLE_CONFIG`: config path when no argument is given (default: config.yaml)
//! - `RUST_LOG`: overrides the configured log level

use anyhow::Context;
use strangle_engine::config::{Config, load_config};
use strangle_engine::telemetry::init_tracing;
use strangle_engine::{JsonFilePositionStore, Position, StoragePort};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("STRANGLE_CONFIG").ok());
    let config = load_config(config_path.as_deref()).context("loading configuration")?;

    init_tracing(&config.observability.logging)
        .map_err(|e| anyhow::anyhow!("initializing tracing: {e}"))?;

    let store = JsonFilePositionStore::new(&config.storage.path);
    let current = store
        .get_current_position()
        .await
        .with_context(|| format!("reading positions from {}", config.storage.path))?;
    let history = store.history().await.context("reading position history")?;

    tracing::info!(
        path = %config.storage.path,
        closed_positions = history.len(),
        "position store opened"
    );

    match current {
        Some(position) => report(&config, &with_configured_limits(&config, position)),
        None => tracing::info!("no active position"),
    }

    Ok(())
}

/// Rebuild the loaded position's machine against the configured limits.
fn with_configured_limits(config: &Config, mut position: Position) -> Position {
    position.set_limits(config.limits.to_lifecycle_limits());
    position
}

fn report(config: &Config, position: &Position) {
    let machine = position.machine();
    let decision = position.should_emergency_exit(
        config.risk.option_c_max_dte,
        config.risk.escalate_loss_pct_decimal(),
    );

    tracing::info!(
        position_id = %position.id(),
        symbol = position.symbol(),
        state = %position.state(),
        management_phase = position.management_phase(),
        put_strike = %position.put_strike(),
        call_strike = %position.call_strike(),
        quantity = position.quantity(),
        dte = position.calculate_dte(),
        net_credit = %position.net_credit(),
        profit_percent = %position.profit_percent().round_dp(1),
        can_adjust = machine.can_adjust(),
        can_roll = machine.can_roll(),
        can_punt = machine.can_punt(),
        fourth_down_option = %machine.fourth_down_option(),
        "active position"
    );

    if let Err(e) = position.validate_state() {
        tracing::warn!(position_id = %position.id(), error = %e, "position invariants violated");
    }

    if let Some(order_id) = position.exit_order_id() {
        tracing::info!(position_id = %position.id(), order_id = %order_id, reason = position.exit_reason(), "exit order working");
    } else if let Some(order_id) = position.entry_order_id() {
        tracing::debug!(position_id = %position.id(), order_id = %order_id, "entry order");
    }

    if decision.should_exit {
        tracing::warn!(position_id = %position.id(), reason = %decision.reason, "emergency exit indicated");
    }
}

/// Load `.env` from the working directory or the nearest ancestor.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use strangle_engine::config::load_config_from_string;
    use strangle_engine::{PositionRecord, PositionState, TransitionCondition};

    fn stored_first_down() -> PositionRecord {
        let mut p = Position::new(
            "SPY",
            dec!(400),
            dec!(450),
            NaiveDate::from_ymd_opt(2026, 12, 18).unwrap(),
        );
        p.transition_state(PositionState::Submitted, TransitionCondition::OrderPlaced)
            .unwrap();
        p.transition_state(PositionState::Open, TransitionCondition::OrderFilled)
            .unwrap();
        p.record_entry_fill(dec!(2.50), 1);
        p.transition_state(PositionState::FirstDown, TransitionCondition::StartManagement)
            .unwrap();
        p.record().clone()
    }

    #[test]
    fn report_uses_configured_limits() {
        let config = load_config_from_string(
            "limits:\n  max_adjustments: 0\n  max_time_rolls: 0\n  max_punts: 0\n",
        )
        .unwrap();

        let loaded = Position::from(stored_first_down());
        assert!(loaded.can_adjust());

        let position = with_configured_limits(&config, loaded);
        assert!(!position.can_adjust());
        assert!(!position.can_roll());
        assert!(!position.can_punt());
        assert_eq!(position.machine().limits(), config.limits.to_lifecycle_limits());
    }

    #[test]
    fn default_config_keeps_default_limits() {
        let config = load_config_from_string("{}").unwrap();
        let position = with_configured_limits(&config, Position::from(stored_first_down()));
        assert!(position.can_adjust());
        assert!(position.can_roll());
        assert!(position.can_punt());
    }
}
