//! Position lifecycle states and the Fourth Down sub-strategy selector.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a strangle position.
///
/// `FirstDown` through `FourthDown` are the management phases, ordered by
/// escalating risk to the short strikes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionState {
    /// No position and no order working.
    #[default]
    Idle,
    /// Entry order placed, awaiting fill.
    Submitted,
    /// Position filled and being monitored.
    Open,
    /// Management phase 1.
    FirstDown,
    /// Management phase 2.
    SecondDown,
    /// Management phase 3.
    ThirdDown,
    /// Management phase 4, the terminal-risk phase.
    FourthDown,
    /// Adjustment order in progress.
    Adjusting,
    /// Time roll in progress.
    Rolling,
    /// Position closed. Terminal.
    Closed,
    /// Position flagged for intervention.
    Error,
}

impl PositionState {
    /// Number of variants. Sizes per-state counter arrays.
    pub const COUNT: usize = 11;

    /// Every state, in declaration order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Idle,
        Self::Submitted,
        Self::Open,
        Self::FirstDown,
        Self::SecondDown,
        Self::ThirdDown,
        Self::FourthDown,
        Self::Adjusting,
        Self::Rolling,
        Self::Closed,
        Self::Error,
    ];

    /// Dense index for array-backed lookups.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Wire name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Submitted => "submitted",
            Self::Open => "open",
            Self::FirstDown => "first_down",
            Self::SecondDown => "second_down",
            Self::ThirdDown => "third_down",
            Self::FourthDown => "fourth_down",
            Self::Adjusting => "adjusting",
            Self::Rolling => "rolling",
            Self::Closed => "closed",
            Self::Error => "error",
        }
    }

    /// Management phase number: `FirstDown` is 1 through `FourthDown` is 4,
    /// every other state is 0.
    #[must_use]
    pub const fn management_phase(self) -> u8 {
        match self {
            Self::FirstDown => 1,
            Self::SecondDown => 2,
            Self::ThirdDown => 3,
            Self::FourthDown => 4,
            _ => 0,
        }
    }

    /// Whether this is one of the four management phases.
    #[must_use]
    pub const fn is_management(self) -> bool {
        self.management_phase() > 0
    }

    /// Whether a filled position exists in this state.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::Open
                | Self::FirstDown
                | Self::SecondDown
                | Self::ThirdDown
                | Self::FourthDown
                | Self::Adjusting
                | Self::Rolling
        )
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sub-strategy chosen while in `FourthDown`.
///
/// Governs which time-based emergency exit applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FourthDownOption {
    /// Nothing selected.
    #[default]
    None,
    /// Aggressive: exit after 5 days in the phase.
    OptionA,
    /// Conservative: exit after 3 days in the phase.
    OptionB,
    /// DTE-limited: exit once DTE reaches the configured maximum.
    OptionC,
}

impl fmt::Display for FourthDownOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::OptionA => "option_a",
            Self::OptionB => "option_b",
            Self::OptionC => "option_c",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_matches_all_order() {
        for (i, state) in PositionState::ALL.iter().enumerate() {
            assert_eq!(state.index(), i);
        }
    }

    #[test]
    fn management_phase_numbers() {
        assert_eq!(PositionState::FirstDown.management_phase(), 1);
        assert_eq!(PositionState::SecondDown.management_phase(), 2);
        assert_eq!(PositionState::ThirdDown.management_phase(), 3);
        assert_eq!(PositionState::FourthDown.management_phase(), 4);
        assert_eq!(PositionState::Open.management_phase(), 0);
        assert_eq!(PositionState::Adjusting.management_phase(), 0);
        assert!(PositionState::ThirdDown.is_management());
        assert!(!PositionState::Rolling.is_management());
    }

    #[test]
    fn wire_names_match_serde() {
        for state in PositionState::ALL {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state.as_str()));
        }
        assert!(serde_json::from_str::<PositionState>("\"second-down\"").is_err());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&PositionState::FourthDown).unwrap();
        assert_eq!(json, "\"fourth_down\"");
        let option: FourthDownOption = serde_json::from_str("\"option_b\"").unwrap();
        assert_eq!(option, FourthDownOption::OptionB);
    }

    #[test]
    fn only_closed_is_terminal() {
        let terminal: Vec<_> = PositionState::ALL
            .into_iter()
            .filter(|s| s.is_terminal())
            .collect();
        assert_eq!(terminal, vec![PositionState::Closed]);
    }
}
