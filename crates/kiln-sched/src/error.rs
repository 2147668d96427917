//! Error types for tile scheduling.

use kiln_core::TileState;
use thiserror::Error;

/// Result type for scheduling operations.
pub type SchedResult<T> = Result<T, SchedError>;

/// Errors raised by the tile generator and scheduler.
#[derive(Debug, Error)]
pub enum SchedError {
    /// The requested traversal order cannot be used with the current
    /// assignment mode (Hilbert spiral requires whole-image assignment,
    /// not per-device slicing).
    #[error("tile order {order:?} is not usable with sliced device assignment")]
    InvalidOrder {
        /// The rejected order
        order: kiln_core::TileOrder,
    },

    /// A tile was returned while in a state the scheduler never hands out.
    ///
    /// This indicates corrupted scheduling state; the session cannot
    /// continue.
    #[error("tile {index} returned in unexpected state {state:?}")]
    StateViolation {
        /// Index of the offending tile
        index: u32,
        /// The state it was in
        state: TileState,
    },

    /// A tile index outside the current grid was returned.
    #[error("tile index {index} outside the current grid of {num_tiles} tiles")]
    UnknownTile {
        /// The out-of-range index
        index: u32,
        /// Number of tiles in the grid
        num_tiles: usize,
    },

    /// A structural error from the core types.
    #[error(transparent)]
    Core(#[from] kiln_core::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_violation_message() {
        let err = SchedError::StateViolation {
            index: 7,
            state: TileState::Done,
        };
        let msg = err.to_string();
        assert!(msg.contains('7'));
        assert!(msg.contains("Done"));
    }
}
