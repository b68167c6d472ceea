//! Lanes - bitset priorities for updates.
//!
//! A lane is a single bit; a set of lanes is their union. Lower bits are
//! higher priority, so the highest-priority pending lane is the lowest set
//! bit (`lanes & -lanes`).
//!
//! ```text
//! SYNC             0b00001   flushed in a microtask, never yields
//! INPUT_CONTINUOUS 0b00010   user-blocking scheduler priority
//! DEFAULT          0b00100   normal scheduler priority
//! TRANSITION       0b01000   low scheduler priority
//! IDLE             0b10000   idle scheduler priority
//! ```

use std::cell::Cell;

use crate::scheduler::Priority;

bitflags::bitflags! {
    /// A set of lanes. A single-bit value is a lane.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Lanes: u32 {
        const SYNC = 1 << 0;
        const INPUT_CONTINUOUS = 1 << 1;
        const DEFAULT = 1 << 2;
        const TRANSITION = 1 << 3;
        const IDLE = 1 << 4;
    }
}

/// A single lane.
pub type Lane = Lanes;

pub const NO_LANE: Lane = Lanes::empty();
pub const NO_LANES: Lanes = Lanes::empty();

// =============================================================================
// Lane arithmetic
// =============================================================================

pub fn merge_lanes(a: Lanes, b: Lanes) -> Lanes {
    a | b
}

pub fn remove_lanes(set: Lanes, subset: Lanes) -> Lanes {
    set & !subset
}

/// Lowest set bit = highest priority.
pub fn get_highest_priority_lane(lanes: Lanes) -> Lane {
    let bits = lanes.bits();
    Lanes::from_bits_retain(bits & bits.wrapping_neg())
}

pub fn include_some_lanes(a: Lanes, b: Lanes) -> bool {
    a.intersects(b)
}

pub fn is_subset_of_lanes(set: Lanes, subset: Lanes) -> bool {
    set.contains(subset)
}

// =============================================================================
// Scheduler priority mapping
// =============================================================================

/// Scheduler priority used to run work for `lane`.
pub fn lane_to_scheduler_priority(lane: Lane) -> Priority {
    let lane = get_highest_priority_lane(lane);
    if lane == Lanes::SYNC {
        Priority::Immediate
    } else if lane == Lanes::INPUT_CONTINUOUS {
        Priority::UserBlocking
    } else if lane == Lanes::DEFAULT {
        Priority::Normal
    } else if lane == Lanes::TRANSITION {
        Priority::Low
    } else {
        Priority::Idle
    }
}

// =============================================================================
// Current request priority
// =============================================================================

thread_local! {
    /// Lane requested by the host for updates dispatched right now.
    static CURRENT_UPDATE_LANE: Cell<Lanes> = const { Cell::new(Lanes::empty()) };
}

/// Lane for a new update: the host-supplied priority if one is active,
/// otherwise the synchronous lane.
pub fn request_update_lane() -> Lane {
    let lane = CURRENT_UPDATE_LANE.with(Cell::get);
    if lane.is_empty() {
        Lanes::SYNC
    } else {
        lane
    }
}

/// Run `f` with updates tagged at `lane`. Restores the previous lane after.
pub fn with_update_lane<R>(lane: Lane, f: impl FnOnce() -> R) -> R {
    let previous = CURRENT_UPDATE_LANE.with(|current| current.replace(lane));
    let result = f();
    CURRENT_UPDATE_LANE.with(|current| current.set(previous));
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highest_priority_lane() {
        let pending = Lanes::DEFAULT | Lanes::IDLE | Lanes::INPUT_CONTINUOUS;
        assert_eq!(get_highest_priority_lane(pending), Lanes::INPUT_CONTINUOUS);
        assert_eq!(get_highest_priority_lane(Lanes::IDLE), Lanes::IDLE);
        assert_eq!(get_highest_priority_lane(NO_LANES), NO_LANE);
    }

    #[test]
    fn test_merge_and_remove() {
        let merged = merge_lanes(Lanes::SYNC, Lanes::DEFAULT);
        assert!(include_some_lanes(merged, Lanes::SYNC));
        assert!(is_subset_of_lanes(merged, Lanes::DEFAULT));
        assert_eq!(remove_lanes(merged, Lanes::SYNC), Lanes::DEFAULT);
    }

    #[test]
    fn test_request_update_lane_defaults_to_sync() {
        assert_eq!(request_update_lane(), Lanes::SYNC);

        let inner = with_update_lane(Lanes::TRANSITION, || {
            let nested = with_update_lane(Lanes::IDLE, request_update_lane);
            assert_eq!(nested, Lanes::IDLE);
            request_update_lane()
        });

        assert_eq!(inner, Lanes::TRANSITION);
        assert_eq!(request_update_lane(), Lanes::SYNC);
    }

    #[test]
    fn test_priority_follows_highest_lane() {
        assert_eq!(lane_to_scheduler_priority(Lanes::SYNC), Priority::Immediate);
        assert_eq!(lane_to_scheduler_priority(Lanes::TRANSITION), Priority::Low);
        assert_eq!(
            lane_to_scheduler_priority(Lanes::DEFAULT | Lanes::IDLE),
            Priority::Normal
        );
        assert_eq!(lane_to_scheduler_priority(NO_LANES), Priority::Idle);
    }

    #[test]
    fn test_empty_lane_is_subset_of_any_render() {
        assert!(is_subset_of_lanes(Lanes::SYNC, NO_LANE));
        assert!(is_subset_of_lanes(Lanes::IDLE, NO_LANE));
        assert!(!is_subset_of_lanes(Lanes::SYNC, Lanes::DEFAULT));
    }
}
