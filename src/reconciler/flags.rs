//! Effect flags recorded on work nodes during render, applied during commit.

bitflags::bitflags! {
    /// Pending commit-phase actions for one fiber.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Flags: u16 {
        /// Insert or move the host node(s) of this fiber.
        const PLACEMENT = 1 << 1;
        /// Apply a prop payload or text change.
        const UPDATE = 1 << 2;
        /// `deletions` holds children to remove.
        const CHILD_DELETION = 1 << 3;
        /// The fiber has passive effects to run after commit.
        const PASSIVE_EFFECT = 1 << 4;
    }
}

/// Flags that touch the host tree.
pub const MUTATION_MASK: Flags = Flags::PLACEMENT
    .union(Flags::UPDATE)
    .union(Flags::CHILD_DELETION);

/// Flags that require a passive-effect flush.
pub const PASSIVE_MASK: Flags = Flags::PASSIVE_EFFECT.union(Flags::CHILD_DELETION);

bitflags::bitflags! {
    /// Tags on a hook effect record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct HookFlags: u8 {
        const PASSIVE = 1 << 0;
        /// The effect must fire in the next flush.
        const HAS_EFFECT = 1 << 1;
    }
}
