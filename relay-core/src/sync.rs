//! Cross-relay synchronization policies.

use core::fmt;

use crate::relays::RelayId;

/// How a status change on one relay propagates to the others.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum SyncPolicy {
    #[default]
    Independent,
    /// At most one relay may be ON.
    NoneOrOne,
    /// Exactly one relay is ON; turning one OFF hands over to the next.
    ExactlyOne,
    /// Every relay follows the last change.
    AllSame,
}

impl SyncPolicy {
    #[must_use]
    pub const fn from_code(code: u32) -> Self {
        match code {
            1 => SyncPolicy::NoneOrOne,
            2 => SyncPolicy::ExactlyOne,
            3 => SyncPolicy::AllSame,
            _ => SyncPolicy::Independent,
        }
    }

    #[must_use]
    pub const fn as_code(self) -> u32 {
        match self {
            SyncPolicy::Independent => 0,
            SyncPolicy::NoneOrOne => 1,
            SyncPolicy::ExactlyOne => 2,
            SyncPolicy::AllSame => 3,
        }
    }

    /// Follow-up requests implied by `trigger` moving to `status`.
    #[must_use]
    pub const fn plan(self, trigger: RelayId, status: bool, count: usize) -> SyncPlan {
        SyncPlan {
            policy: self,
            trigger,
            status,
            count,
            cursor: 0,
        }
    }
}

impl fmt::Display for SyncPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SyncPolicy::Independent => "independent",
            SyncPolicy::NoneOrOne => "none-or-one",
            SyncPolicy::ExactlyOne => "exactly-one",
            SyncPolicy::AllSame => "all-same",
        };
        f.write_str(label)
    }
}

/// Iterator over the `(relay, status)` requests a policy implies.
#[derive(Copy, Clone, Debug)]
pub struct SyncPlan {
    policy: SyncPolicy,
    trigger: RelayId,
    status: bool,
    count: usize,
    cursor: usize,
}

impl Iterator for SyncPlan {
    type Item = (RelayId, bool);

    fn next(&mut self) -> Option<Self::Item> {
        match (self.policy, self.status) {
            (SyncPolicy::Independent, _) | (SyncPolicy::NoneOrOne, false) => None,
            (SyncPolicy::ExactlyOne, false) => {
                if self.cursor > 0 || self.count < 2 {
                    return None;
                }
                self.cursor = self.count;
                Some(((self.trigger + 1) % self.count, true))
            }
            (SyncPolicy::NoneOrOne | SyncPolicy::ExactlyOne, true) => self.next_other(false),
            (SyncPolicy::AllSame, status) => self.next_other(status),
        }
    }
}

impl SyncPlan {
    fn next_other(&mut self, status: bool) -> Option<(RelayId, bool)> {
        while self.cursor < self.count {
            let id = self.cursor;
            self.cursor += 1;
            if id != self.trigger {
                return Some((id, status));
            }
        }
        None
    }
}

/// Re-entrancy guard around propagation.
///
/// Requests issued while propagating are applied but do not propagate
/// further. The guard is a plain flag owned by the controller so it cannot
/// be left set across calls.
#[derive(Debug, Default)]
pub struct SyncGuard {
    active: bool,
    suppressed: u32,
}

impl SyncGuard {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            active: false,
            suppressed: 0,
        }
    }

    /// Claims the guard; `false` means propagation is already running.
    pub fn enter(&mut self) -> bool {
        if self.active {
            self.suppressed = self.suppressed.saturating_add(1);
            false
        } else {
            self.active = true;
            true
        }
    }

    pub fn exit(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Nested propagations that were cut short.
    pub fn suppressed(&self) -> u32 {
        self.suppressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(plan: SyncPlan) -> heapless::Vec<(RelayId, bool), 8> {
        plan.collect()
    }

    #[test]
    fn independent_plans_nothing() {
        assert!(collect(SyncPolicy::Independent.plan(0, true, 4)).is_empty());
    }

    #[test]
    fn exclusive_on_turns_others_off() {
        for policy in [SyncPolicy::NoneOrOne, SyncPolicy::ExactlyOne] {
            let plan = collect(policy.plan(1, true, 3));
            assert_eq!(plan.as_slice(), &[(0, false), (2, false)]);
        }
    }

    #[test]
    fn none_or_one_off_is_local() {
        assert!(collect(SyncPolicy::NoneOrOne.plan(1, false, 3)).is_empty());
    }

    #[test]
    fn exactly_one_hands_over_to_next() {
        assert_eq!(
            collect(SyncPolicy::ExactlyOne.plan(2, false, 3)).as_slice(),
            &[(0, true)]
        );
        assert!(collect(SyncPolicy::ExactlyOne.plan(0, false, 1)).is_empty());
    }

    #[test]
    fn all_same_mirrors_status() {
        assert_eq!(
            collect(SyncPolicy::AllSame.plan(0, true, 3)).as_slice(),
            &[(1, true), (2, true)]
        );
    }

    #[test]
    fn guard_rejects_nested_entry() {
        let mut guard = SyncGuard::new();
        assert!(guard.enter());
        assert!(!guard.enter());
        guard.exit();
        assert!(!guard.is_active());
        assert!(guard.enter());
        assert_eq!(guard.suppressed(), 1);
    }
}
