use std::collections::HashSet;
use std::sync::Mutex;

/// Identity of a condition progress application for one subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppliedKey {
    pub net_id: i32,
    pub quest_id: String,
    pub condition_id: String,
}

impl AppliedKey {
    pub fn condition(net_id: i32, quest_id: &str, condition_id: &str) -> Self {
        Self {
            net_id,
            quest_id: quest_id.to_owned(),
            condition_id: condition_id.to_owned(),
        }
    }
}

/// Session-scoped record of progress events that already mutated state.
/// Shared across the receive path and the local observers, so lookups
/// go through a mutex.
#[derive(Debug, Default)]
pub struct AppliedSet {
    inner: Mutex<HashSet<AppliedKey>>,
}

impl AppliedSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<AppliedKey>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn already_applied(&self, key: &AppliedKey) -> bool {
        self.lock().contains(key)
    }

    pub fn mark_applied(&self, key: AppliedKey) {
        self.lock().insert(key);
    }

    /// Marks the key and reports whether it was newly inserted. The mark
    /// lands before any state mutation so a relayed echo of our own
    /// event cannot re-apply.
    pub fn check_and_mark(&self, key: AppliedKey) -> bool {
        self.lock().insert(key)
    }

    /// Cleared at session boundaries. A new raid starts with no history.
    pub fn reset(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_mark_wins() {
        let set = AppliedSet::new();
        let key = AppliedKey::condition(3, "quest_a", "cond_1");
        assert!(set.check_and_mark(key.clone()));
        assert!(!set.check_and_mark(key.clone()));
        assert!(set.already_applied(&key));
    }

    #[test]
    fn keys_differ_by_any_component() {
        let set = AppliedSet::new();
        set.mark_applied(AppliedKey::condition(3, "quest_a", "cond_1"));
        assert!(!set.already_applied(&AppliedKey::condition(4, "quest_a", "cond_1")));
        assert!(!set.already_applied(&AppliedKey::condition(3, "quest_b", "cond_1")));
        assert!(!set.already_applied(&AppliedKey::condition(3, "quest_a", "cond_2")));
    }

    #[test]
    fn reset_forgets_everything() {
        let set = AppliedSet::new();
        set.mark_applied(AppliedKey::condition(1, "q", "c"));
        assert_eq!(set.len(), 1);
        set.reset();
        assert!(set.is_empty());
        assert!(set.check_and_mark(AppliedKey::condition(1, "q", "c")));
    }
}
