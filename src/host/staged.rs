//! Copy-on-begin staging for all-or-nothing calls.

use std::ops::{Deref, DerefMut};

/// A working copy of `T` that replaces the original only on [`commit`].
///
/// Dropping a `Staged` without committing discards every change made
/// through it.
///
/// [`commit`]: Staged::commit
pub struct Staged<'a, T: Clone> {
    target: &'a mut T,
    draft: T,
}

impl<'a, T: Clone> Staged<'a, T> {
    pub fn begin(target: &'a mut T) -> Self {
        let draft = target.clone();
        Self { target, draft }
    }

    pub fn commit(self) {
        *self.target = self.draft;
    }
}

impl<T: Clone> Deref for Staged<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.draft
    }
}

impl<T: Clone> DerefMut for Staged<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.draft
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_replaces_target() {
        let mut value = vec![1, 2];
        let mut staged = Staged::begin(&mut value);
        staged.push(3);
        staged.commit();
        assert_eq!(value, vec![1, 2, 3]);
    }

    #[test]
    fn test_drop_discards_changes() {
        let mut value = vec![1, 2];
        {
            let mut staged = Staged::begin(&mut value);
            staged.clear();
            assert!(staged.is_empty());
        }
        assert_eq!(value, vec![1, 2]);
    }

    #[test]
    fn test_failed_step_leaves_target_untouched() {
        fn run(v: &mut Vec<i32>) -> Result<(), &'static str> {
            v.push(99);
            Err("boom")
        }

        let mut value = vec![1];
        let mut staged = Staged::begin(&mut value);
        match run(&mut staged) {
            Ok(()) => staged.commit(),
            Err(_) => drop(staged),
        }
        assert_eq!(value, vec![1]);
    }
}
