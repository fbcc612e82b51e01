//! Scoped substitution of shared settings.
//!
//! A [`Setting`] is a named, shareable slot. [`Override`] swaps a value in
//! and puts the previous one back when dropped, so a panicking test still
//! leaves the slot as it found it.
//!
//! ```rust,ignore
//! static DEBUG: Setting<bool> = Setting::new("debug", false);
//!
//! let _guard = Override::new(&DEBUG, true);
//! assert_eq!(DEBUG.get(), Some(true));
//! ```

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Named value shared between the application and its tests.
///
/// A slot may be unset; overriding an unset slot leaves it unset again on
/// restore.
#[derive(Debug)]
pub struct Setting<T> {
    name: &'static str,
    value: RwLock<Option<T>>,
}

impl<T> Setting<T> {
    pub const fn new(name: &'static str, value: T) -> Self {
        Self {
            name,
            value: RwLock::new(Some(value)),
        }
    }

    pub const fn unset(name: &'static str) -> Self {
        Self {
            name,
            value: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_set(&self) -> bool {
        self.read().is_some()
    }

    pub fn set(&self, value: T) {
        *self.write() = Some(value);
    }

    pub fn clear(&self) -> Option<T> {
        self.write().take()
    }

    /// Store `value` (or unset the slot) and return what was there.
    pub fn replace(&self, value: Option<T>) -> Option<T> {
        std::mem::replace(&mut *self.write(), value)
    }

    /// Run `f` against the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        f(self.read().as_ref())
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<T>> {
        self.value.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<T>> {
        self.value.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T: Clone> Setting<T> {
    pub fn get(&self) -> Option<T> {
        self.read().clone()
    }

    pub fn get_or(&self, default: T) -> T {
        self.get().unwrap_or(default)
    }
}

/// Guard holding a substituted [`Setting`] value.
#[must_use = "the override is undone as soon as the guard is dropped"]
#[derive(Debug)]
pub struct Override<'a, T> {
    setting: &'a Setting<T>,
    previous: Option<T>,
}

impl<'a, T> Override<'a, T> {
    pub fn new(setting: &'a Setting<T>, value: T) -> Self {
        let previous = setting.replace(Some(value));
        tracing::debug!(setting = setting.name(), was_set = previous.is_some(), "setting overridden");
        Self { setting, previous }
    }

    /// Run `f` with `setting` overridden, restoring it afterwards.
    pub fn scoped<R>(setting: &'a Setting<T>, value: T, f: impl FnOnce() -> R) -> R {
        let _guard = Self::new(setting, value);
        f()
    }

    pub fn setting(&self) -> &'a Setting<T> {
        self.setting
    }
}

impl<T> Drop for Override<'_, T> {
    fn drop(&mut self) {
        self.setting.replace(self.previous.take());
        tracing::debug!(setting = self.setting.name(), "setting restored");
    }
}
