//! Runtime configuration and the conversion toggle
//!
//! Both live in thread-local storage: containers are `Rc` handles, so a
//! reactive graph never leaves the thread that built it, and the thread is
//! the widest scope any setting could meaningfully apply to.

use serde::{Deserialize, Serialize};
use std::cell::Cell;

/// Configuration for the reactive runtime
///
/// # Example
///
/// ```
/// use ripple_core::ReactiveConfig;
///
/// let config = ReactiveConfig::default().with_diagnostics(false);
/// assert!(!config.diagnostics());
/// assert!(config.deep());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactiveConfig {
    /// Emit diagnostic warnings and run custom setter hooks
    ///
    /// Defaults to on in debug builds and off in release builds.
    diagnostics: bool,

    /// Observe nested containers recursively
    ///
    /// When off, `observe` only converts the top-level container and every
    /// reactive property behaves as if it were declared shallow.
    deep: bool,
}

impl ReactiveConfig {
    const DEFAULT: ReactiveConfig = ReactiveConfig {
        diagnostics: cfg!(debug_assertions),
        deep: true,
    };

    /// Set whether diagnostics are enabled
    pub fn with_diagnostics(mut self, diagnostics: bool) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Set whether nested containers are observed
    pub fn with_deep(mut self, deep: bool) -> Self {
        self.deep = deep;
        self
    }

    /// Check whether diagnostics are enabled
    pub fn diagnostics(&self) -> bool {
        self.diagnostics
    }

    /// Check whether nested containers are observed
    pub fn deep(&self) -> bool {
        self.deep
    }
}

impl Default for ReactiveConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

thread_local! {
    static CONFIG: Cell<ReactiveConfig> = const { Cell::new(ReactiveConfig::DEFAULT) };
    static SHOULD_CONVERT: Cell<bool> = const { Cell::new(true) };
}

/// Get the active configuration
pub fn config() -> ReactiveConfig {
    CONFIG.with(Cell::get)
}

/// Replace the active configuration, returning the previous one
pub fn set_config(config: ReactiveConfig) -> ReactiveConfig {
    CONFIG.with(|c| c.replace(config))
}

/// Run `f` with `config` active, restoring the previous configuration afterwards
///
/// ```
/// use ripple_core::{config, with_config, ReactiveConfig};
///
/// let quiet = ReactiveConfig::default().with_diagnostics(false);
/// with_config(quiet, || assert!(!config().diagnostics()));
/// ```
pub fn with_config<T>(config: ReactiveConfig, f: impl FnOnce() -> T) -> T {
    struct Restore(ReactiveConfig);

    impl Drop for Restore {
        fn drop(&mut self) {
            set_config(self.0);
        }
    }

    let _restore = Restore(set_config(config));
    f()
}

pub(crate) fn diagnostics_enabled() -> bool {
    config().diagnostics
}

/// Check whether `observe` is allowed to create new observers
pub fn should_convert() -> bool {
    SHOULD_CONVERT.with(Cell::get)
}

/// Enable or disable creation of new observers
///
/// Disabling conversion lets a caller hand a structure to reactive code
/// without making it reactive, e.g. a frozen value shared between owners.
/// Containers that already have an observer keep it.
pub fn set_should_convert(convert: bool) {
    SHOULD_CONVERT.with(|c| c.set(convert));
}

/// Run `f` with conversion disabled
pub fn without_conversion<T>(f: impl FnOnce() -> T) -> T {
    struct Restore(bool);

    impl Drop for Restore {
        fn drop(&mut self) {
            set_should_convert(self.0);
        }
    }

    let _restore = Restore(should_convert());
    set_should_convert(false);
    f()
}
