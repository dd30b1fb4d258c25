//! Pluggable syntax-validity oracles.
//!
//! Provides a `SyntaxOracle` trait with three implementations: `BalanceOracle`
//! (built-in Ruby lexer tracking block and literal balance, no dependencies),
//! `RubyOracle` (runs `ruby -c` out of process) and `TreeSitterOracle`
//! (tree-sitter-ruby, feature-gated behind `treesitter`).
//!
//! Callers never talk to an oracle directly: [`Probe`] wraps one and keeps its
//! speculative failures from leaking into the rest of the process.

mod balance;
mod ruby;
#[cfg(feature = "treesitter")]
mod treesitter;

pub use balance::BalanceOracle;
pub use ruby::RubyOracle;
#[cfg(feature = "treesitter")]
pub use treesitter::TreeSitterOracle;

use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe, PanicHookInfo};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use tracing::trace;

use crate::error::{ConfigError, OracleError};

pub trait SyntaxOracle: Send + Sync {
    /// Decide whether `text` is a syntactically complete Ruby program.
    /// Anything the oracle wants to report goes to `diagnostics`.
    fn check(&self, text: &str, diagnostics: &mut dyn Write) -> Result<bool, OracleError>;
    fn name(&self) -> &str;
}

/// Oracle names accepted by [`create_oracle`].
#[cfg(not(feature = "treesitter"))]
pub const ORACLE_NAMES: &[&str] = &["balance", "ruby"];
#[cfg(feature = "treesitter")]
pub const ORACLE_NAMES: &[&str] = &["balance", "ruby", "tree-sitter"];

/// Create an oracle by name. `ruby` is only consulted by the `ruby` oracle.
pub fn create_oracle(name: &str, ruby: &Path) -> Result<Box<dyn SyntaxOracle>, ConfigError> {
    match name {
        "balance" => Ok(Box::new(BalanceOracle)),
        "ruby" => Ok(Box::new(RubyOracle::new(ruby))),
        #[cfg(feature = "treesitter")]
        "tree-sitter" | "treesitter" => Ok(Box::new(TreeSitterOracle)),
        other => Err(ConfigError::UnknownOracle(other.to_string(), ORACLE_NAMES.join(", "))),
    }
}

// ---------------------------------------------------------------------------
// Quiet probing
// ---------------------------------------------------------------------------

/// Serializes access to the process-wide state a probe temporarily replaces.
static PROBE_LOCK: Mutex<()> = Mutex::new(());

type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Sync + Send + 'static>;

/// Scope in which oracle failures stay invisible: holds the probe lock and
/// swaps the panic hook for a silent one, restoring the original on drop.
struct QuietScope {
    previous_hook: Option<PanicHook>,
    _lock: MutexGuard<'static, ()>,
}

impl QuietScope {
    fn enter() -> Self {
        let lock = PROBE_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous_hook = panic::take_hook();
        panic::set_hook(Box::new(|_| {}));
        QuietScope { previous_hook: Some(previous_hook), _lock: lock }
    }
}

impl Drop for QuietScope {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        if let Some(hook) = self.previous_hook.take() {
            panic::set_hook(hook);
        }
    }
}

/// Adapter that asks an oracle about candidate text without side effects:
/// diagnostics go to a discard sink, panics inside the oracle count as
/// "not valid", and the process panic hook is restored afterwards.
pub struct Probe {
    oracle: Box<dyn SyntaxOracle>,
}

impl Probe {
    pub fn new(oracle: Box<dyn SyntaxOracle>) -> Self {
        Probe { oracle }
    }

    pub fn oracle_name(&self) -> &str {
        self.oracle.name()
    }

    /// `Ok(false)` for anything short of a clean "valid" answer, except an
    /// oracle that cannot run at all, which is reported as `Err`.
    pub fn is_valid(&self, text: &str) -> Result<bool, OracleError> {
        let outcome = {
            let _quiet = QuietScope::enter();
            panic::catch_unwind(AssertUnwindSafe(|| self.oracle.check(text, &mut io::sink())))
        };

        match outcome {
            Ok(Ok(valid)) => {
                trace!(oracle = self.oracle.name(), bytes = text.len(), valid, "Probe");
                Ok(valid)
            }
            Ok(Err(OracleError::Failed(reason))) => {
                trace!(oracle = self.oracle.name(), reason = reason.as_str(), "Probe failed");
                Ok(false)
            }
            Ok(Err(err @ OracleError::Unavailable(_))) => Err(err),
            Err(_) => {
                trace!(oracle = self.oracle.name(), "Oracle panicked during probe");
                Ok(false)
            }
        }
    }

    /// Run the oracle with its diagnostics going to `out`, outside the quiet scope.
    pub fn check_verbose(&self, text: &str, out: &mut dyn Write) -> Result<bool, OracleError> {
        self.oracle.check(text, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Panicking;

    impl SyntaxOracle for Panicking {
        fn check(&self, _text: &str, _diagnostics: &mut dyn Write) -> Result<bool, OracleError> {
            panic!("parser blew up");
        }
        fn name(&self) -> &str {
            "panicking"
        }
    }

    struct Noisy(Arc<AtomicUsize>);

    impl SyntaxOracle for Noisy {
        fn check(&self, text: &str, diagnostics: &mut dyn Write) -> Result<bool, OracleError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            writeln!(diagnostics, "-:1: syntax error in {text:?}")
                .map_err(|e| OracleError::Failed(e.to_string()))?;
            Ok(false)
        }
        fn name(&self) -> &str {
            "noisy"
        }
    }

    struct Missing;

    impl SyntaxOracle for Missing {
        fn check(&self, _text: &str, _diagnostics: &mut dyn Write) -> Result<bool, OracleError> {
            Err(OracleError::Unavailable("no parser installed".to_string()))
        }
        fn name(&self) -> &str {
            "missing"
        }
    }

    #[test]
    fn panicking_oracle_reads_as_invalid() {
        let probe = Probe::new(Box::new(Panicking));
        assert!(!probe.is_valid("def x; end").unwrap());
        // A second call must work the same way: the lock was released.
        assert!(!probe.is_valid("def x; end").unwrap());
    }

    #[test]
    fn panic_hook_is_restored_after_probe() {
        let probe = Probe::new(Box::new(Panicking));
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        {
            let _guard = PROBE_LOCK.lock().unwrap_or_else(|p| p.into_inner());
            panic::set_hook(Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }

        assert!(!probe.is_valid("x").unwrap());

        // Hold the lock so no concurrent probe swaps the hook under us.
        let _guard = PROBE_LOCK.lock().unwrap_or_else(|p| p.into_inner());
        assert_eq!(seen.load(Ordering::SeqCst), 0, "hook must be silenced during the probe");
        let _ = panic::catch_unwind(|| panic!("after probe"));
        assert_eq!(seen.load(Ordering::SeqCst), 1, "original hook must be back");
        let _ = panic::take_hook();
    }

    #[test]
    fn diagnostics_are_discarded() {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = Probe::new(Box::new(Noisy(calls.clone())));
        assert!(!probe.is_valid("def").unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn verbose_check_forwards_diagnostics() {
        let probe = Probe::new(Box::new(Noisy(Arc::new(AtomicUsize::new(0)))));
        let mut out = Vec::new();
        assert!(!probe.check_verbose("def", &mut out).unwrap());
        assert!(String::from_utf8(out).unwrap().contains("syntax error"));
    }

    #[test]
    fn unavailable_oracle_is_an_error() {
        let probe = Probe::new(Box::new(Missing));
        assert!(matches!(probe.is_valid("x"), Err(OracleError::Unavailable(_))));
    }

    #[test]
    fn create_oracle_by_name() {
        let ruby = Path::new("ruby");
        assert_eq!(create_oracle("balance", ruby).unwrap().name(), "balance");
        assert_eq!(create_oracle("ruby", ruby).unwrap().name(), "ruby");
        assert!(matches!(
            create_oracle("prism", ruby),
            Err(ConfigError::UnknownOracle(name, _)) if name == "prism"
        ));
    }
}
