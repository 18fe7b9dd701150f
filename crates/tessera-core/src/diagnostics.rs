//! Assertion and abort surface.
//!
//! Precondition violations (type mismatches, out-of-range indices, zero
//! sizes, cross-world values) are programmer errors and are never returned
//! as `Result`s. [`precondition!`](crate::precondition) logs a report through
//! `tracing` and then panics with the same report.
//! [`soft_assert!`](crate::soft_assert) logs at `warn` and lets execution
//! continue.
//!
//! Tests intercept violations with `#[should_panic]` or
//! [`std::panic::catch_unwind`].

use std::fmt;
use std::panic::Location;

/// How a failed check is handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    /// Log and panic.
    Fatal,
    /// Log and continue.
    Soft,
}

/// Where a check was written and what it asserted.
#[derive(Clone, Copy, Debug)]
pub struct Site {
    /// Source file.
    pub file: &'static str,
    /// Module path of the enclosing function.
    pub function: &'static str,
    /// Source line.
    pub line: u32,
    /// The asserted expression, as written.
    pub expression: &'static str,
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} in {}: `{}`",
            self.file, self.line, self.function, self.expression
        )
    }
}

/// Report a failed fatal check and panic.
///
/// Called by [`precondition!`](crate::precondition); rarely useful directly.
#[cold]
#[inline(never)]
pub fn fail(site: Site, message: fmt::Arguments<'_>) -> ! {
    tracing::error!(
        file = site.file,
        function = site.function,
        line = site.line,
        expression = site.expression,
        "precondition violated: {message}"
    );
    panic!("precondition violated at {site}: {message}");
}

/// Report a failed soft check.
#[cold]
pub fn report(site: Site, message: fmt::Arguments<'_>) {
    tracing::warn!(
        file = site.file,
        function = site.function,
        line = site.line,
        expression = site.expression,
        "assertion failed: {message}"
    );
}

/// Function form of the assert capability, for callers that pick the
/// severity at runtime. The caller's location is recorded.
#[track_caller]
pub fn check(condition: bool, message: &str, severity: Severity) {
    if condition {
        return;
    }
    let loc = Location::caller();
    let site = Site {
        file: loc.file(),
        function: "<unknown>",
        line: loc.line(),
        expression: "<runtime check>",
    };
    match severity {
        Severity::Fatal => fail(site, format_args!("{message}")),
        Severity::Soft => report(site, format_args!("{message}")),
    }
}

/// Log and terminate the process immediately, without unwinding.
///
/// ```no_run
/// let mapped = false;
/// if !mapped {
///     tessera_core::diagnostics::abort();
/// }
/// ```
pub fn abort() -> ! {
    tracing::error!("abort requested");
    std::process::abort()
}

/// Assert a precondition; on failure log the site and message, then panic.
///
/// ```should_panic
/// let index = 3;
/// let len = 2;
/// tessera_core::precondition!(index < len, "index {index} out of range for length {len}");
/// ```
#[macro_export]
macro_rules! precondition {
    ($cond:expr $(,)?) => {
        $crate::precondition!($cond, "{}", stringify!($cond))
    };
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            $crate::diagnostics::fail(
                $crate::diagnostics::Site {
                    file: file!(),
                    function: module_path!(),
                    line: line!(),
                    expression: stringify!($cond),
                },
                format_args!($($arg)+),
            )
        }
    };
}

/// Report an unconditional precondition violation.
#[macro_export]
macro_rules! violation {
    ($($arg:tt)+) => {
        $crate::diagnostics::fail(
            $crate::diagnostics::Site {
                file: file!(),
                function: module_path!(),
                line: line!(),
                expression: "unreachable state",
            },
            format_args!($($arg)+),
        )
    };
}

/// Check a condition; on failure log at `warn` and continue.
///
/// Evaluates to the condition so callers can branch on it.
#[macro_export]
macro_rules! soft_assert {
    ($cond:expr $(,)?) => {
        $crate::soft_assert!($cond, "{}", stringify!($cond))
    };
    ($cond:expr, $($arg:tt)+) => {{
        let ok: bool = $cond;
        if !ok {
            $crate::diagnostics::report(
                $crate::diagnostics::Site {
                    file: file!(),
                    function: module_path!(),
                    line: line!(),
                    expression: stringify!($cond),
                },
                format_args!($($arg)+),
            );
        }
        ok
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABORT_CHILD: &str = "TESSERA_ABORT_CHILD";

    #[test]
    fn abort_in_child() {
        if std::env::var_os(ABORT_CHILD).is_some() {
            abort();
        }
    }

    #[test]
    fn abort_terminates_without_unwinding() {
        let exe = std::env::current_exe().unwrap();
        let status = std::process::Command::new(exe)
            .args(["--exact", "diagnostics::tests::abort_in_child", "--test-threads=1"])
            .env(ABORT_CHILD, "1")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .unwrap();
        assert!(!status.success());
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            // SIGABRT
            assert_eq!(status.signal(), Some(6));
        }
    }

    #[test]
    fn passing_precondition_is_silent() {
        precondition!(1 + 1 == 2, "arithmetic");
    }

    #[test]
    #[should_panic(expected = "precondition violated")]
    fn failing_precondition_panics() {
        let len = 2;
        precondition!(len > 5, "len {len} too small");
    }

    #[test]
    fn panic_message_carries_site_and_message() {
        let err = std::panic::catch_unwind(|| {
            precondition!(false, "custom {}", 42);
        })
        .unwrap_err();
        let msg = err.downcast_ref::<String>().unwrap();
        assert!(msg.contains("custom 42"));
        assert!(msg.contains("diagnostics.rs"));
        assert!(msg.contains("`false`"));
    }

    #[test]
    #[should_panic(expected = "unreachable state")]
    fn violation_always_panics() {
        violation!("bad tag {}", 9);
    }

    #[test]
    fn soft_assert_returns_condition() {
        assert!(soft_assert!(true));
        assert!(!soft_assert!(1 > 2, "not fatal"));
    }

    #[test]
    fn soft_check_continues() {
        check(false, "soft", Severity::Soft);
    }

    #[test]
    #[should_panic(expected = "fatal check")]
    fn fatal_check_panics() {
        check(false, "fatal check", Severity::Fatal);
    }
}
