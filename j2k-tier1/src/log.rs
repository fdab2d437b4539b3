//! Logging of decoding progress and errors.
//!
//! With the `logging` feature, messages go to the `log` crate under the
//! `j2k_tier1` target. Otherwise the arguments are only borrowed.

macro_rules! log_at {
    ($level:ident, $fmt:literal $(, $($arg:expr),* $(,)?)?) => {{
        #[cfg(feature = "logging")]
        ::log::log!(target: "j2k_tier1", ::log::Level::$level, $fmt $(, $($arg),*)?);
        #[cfg(not(feature = "logging"))]
        { $($(let _ = &$arg;)*)? }
    }};
}

/// Per-codeword progress.
macro_rules! ldebug {
    ($($tt:tt)*) => {
        $crate::log::log_at!(Debug, $($tt)*)
    };
}

/// Per-segment details.
macro_rules! ltrace {
    ($($tt:tt)*) => {
        $crate::log::log_at!(Trace, $($tt)*)
    };
}

/// Errors that stop the decoding of a code-block.
macro_rules! lwarn {
    ($($tt:tt)*) => {
        $crate::log::log_at!(Warn, $($tt)*)
    };
}

pub(crate) use ldebug;
pub(crate) use log_at;
pub(crate) use ltrace;
pub(crate) use lwarn;
