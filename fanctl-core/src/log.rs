//! Feature-gated logging
//!
//! With the `defmt` feature the `log_*!` macros forward to defmt; without
//! it they only borrow their arguments inside a dead branch, so host tests
//! need no logger and values used just for logging still count as used.
//! Crates using these macros must carry their own optional `defmt`
//! dependency and turn on `fanctl-core/defmt` together with it.

#[cfg(feature = "defmt")]
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => { defmt::info!($($arg)*) };
}

#[cfg(feature = "defmt")]
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => { defmt::debug!($($arg)*) };
}

#[cfg(feature = "defmt")]
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => { defmt::warn!($($arg)*) };
}

#[cfg(feature = "defmt")]
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => { defmt::error!($($arg)*) };
}

#[cfg(feature = "defmt")]
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => { defmt::trace!($($arg)*) };
}

#[cfg(not(feature = "defmt"))]
#[macro_export]
macro_rules! log_info {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        if false {
            $( let _ = &$arg; )*
        }
    }};
}

#[cfg(not(feature = "defmt"))]
#[macro_export]
macro_rules! log_debug {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        if false {
            $( let _ = &$arg; )*
        }
    }};
}

#[cfg(not(feature = "defmt"))]
#[macro_export]
macro_rules! log_warn {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        if false {
            $( let _ = &$arg; )*
        }
    }};
}

#[cfg(not(feature = "defmt"))]
#[macro_export]
macro_rules! log_error {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        if false {
            $( let _ = &$arg; )*
        }
    }};
}

#[cfg(not(feature = "defmt"))]
#[macro_export]
macro_rules! log_trace {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        if false {
            $( let _ = &$arg; )*
        }
    }};
}
