//! Minimal leveled diagnostics, written directly to stderr.
//!
//! The engine has no concurrency and no query surface beyond pattern match,
//! so pulling in a full logging facade buys nothing over a few macros. Used
//! by the allocator (truncation), the class catalog (dedup hits, coherency
//! repairs) and the database facade (Default-mode recovery).

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if cfg!(debug_assertions) {
            eprintln!("[debug] {}", format!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        eprintln!("[info] {}", format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        eprintln!("[warn] {}", format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        eprintln!("[error] {}", format!($($arg)*));
    };
}
