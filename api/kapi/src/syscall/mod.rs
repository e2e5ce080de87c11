//! Syscall implementations.

mod io_mpx;

pub use self::io_mpx::*;
