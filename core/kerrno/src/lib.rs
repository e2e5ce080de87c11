// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Kernel error codes.
//!
//! `KError` is the error currency of the workspace: every fallible kernel
//! operation returns [`KResult`]. At the syscall boundary errors become small
//! negative integers (`-errno`) via [`KError::errno`] / [`into_retval`].

#![cfg_attr(not(feature = "std"), no_std)]

use core::fmt;

/// Result type used throughout the kernel crates.
pub type KResult<T = ()> = Result<T, KError>;

/// Kernel error kinds, each mapping to one Linux errno value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum KError {
    /// EPERM: operation not permitted.
    OperationNotPermitted,
    /// ENOENT: no such entry.
    NotFound,
    /// EBADF: fd not present in the fd table.
    BadFileDescriptor,
    /// EAGAIN: resource temporarily unavailable.
    WouldBlock,
    /// ENOMEM: allocation failure.
    OutOfMemory,
    /// EFAULT: bad user-space address.
    BadAddress,
    /// EEXIST: entry already present.
    AlreadyExists,
    /// EINVAL: malformed flags, op, or timeout.
    InvalidInput,
    /// EPIPE: peer end has gone away.
    BrokenPipe,
    /// ENOSYS: functionality not implemented.
    Unsupported,
}

impl KError {
    /// The positive errno value for this error.
    pub const fn errno(self) -> i32 {
        match self {
            Self::OperationNotPermitted => 1,
            Self::NotFound => 2,
            Self::BadFileDescriptor => 9,
            Self::WouldBlock => 11,
            Self::OutOfMemory => 12,
            Self::BadAddress => 14,
            Self::AlreadyExists => 17,
            Self::InvalidInput => 22,
            Self::BrokenPipe => 32,
            Self::Unsupported => 38,
        }
    }

    /// A short human-readable description, errno style.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OperationNotPermitted => "Operation not permitted",
            Self::NotFound => "No such file or directory",
            Self::BadFileDescriptor => "Bad file descriptor",
            Self::WouldBlock => "Resource temporarily unavailable",
            Self::OutOfMemory => "Out of memory",
            Self::BadAddress => "Bad address",
            Self::AlreadyExists => "File exists",
            Self::InvalidInput => "Invalid argument",
            Self::BrokenPipe => "Broken pipe",
            Self::Unsupported => "Function not implemented",
        }
    }
}

impl fmt::Display for KError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collapse a syscall result into the raw return convention: the value on
/// success, `-errno` on failure.
pub fn into_retval(res: KResult<isize>) -> isize {
    match res {
        Ok(v) => v,
        Err(e) => -(e.errno() as isize),
    }
}

#[cfg(test)]
mod tests {
    use super::{into_retval, KError};

    #[test]
    fn test_errno_values() {
        assert_eq!(KError::BadFileDescriptor.errno(), 9);
        assert_eq!(KError::InvalidInput.errno(), 22);
        assert_eq!(KError::AlreadyExists.errno(), 17);
        assert_eq!(KError::NotFound.errno(), 2);
        assert_eq!(KError::Unsupported.errno(), 38);
    }

    #[test]
    fn test_retval_convention() {
        assert_eq!(into_retval(Ok(7)), 7);
        assert_eq!(into_retval(Err(KError::BadAddress)), -14);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            std::format!("{}", KError::InvalidInput),
            "Invalid argument"
        );
    }
}
