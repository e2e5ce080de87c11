//! POSIX-facing kernel API.
//!
//! This crate hosts the file-like kernel objects (pipes, eventfds, epoll
//! instances), the fd table binding them to descriptors, and the epoll
//! syscall surface.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

#[macro_use]
extern crate log;

pub mod fdtab;
pub mod file;
pub mod syscall;
pub mod time;
