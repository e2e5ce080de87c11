//! The file-descriptor table.
//!
//! Descriptors resolve to a discriminated union of the two file worlds:
//! modern [`FileLike`] objects carrying a pollqueue, and legacy
//! [`VfsFile`]s driven through vnode callbacks. Lookups hand out a clone
//! of the stored reference; the caller drops it when done.

use alloc::{sync::Arc, vec::Vec};

use kerrno::{KError, KResult};
use kvfs::VfsFile;
use spin::Mutex;

use crate::file::FileLike;

/// A file as seen by fd-consuming syscalls.
#[derive(Clone)]
pub enum ShimFile {
    Modern(Arc<dyn FileLike>),
    Legacy(Arc<VfsFile>),
}

struct FdEntry {
    file: ShimFile,
    cloexec: bool,
}

static FD_TABLE: Mutex<Vec<Option<FdEntry>>> = Mutex::new(Vec::new());

/// Installs a file into the lowest free descriptor slot.
pub fn install(file: ShimFile, cloexec: bool) -> KResult<i32> {
    let mut table = FD_TABLE.lock();
    let entry = Some(FdEntry { file, cloexec });
    if let Some(fd) = table.iter().position(Option::is_none) {
        table[fd] = entry;
        Ok(fd as i32)
    } else {
        table.push(entry);
        Ok((table.len() - 1) as i32)
    }
}

/// Looks up a descriptor.
pub fn get(fd: i32) -> KResult<ShimFile> {
    let table = FD_TABLE.lock();
    usize::try_from(fd)
        .ok()
        .and_then(|fd| table.get(fd))
        .and_then(|slot| slot.as_ref())
        .map(|e| e.file.clone())
        .ok_or(KError::BadFileDescriptor)
}

/// Looks up a descriptor expecting a modern file.
pub fn get_file_like(fd: i32) -> KResult<Arc<dyn FileLike>> {
    match get(fd)? {
        ShimFile::Modern(f) => Ok(f),
        ShimFile::Legacy(_) => Err(KError::InvalidInput),
    }
}

/// Whether a descriptor was installed close-on-exec.
pub fn is_cloexec(fd: i32) -> KResult<bool> {
    let table = FD_TABLE.lock();
    usize::try_from(fd)
        .ok()
        .and_then(|fd| table.get(fd))
        .and_then(|slot| slot.as_ref())
        .map(|e| e.cloexec)
        .ok_or(KError::BadFileDescriptor)
}

/// Closes a descriptor.
///
/// Closing a legacy file notifies the eventpoll layer so any epoll entries
/// watching it are force-removed before the reference drops.
pub fn close(fd: i32) -> KResult {
    let entry = {
        let mut table = FD_TABLE.lock();
        usize::try_from(fd)
            .ok()
            .and_then(|fd| table.get_mut(fd))
            .and_then(|slot| slot.take())
            .ok_or(KError::BadFileDescriptor)?
    };
    if let ShimFile::Legacy(vf) = &entry.file {
        kvfs::eventpoll_notify_close(vf);
    }
    Ok(())
}
