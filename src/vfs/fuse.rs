//! `fuser` binding: translates kernel requests into [`VfsOperations`] calls.

use std::ffi::OsStr;
use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};

use fuser::{
    BackgroundSession, FileAttr, FileType, Filesystem, KernelConfig, MountOption, ReplyAttr,
    ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, Request,
};
use libc::c_int;
use tracing::{debug, info, trace, warn};

use crate::config::MountConfig;
use crate::error::{MailFsError, Result};
use crate::model::NAME_MAX;
use crate::vfs::{Attributes, DirEntries, NodeType, VfsOperations};

/// Block size reported for every inode.
const BLOCK_SIZE: u32 = 4096;

/// FUSE offsets 1 and 2 belong to `.` and `..`; children start after them.
const DOT_ENTRIES: i64 = 2;

/// The mailbox filesystem as seen by the kernel.
pub struct MailFs {
    ops: VfsOperations,
    ttl: Duration,
    uid: u32,
    gid: u32,
}

impl MailFs {
    pub fn new(ops: VfsOperations, ttl: Duration) -> Self {
        // SAFETY: getuid/getgid cannot fail and touch no memory.
        let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
        Self { ops, ttl, uid, gid }
    }

    fn file_attr(&self, attr: &Attributes) -> FileAttr {
        let time = UNIX_EPOCH + Duration::from_secs(attr.mtime.max(0).unsigned_abs());
        let nlink = match attr.kind {
            NodeType::Directory => 2,
            NodeType::File => 1,
        };
        FileAttr {
            ino: attr.ino,
            size: attr.size,
            blocks: attr.size.div_ceil(u64::from(BLOCK_SIZE)),
            atime: time,
            mtime: time,
            ctime: time,
            crtime: time,
            kind: file_type(attr.kind),
            perm: attr.perm,
            nlink,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: BLOCK_SIZE,
            flags: 0,
        }
    }
}

fn file_type(kind: NodeType) -> FileType {
    match kind {
        NodeType::Directory => FileType::Directory,
        NodeType::File => FileType::RegularFile,
    }
}

/// Child offset for [`VfsOperations::read_directory`] given a FUSE offset.
fn child_offset(offset: i64) -> u64 {
    u64::try_from(offset - DOT_ENTRIES).unwrap_or(0)
}

/// Entries a `readdir` reply should carry, starting at FUSE `offset`:
/// `(ino, next offset, kind, name)`.
///
/// `entries` must come from `read_directory(ino, child_offset(offset))`.
/// `.` and `..` occupy offsets 1 and 2; children follow, shifted past them.
fn listing(
    ino: u64,
    offset: i64,
    entries: DirEntries,
) -> impl Iterator<Item = (u64, i64, FileType, String)> {
    let skip = usize::try_from(offset).unwrap_or(0);
    let dots = [(ino, "."), (entries.parent(), "..")]
        .into_iter()
        .zip(1_i64..)
        .skip(skip)
        .map(|((dot_ino, dot), next)| (dot_ino, next, FileType::Directory, dot.to_string()));

    let children = entries.map(|entry| {
        let next = i64::try_from(entry.next_offset).unwrap_or(i64::MAX - DOT_ENTRIES);
        (
            entry.attr.ino,
            next + DOT_ENTRIES,
            file_type(entry.attr.kind),
            entry.name,
        )
    });
    dots.chain(children)
}

fn log_failure(op: &str, ino: u64, err: &MailFsError) {
    if err.is_expected() {
        trace!(op, inode = ino, error = %err, "Request failed");
    } else {
        warn!(op, inode = ino, error = %err, "Request failed");
    }
}

impl Filesystem for MailFs {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> std::result::Result<(), c_int> {
        let snapshot = self.ops.snapshot();
        info!(
            generation = snapshot.generation,
            inodes = snapshot.tree.len(),
            "Filesystem initialized"
        );
        Ok(())
    }

    fn destroy(&mut self) {
        info!("Filesystem destroyed");
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        // Every name in the tree is UTF-8; anything else cannot exist.
        let Some(name) = name.to_str() else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.ops.lookup(parent, name) {
            Ok(attr) => reply.entry(&self.ttl, &self.file_attr(&attr), attr.generation),
            Err(e) => {
                log_failure("lookup", parent, &e);
                reply.error(e.to_errno());
            }
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        match self.ops.get_attributes(ino) {
            Ok(attr) => reply.attr(&self.ttl, &self.file_attr(&attr)),
            Err(e) => {
                log_failure("getattr", ino, &e);
                reply.error(e.to_errno());
            }
        }
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        match self.ops.open_directory(ino) {
            Ok(fh) => reply.opened(fh, 0),
            Err(e) => {
                log_failure("opendir", ino, &e);
                reply.error(e.to_errno());
            }
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let entries = match self.ops.read_directory(ino, child_offset(offset)) {
            Ok(entries) => entries,
            Err(e) => {
                log_failure("readdir", ino, &e);
                reply.error(e.to_errno());
                return;
            }
        };

        for (child, next, kind, name) in listing(ino, offset, entries) {
            if reply.add(child, next, kind, &name) {
                break;
            }
        }
        reply.ok();
    }

    fn releasedir(&mut self, _req: &Request<'_>, ino: u64, _fh: u64, _flags: i32, reply: ReplyEmpty) {
        trace!(inode = ino, "Released directory");
        reply.ok();
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        match self.ops.open_file(ino, flags) {
            Ok(fh) => reply.opened(fh, 0),
            Err(e) => {
                log_failure("open", ino, &e);
                reply.error(e.to_errno());
            }
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let Ok(offset) = u64::try_from(offset) else {
            reply.error(libc::EINVAL);
            return;
        };
        match self.ops.read(ino, offset, size) {
            Ok(data) => reply.data(&data),
            Err(e) => {
                log_failure("read", ino, &e);
                reply.error(e.to_errno());
            }
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        trace!(inode = ino, "Released file");
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        let snapshot = self.ops.snapshot();
        let bytes: u64 = snapshot
            .tree
            .iter()
            .filter_map(|node| node.meta())
            .map(|meta| meta.size())
            .sum();
        reply.statfs(
            bytes.div_ceil(u64::from(BLOCK_SIZE)),
            0,
            0,
            snapshot.tree.len() as u64,
            0,
            BLOCK_SIZE,
            NAME_MAX as u32,
            BLOCK_SIZE,
        );
    }
}

/// Mount options for a read-only mailbox filesystem.
pub fn mount_options(config: &MountConfig) -> Vec<MountOption> {
    let mut options = vec![
        MountOption::RO,
        MountOption::FSName("mailfs".to_string()),
        MountOption::Subtype("mailfs".to_string()),
        MountOption::DefaultPermissions,
    ];
    if config.allow_other {
        options.push(MountOption::AllowOther);
        options.push(MountOption::AutoUnmount);
    }
    options
}

/// Mount `ops` at `mountpoint` on a background thread.
///
/// The filesystem stays mounted until the returned session is dropped.
pub fn mount(ops: VfsOperations, mountpoint: &Path, config: &MountConfig) -> Result<BackgroundSession> {
    let meta = std::fs::metadata(mountpoint).map_err(|e| MailFsError::io(mountpoint, e))?;
    if !meta.is_dir() {
        return Err(MailFsError::Config(format!(
            "mountpoint {} is not a directory",
            mountpoint.display()
        )));
    }

    let options = mount_options(config);
    debug!(mountpoint = %mountpoint.display(), ?options, "Mounting");
    let session = fuser::spawn_mount2(MailFs::new(ops, config.attr_ttl()), mountpoint, &options)
        .map_err(MailFsError::Mount)?;
    info!(mountpoint = %mountpoint.display(), "Mounted mailbox filesystem");
    Ok(session)
}
