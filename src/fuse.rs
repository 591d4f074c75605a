//! FUSE boundary: kernel VFS calls in, projection calls out.
//!
//! Paths are the identity here; inodes are handed out lazily and mapped
//! both ways. Every callback bridges into the async layer with
//! `Handle::block_on` and translates errors to errnos exactly once, via
//! `Error::errno`.

use crate::app::App;
use crate::common::Error;
use crate::projection::attr::{Stat, StatKind};
use crate::projection::listing::EntryKind;
use crate::projection::Projection;
use fuser::{
    FileAttr, FileType, Filesystem, MountOption, ReplyAttr, ReplyData, ReplyDirectory, ReplyEntry,
    ReplyOpen, ReplyWrite, Request, TimeOrNow,
};
use libc::{EINVAL, EROFS};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tokio::runtime::Handle;

const TTL: Duration = Duration::from_secs(1);

const ROOT_INO: u64 = 1;

/// Lazy path↔inode assignment. Inodes are never recycled; the table only
/// grows with paths the kernel has actually asked about.
#[derive(Default)]
struct InodeTable {
    by_path: HashMap<String, u64>,
    by_ino: HashMap<u64, String>,
}

impl InodeTable {
    fn new() -> Self {
        let mut table = Self::default();
        table.by_path.insert("/".to_string(), ROOT_INO);
        table.by_ino.insert(ROOT_INO, "/".to_string());
        table
    }

    fn assign(&mut self, path: &str) -> u64 {
        match self.by_path.get(path) {
            Some(&known) => known,
            None => {
                let next = ROOT_INO + self.by_path.len() as u64;
                self.by_path.insert(path.to_string(), next);
                self.by_ino.insert(next, path.to_string());
                next
            }
        }
    }

    fn path_of(&self, ino: u64) -> Option<String> {
        self.by_ino.get(&ino).cloned()
    }
}

pub struct R4Fuse {
    app: Arc<App>,
    rt: Handle,
    inodes: Mutex<InodeTable>,
}

impl R4Fuse {
    pub fn new(app: Arc<App>, rt: Handle) -> Self {
        Self {
            app,
            rt,
            inodes: Mutex::new(InodeTable::new()),
        }
    }

    fn inode_for(&self, path: &str) -> u64 {
        self.inodes.lock().unwrap().assign(path)
    }

    fn path_for(&self, ino: u64) -> Option<String> {
        self.inodes.lock().unwrap().path_of(ino)
    }

    fn file_attr(&self, ino: u64, stat: &Stat) -> FileAttr {
        let kind = match stat.kind {
            StatKind::Directory => FileType::Directory,
            StatKind::RegularFile => FileType::RegularFile,
        };
        FileAttr {
            ino,
            size: stat.size,
            blocks: 1,
            atime: stat.atime,
            mtime: stat.mtime,
            ctime: stat.ctime,
            crtime: stat.ctime,
            kind,
            perm: stat.perm,
            nlink: 1,
            uid: unsafe { libc::geteuid() },
            gid: unsafe { libc::getegid() },
            rdev: 0,
            blksize: 512,
            flags: 0,
        }
    }
}

impl Filesystem for R4Fuse {
    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let Some(path) = self.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.rt.block_on(self.app.projection.getattr(&path)) {
            Ok(stat) => reply.attr(&TTL, &self.file_attr(ino, &stat)),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(parent_path) = self.path_for(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let name = name.to_string_lossy();
        let child_path = join_child_path(&parent_path, &name);
        match self.rt.block_on(self.app.projection.getattr(&child_path)) {
            Ok(stat) => {
                let ino = self.inode_for(&child_path);
                reply.entry(&TTL, &self.file_attr(ino, &stat), 0);
            }
            Err(e) => reply.error(e.errno()),
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
        let Some(path) = self.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let entries = match self.rt.block_on(self.app.projection.readdir(&path)) {
            Ok(entries) => entries,
            Err(e) => {
                reply.error(e.errno());
                return;
            }
        };

        // Each row carries its own 1-based cursor; the kernel resumes by
        // passing the cursor of the last row it accepted.
        let dot_rows = [
            (ino, FileType::Directory, ".".to_string()),
            (ino, FileType::Directory, "..".to_string()),
        ];
        let child_rows = entries.into_iter().map(|entry| {
            let kind = match entry.kind {
                EntryKind::Dir => FileType::Directory,
                EntryKind::File => FileType::RegularFile,
            };
            let child_ino = self.inode_for(&join_child_path(&path, &entry.name));
            (child_ino, kind, entry.name)
        });

        let resume_after = offset.max(0);
        let mut cursor = 0i64;
        for (row_ino, kind, name) in dot_rows.into_iter().chain(child_rows) {
            cursor += 1;
            if cursor <= resume_after {
                continue;
            }
            let buffer_full = reply.add(row_ino, cursor, kind, &name);
            if buffer_full {
                break;
            }
        }
        reply.ok();
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        let Some(path) = self.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        if is_write(flags) && !Projection::is_control(&path) {
            reply.error(EROFS);
            return;
        }
        reply.opened(0, 0);
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
        if offset < 0 {
            reply.error(EINVAL);
            return;
        }
        let Some(path) = self.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.rt.block_on(self.app.projection.read(&path)) {
            Ok(content) => {
                let offset = (offset as usize).min(content.len());
                let end = (offset + size as usize).min(content.len());
                reply.data(&content[offset..end]);
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    /// The control surface: writing a slug to the control file enqueues
    /// it; every other write target is read-only.
    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        _offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let Some(path) = self.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        if !Projection::is_control(&path) {
            reply.error(EROFS);
            return;
        }
        let slug = String::from_utf8_lossy(data).trim().to_string();
        if !slug.is_empty() {
            self.app.enqueue(&slug);
        }
        reply.written(data.len() as u32);
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let Some(path) = self.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        // Shell redirection truncates the control file before writing; let
        // that through and refuse every other mutation.
        if Projection::is_control(&path) && size.is_some() {
            match self.rt.block_on(self.app.projection.getattr(&path)) {
                Ok(stat) => reply.attr(&TTL, &self.file_attr(ino, &stat)),
                Err(e) => reply.error(e.errno()),
            }
            return;
        }
        reply.error(EROFS);
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        _parent: u64,
        _name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        reply.error(EROFS);
    }

    fn mknod(
        &mut self,
        _req: &Request<'_>,
        _parent: u64,
        _name: &OsStr,
        _mode: u32,
        _umask: u32,
        _rdev: u32,
        reply: ReplyEntry,
    ) {
        reply.error(EROFS);
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        _parent: u64,
        _name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: fuser::ReplyCreate,
    ) {
        reply.error(EROFS);
    }

    fn unlink(&mut self, _req: &Request<'_>, _parent: u64, _name: &OsStr, reply: fuser::ReplyEmpty) {
        reply.error(EROFS);
    }

    fn rmdir(&mut self, _req: &Request<'_>, _parent: u64, _name: &OsStr, reply: fuser::ReplyEmpty) {
        reply.error(EROFS);
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        _parent: u64,
        _name: &OsStr,
        _newparent: u64,
        _newname: &OsStr,
        _flags: u32,
        reply: fuser::ReplyEmpty,
    ) {
        reply.error(EROFS);
    }

    fn symlink(
        &mut self,
        _req: &Request<'_>,
        _parent: u64,
        _link_name: &OsStr,
        _target: &Path,
        reply: ReplyEntry,
    ) {
        reply.error(EROFS);
    }

    fn flush(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _lock_owner: u64,
        reply: fuser::ReplyEmpty,
    ) {
        reply.ok();
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: fuser::ReplyEmpty,
    ) {
        reply.ok();
    }

    fn destroy(&mut self) {
        tracing::info!("filesystem destroyed, stopping downloads");
        self.rt.block_on(self.app.stop_downloads());
    }
}

/// Mount the projection and block until the filesystem is unmounted.
pub fn mount(app: Arc<App>, rt: Handle) -> crate::common::Result<()> {
    let mut options = vec![
        MountOption::FSName("radio4000".to_string()),
        MountOption::AutoUnmount,
        MountOption::DefaultPermissions,
    ];
    if app.config.settings.mount.debug {
        options.push(MountOption::CUSTOM("debug".to_string()));
    }
    let mount_point = app.config.mount_point.clone();
    let fs = R4Fuse::new(app, rt);
    fuser::mount2(fs, &mount_point, &options)
        .map_err(|e| Error::Internal(format!("mount {}: {e}", mount_point.display())))?;
    Ok(())
}

fn is_write(flags: i32) -> bool {
    flags & (libc::O_WRONLY | libc::O_RDWR) != 0
}

fn join_child_path(parent: &str, name: &str) -> String {
    let mut path = String::with_capacity(parent.len() + name.len() + 1);
    path.push_str(parent.trim_end_matches('/'));
    path.push('/');
    path.push_str(name);
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_paths_join_cleanly() {
        assert_eq!(join_child_path("/", "channels"), "/channels");
        assert_eq!(
            join_child_path("/channels/oskar", "tracks"),
            "/channels/oskar/tracks"
        );
    }

    #[test]
    fn write_flag_detection() {
        assert!(is_write(libc::O_WRONLY));
        assert!(is_write(libc::O_RDWR));
        assert!(!is_write(libc::O_RDONLY));
    }
}
