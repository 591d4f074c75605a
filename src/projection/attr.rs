//! Stat production: POSIX attributes for every node kind.

use crate::catalog::{Channel, Track};
use crate::common::date::{parse_date, stat_times};
use chrono::{DateTime, Utc};
use std::time::SystemTime;

pub const DIR_PERM: u16 = 0o755;
pub const FILE_PERM: u16 = 0o444;
/// The control file accepts writes.
pub const CONTROL_PERM: u16 = 0o644;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    Directory,
    RegularFile,
}

/// The attribute tuple the FUSE layer converts into a kernel `FileAttr`.
#[derive(Debug, Clone)]
pub struct Stat {
    pub kind: StatKind,
    pub perm: u16,
    pub size: u64,
    pub mtime: SystemTime,
    pub atime: SystemTime,
    pub ctime: SystemTime,
}

impl Stat {
    pub fn directory(times: (SystemTime, SystemTime, SystemTime)) -> Self {
        let (mtime, atime, ctime) = times;
        Self {
            kind: StatKind::Directory,
            perm: DIR_PERM,
            size: 0,
            mtime,
            atime,
            ctime,
        }
    }

    pub fn directory_now() -> Self {
        Self::directory(stat_times(None, None))
    }

    pub fn file(size: u64, times: (SystemTime, SystemTime, SystemTime)) -> Self {
        let (mtime, atime, ctime) = times;
        Self {
            kind: StatKind::RegularFile,
            perm: FILE_PERM,
            size,
            mtime,
            atime,
            ctime,
        }
    }

    pub fn control() -> Self {
        let mut stat = Self::file(0, stat_times(None, None));
        stat.perm = CONTROL_PERM;
        stat
    }

    pub fn is_dir(&self) -> bool {
        self.kind == StatKind::Directory
    }
}

/// Channel timestamps: `(created_at, updated_at)` parsed safely.
pub fn channel_dates(channel: &Channel) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    (
        parse_date(channel.created_at.as_deref()),
        parse_date(channel.updated_at.as_deref()),
    )
}

/// Track timestamps: `(created_at, updated_at)` parsed safely.
pub fn track_dates(track: &Track) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    (
        parse_date(track.created_at.as_deref()),
        parse_date(track.updated_at.as_deref()),
    )
}

/// Stat times for a channel-owned node.
pub fn channel_times(channel: &Channel) -> (SystemTime, SystemTime, SystemTime) {
    let (created, updated) = channel_dates(channel);
    stat_times(created, updated)
}

/// Stat times for a single track file: `mtime = created_at`,
/// `ctime = atime = updated_at`.
pub fn track_times(track: &Track) -> (SystemTime, SystemTime, SystemTime) {
    let (created, updated) = track_dates(track);
    stat_times(created, updated)
}

/// Aggregate times across a set of tracks: earliest valid `created_at`,
/// latest valid `updated_at`. Records whose date strings fail to parse are
/// skipped; when nothing parses, both slots fall back to wall clock.
pub fn aggregate_times<'a, I>(tracks: I) -> (SystemTime, SystemTime, SystemTime)
where
    I: IntoIterator<Item = &'a Track>,
{
    let mut earliest_created: Option<DateTime<Utc>> = None;
    let mut latest_updated: Option<DateTime<Utc>> = None;
    for track in tracks {
        let (created, updated) = track_dates(track);
        if let Some(created) = created {
            earliest_created = Some(match earliest_created {
                Some(current) if current <= created => current,
                _ => created,
            });
        }
        if let Some(updated) = updated {
            latest_updated = Some(match latest_updated {
                Some(current) if current >= updated => current,
                _ => updated,
            });
        }
    }
    stat_times(earliest_created, latest_updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::date::to_system_time;

    fn track(created: &str, updated: &str) -> Track {
        Track {
            created_at: Some(created.to_string()),
            updated_at: Some(updated.to_string()),
            ..Track::default()
        }
    }

    #[test]
    fn track_times_invert_mtime_and_ctime() {
        let t = track("2020-03-01T00:00:00Z", "2022-05-01T00:00:00Z");
        let (mtime, atime, ctime) = track_times(&t);
        let created = to_system_time(parse_date(Some("2020-03-01T00:00:00Z")).unwrap());
        let updated = to_system_time(parse_date(Some("2022-05-01T00:00:00Z")).unwrap());
        assert_eq!(mtime, created);
        assert_eq!(atime, updated);
        assert_eq!(ctime, updated);
    }

    #[test]
    fn aggregate_takes_earliest_created_and_latest_updated() {
        let tracks = vec![
            track("2021-01-01T00:00:00Z", "2021-06-01T00:00:00Z"),
            track("2019-01-01T00:00:00Z", "2023-01-01T00:00:00Z"),
            track("2020-01-01T00:00:00Z", "2022-01-01T00:00:00Z"),
        ];
        let (mtime, atime, _) = aggregate_times(&tracks);
        assert_eq!(
            mtime,
            to_system_time(parse_date(Some("2019-01-01T00:00:00Z")).unwrap())
        );
        assert_eq!(
            atime,
            to_system_time(parse_date(Some("2023-01-01T00:00:00Z")).unwrap())
        );
    }

    #[test]
    fn aggregate_skips_unparseable_dates() {
        let tracks = vec![
            track("", "not a date"),
            track("2020-01-01T00:00:00Z", "2021-01-01T00:00:00Z"),
        ];
        let (mtime, _, _) = aggregate_times(&tracks);
        assert_eq!(
            mtime,
            to_system_time(parse_date(Some("2020-01-01T00:00:00Z")).unwrap())
        );
    }

    #[test]
    fn aggregate_of_invalid_only_falls_back_to_now() {
        let before = SystemTime::now();
        let tracks = vec![track("", "nope")];
        let (mtime, atime, _) = aggregate_times(&tracks);
        assert!(mtime >= before);
        assert!(atime >= before);
    }

    #[test]
    fn stat_constructors_carry_the_right_bits() {
        let dir = Stat::directory_now();
        assert!(dir.is_dir());
        assert_eq!(dir.perm, 0o755);
        assert_eq!(dir.size, 0);

        let file = Stat::file(42, stat_times(None, None));
        assert_eq!(file.kind, StatKind::RegularFile);
        assert_eq!(file.perm, 0o444);
        assert_eq!(file.size, 42);

        let control = Stat::control();
        assert_eq!(control.perm, 0o644);
        assert_eq!(control.size, 0);
    }
}
