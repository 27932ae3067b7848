//! Parsing helpers for `/proc/self/mountinfo` (and similar mountinfo files).

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    pub mount_point: PathBuf,
    pub fstype: String,
    pub source: String,
}

pub fn parse_mountinfo(content: &str) -> Vec<MountInfo> {
    content
        .lines()
        .filter_map(|line| {
            // mountinfo format:
            //   <pre fields...> <mount point> <...> - <fstype> <source> <superopts>
            let (pre, post) = line.split_once(" - ")?;
            let pre_fields: Vec<&str> = pre.split_whitespace().collect();
            if pre_fields.len() < 5 {
                return None;
            }
            let mut post_fields = post.split_whitespace();
            let fstype = post_fields.next().unwrap_or_default().to_string();
            let source = post_fields.next().unwrap_or_default().to_string();
            Some(MountInfo {
                mount_point: PathBuf::from(unescape_mount_path(pre_fields[4])),
                fstype,
                source,
            })
        })
        .collect()
}

/// Find the most recent mount stacked on `path`, if any.
pub fn find_mount<'a>(path: &Path, entries: &'a [MountInfo]) -> Option<&'a MountInfo> {
    let target = normalize_path(path);
    entries
        .iter()
        .rev()
        .find(|entry| normalize_path(&entry.mount_point) == target)
}

pub fn unescape_mount_path(raw: &str) -> String {
    raw.replace("\\040", " ")
        .replace("\\011", "\t")
        .replace("\\012", "\n")
        .replace("\\134", "\\")
}

fn normalize_path(path: &Path) -> String {
    let s = path.to_string_lossy();
    if s.len() > 1 && s.ends_with('/') {
        s.trim_end_matches('/').to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "36 28 0:31 / / rw,relatime - ext4 /dev/xvda1 rw\n\
                          37 28 202:80 / /var/lib/blockvol/mounts/vol-1 rw,relatime - ext4 /dev/xvdf rw\n";

    #[test]
    fn parse_mountinfo_extracts_fields() {
        let entries = parse_mountinfo(SAMPLE);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].mount_point, PathBuf::from("/"));
        assert_eq!(
            entries[1].mount_point,
            PathBuf::from("/var/lib/blockvol/mounts/vol-1")
        );
        assert_eq!(entries[1].fstype, "ext4");
        assert_eq!(entries[1].source, "/dev/xvdf");
    }

    #[test]
    fn find_mount_matches_paths() {
        let entries = parse_mountinfo(SAMPLE);
        assert!(find_mount(Path::new("/"), &entries).is_some());
        assert!(find_mount(Path::new("/var/lib/blockvol/mounts/vol-1/"), &entries).is_some());
        assert!(find_mount(Path::new("/var/lib/blockvol/mounts"), &entries).is_none());
    }

    #[test]
    fn find_mount_prefers_topmost_entry() {
        let mi = "36 28 0:31 / /mnt rw - tmpfs tmpfs rw\n\
                  40 36 202:80 / /mnt rw - xfs /dev/xvdg rw\n";
        let entries = parse_mountinfo(mi);
        let top = find_mount(Path::new("/mnt"), &entries).unwrap();
        assert_eq!(top.source, "/dev/xvdg");
    }

    #[test]
    fn mountinfo_unescapes_paths() {
        let sample = "36 28 0:31 / /mnt/data\\040disk rw,relatime - ext4 /dev/sda3 rw\n";
        let entries = parse_mountinfo(sample);
        assert_eq!(entries[0].mount_point, PathBuf::from("/mnt/data disk"));
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let entries = parse_mountinfo("garbage\n36 28 / - ext4\n");
        assert!(entries.is_empty());
    }
}
