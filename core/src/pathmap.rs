use crate::{Error, FileRecord, Result};
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};

/// Bidirectional mapping between source paths and destination identities.
///
/// Derived once per run from the collected source records. `to_dest` and
/// `from_dest` are mutual inverses over every collected path, which is what
/// lets the diff engine inverse-map destination records back to source
/// identities when classifying removals.
#[derive(Debug, Clone)]
pub enum PathMapper {
    /// Source paths are destination identities (offsite diffs against the
    /// committed snapshot, which is keyed by the same absolute paths).
    Identity,
    /// All sources share one root: strip the common directory prefix and
    /// re-root under the destination.
    CommonPrefix { prefix: PathBuf, dest: PathBuf },
    /// Sources span multiple drive roots: each root becomes a destination
    /// subdirectory, with `:` encoded as `_` to stay a valid name.
    MultiRoot { dest: PathBuf },
}

impl PathMapper {
    pub fn identity() -> Self {
        PathMapper::Identity
    }

    /// Derives the mapping for mirroring `records` under `dest`.
    pub fn for_destination(records: &[FileRecord], dest: &Path) -> Result<Self> {
        if records.is_empty() {
            return Err(Error::AmbiguousRoot(
                "no source records to derive a mapping from".to_string(),
            ));
        }

        let first_root = drive_root(&records[0].path);
        let multi_root = records
            .iter()
            .any(|r| drive_root(&r.path) != first_root);

        if multi_root {
            return Ok(PathMapper::MultiRoot {
                dest: dest.to_path_buf(),
            });
        }

        let paths: Vec<&Path> = records.iter().map(|r| r.path.as_path()).collect();
        let prefix = common_dir_prefix(&paths).ok_or_else(|| {
            Error::AmbiguousRoot(format!(
                "no common prefix among {} source paths",
                paths.len()
            ))
        })?;

        Ok(PathMapper::CommonPrefix {
            prefix,
            dest: dest.to_path_buf(),
        })
    }

    pub fn to_dest(&self, path: &Path) -> Result<PathBuf> {
        match self {
            PathMapper::Identity => Ok(path.to_path_buf()),
            PathMapper::CommonPrefix { prefix, dest } => {
                let rel = path.strip_prefix(prefix).map_err(|_| {
                    Error::AmbiguousRoot(format!(
                        "'{}' is outside the mapped prefix '{}'",
                        path.display(),
                        prefix.display()
                    ))
                })?;
                Ok(dest.join(rel))
            }
            PathMapper::MultiRoot { dest } => {
                let text = path.to_string_lossy();
                let (root, rest) = split_drive(&text);
                let rest = rest.trim_start_matches(['/', '\\']);
                Ok(dest.join(root.replace(':', "_")).join(rest))
            }
        }
    }

    pub fn from_dest(&self, path: &Path) -> Result<PathBuf> {
        match self {
            PathMapper::Identity => Ok(path.to_path_buf()),
            PathMapper::CommonPrefix { prefix, dest } => {
                let rel = path.strip_prefix(dest).map_err(|_| {
                    Error::AmbiguousRoot(format!(
                        "'{}' is outside the destination '{}'",
                        path.display(),
                        dest.display()
                    ))
                })?;
                Ok(prefix.join(rel))
            }
            PathMapper::MultiRoot { dest } => {
                let rel = path.strip_prefix(dest).map_err(|_| {
                    Error::AmbiguousRoot(format!(
                        "'{}' is outside the destination '{}'",
                        path.display(),
                        dest.display()
                    ))
                })?;

                let mut components = rel.components();
                let root = components
                    .next()
                    .map(|c| c.as_os_str().to_string_lossy().replace('_', ":"))
                    .ok_or_else(|| {
                        Error::AmbiguousRoot(format!(
                            "'{}' carries no encoded root",
                            path.display()
                        ))
                    })?;

                let rest = components.as_path();
                Ok(PathBuf::from(format!(
                    "{root}{MAIN_SEPARATOR}{}",
                    rest.display()
                )))
            }
        }
    }
}

/// Drive-style root of a path (`C:` on Windows); empty for rooted POSIX
/// paths, which always share one root.
fn drive_root(path: &Path) -> String {
    match path.components().next() {
        Some(Component::Prefix(prefix)) => prefix.as_os_str().to_string_lossy().into_owned(),
        _ => {
            let text = path.to_string_lossy();
            split_drive(&text).0.to_string()
        }
    }
}

fn split_drive(path: &str) -> (&str, &str) {
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        (&path[..2], &path[2..])
    } else {
        ("", path)
    }
}

/// Longest directory prefix shared by every path's parent.
fn common_dir_prefix(paths: &[&Path]) -> Option<PathBuf> {
    let mut iter = paths.iter();
    let mut prefix: Vec<Component> = iter.next()?.parent()?.components().collect();

    for path in iter {
        let parent: Vec<Component> = path.parent()?.components().collect();
        let shared = prefix
            .iter()
            .zip(parent.iter())
            .take_while(|(a, b)| a == b)
            .count();
        prefix.truncate(shared);
    }

    if prefix.is_empty() {
        None
    } else {
        Some(prefix.iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str) -> FileRecord {
        FileRecord {
            path: PathBuf::from(path),
            size: 0,
            mtime: 0.0,
            hash: None,
        }
    }

    #[test]
    fn common_prefix_round_trips() {
        let records = vec![
            record("/home/user/docs/a.txt"),
            record("/home/user/docs/sub/b.txt"),
            record("/home/user/docs/sub/deep/c.txt"),
        ];
        let mapper = PathMapper::for_destination(&records, Path::new("/backup")).unwrap();

        let dest = mapper.to_dest(Path::new("/home/user/docs/sub/b.txt")).unwrap();
        assert_eq!(dest, PathBuf::from("/backup/sub/b.txt"));

        for r in &records {
            let mapped = mapper.to_dest(&r.path).unwrap();
            assert_eq!(mapper.from_dest(&mapped).unwrap(), r.path);
        }
    }

    #[test]
    fn single_file_maps_under_its_parent() {
        let records = vec![record("/var/log/syslog")];
        let mapper = PathMapper::for_destination(&records, Path::new("/backup")).unwrap();

        let dest = mapper.to_dest(Path::new("/var/log/syslog")).unwrap();
        assert_eq!(dest, PathBuf::from("/backup/syslog"));
        assert_eq!(
            mapper.from_dest(&dest).unwrap(),
            PathBuf::from("/var/log/syslog")
        );
    }

    #[test]
    fn disjoint_trees_share_the_filesystem_root() {
        let records = vec![record("/alpha/a.txt"), record("/beta/b.txt")];
        let mapper = PathMapper::for_destination(&records, Path::new("/backup")).unwrap();

        let dest = mapper.to_dest(Path::new("/alpha/a.txt")).unwrap();
        assert_eq!(dest, PathBuf::from("/backup/alpha/a.txt"));
        assert_eq!(
            mapper.from_dest(&dest).unwrap(),
            PathBuf::from("/alpha/a.txt")
        );
    }

    #[test]
    fn multi_root_encodes_each_drive() {
        let records = vec![record("c:/data/a.txt"), record("d:/media/b.txt")];
        let mapper = PathMapper::for_destination(&records, Path::new("/backup")).unwrap();

        assert!(matches!(mapper, PathMapper::MultiRoot { .. }));

        let dest = mapper.to_dest(Path::new("c:/data/a.txt")).unwrap();
        assert_eq!(dest, PathBuf::from("/backup/c_/data/a.txt"));

        let back = mapper.from_dest(&dest).unwrap();
        assert_eq!(back, PathBuf::from("c:/data/a.txt"));
    }

    #[test]
    fn identity_is_its_own_inverse() {
        let mapper = PathMapper::identity();
        let path = Path::new("/any/where");

        assert_eq!(mapper.to_dest(path).unwrap(), path);
        assert_eq!(mapper.from_dest(path).unwrap(), path);
    }

    #[test]
    fn empty_record_set_is_ambiguous() {
        assert!(matches!(
            PathMapper::for_destination(&[], Path::new("/backup")),
            Err(Error::AmbiguousRoot(_))
        ));
    }

    #[test]
    fn outside_path_is_rejected() {
        let records = vec![record("/home/user/docs/a.txt")];
        let mapper = PathMapper::for_destination(&records, Path::new("/backup")).unwrap();

        assert!(mapper.to_dest(Path::new("/etc/passwd")).is_err());
        assert!(mapper.from_dest(Path::new("/elsewhere/x")).is_err());
    }
}
