/// Sequential renaming of the files in a folder
///
/// Every regular file gets `<prefix>_<index>.<extension>`, indices
/// starting at 0 in file name order.

use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::cleanup::batch::list_files;
use crate::error::{Error, Result};

/// Marker for the intermediate names used while renaming
const TEMP_PREFIX: &str = ".screw-prep-rename-";

/// A single planned rename (file names only, relative to the folder)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameEntry {
    pub from: OsString,
    pub to: OsString,
}

impl RenameEntry {
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }
}

/// Ordered rename plan for one folder
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenamePlan {
    pub entries: Vec<RenameEntry>,
}

impl RenamePlan {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn validate_component(kind: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::InvalidName(format!("{} must not be empty", kind)));
    }
    if value.contains(['/', '\\']) || value == "." || value == ".." {
        return Err(Error::InvalidName(format!("{} {:?} is not a plain name", kind, value)));
    }
    Ok(())
}

/// Build the rename plan for `folder`
pub fn plan_renames(folder: &Path, prefix: &str, extension: &str) -> Result<RenamePlan> {
    validate_component("prefix", prefix)?;
    let extension = extension.trim_start_matches('.');
    validate_component("extension", extension)?;

    let entries = list_files(folder)?
        .into_iter()
        .filter_map(|path| path.file_name().map(|name| name.to_os_string()))
        .filter(|name| {
            let stale = is_temp_name(name);
            if stale {
                tracing::warn!(
                    "⚠️  Leaving {} alone (left over from an interrupted rename)",
                    name.to_string_lossy()
                );
            }
            !stale
        })
        .enumerate()
        .map(|(index, from)| RenameEntry {
            from,
            to: OsString::from(format!("{}_{}.{}", prefix, index, extension)),
        })
        .collect();

    Ok(RenamePlan { entries })
}

/// True for names used while staging a rename
fn is_temp_name(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with(TEMP_PREFIX)
}

/// Nothing at all (file, directory or dangling link) lives at `path`
fn is_free(path: &Path) -> bool {
    matches!(fs::symlink_metadata(path), Err(e) if e.kind() == ErrorKind::NotFound)
}

/// A file moved out of the way during staging
struct Staged {
    original: PathBuf,
    temp: PathBuf,
    target: PathBuf,
}

/// Put every staged file back under its original name.
/// `completed` staged files already reached their target and are moved back first.
fn roll_back(staged: &[Staged], completed: usize) {
    for file in staged[..completed].iter().rev() {
        if let Err(e) = fs::rename(&file.target, &file.temp) {
            tracing::error!("❌ Could not undo {}: {}", file.target.display(), e);
        }
    }
    for file in staged.iter().rev() {
        if !file.temp.exists() {
            continue;
        }
        match fs::rename(&file.temp, &file.original) {
            Ok(()) => tracing::debug!("↩️  Restored {}", file.original.display()),
            Err(e) => tracing::error!(
                "❌ {} is stranded at {}: {}",
                file.original.display(),
                file.temp.display(),
                e
            ),
        }
    }
}

/// Execute `plan` inside `folder`, returning how many files moved.
///
/// Files are first moved to free temporary names, then to their targets, so
/// a target that is another file's current name is never overwritten. On
/// any error every file is moved back to where it started.
pub fn apply_renames(folder: &Path, plan: &RenamePlan) -> Result<usize> {
    let pending: Vec<&RenameEntry> = plan.entries.iter().filter(|e| !e.is_noop()).collect();

    // A target must not clobber a file that is not part of the plan
    let planned: HashSet<&OsString> = plan.entries.iter().map(|e| &e.from).collect();
    for entry in &pending {
        let target = folder.join(&entry.to);
        if !is_free(&target) && !planned.contains(&entry.to) {
            return Err(Error::InvalidName(format!(
                "target {} already exists and is not being renamed",
                target.display()
            )));
        }
    }

    let mut staged: Vec<Staged> = Vec::with_capacity(pending.len());
    let mut counter = 0usize;
    for entry in &pending {
        let original = folder.join(&entry.from);
        let temp = loop {
            let candidate = folder.join(format!("{}{}", TEMP_PREFIX, counter));
            counter += 1;
            if is_free(&candidate) {
                break candidate;
            }
        };
        if let Err(e) = fs::rename(&original, &temp) {
            roll_back(&staged, 0);
            return Err(Error::io(original, e));
        }
        staged.push(Staged {
            original,
            temp,
            target: folder.join(&entry.to),
        });
    }

    for (done, file) in staged.iter().enumerate() {
        let moved = if is_free(&file.target) {
            fs::rename(&file.temp, &file.target)
        } else {
            Err(std::io::Error::new(
                ErrorKind::AlreadyExists,
                format!("{} appeared during rename", file.target.display()),
            ))
        };
        if let Err(e) = moved {
            roll_back(&staged, done);
            return Err(Error::io(&file.target, e));
        }
        tracing::debug!("📝 {}", file.target.display());
    }

    tracing::info!(
        "✅ Renamed {} files in {} ({} already in place)",
        staged.len(),
        folder.display(),
        plan.len() - staged.len()
    );

    Ok(staged.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(folder: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(folder)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_plan_is_sequential_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["c.png", "a.jpg", "b.jpeg"] {
            fs::write(dir.path().join(name), name).unwrap();
        }
        fs::create_dir(dir.path().join("subdir")).unwrap();

        let plan = plan_renames(dir.path(), "screw", "jpeg").unwrap();

        let pairs: Vec<(String, String)> = plan
            .entries
            .iter()
            .map(|e| (e.from.to_string_lossy().into(), e.to.to_string_lossy().into()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("a.jpg".into(), "screw_0.jpeg".into()),
                ("b.jpeg".into(), "screw_1.jpeg".into()),
                ("c.png".into(), "screw_2.jpeg".into()),
            ]
        );
    }

    #[test]
    fn test_apply_renames_every_file_once() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["c.png", "a.jpg", "b.jpeg"] {
            fs::write(dir.path().join(name), name).unwrap();
        }

        let plan = plan_renames(dir.path(), "screw", ".jpeg").unwrap();
        let moved = apply_renames(dir.path(), &plan).unwrap();

        assert_eq!(moved, 3);
        assert_eq!(names(dir.path()), vec!["screw_0.jpeg", "screw_1.jpeg", "screw_2.jpeg"]);
        assert_eq!(fs::read_to_string(dir.path().join("screw_0.jpeg")).unwrap(), "a.jpg");
        assert_eq!(fs::read_to_string(dir.path().join("screw_2.jpeg")).unwrap(), "c.png");
    }

    #[test]
    fn test_rerun_does_not_clobber() {
        let dir = tempfile::tempdir().unwrap();
        // "a.png" sorts before the already-renamed files and wants screw_0
        for name in ["screw_0.jpeg", "screw_1.jpeg", "a.png"] {
            fs::write(dir.path().join(name), name).unwrap();
        }

        let plan = plan_renames(dir.path(), "screw", "jpeg").unwrap();
        apply_renames(dir.path(), &plan).unwrap();

        assert_eq!(names(dir.path()), vec!["screw_0.jpeg", "screw_1.jpeg", "screw_2.jpeg"]);
        let mut contents: Vec<String> = names(dir.path())
            .iter()
            .map(|n| fs::read_to_string(dir.path().join(n)).unwrap())
            .collect();
        contents.sort();
        assert_eq!(contents, vec!["a.png", "screw_0.jpeg", "screw_1.jpeg"]);
    }

    #[test]
    fn test_already_renamed_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["screw_0.jpeg", "screw_1.jpeg"] {
            fs::write(dir.path().join(name), name).unwrap();
        }

        let plan = plan_renames(dir.path(), "screw", "jpeg").unwrap();
        assert!(plan.entries.iter().all(RenameEntry::is_noop));
        assert_eq!(apply_renames(dir.path(), &plan).unwrap(), 0);
    }

    #[test]
    fn test_empty_folder_and_bad_names() {
        let dir = tempfile::tempdir().unwrap();
        assert!(plan_renames(dir.path(), "screw", "jpeg").unwrap().is_empty());
        assert!(matches!(plan_renames(dir.path(), "", "jpeg"), Err(Error::InvalidName(_))));
        assert!(matches!(plan_renames(dir.path(), "a/b", "jpeg"), Err(Error::InvalidName(_))));
        assert!(matches!(plan_renames(dir.path(), "screw", "."), Err(Error::InvalidName(_))));
        assert!(matches!(
            plan_renames(&dir.path().join("missing"), "screw", "jpeg"),
            Err(Error::FolderNotFound(_))
        ));
    }

    #[test]
    fn test_staging_never_reuses_taken_names() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".DS_Store"), "ds").unwrap();
        fs::write(dir.path().join(".screw-prep-rename-0"), "photo").unwrap();

        let plan = plan_renames(dir.path(), "screw", "jpeg").unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(apply_renames(dir.path(), &plan).unwrap(), 1);

        assert_eq!(names(dir.path()), vec![".screw-prep-rename-0", "screw_0.jpeg"]);
        assert_eq!(fs::read_to_string(dir.path().join("screw_0.jpeg")).unwrap(), "ds");
        assert_eq!(
            fs::read_to_string(dir.path().join(".screw-prep-rename-0")).unwrap(),
            "photo"
        );
    }

    #[test]
    fn test_failed_move_restores_every_file() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.png", "b.png"] {
            fs::write(dir.path().join(name), name).unwrap();
        }
        let plan = RenamePlan {
            entries: vec![
                RenameEntry { from: "a.png".into(), to: "screw_0.jpeg".into() },
                RenameEntry { from: "b.png".into(), to: "missing/screw_1.jpeg".into() },
            ],
        };

        let result = apply_renames(dir.path(), &plan);

        assert!(matches!(result, Err(Error::Io { .. })));
        assert_eq!(names(dir.path()), vec!["a.png", "b.png"]);
        assert_eq!(fs::read_to_string(dir.path().join("a.png")).unwrap(), "a.png");
        assert_eq!(fs::read_to_string(dir.path().join("b.png")).unwrap(), "b.png");
    }

    #[test]
    fn test_missing_source_restores_staged_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.png"), "a.png").unwrap();
        let plan = RenamePlan {
            entries: vec![
                RenameEntry { from: "a.png".into(), to: "screw_0.jpeg".into() },
                RenameEntry { from: "gone.png".into(), to: "screw_1.jpeg".into() },
            ],
        };

        assert!(matches!(apply_renames(dir.path(), &plan), Err(Error::Io { .. })));
        assert_eq!(names(dir.path()), vec!["a.png"]);
    }
}
