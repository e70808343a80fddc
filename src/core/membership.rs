//! Pending membership changes shared between callers and the watch loop.

use crate::error::{Result, WatchError};
use crate::notify::WatchedFile;
use crate::sources::FileKind;
use std::collections::{HashMap, HashSet};
use std::mem;
use std::path::{Path, PathBuf};

/// Changes requested by callers, not yet applied by the watch loop.
///
/// Operations on one path follow last-write-wins: a registration cancels a
/// queued removal of the same path and vice versa. `registered` tracks the
/// kind every known path was registered with, active or pending.
#[derive(Debug, Default)]
pub(crate) struct PendingMembership {
    registered: HashMap<PathBuf, FileKind>,
    add: HashMap<PathBuf, WatchedFile>,
    remove: HashSet<PathBuf>,
}

/// One drained batch of changes.
#[derive(Debug, Default)]
pub(crate) struct MembershipChanges {
    pub(crate) add: HashMap<PathBuf, WatchedFile>,
    pub(crate) remove: HashSet<PathBuf>,
}

impl PendingMembership {
    /// Queue `file` for activation, replacing any earlier pending definition.
    pub(crate) fn register(&mut self, file: WatchedFile) -> Result<()> {
        if let Some(registered) = self.registered.get(file.path()) {
            if *registered != file.kind() {
                return Err(WatchError::KindConflict {
                    path: file.path().to_path_buf(),
                    registered: *registered,
                    requested: file.kind(),
                });
            }
        }

        let path = file.path().to_path_buf();
        self.remove.remove(&path);
        self.registered.insert(path.clone(), file.kind());
        self.add.insert(path, file);
        Ok(())
    }

    /// Queue `path` for removal. Returns `false` if it was never registered.
    pub(crate) fn unregister(&mut self, path: &Path) -> bool {
        if self.registered.remove(path).is_none() {
            return false;
        }
        self.add.remove(path);
        self.remove.insert(path.to_path_buf());
        true
    }

    pub(crate) fn is_settled(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }

    /// Take every queued change, leaving both queues empty.
    pub(crate) fn drain(&mut self) -> MembershipChanges {
        MembershipChanges {
            add: mem::take(&mut self.add),
            remove: mem::take(&mut self.remove),
        }
    }

    pub(crate) fn registered_len(&self) -> usize {
        self.registered.len()
    }

    pub(crate) fn is_registered(&self, path: &Path) -> bool {
        self.registered.contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    fn file(path: &str, secs: u64) -> WatchedFile {
        WatchedFile::new(path, FileKind::Ini, Duration::from_secs(secs)).unwrap()
    }

    #[test]
    fn test_reregister_replaces_pending_definition() {
        let mut pending = PendingMembership::default();
        pending.register(file("a.ini", 1)).unwrap();
        pending.register(file("a.ini", 5)).unwrap();

        let changes = pending.drain();
        assert_eq!(changes.add.len(), 1);
        assert_eq!(changes.add[Path::new("a.ini")].interval(), Duration::from_secs(5));
        assert!(pending.is_settled());
    }

    #[test]
    fn test_kind_conflict_rejected() {
        let mut pending = PendingMembership::default();
        pending.register(file("a.ini", 1)).unwrap();

        let other = WatchedFile::new("a.ini", FileKind::Json, Duration::from_secs(1)).unwrap();
        assert!(matches!(
            pending.register(other),
            Err(WatchError::KindConflict { .. })
        ));
    }

    #[test]
    fn test_unregister_unknown_is_noop() {
        let mut pending = PendingMembership::default();
        assert!(!pending.unregister(Path::new("missing.ini")));
        assert!(pending.is_settled());
    }

    #[test]
    fn test_unregister_cancels_pending_add() {
        let mut pending = PendingMembership::default();
        pending.register(file("a.ini", 1)).unwrap();
        assert!(pending.unregister(Path::new("a.ini")));

        let changes = pending.drain();
        assert!(changes.add.is_empty());
        assert!(changes.remove.contains(Path::new("a.ini")));
        assert!(!pending.is_registered(Path::new("a.ini")));
    }

    #[test]
    fn test_kind_can_change_after_unregister() {
        let mut pending = PendingMembership::default();
        pending.register(file("a.ini", 1)).unwrap();
        pending.unregister(Path::new("a.ini"));

        let json = WatchedFile::new("a.ini", FileKind::Json, Duration::from_secs(1)).unwrap();
        assert!(pending.register(json).is_ok());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Register(u8),
        Unregister(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..4).prop_map(Op::Register),
            (0u8..4).prop_map(Op::Unregister),
        ]
    }

    proptest! {
        #[test]
        fn prop_last_operation_per_path_wins(ops in proptest::collection::vec(op(), 0..32)) {
            let mut pending = PendingMembership::default();
            let mut last: HashMap<PathBuf, bool> = HashMap::new();

            for op in &ops {
                match op {
                    Op::Register(n) => {
                        let path = format!("f{n}.ini");
                        pending.register(file(&path, 1)).unwrap();
                        last.insert(PathBuf::from(path), true);
                    }
                    Op::Unregister(n) => {
                        let path = PathBuf::from(format!("f{n}.ini"));
                        if pending.unregister(&path) {
                            last.insert(path, false);
                        }
                    }
                }
            }

            let expected_registered = last.values().filter(|r| **r).count();
            prop_assert_eq!(pending.registered_len(), expected_registered);

            let changes = pending.drain();
            for (path, registered) in &last {
                prop_assert_eq!(changes.add.contains_key(path), *registered);
                prop_assert_eq!(changes.remove.contains(path), !*registered);
                prop_assert!(!(changes.add.contains_key(path) && changes.remove.contains(path)));
            }
        }
    }
}
