use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

/// Maps absolute file paths to the lock guarding them.
///
/// Entries live for the whole process; a path always resolves to the same
/// lock no matter how many sinks target it.
#[derive(Debug, Default)]
pub struct FileLockRegistry {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

static GLOBAL: LazyLock<Arc<FileLockRegistry>> =
    LazyLock::new(|| Arc::new(FileLockRegistry::default()));

impl FileLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global() -> Arc<FileLockRegistry> {
        Arc::clone(&GLOBAL)
    }

    /// `path` is expected to be absolute already.
    pub fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(path.to_path_buf()).or_default())
    }

    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_path_same_lock() {
        let registry = FileLockRegistry::new();
        let a = registry.lock_for(Path::new("/tmp/a.log"));
        let b = registry.lock_for(Path::new("/tmp/a.log"));
        let c = registry.lock_for(Path::new("/tmp/c.log"));

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(registry.len(), 2);
    }
}
