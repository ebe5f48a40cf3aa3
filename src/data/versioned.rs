use super::{ModelError, ModelResult};

/// A record guarded by optimistic concurrency control.
///
/// `version` starts at 1 and is advanced by exactly one on every successful
/// update.
pub trait Versioned {
    fn id(&self) -> i64;
    fn version(&self) -> i32;
    fn set_version(&mut self, version: i32);
}

/// Applies the result of a conditional write keyed by `(id, version)`.
///
/// `new_version` is what the `UPDATE ... WHERE id = ? AND version = ?
/// RETURNING version` statement produced: `None` means no row matched, which
/// for a record the caller has already read means another writer got there
/// first. Conflicts are never retried here.
pub fn guard_update<T: Versioned>(record: &mut T, new_version: Option<i32>) -> ModelResult<i32> {
    match new_version {
        Some(version) => {
            debug_assert_eq!(version, record.version() + 1);
            record.set_version(version);
            Ok(version)
        }
        None => {
            tracing::debug!(
                id = record.id(),
                stale_version = record.version(),
                "Conditional update matched no row"
            );
            Err(ModelError::EditConflict)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Doc {
        id: i64,
        version: i32,
    }

    impl Versioned for Doc {
        fn id(&self) -> i64 {
            self.id
        }
        fn version(&self) -> i32 {
            self.version
        }
        fn set_version(&mut self, version: i32) {
            self.version = version;
        }
    }

    #[test]
    fn test_matching_write_advances_version() {
        let mut doc = Doc { id: 7, version: 3 };
        assert_eq!(guard_update(&mut doc, Some(4)).unwrap(), 4);
        assert_eq!(doc.version, 4);
    }

    #[test]
    fn test_unmatched_write_is_conflict() {
        let mut doc = Doc { id: 7, version: 3 };
        assert!(matches!(guard_update(&mut doc, None), Err(ModelError::EditConflict)));
        assert_eq!(doc.version, 3);
    }
}
