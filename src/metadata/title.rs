//! Title and root resolution over stored document records

use std::collections::HashSet;

use super::RecordStore;

/// Display title of a stored document
///
/// With `recursive`, an empty title is inherited from the nearest ancestor
/// (following `part_of`) that has one. UID 0 is invalid and yields `""`.
pub fn resolve_title(store: &dyn RecordStore, uid: u64, recursive: bool) -> String {
    if uid == 0 {
        tracing::error!("Invalid UID {} for document", uid);
        return String::new();
    }

    let mut visited = HashSet::new();
    let mut current = uid;
    loop {
        visited.insert(current);
        let Some(record) = store.document_record(current) else {
            tracing::warn!("No document with UID {} found or document not accessible", current);
            return String::new();
        };

        if !recursive || !record.title.is_empty() || record.part_of == 0 {
            return record.title;
        }
        if visited.contains(&record.part_of) {
            return record.title;
        }
        current = record.part_of;
    }
}

/// UID of the topmost ancestor of `parent_id`, 0 when there is no parent
pub fn resolve_root_id(store: &dyn RecordStore, parent_id: u64) -> u64 {
    if parent_id == 0 {
        return 0;
    }

    let mut visited = HashSet::new();
    let mut current = parent_id;
    while visited.insert(current) {
        match store.document_record(current) {
            Some(record) if record.part_of != 0 && !visited.contains(&record.part_of) => {
                current = record.part_of;
            }
            _ => break,
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{DocumentRecord, InMemoryRegistry};

    fn record(uid: u64, title: &str, part_of: u64) -> DocumentRecord {
        DocumentRecord {
            uid,
            title: title.to_string(),
            part_of,
        }
    }

    fn store() -> InMemoryRegistry {
        InMemoryRegistry::new()
            .with_document(record(1, "Zeitschrift", 0))
            .with_document(record(2, "", 1))
            .with_document(record(3, "", 2))
            .with_document(record(4, "", 4))
            .with_document(record(5, "", 6))
            .with_document(record(6, "", 5))
    }

    #[test]
    fn test_title_without_recursion() {
        let store = store();
        assert_eq!(resolve_title(&store, 1, false), "Zeitschrift");
        assert_eq!(resolve_title(&store, 3, false), "");
    }

    #[test]
    fn test_title_inherited_from_ancestors() {
        assert_eq!(resolve_title(&store(), 3, true), "Zeitschrift");
    }

    #[test]
    fn test_invalid_and_unknown_uids() {
        let store = store();
        assert_eq!(resolve_title(&store, 0, true), "");
        assert_eq!(resolve_title(&store, 99, true), "");
    }

    #[test]
    fn test_cycles_terminate() {
        let store = store();
        assert_eq!(resolve_title(&store, 4, true), "");
        assert_eq!(resolve_title(&store, 5, true), "");
        assert!(matches!(resolve_root_id(&store, 5), 5 | 6));
    }

    #[test]
    fn test_root_id() {
        let store = store();
        assert_eq!(resolve_root_id(&store, 0), 0);
        assert_eq!(resolve_root_id(&store, 1), 1);
        assert_eq!(resolve_root_id(&store, 3), 1);
        // unknown parents are their own root
        assert_eq!(resolve_root_id(&store, 42), 42);
    }
}
