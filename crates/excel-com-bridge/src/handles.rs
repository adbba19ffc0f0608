//! Handle table for objects handed out to the client

use std::collections::BTreeMap;

/// Objects keyed by handle, numbered from 1 in order of creation
pub struct HandleTable<T> {
    objects: BTreeMap<u64, T>,
    next_handle: u64,
}

impl<T> HandleTable<T> {
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            next_handle: 1,
        }
    }

    pub fn insert(&mut self, object: T) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.objects.insert(handle, object);
        handle
    }

    pub fn get(&self, handle: u64) -> Option<&T> {
        self.objects.get(&handle)
    }

    pub fn remove(&mut self, handle: u64) -> Option<T> {
        self.objects.remove(&handle)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Drop every object, newest first, so children go before the parents
    /// they were obtained from. Returns how many were dropped.
    pub fn release_all(&mut self) -> usize {
        let mut released = 0;
        while let Some((_, object)) = self.objects.pop_last() {
            drop(object);
            released += 1;
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Tracked(u64, Rc<RefCell<Vec<u64>>>);

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.1.borrow_mut().push(self.0);
        }
    }

    #[test]
    fn test_handles_count_up_from_one() {
        let mut table = HandleTable::new();
        assert_eq!(table.insert("app"), 1);
        assert_eq!(table.insert("workbooks"), 2);
        assert_eq!(table.remove(1), Some("app"));
        assert_eq!(table.insert("workbook"), 3);
        assert_eq!(table.get(3), Some(&"workbook"));
        assert_eq!(table.get(1), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_release_all_goes_newest_first() {
        let dropped = Rc::new(RefCell::new(Vec::new()));
        let mut table = HandleTable::new();
        for tag in [10, 20, 30, 40, 50] {
            table.insert(Tracked(tag, Rc::clone(&dropped)));
        }
        drop(table.remove(3));
        assert_eq!(table.release_all(), 4);
        assert_eq!(*dropped.borrow(), vec![30, 50, 40, 20, 10]);
        assert_eq!(table.len(), 0);
        assert_eq!(table.release_all(), 0);
    }
}
