use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: i64,
    pub label: String,
}

/// Shared, in-place updated roster. Lookups always read the latest contents,
/// so a refresh is visible to capture tasks that were spawned before it.
#[derive(Debug, Clone, Default)]
pub struct RosterCell {
    inner: Arc<RwLock<HashMap<i64, String>>>,
}

impl RosterCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, subjects: Vec<Subject>) {
        let fresh: HashMap<i64, String> = subjects
            .into_iter()
            .map(|subject| (subject.id, subject.label))
            .collect();
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = fresh;
    }

    pub fn label(&self, subject_id: i64) -> String {
        let guard = match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .get(&subject_id)
            .cloned()
            .unwrap_or_else(|| format!("Subject #{subject_id}"))
    }

    pub fn len(&self) -> usize {
        match self.inner.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_observe_refreshes() {
        let cell = RosterCell::new();
        let reader = cell.clone();
        assert_eq!(reader.label(4), "Subject #4");

        cell.replace(vec![Subject {
            id: 4,
            label: "Amina Benali".into(),
        }]);
        assert_eq!(reader.label(4), "Amina Benali");

        cell.replace(Vec::new());
        assert_eq!(reader.label(4), "Subject #4");
        assert_eq!(reader.len(), 0);
    }
}
