//! Dense indices for class, teacher and subject identifiers.
//!
//! Identifiers are interned in sorted order, so comparing two indices gives
//! the same answer as comparing the identifiers. Every engine tie-break
//! relies on this.

use rustc_hash::FxHashMap;

pub type Idx = u32;

pub type ClassIdx = Idx;
pub type TeacherIdx = Idx;
pub type SubjectIdx = Idx;

/// Sorted identifier table with a reverse lookup.
#[derive(Debug, Clone, Default)]
pub struct IdInterner {
    index: FxHashMap<String, Idx>,
    ids: Vec<String>,
}

impl IdInterner {
    /// Intern `ids` in sorted order. Duplicates collapse to one index.
    pub fn sorted<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        let mut sorted: Vec<&str> = ids.into_iter().collect();
        sorted.sort_unstable();
        sorted.dedup();

        let index = sorted
            .iter()
            .enumerate()
            .map(|(i, id)| (id.to_string(), i as Idx))
            .collect();
        Self {
            index,
            ids: sorted.into_iter().map(str::to_string).collect(),
        }
    }

    #[inline]
    pub fn get(&self, id: &str) -> Option<Idx> {
        self.index.get(id).copied()
    }

    /// Identifier behind `idx`; `"?"` if the index did not come from here.
    #[inline]
    pub fn name(&self, idx: Idx) -> &str {
        self.ids.get(idx as usize).map_or("?", String::as_str)
    }

    /// `(index, identifier)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (Idx, &str)> {
        self.ids
            .iter()
            .enumerate()
            .map(|(i, s)| (i as Idx, s.as_str()))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
