mod corpus;
pub use corpus::{vocab, CorpusVocab};

use std::borrow::Borrow;
use std::hash::Hash;

use fnv::FnvHashMap;
use serde::Serialize;

pub type Word = CountedType<String>;

#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize)]
pub struct CountedType<T> {
    count: usize,
    label: T,
}

impl<T> CountedType<T> {
    /// Construct a new type.
    pub fn new(label: T, count: usize) -> Self {
        CountedType { label, count }
    }
    pub fn count(&self) -> usize {
        self.count
    }
    pub fn label(&self) -> &T {
        &self.label
    }
}

impl CountedType<String> {
    /// The string representation of the word.
    pub fn word(&self) -> &str {
        &self.label
    }
}

/// Builder struct to count types.
///
/// Items are added to the vocabulary and counted using the `count`
/// method. Types are kept in the order in which they were first seen, the
/// index of a type is its position in that order.
#[derive(Clone, Debug)]
pub struct VocabBuilder<T> {
    types: Vec<CountedType<T>>,
    index: FnvHashMap<T, usize>,
    n_items: usize,
}

impl<T> Default for VocabBuilder<T>
where
    T: Hash + Eq,
{
    fn default() -> Self {
        VocabBuilder {
            types: Vec::new(),
            index: FnvHashMap::default(),
            n_items: 0,
        }
    }
}

impl<T> VocabBuilder<T>
where
    T: Clone + Hash + Eq,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count<S>(&mut self, item: S)
    where
        S: Into<T>,
    {
        self.n_items += 1;

        let item = item.into();
        match self.index.get(&item) {
            Some(&idx) => self.types[idx].count += 1,
            None => {
                self.index.insert(item.clone(), self.types.len());
                self.types.push(CountedType::new(item, 1));
            }
        }
    }

    /// Get the index of a type, `None` if it was not counted.
    pub fn idx<Q>(&self, key: &Q) -> Option<usize>
    where
        T: Borrow<Q>,
        Q: Hash + ?Sized + Eq,
    {
        self.index.get(key).cloned()
    }

    /// Get the number of distinct types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Get the number of counted items, including duplicates.
    pub fn n_items(&self) -> usize {
        self.n_items
    }

    /// Get all types in first-seen order.
    pub fn types(&self) -> &[CountedType<T>] {
        &self.types
    }

    /// Destruct the builder into the types and the type index.
    pub fn into_parts(self) -> (Vec<CountedType<T>>, FnvHashMap<T, usize>) {
        (self.types, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::{CountedType, VocabBuilder};

    #[test]
    pub fn types_are_in_first_seen_order() {
        let mut builder: VocabBuilder<&str> = VocabBuilder::new();
        for item in &["d", "a", "d", "b", "a", "d", "c"] {
            builder.count(*item);
        }

        assert_eq!(
            builder.types(),
            &[
                CountedType::new("d", 3),
                CountedType::new("a", 2),
                CountedType::new("b", 1),
                CountedType::new("c", 1),
            ]
        );
        assert_eq!(builder.idx("d"), Some(0));
        assert_eq!(builder.idx("c"), Some(3));
        assert_eq!(builder.idx("e"), None);
        assert_eq!(builder.len(), 4);
        assert_eq!(builder.n_items(), 7);
    }

    #[test]
    pub fn indices_are_unique() {
        let mut builder: VocabBuilder<String> = VocabBuilder::new();
        for item in "the cat saw the other cat".split_whitespace() {
            builder.count(item);
        }

        let (types, index) = builder.into_parts();
        assert_eq!(types.len(), index.len());
        for (idx, item) in types.iter().enumerate() {
            assert_eq!(index[item.label()], idx);
        }
    }
}
