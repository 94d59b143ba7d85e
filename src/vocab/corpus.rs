use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::Result;
use fnv::FnvHashMap;

use crate::conll::{read_conll, ConllReader, Sentence};
use crate::vocab::{CountedType, VocabBuilder, Word};

/// Vocabularies of a dependency corpus.
///
/// Word forms are counted in their normalized form. Only tokens are
/// counted, raw lines such as comments and multi-word tokens are
/// skipped. The artificial root is a token and is counted as well.
#[derive(Clone, Debug)]
pub struct CorpusVocab {
    words: Vec<Word>,
    word_indices: FnvHashMap<String, usize>,
    pos: Vec<CountedType<String>>,
    relations: Vec<CountedType<String>>,
}

impl CorpusVocab {
    /// Count the vocabularies of a stream of sentences.
    pub fn from_sentences<I>(sentences: I) -> Result<Self>
    where
        I: IntoIterator<Item = Result<Sentence>>,
    {
        let mut words: VocabBuilder<String> = VocabBuilder::new();
        let mut pos: VocabBuilder<String> = VocabBuilder::new();
        let mut relations: VocabBuilder<String> = VocabBuilder::new();

        for sentence in sentences {
            for token in sentence?.iter().filter_map(|line| line.token()) {
                words.count(token.norm.as_str());
                pos.count(token.pos.as_str());
                relations.count(token.relation.as_str());
            }
        }

        let (words, word_indices) = words.into_parts();

        Ok(CorpusVocab {
            words,
            word_indices,
            pos: pos.into_parts().0,
            relations: relations.into_parts().0,
        })
    }

    /// Count the vocabularies of a corpus that is read from `read`.
    pub fn from_read<R>(read: R) -> Result<Self>
    where
        R: Read,
    {
        Self::from_sentences(ConllReader::new(BufReader::new(read)))
    }

    /// Get the normalized word forms with their counts, in first-seen order.
    pub fn words(&self) -> &[Word] {
        &self.words
    }

    /// Get the count of a normalized word form.
    pub fn word_count(&self, norm: &str) -> Option<usize> {
        self.word_idx(norm).map(|idx| self.words[idx].count())
    }

    /// Get the index of a normalized word form.
    pub fn word_idx(&self, norm: &str) -> Option<usize> {
        self.word_indices.get(norm).cloned()
    }

    /// Get the mapping from normalized word forms to indices.
    pub fn word_indices(&self) -> &FnvHashMap<String, usize> {
        &self.word_indices
    }

    /// Get the distinct part-of-speech tags, in first-seen order.
    pub fn pos(&self) -> Vec<&str> {
        self.pos.iter().map(|tag| tag.word()).collect()
    }

    /// Get the part-of-speech tags with their counts.
    pub fn pos_counts(&self) -> &[CountedType<String>] {
        &self.pos
    }

    /// Get the distinct dependency relations, in first-seen order.
    pub fn relations(&self) -> Vec<&str> {
        self.relations.iter().map(|rel| rel.word()).collect()
    }

    /// Get the dependency relations with their counts.
    pub fn relation_counts(&self) -> &[CountedType<String>] {
        &self.relations
    }
}

/// Build the vocabularies of the corpus at `path`.
pub fn vocab(path: impl AsRef<Path>) -> Result<CorpusVocab> {
    CorpusVocab::from_sentences(read_conll(path)?)
}
