use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{bail, Context, Result};
use finalfusion::compat::text::{ReadText, ReadTextDims};
use finalfusion::compat::word2vec::ReadWord2Vec;
use finalfusion::io::ReadEmbeddings;
use finalfusion::prelude::{Embeddings, StorageWrap, VocabWrap};
use finalfusion::storage::Storage;
use finalfusion::vocab::Vocab;
use ndarray::Array2;

/// Embedding file formats.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EmbeddingFormat {
    /// finalfusion embeddings.
    FinalFusion,

    /// Text format, one embedding per line (GloVe).
    Text,

    /// Text format with a `rows dims` header line.
    TextDims,

    /// Binary word2vec format.
    Word2Vec,
}

impl EmbeddingFormat {
    pub fn try_from_str(format: &str) -> Result<EmbeddingFormat> {
        match format {
            "finalfusion" => Ok(EmbeddingFormat::FinalFusion),
            "text" => Ok(EmbeddingFormat::Text),
            "textdims" => Ok(EmbeddingFormat::TextDims),
            "word2vec" => Ok(EmbeddingFormat::Word2Vec),
            _ => bail!("Unknown embedding format: {}", format),
        }
    }

    /// Guess the format from the file extension.
    ///
    /// Files ending in `.fifu` are finalfusion files, `.bin` files are
    /// word2vec files, everything else is treated as GloVe text.
    pub fn from_path(path: impl AsRef<Path>) -> EmbeddingFormat {
        match path
            .as_ref()
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .as_deref()
        {
            Some("fifu") => EmbeddingFormat::FinalFusion,
            Some("bin") => EmbeddingFormat::Word2Vec,
            _ => EmbeddingFormat::Text,
        }
    }
}

/// Read a vocabulary, one token per line.
///
/// The line number (starting at zero) is the token identifier.
pub fn read_vocab<R>(read: R) -> Result<Vec<String>>
where
    R: BufRead,
{
    read.lines()
        .map(|line| Ok(line?.trim().to_owned()))
        .collect()
}

/// Look up the embedding of every vocabulary token.
///
/// Row *i* of the matrix is the embedding of token *i*. Tokens without an
/// embedding get a zero vector. Returns the matrix and the number of
/// tokens without an embedding.
pub fn embedding_matrix<V, S>(embeds: &Embeddings<V, S>, vocab: &[String]) -> (Array2<f32>, usize)
where
    V: Vocab,
    S: Storage,
{
    let mut matrix = Array2::zeros((vocab.len(), embeds.storage().shape().1));
    let mut n_unknown = 0;

    for (word, mut row) in vocab.iter().zip(matrix.outer_iter_mut()) {
        match embeds.embedding(word) {
            Some(embed) => row.assign(&embed),
            None => n_unknown += 1,
        }
    }

    (matrix, n_unknown)
}

/// Load the embedding matrix for the vocabulary in `vocab_path`.
pub fn load_embedding_matrix(
    vocab_path: impl AsRef<Path>,
    embeds_path: impl AsRef<Path>,
    format: EmbeddingFormat,
) -> Result<(Array2<f32>, usize)> {
    let vocab_path = vocab_path.as_ref();
    let vocab_file = File::open(vocab_path)
        .with_context(|| format!("Cannot open vocabulary: {}", vocab_path.display()))?;
    let vocab = read_vocab(BufReader::new(vocab_file))?;

    let embeds_path = embeds_path.as_ref();
    let embeds_file = File::open(embeds_path)
        .with_context(|| format!("Cannot open embeddings: {}", embeds_path.display()))?;
    let mut reader = BufReader::new(embeds_file);
    let context = || format!("Cannot read embeddings: {}", embeds_path.display());

    let matrix = match format {
        EmbeddingFormat::FinalFusion => {
            let embeds: Embeddings<VocabWrap, StorageWrap> =
                Embeddings::read_embeddings(&mut reader).with_context(context)?;
            embedding_matrix(&embeds, &vocab)
        }
        EmbeddingFormat::Text => {
            let embeds = Embeddings::read_text(&mut reader).with_context(context)?;
            embedding_matrix(&embeds, &vocab)
        }
        EmbeddingFormat::TextDims => {
            let embeds = Embeddings::read_text_dims(&mut reader).with_context(context)?;
            embedding_matrix(&embeds, &vocab)
        }
        EmbeddingFormat::Word2Vec => {
            let embeds = Embeddings::read_word2vec_binary(&mut reader).with_context(context)?;
            embedding_matrix(&embeds, &vocab)
        }
    };

    Ok(matrix)
}
