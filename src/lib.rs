pub mod checkpoint;
pub use checkpoint::{CheckpointState, Checkpointer};

pub mod config;
pub use config::{Device, Mode, TrainConfig};

pub mod conll;
pub use conll::{
    normalize, read_conll, write_conll, write_conll_file, ConllEntry, ConllLine, ConllReader,
    Sentence,
};

mod driver;
pub use driver::{EpochReport, Initialization, TrainDriver};

pub mod embeddings;
pub use embeddings::{load_embedding_matrix, EmbeddingFormat};

pub mod eval;
pub use eval::{run_eval, AttachmentScores, EvalOutcome, EvalStrategy};

pub mod io;

mod metrics;
pub use metrics::{exact_match, f1_score, PassStats};

mod pointer;
pub use pointer::{best_span, PointerModel};

pub mod squad;
pub use squad::{Span, SquadExample, SquadFiles};

mod train_model;
pub use train_model::{Prediction, SpanModel};

pub(crate) mod util;
pub use util::VersionInfo;

pub mod vocab;
pub use vocab::{vocab, CorpusVocab, CountedType, VocabBuilder, Word};
