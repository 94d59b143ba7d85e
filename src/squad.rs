//! Preprocessed SQuAD data.
//!
//! The data directory contains token identifier files with one
//! paragraph or question per line and span files with one answer span per
//! line.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, ensure, Context, Result};

use crate::config::{Mode, TrainConfig};

/// Answer span, the inclusive start and end offsets in the paragraph.
pub type Span = (usize, usize);

/// A question about a paragraph with its answer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SquadExample {
    pub paragraph: Vec<usize>,
    pub question: Vec<usize>,
    pub span: Span,
}

impl SquadExample {
    pub fn new(paragraph: Vec<usize>, question: Vec<usize>, span: Span) -> Self {
        SquadExample {
            paragraph,
            question,
            span,
        }
    }

    /// Does the answer span lie within the first `len` paragraph tokens?
    fn span_fits(&self, len: usize) -> bool {
        self.span.0 <= self.span.1 && self.span.1 < len.min(self.paragraph.len())
    }
}

/// Paths of the preprocessed files in a data directory.
#[derive(Clone, Debug)]
pub struct SquadFiles {
    pub train_para_ids: PathBuf,
    pub train_ques_ids: PathBuf,
    pub train_answer: PathBuf,
    pub val_para_ids: PathBuf,
    pub val_ques_ids: PathBuf,
    pub val_answer: PathBuf,
    pub vocab: PathBuf,
}

impl SquadFiles {
    pub fn new(data_path: impl AsRef<Path>) -> Self {
        let data_path = data_path.as_ref();
        SquadFiles {
            train_para_ids: data_path.join("train.ids.context"),
            train_ques_ids: data_path.join("train.ids.question"),
            train_answer: data_path.join("train.span"),
            val_para_ids: data_path.join("dev.ids.context"),
            val_ques_ids: data_path.join("dev.ids.question"),
            val_answer: data_path.join("dev.span"),
            vocab: data_path.join("vocab.dat"),
        }
    }
}

fn parse_line<T>(line: &str, line_no: usize) -> Result<Vec<T>>
where
    T: std::str::FromStr,
{
    line.split_whitespace()
        .map(|v| {
            v.parse()
                .map_err(|_| anyhow!("Cannot parse '{}' on line {}", v, line_no))
        })
        .collect()
}

/// Read token identifiers, one sequence per line.
pub fn read_ids<R>(read: R) -> Result<Vec<Vec<usize>>>
where
    R: BufRead,
{
    read.lines()
        .enumerate()
        .map(|(idx, line)| parse_line(&line?, idx + 1))
        .collect()
}

/// Read answer spans, one span per line.
pub fn read_spans<R>(read: R) -> Result<Vec<Span>>
where
    R: BufRead,
{
    read.lines()
        .enumerate()
        .map(|(idx, line)| {
            let span: Vec<usize> = parse_line(&line?, idx + 1)?;
            match span.as_slice() {
                &[start, end] if start <= end => Ok((start, end)),
                &[start, end] => bail!("Span end {} before start {} on line {}", end, start, idx + 1),
                _ => bail!("Expected two span offsets on line {}", idx + 1),
            }
        })
        .collect()
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let f = File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
    Ok(BufReader::new(f))
}

/// Read paragraphs, questions, and answers into examples.
pub fn create_squad_training(
    para_ids: impl AsRef<Path>,
    ques_ids: impl AsRef<Path>,
    answers: impl AsRef<Path>,
) -> Result<Vec<SquadExample>> {
    let (para_ids, ques_ids, answers) = (para_ids.as_ref(), ques_ids.as_ref(), answers.as_ref());

    let paragraphs =
        read_ids(open(para_ids)?).with_context(|| format!("Cannot read {}", para_ids.display()))?;
    let questions =
        read_ids(open(ques_ids)?).with_context(|| format!("Cannot read {}", ques_ids.display()))?;
    let spans =
        read_spans(open(answers)?).with_context(|| format!("Cannot read {}", answers.display()))?;

    ensure!(
        paragraphs.len() == questions.len() && questions.len() == spans.len(),
        "Line counts differ: {} ({}), {} ({}), {} ({})",
        para_ids.display(),
        paragraphs.len(),
        ques_ids.display(),
        questions.len(),
        answers.display(),
        spans.len()
    );

    Ok(paragraphs
        .into_iter()
        .zip(questions)
        .zip(spans)
        .map(|((paragraph, question), span)| SquadExample::new(paragraph, question, span))
        .collect())
}

/// Get the maximum paragraph and question lengths.
pub fn max_values<'a>(examples: impl IntoIterator<Item = &'a SquadExample>) -> (usize, usize) {
    examples
        .into_iter()
        .fold((0, 0), |(max_para, max_ques), example| {
            (
                max_para.max(example.paragraph.len()),
                max_ques.max(example.question.len()),
            )
        })
}

/// Fit examples to the configured lengths.
///
/// Training examples with a paragraph that is longer than `max_para` are
/// discarded. Validation paragraphs are truncated to `max_para`. In both
/// cases examples whose answer does not fit in the paragraph are
/// discarded. Questions are truncated to `max_question`.
pub fn get_data_array(
    config: &TrainConfig,
    examples: Vec<SquadExample>,
    mode: Mode,
) -> Vec<SquadExample> {
    examples
        .into_iter()
        .filter(|example| mode == Mode::Validation || example.paragraph.len() <= config.max_para)
        .filter(|example| example.span_fits(config.max_para))
        .map(|mut example| {
            example.paragraph.truncate(config.max_para);
            if config.max_question > 0 {
                example.question.truncate(config.max_question);
            }
            example
        })
        .collect()
}

/// Check that all token identifiers are in the vocabulary.
pub fn check_ids<'a>(
    examples: impl IntoIterator<Item = &'a SquadExample>,
    vocab_len: usize,
) -> Result<()> {
    for (idx, example) in examples.into_iter().enumerate() {
        if let Some(id) = example
            .paragraph
            .iter()
            .chain(&example.question)
            .find(|&&id| id >= vocab_len)
        {
            bail!(
                "Token identifier {} of example {} is not in the vocabulary ({} types)",
                id,
                idx,
                vocab_len
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::{
        check_ids, create_squad_training, get_data_array, max_values, read_ids, read_spans,
        SquadExample, SquadFiles,
    };
    use crate::config::{Mode, TrainConfig};

    fn example(para_len: usize, ques_len: usize, span: (usize, usize)) -> SquadExample {
        SquadExample::new((0..para_len).collect(), (0..ques_len).collect(), span)
    }

    #[test]
    fn reads_ids() {
        let ids = read_ids(Cursor::new("1 2 3\n\n4 5\n")).unwrap();
        assert_eq!(ids, vec![vec![1, 2, 3], vec![], vec![4, 5]]);
        assert!(read_ids(Cursor::new("1 x 3\n")).is_err());
    }

    #[test]
    fn reads_spans() {
        let spans = read_spans(Cursor::new("0 0\n3 5\n")).unwrap();
        assert_eq!(spans, vec![(0, 0), (3, 5)]);
        assert!(read_spans(Cursor::new("3\n")).is_err());
        assert!(read_spans(Cursor::new("5 3\n")).is_err());
    }

    #[test]
    fn reads_data_directory() {
        let files = SquadFiles::new("testdata/squad");
        let train =
            create_squad_training(&files.train_para_ids, &files.train_ques_ids, &files.train_answer)
                .unwrap();
        assert_eq!(train.len(), 4);
        assert_eq!(train[0].paragraph, vec![2, 3, 4, 5, 6, 7]);
        assert_eq!(train[0].question, vec![8, 4, 9]);
        assert_eq!(train[0].span, (2, 3));

        let dev =
            create_squad_training(&files.val_para_ids, &files.val_ques_ids, &files.val_answer)
                .unwrap();
        assert_eq!(dev.len(), 2);
    }

    #[test]
    fn line_count_mismatch_is_an_error() {
        let files = SquadFiles::new("testdata/squad");
        assert!(
            create_squad_training(&files.train_para_ids, &files.val_ques_ids, &files.train_answer)
                .is_err()
        );
    }

    #[test]
    fn max_lengths() {
        let examples = vec![example(10, 3, (0, 1)), example(4, 7, (0, 1))];
        assert_eq!(max_values(&examples), (10, 7));
        assert_eq!(max_values(&[]), (0, 0));
    }

    #[test]
    fn training_data_discards_long_paragraphs() {
        let config = TrainConfig {
            max_para: 5,
            max_question: 2,
            ..TrainConfig::default()
        };
        let examples = vec![
            example(5, 3, (1, 4)),
            example(6, 3, (1, 2)),
            example(3, 1, (2, 3)),
        ];

        let train = get_data_array(&config, examples, Mode::Train);
        assert_eq!(train, vec![example(5, 2, (1, 4))]);
    }

    #[test]
    fn validation_data_truncates_paragraphs() {
        let config = TrainConfig {
            max_para: 5,
            ..TrainConfig::default()
        };
        let examples = vec![example(8, 3, (1, 4)), example(8, 3, (4, 5))];

        let dev = get_data_array(&config, examples, Mode::Validation);
        assert_eq!(dev, vec![example(5, 3, (1, 4))]);
    }

    #[test]
    fn out_of_vocabulary_ids() {
        let examples = vec![example(5, 3, (1, 4))];
        assert!(check_ids(&examples, 5).is_ok());
        assert!(check_ids(&examples, 4).is_err());
    }
}
