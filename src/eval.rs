//! Evaluation of predicted dependency parses.

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::conll::{read_conll, ConllEntry, Sentence};

/// Default location of the CoNLL-X evaluation script.
pub const DEFAULT_EVAL_SCRIPT: &str = "eval/eval.pl";

/// Determines if the file is in CoNLL-U format.
///
/// The extension is compared case-insensitively.
pub fn is_conllu(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase() == "conllu")
        .unwrap_or(false)
}

/// Path of the evaluation report for the predictions in `test`.
///
/// The extension (everything from the last `.`) is replaced by
/// `_eval.txt`.
pub fn eval_output_path(test: impl AsRef<Path>) -> PathBuf {
    let test = test.as_ref().to_string_lossy();
    let stem = match test.rfind('.') {
        Some(idx) => &test[..idx],
        None => &test[..],
    };

    PathBuf::from(format!("{}_eval.txt", stem))
}

/// Evaluation strategies.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EvalStrategy {
    /// Score CoNLL-U files in-process.
    Conllu,

    /// Score CoNLL-X files with the external Perl script.
    Script,
}

impl EvalStrategy {
    /// Pick the strategy for a gold standard file.
    pub fn for_gold(gold: impl AsRef<Path>) -> Self {
        if is_conllu(gold) {
            EvalStrategy::Conllu
        } else {
            EvalStrategy::Script
        }
    }
}

/// Attachment scores of predicted parses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct AttachmentScores {
    /// Number of scored tokens.
    pub n_tokens: usize,

    /// Tokens with the correct head.
    pub n_head: usize,

    /// Tokens with the correct head and relation.
    pub n_labeled: usize,

    /// Tokens with the correct universal part-of-speech tag.
    pub n_upos: usize,
}

impl AttachmentScores {
    /// Unlabeled attachment score.
    pub fn uas(&self) -> f64 {
        self.ratio(self.n_head)
    }

    /// Labeled attachment score.
    pub fn las(&self) -> f64 {
        self.ratio(self.n_labeled)
    }

    /// Part-of-speech accuracy.
    pub fn upos(&self) -> f64 {
        self.ratio(self.n_upos)
    }

    fn ratio(&self, n: usize) -> f64 {
        if self.n_tokens == 0 {
            0.
        } else {
            n as f64 / self.n_tokens as f64
        }
    }

    fn add_token(&mut self, gold: &ConllEntry, test: &ConllEntry) {
        self.n_tokens += 1;

        if gold.head == test.head {
            self.n_head += 1;
            if universal_relation(&gold.relation) == universal_relation(&test.relation) {
                self.n_labeled += 1;
            }
        }

        if gold.cpos == test.cpos {
            self.n_upos += 1;
        }
    }
}

impl fmt::Display for AttachmentScores {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Tokens: {}", self.n_tokens)?;
        writeln!(f, "UPOS:   {:.2}", self.upos() * 100.)?;
        writeln!(f, "UAS:    {:.2}", self.uas() * 100.)?;
        write!(f, "LAS:    {:.2}", self.las() * 100.)
    }
}

/// Strip the language-specific subtype from a relation.
fn universal_relation(relation: &str) -> &str {
    relation.split(':').next().unwrap_or(relation)
}

fn sentence_tokens(sentence: &Sentence) -> impl Iterator<Item = &ConllEntry> {
    sentence
        .iter()
        .filter_map(|line| line.token())
        .filter(|token| !token.is_root())
}

/// Score sentences with predicted parses against gold sentences.
///
/// Both sequences must have the same tokenization.
pub fn score_sentences<G, T>(gold: G, test: T) -> Result<AttachmentScores>
where
    G: IntoIterator<Item = Result<Sentence>>,
    T: IntoIterator<Item = Result<Sentence>>,
{
    let mut scores = AttachmentScores::default();
    let mut test = test.into_iter();

    for (sent_idx, gold_sentence) in gold.into_iter().enumerate() {
        let gold_sentence = gold_sentence?;
        let test_sentence = match test.next() {
            Some(sentence) => sentence?,
            None => bail!("Predictions end at sentence {}", sent_idx + 1),
        };

        let mut gold_tokens = sentence_tokens(&gold_sentence);
        let mut test_tokens = sentence_tokens(&test_sentence);
        loop {
            match (gold_tokens.next(), test_tokens.next()) {
                (Some(gold), Some(test)) => {
                    if gold.form != test.form {
                        bail!(
                            "Tokenization mismatch in sentence {}: '{}' != '{}'",
                            sent_idx + 1,
                            gold.form,
                            test.form
                        );
                    }
                    scores.add_token(gold, test);
                }
                (None, None) => break,
                _ => bail!("Sentence {} differs in length", sent_idx + 1),
            }
        }
    }

    if test.next().is_some() {
        bail!("Predictions contain more sentences than the gold standard");
    }

    Ok(scores)
}

/// Evaluate CoNLL-U predictions in-process.
pub fn conllu_eval(gold: impl AsRef<Path>, test: impl AsRef<Path>) -> Result<AttachmentScores> {
    score_sentences(read_conll(gold)?, read_conll(test)?)
}

/// Evaluate CoNLL-X predictions with the Perl evaluation script.
///
/// The script output is written to the file returned by
/// `eval_output_path`. This blocks until the script is finished.
pub fn script_eval(
    script: impl AsRef<Path>,
    gold: impl AsRef<Path>,
    test: impl AsRef<Path>,
) -> Result<PathBuf> {
    let output_path = eval_output_path(test.as_ref());
    let output = File::create(&output_path)
        .with_context(|| format!("Cannot open {} for writing", output_path.display()))?;

    let status = Command::new("perl")
        .arg(script.as_ref())
        .arg("-g")
        .arg(gold.as_ref())
        .arg("-s")
        .arg(test.as_ref())
        .stdout(Stdio::from(output))
        .status()
        .context("Cannot run evaluation script")?;

    if !status.success() {
        bail!("Evaluation script failed: {}", status);
    }

    Ok(output_path)
}

/// Result of an evaluation.
#[derive(Clone, Debug, PartialEq)]
pub enum EvalOutcome {
    /// Scores computed in-process.
    Scores(AttachmentScores),

    /// Path of the report written by the evaluation script.
    Report(PathBuf),
}

/// Evaluates a set of predictions using the appropriate strategy.
pub fn run_eval(
    gold: impl AsRef<Path>,
    test: impl AsRef<Path>,
    script: impl AsRef<Path>,
) -> Result<EvalOutcome> {
    match EvalStrategy::for_gold(gold.as_ref()) {
        EvalStrategy::Conllu => conllu_eval(gold, test).map(EvalOutcome::Scores),
        EvalStrategy::Script => script_eval(script, gold, test).map(EvalOutcome::Report),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Cursor;
    use std::path::PathBuf;

    use super::{
        conllu_eval, eval_output_path, is_conllu, run_eval, score_sentences, EvalOutcome,
        EvalStrategy,
    };
    use crate::conll::ConllReader;
    use crate::util::close;

    #[test]
    fn conllu_detection_ignores_case() {
        assert!(is_conllu("en-ud-dev.conllu"));
        assert!(is_conllu("data/EN.CONLLU"));
        assert!(is_conllu("x.ConllU"));
        assert!(!is_conllu("en-dev.conll"));
        assert!(!is_conllu("conllu"));
        assert!(!is_conllu("dev.conllu.txt"));
    }

    #[test]
    fn strategy_follows_extension() {
        assert_eq!(EvalStrategy::for_gold("a/dev.CoNLLU"), EvalStrategy::Conllu);
        assert_eq!(EvalStrategy::for_gold("a/dev.conll"), EvalStrategy::Script);
        assert_eq!(EvalStrategy::for_gold("a/dev.txt"), EvalStrategy::Script);
        assert_eq!(EvalStrategy::for_gold("a/dev"), EvalStrategy::Script);
    }

    #[test]
    fn output_path_replaces_extension() {
        assert_eq!(
            eval_output_path("out/test_pred.conll"),
            PathBuf::from("out/test_pred_eval.txt")
        );
        assert_eq!(
            eval_output_path("out/test.pred.conll"),
            PathBuf::from("out/test.pred_eval.txt")
        );
        assert_eq!(eval_output_path("pred"), PathBuf::from("pred_eval.txt"));
    }

    #[test]
    fn scores_predictions() {
        let scores = conllu_eval("testdata/gold.conllu", "testdata/pred.conllu").unwrap();
        assert_eq!(scores.n_tokens, 6);
        assert_eq!(scores.n_head, 5);
        assert_eq!(scores.n_labeled, 4);
        assert_eq!(scores.n_upos, 5);
        assert!(close(scores.las() as f32, 4. / 6., 1e-6));
    }

    #[test]
    fn conllu_gold_is_scored_in_process() {
        match run_eval("testdata/gold.conllu", "testdata/gold.conllu", "missing.pl").unwrap() {
            EvalOutcome::Scores(scores) => {
                assert_eq!(scores.n_tokens, 6);
                assert_eq!(scores.n_labeled, 6);
            }
            EvalOutcome::Report(_) => panic!("CoNLL-U file was not scored in-process"),
        }
    }

    #[test]
    fn conll_gold_is_scored_by_script() {
        let dir = tempfile::tempdir().unwrap();
        let pred = dir.path().join("pred.conll");
        fs::copy("testdata/round_trip.conll", &pred).unwrap();

        let outcome =
            run_eval("testdata/round_trip.conll", &pred, "testdata/echo_eval.pl").unwrap();
        let report = match outcome {
            EvalOutcome::Report(report) => report,
            EvalOutcome::Scores(_) => panic!("CoNLL-X file was scored in-process"),
        };
        assert_eq!(report, dir.path().join("pred_eval.txt"));
        assert_eq!(
            fs::read_to_string(report).unwrap(),
            format!("-g testdata/round_trip.conll -s {}\n", pred.display())
        );
    }

    #[test]
    fn script_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let pred = dir.path().join("pred.conll");
        fs::copy("testdata/round_trip.conll", &pred).unwrap();

        assert!(
            run_eval("testdata/round_trip.conll", &pred, "testdata/failing_eval.pl").is_err()
        );
    }

    #[test]
    fn tokenization_mismatch_is_an_error() {
        let gold = ConllReader::new(Cursor::new(
            b"1\ta\ta\tX\tX\t_\t0\troot\t_\t_\n2\tb\tb\tX\tX\t_\t1\tdep\t_\t_\n".to_vec(),
        ));
        let test = ConllReader::new(Cursor::new(
            b"1\ta\ta\tX\tX\t_\t0\troot\t_\t_\n2\tc\tc\tX\tX\t_\t1\tdep\t_\t_\n".to_vec(),
        ));
        assert!(score_sentences(gold, test).is_err());

        let gold = ConllReader::new(Cursor::new(
            b"1\ta\ta\tX\tX\t_\t0\troot\t_\t_\n".to_vec(),
        ));
        let test = ConllReader::new(Cursor::new(
            b"1\ta\ta\tX\tX\t_\t0\troot\t_\t_\n\n1\ta\ta\tX\tX\t_\t0\troot\t_\t_\n".to_vec(),
        ));
        assert!(score_sentences(gold, test).is_err());
    }
}
