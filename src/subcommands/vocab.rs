use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};
use clap::{App, Arg, ArgMatches};
use rcconll::io::FileProgress;
use rcconll::{CorpusVocab, CountedType, VersionInfo, Word};
use serde::Serialize;
use toml::Value;

use crate::subcommands::RcConllApp;

static CORPUS: &str = "CORPUS";
static OUTPUT: &str = "OUTPUT";

/// Vocabulary and statistics subcommand.
pub struct VocabApp {
    corpus: String,
    output: Option<String>,
}

#[derive(Serialize)]
struct VocabReport<'a> {
    corpus: &'a str,
    n_words: usize,
    n_pos: usize,
    n_relations: usize,
    version_info: VersionInfo,
    word_indices: BTreeMap<&'a str, usize>,
    pos: Vec<&'a str>,
    relations: Vec<&'a str>,
    words: &'a [Word],
    pos_counts: &'a [CountedType<String>],
    relation_counts: &'a [CountedType<String>],
}

impl<'a> VocabReport<'a> {
    fn new(corpus: &'a str, vocab: &'a CorpusVocab) -> Self {
        VocabReport {
            corpus,
            n_words: vocab.words().len(),
            n_pos: vocab.pos_counts().len(),
            n_relations: vocab.relation_counts().len(),
            version_info: VersionInfo::new(),
            word_indices: vocab
                .word_indices()
                .iter()
                .map(|(word, &idx)| (word.as_str(), idx))
                .collect(),
            pos: vocab.pos(),
            relations: vocab.relations(),
            words: vocab.words(),
            pos_counts: vocab.pos_counts(),
            relation_counts: vocab.relation_counts(),
        }
    }

    fn to_toml(&self) -> Result<String> {
        // Serialize through a value, so that tables follow plain values.
        let value = Value::try_from(self).context("Cannot convert vocabulary report")?;
        toml::to_string(&value).context("Cannot serialize vocabulary report")
    }
}

impl RcConllApp for VocabApp {
    fn app() -> App<'static, 'static> {
        Self::versioned_app("vocab")
            .about("Count the words, tags, and relations of a CoNLL corpus")
            .arg(
                Arg::with_name(CORPUS)
                    .help("CoNLL corpus")
                    .index(1)
                    .required(true),
            )
            .arg(
                Arg::with_name(OUTPUT)
                    .help("Vocabulary report (default: standard output)")
                    .index(2),
            )
    }

    fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(VocabApp {
            corpus: matches.value_of(CORPUS).unwrap().to_owned(),
            output: matches.value_of(OUTPUT).map(ToOwned::to_owned),
        })
    }

    fn run(&self) -> Result<()> {
        let vocab = CorpusVocab::from_read(FileProgress::open(&self.corpus)?)
            .with_context(|| format!("Cannot read corpus: {}", self.corpus))?;

        eprintln!(
            "{} word types, {} tags, {} relations",
            vocab.words().len(),
            vocab.pos_counts().len(),
            vocab.relation_counts().len()
        );

        let report = VocabReport::new(&self.corpus, &vocab).to_toml()?;
        let mut writer: Box<dyn Write> = match &self.output {
            Some(output) => Box::new(BufWriter::new(
                File::create(output)
                    .with_context(|| format!("Cannot open output file for writing: {}", output))?,
            )),
            None => Box::new(BufWriter::new(io::stdout())),
        };

        writer
            .write_all(report.as_bytes())
            .context("Cannot write vocabulary report")?;
        writer.flush().context("Cannot write vocabulary report")
    }
}

#[cfg(test)]
mod tests {
    use rcconll::vocab;
    use toml::Value;

    use super::VocabReport;

    #[test]
    fn report_has_all_tables() {
        let vocab = vocab("testdata/round_trip.conll").unwrap();
        let report: Value = VocabReport::new("testdata/round_trip.conll", &vocab)
            .to_toml()
            .unwrap()
            .parse()
            .unwrap();

        assert_eq!(report["corpus"].as_str(), Some("testdata/round_trip.conll"));
        assert_eq!(report["word_indices"]["*root*"].as_integer(), Some(0));
        assert_eq!(
            report["words"].as_array().unwrap().len() as i64,
            report["n_words"].as_integer().unwrap()
        );
        assert_eq!(report["pos"][0].as_str(), Some("ROOT-POS"));
        assert_eq!(report["relations"][0].as_str(), Some("rroot"));
    }
}
