//! Reading and writing of CoNLL-X and CoNLL-U dependency corpora.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};

/// Form, normalized form, and lemma of the artificial root.
pub const ROOT_FORM: &str = "*root*";

/// Fine-grained part-of-speech tag of the artificial root.
pub const ROOT_POS: &str = "ROOT-POS";

/// Coarse part-of-speech tag of the artificial root.
pub const ROOT_CPOS: &str = "ROOT-CPOS";

/// Relation of the artificial root.
pub const ROOT_RELATION: &str = "rroot";

/// Normalized form of tokens that start with a number.
pub const NUM: &str = "NUM";

const EMPTY_FIELD: &str = "_";

const N_FIELDS: usize = 10;

/// Normalize a word form.
///
/// Forms starting with a digit are mapped to `NUM`, other forms are
/// lowercased.
pub fn normalize(form: &str) -> String {
    if form.starts_with(|c: char| c.is_ascii_digit()) {
        NUM.to_owned()
    } else {
        form.to_lowercase()
    }
}

/// A token of a dependency-annotated sentence.
///
/// The gold annotation is read from the corpus. A parser can store its
/// predictions in `pred_head` and `pred_relation`; when these are set, they
/// are written instead of the gold annotation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConllEntry {
    pub id: usize,
    pub form: String,
    pub norm: String,
    pub lemma: String,
    pub pos: String,
    pub cpos: String,
    pub feats: String,
    pub head: Option<usize>,
    pub relation: String,
    pub deps: String,
    pub misc: String,
    pub pred_head: Option<usize>,
    pub pred_relation: Option<String>,
}

impl ConllEntry {
    /// The artificial root that starts every sentence.
    pub fn root() -> Self {
        ConllEntry {
            id: 0,
            form: ROOT_FORM.to_owned(),
            norm: ROOT_FORM.to_owned(),
            lemma: ROOT_FORM.to_owned(),
            pos: ROOT_POS.to_owned(),
            cpos: ROOT_CPOS.to_owned(),
            feats: EMPTY_FIELD.to_owned(),
            head: None,
            relation: ROOT_RELATION.to_owned(),
            deps: EMPTY_FIELD.to_owned(),
            misc: EMPTY_FIELD.to_owned(),
            pred_head: None,
            pred_relation: None,
        }
    }

    /// Parse the tab-separated fields of a token line.
    ///
    /// The fields are in CoNLL order: id, form, lemma, coarse tag, fine
    /// tag, features, head, relation, enhanced dependencies, misc.
    pub fn from_fields(fields: &[&str]) -> Result<Self> {
        if fields.len() < N_FIELDS {
            bail!(
                "Expected {} fields, token line has {}",
                N_FIELDS,
                fields.len()
            );
        }

        let id = fields[0]
            .parse()
            .map_err(|_| anyhow!("Cannot parse token identifier: {}", fields[0]))?;
        let head = match fields[6] {
            EMPTY_FIELD => None,
            head => Some(
                head.parse()
                    .map_err(|_| anyhow!("Cannot parse head: {}", head))?,
            ),
        };

        Ok(ConllEntry {
            id,
            form: fields[1].to_owned(),
            norm: normalize(fields[1]),
            lemma: fields[2].to_owned(),
            pos: fields[4].to_owned(),
            cpos: fields[3].to_owned(),
            feats: fields[5].to_owned(),
            head,
            relation: fields[7].to_owned(),
            deps: fields[8].to_owned(),
            misc: fields[9].to_owned(),
            pred_head: None,
            pred_relation: None,
        })
    }

    /// Is this the artificial root?
    pub fn is_root(&self) -> bool {
        self.id == 0
    }
}

impl fmt::Display for ConllEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let head = self
            .pred_head
            .or(self.head)
            .map(|head| head.to_string())
            .unwrap_or_else(|| EMPTY_FIELD.to_owned());
        let relation = self.pred_relation.as_ref().unwrap_or(&self.relation);

        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.id,
            self.form,
            self.lemma,
            self.cpos,
            self.pos,
            self.feats,
            head,
            relation,
            self.deps,
            self.misc
        )
    }
}

/// A line of a sentence.
///
/// Comments, multi-word token ranges, and empty nodes are not parsed, they
/// are kept verbatim as `Raw` lines.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConllLine {
    Token(ConllEntry),
    Raw(String),
}

impl ConllLine {
    /// Get the token, `None` for raw lines.
    pub fn token(&self) -> Option<&ConllEntry> {
        match self {
            ConllLine::Token(token) => Some(token),
            ConllLine::Raw(_) => None,
        }
    }

    /// Get the token mutably, `None` for raw lines.
    pub fn token_mut(&mut self) -> Option<&mut ConllEntry> {
        match self {
            ConllLine::Token(token) => Some(token),
            ConllLine::Raw(_) => None,
        }
    }
}

impl fmt::Display for ConllLine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConllLine::Token(token) => token.fmt(f),
            ConllLine::Raw(line) => f.write_str(line),
        }
    }
}

impl From<ConllEntry> for ConllLine {
    fn from(token: ConllEntry) -> Self {
        ConllLine::Token(token)
    }
}

/// A sentence, the first line is always the artificial root.
pub type Sentence = Vec<ConllLine>;

/// Sentence iterator.
///
/// This iterator consumes a reader with a CoNLL-X or CoNLL-U corpus:
///
/// - One token per line, with tab-separated fields.
/// - Sentences separated by an empty line.
///
/// Every sentence that is produced starts with the artificial root. Lines
/// starting with `#` and lines with a `-` or `.` in their identifier are
/// kept as raw lines. Sentences without any line besides the root are
/// discarded.
pub struct ConllReader<R> {
    lines: Lines<R>,
    line_no: usize,
}

impl<R> ConllReader<R>
where
    R: BufRead,
{
    pub fn new(read: R) -> Self {
        ConllReader {
            lines: read.lines(),
            line_no: 0,
        }
    }
}

impl<R> Iterator for ConllReader<R>
where
    R: BufRead,
{
    type Item = Result<Sentence>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut sentence = vec![ConllLine::Token(ConllEntry::root())];

        for line in &mut self.lines {
            self.line_no += 1;

            let line = match line {
                Ok(line) => line,
                Err(err) => return Some(Err(err.into())),
            };
            let trimmed = line.trim();

            if trimmed.is_empty() {
                if sentence.len() > 1 {
                    return Some(Ok(sentence));
                }

                continue;
            }

            let fields: Vec<_> = trimmed.split('\t').collect();
            if line.starts_with('#') || fields[0].contains(|c: char| c == '-' || c == '.') {
                sentence.push(ConllLine::Raw(trimmed.to_owned()));
            } else {
                match ConllEntry::from_fields(&fields) {
                    Ok(token) => sentence.push(ConllLine::Token(token)),
                    Err(err) => {
                        return Some(Err(err.context(format!("Invalid line {}", self.line_no))))
                    }
                }
            }
        }

        if sentence.len() > 1 {
            Some(Ok(sentence))
        } else {
            None
        }
    }
}

/// Open a corpus for reading.
pub fn read_conll(path: impl AsRef<Path>) -> Result<ConllReader<BufReader<File>>> {
    let path = path.as_ref();
    let f = File::open(path)
        .with_context(|| format!("Cannot open corpus for reading: {}", path.display()))?;
    Ok(ConllReader::new(BufReader::new(f)))
}

/// Write sentences in CoNLL format.
///
/// The artificial root of every sentence is skipped, every sentence is
/// followed by an empty line.
pub fn write_conll<W, I, S>(write: &mut W, sentences: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = S>,
    S: AsRef<[ConllLine]>,
{
    for sentence in sentences {
        for line in sentence.as_ref().iter().skip(1) {
            writeln!(write, "{}", line)?;
        }
        writeln!(write)?;
    }

    Ok(())
}

/// Write sentences in CoNLL format to the file at `path`.
pub fn write_conll_file<I, S>(path: impl AsRef<Path>, sentences: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<[ConllLine]>,
{
    let path = path.as_ref();
    let f = File::create(path)
        .with_context(|| format!("Cannot open {} for writing", path.display()))?;
    let mut writer = BufWriter::new(f);
    write_conll(&mut writer, sentences)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Cursor;

    use super::{normalize, read_conll, write_conll, ConllEntry, ConllLine, ConllReader, NUM};

    static TWO_TOKENS: &str =
        "1\tThe\tthe\tDT\tDT\t_\t2\tdet\t_\t_\n2\tdog\tdog\tNN\tNN\t_\t0\troot\t_\t_\n\n";

    fn read_str(data: &str) -> Vec<Vec<ConllLine>> {
        ConllReader::new(Cursor::new(data.as_bytes().to_vec()))
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn reads_sentence_with_root() {
        let sentences = read_str(TWO_TOKENS);
        assert_eq!(sentences.len(), 1);

        let sentence = &sentences[0];
        assert_eq!(sentence.len(), 3);
        assert_eq!(sentence[0], ConllLine::Token(ConllEntry::root()));

        let dog = sentence[2].token().unwrap();
        assert_eq!(dog.id, 2);
        assert_eq!(dog.form, "dog");
        assert_eq!(dog.head, Some(0));
        assert_eq!(dog.relation, "root");
    }

    #[test]
    fn coarse_and_fine_tags_are_distinguished() {
        let sentences = read_str("1\tdogs\tdog\tNOUN\tNNS\tNumber=Plur\t0\troot\t_\t_\n");
        let token = sentences[0][1].token().unwrap();
        assert_eq!(token.cpos, "NOUN");
        assert_eq!(token.pos, "NNS");
        assert_eq!(token.feats, "Number=Plur");
    }

    #[test]
    fn comments_and_ranges_are_raw() {
        let data = "# sent_id = 1\n1-2\tdon't\t_\t_\t_\t_\t_\t_\t_\t_\n\
                    1\tdo\tdo\tAUX\tVBP\t_\t0\troot\t_\t_\n\
                    2\tn't\tnot\tPART\tRB\t_\t1\tadvmod\t_\t_\n\
                    2.1\tx\tx\tX\tX\t_\t_\t_\t_\t_\n\n";
        let sentences = read_str(data);
        assert_eq!(sentences.len(), 1);

        let sentence = &sentences[0];
        assert_eq!(sentence.len(), 6);
        assert_eq!(sentence[1], ConllLine::Raw("# sent_id = 1".to_owned()));
        assert_eq!(
            sentence[2],
            ConllLine::Raw("1-2\tdon't\t_\t_\t_\t_\t_\t_\t_\t_".to_owned())
        );
        assert!(sentence[3].token().is_some());
        assert!(sentence[5].token().is_none());
    }

    #[test]
    fn root_only_sentences_are_discarded() {
        let data = format!("\n\n{}\n\n\n", TWO_TOKENS);
        assert_eq!(read_str(&data).len(), 1);
        assert!(read_str("").is_empty());
        assert!(read_str("\n \n\t\n").is_empty());
    }

    #[test]
    fn last_sentence_without_blank_line() {
        let sentences = read_str("1\ta\ta\tX\tX\t_\t0\troot\t_\t_\n\n1\tb\tb\tX\tX\t_\t0\troot\t_\t_");
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[1][1].token().unwrap().form, "b");
    }

    #[test]
    fn underscore_head_is_none() {
        let sentences = read_str("1\ta\ta\tX\tX\t_\t_\t_\t_\t_\n");
        assert_eq!(sentences[0][1].token().unwrap().head, None);
    }

    #[test]
    fn malformed_line_reports_line_number() {
        let mut reader = ConllReader::new(Cursor::new(
            b"1\ta\ta\tX\tX\t_\t0\troot\t_\t_\n2\tb\tb\tX\n".to_vec(),
        ));
        let err = reader.next().unwrap().unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));

        let mut reader = ConllReader::new(Cursor::new(
            b"1\ta\ta\tX\tX\t_\tnope\troot\t_\t_\n".to_vec(),
        ));
        assert!(reader.next().unwrap().is_err());
    }

    #[test]
    fn normalization() {
        assert_eq!(normalize("The"), "the");
        assert_eq!(normalize("1,000"), NUM);
        assert_eq!(normalize("3.14"), NUM);
        assert_eq!(normalize("4th"), NUM);
        assert_eq!(normalize("A4"), "a4");
    }

    #[test]
    fn write_uses_predictions() {
        let mut sentences = read_str(TWO_TOKENS);
        let dog = sentences[0][2].token_mut().unwrap();
        dog.pred_head = Some(1);
        dog.pred_relation = Some("nsubj".to_owned());

        let mut output = Vec::new();
        write_conll(&mut output, &sentences).unwrap();
        let output = String::from_utf8(output).unwrap();
        assert_eq!(
            output,
            "1\tThe\tthe\tDT\tDT\t_\t2\tdet\t_\t_\n2\tdog\tdog\tNN\tNN\t_\t1\tnsubj\t_\t_\n\n"
        );
    }

    #[test]
    fn round_trip() {
        let data = fs::read_to_string("testdata/round_trip.conll").unwrap();
        let sentences = read_conll("testdata/round_trip.conll")
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(sentences.len(), 3);

        let mut output = Vec::new();
        write_conll(&mut output, &sentences).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), data);
    }
}
