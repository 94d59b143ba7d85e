use anyhow::Result;
use clap::{App, Arg, ArgMatches};
use rcconll::eval::DEFAULT_EVAL_SCRIPT;
use rcconll::{run_eval, EvalOutcome};

use crate::subcommands::RcConllApp;

static EVAL_SCRIPT: &str = "eval_script";
static GOLD: &str = "GOLD";
static TEST: &str = "TEST";

/// Dependency parser evaluation subcommand.
pub struct EvalApp {
    eval_script: String,
    gold: String,
    test: String,
}

impl RcConllApp for EvalApp {
    fn app() -> App<'static, 'static> {
        Self::versioned_app("eval")
            .about("Evaluate predicted dependency trees against a gold standard")
            .arg(
                Arg::with_name(EVAL_SCRIPT)
                    .long("eval_script")
                    .value_name("SCRIPT")
                    .help("Perl evaluation script for CoNLL-X files")
                    .takes_value(true)
                    .default_value(DEFAULT_EVAL_SCRIPT),
            )
            .arg(
                Arg::with_name(GOLD)
                    .help("Gold standard corpus, CoNLL-U files are evaluated in-process")
                    .index(1)
                    .required(true),
            )
            .arg(
                Arg::with_name(TEST)
                    .help("Predicted corpus")
                    .index(2)
                    .required(true),
            )
    }

    fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(EvalApp {
            eval_script: matches.value_of(EVAL_SCRIPT).unwrap().to_owned(),
            gold: matches.value_of(GOLD).unwrap().to_owned(),
            test: matches.value_of(TEST).unwrap().to_owned(),
        })
    }

    fn run(&self) -> Result<()> {
        match run_eval(&self.gold, &self.test, &self.eval_script)? {
            EvalOutcome::Scores(scores) => println!("{}", scores),
            EvalOutcome::Report(path) => eprintln!("Evaluation written to {}", path.display()),
        }

        Ok(())
    }
}
