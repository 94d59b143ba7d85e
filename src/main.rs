use std::io::stdout;
use std::process;

use anyhow::{anyhow, Result};
use clap::{App, AppSettings, Arg, ArgMatches, Shell, SubCommand};

mod subcommands;
use subcommands::{EvalApp, RcConllApp, TrainApp, VocabApp};

static DEFAULT_CLAP_SETTINGS: &[AppSettings] = &[
    AppSettings::DontCollapseArgsInUsage,
    AppSettings::UnifiedHelpMessage,
    AppSettings::SubcommandRequiredElseHelp,
];

fn main() {
    // Known subapplications.
    let apps = vec![TrainApp::app(), VocabApp::app(), EvalApp::app()];

    let cli = App::new("rcconll")
        .settings(DEFAULT_CLAP_SETTINGS)
        .subcommands(apps)
        .subcommand(
            SubCommand::with_name("completions")
                .about("Generate completion scripts for your shell")
                .setting(AppSettings::ArgRequiredElseHelp)
                .arg(Arg::with_name("shell").possible_values(&Shell::variants())),
        );
    let matches = cli.clone().get_matches();

    let result = match matches.subcommand() {
        ("completions", Some(matches)) => write_completion_script(cli, matches),
        ("eval", Some(matches)) => run::<EvalApp>(matches),
        ("train", Some(matches)) => run::<TrainApp>(matches),
        ("vocab", Some(matches)) => run::<VocabApp>(matches),
        _unknown => unreachable!(),
    };

    if let Err(err) = result {
        eprintln!("{:?}", err);
        process::exit(1);
    }
}

fn run<A>(matches: &ArgMatches) -> Result<()>
where
    A: RcConllApp,
{
    A::parse(matches)?.run()
}

fn write_completion_script(mut cli: App, matches: &ArgMatches) -> Result<()> {
    let shell = matches
        .value_of("shell")
        .unwrap()
        .parse::<Shell>()
        .map_err(|err| anyhow!(err))?;
    cli.gen_completions_to("rcconll", shell, &mut stdout());
    Ok(())
}
