use anyhow::Result;
use clap::{App, AppSettings, ArgMatches};

static DEFAULT_CLAP_SETTINGS: &[AppSettings] = &[
    AppSettings::DontCollapseArgsInUsage,
    AppSettings::UnifiedHelpMessage,
];

pub trait RcConllApp
where
    Self: Sized,
{
    fn app() -> App<'static, 'static>;

    fn parse(matches: &ArgMatches) -> Result<Self>;

    fn run(&self) -> Result<()>;

    /// Subcommand with the default settings and version.
    fn versioned_app<'a, 'b>(name: &str) -> App<'a, 'b> {
        let version = if let Some(git_desc) = option_env!("MAYBE_RCCONLL_GIT_DESC") {
            git_desc
        } else {
            env!("CARGO_PKG_VERSION")
        };
        App::new(name).settings(DEFAULT_CLAP_SETTINGS).version(version)
    }
}
