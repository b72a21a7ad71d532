use clap::{Parser, Subcommand};

const CMD_NAME: &str = "mlbox";

/// Stores our command-line args format.
#[derive(Parser, Debug)]
#[command(name = CMD_NAME, version, about = None, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Print additional debugging info (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Root directory for profile paths (default: <BOX>/workspace)
    #[arg(short, long, value_name = "DIR", global = true)]
    #[arg(env = "MLBOX_WORKSPACE")]
    pub workspace: Option<String>,

    /// Runner configuration to use when none is given before the box
    #[arg(long, value_name = "FILE[:RUNNER]", global = true)]
    #[arg(env = "MLBOX_PLATFORM")]
    pub platform: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a summary of a box
    Describe(Target),
    /// Prepare the environment a box runs in
    Configure(Target),
    /// Run one task of a box
    Run(Target),
}

impl Command {
    pub fn target(&self) -> &Target {
        match self {
            Self::Describe(t) | Self::Configure(t) | Self::Run(t) => t,
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct Target {
    /// [RUNNER_CONFIG[:RUNNER]] BOX[:TASK[/PROFILE]] [--PARAM=VALUE]...
    #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl Target {
    pub fn new<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}
