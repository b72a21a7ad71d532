/// High-level command line app
mod app;
/// Definition of command-line args
mod args;
/// Running external commands
pub mod exec;
/// Filesystem operations
mod fs;
/// Configure and execute back-ends
pub mod runners;
/// Command-line settings and process environment
mod settings;
/// Text UI
mod ui;

// exported for tests:
pub use app::{describe, App};
pub use args::{Args, Command, Target};
pub use settings::{Action, Environment, Settings};

/// Run the command-line app.
pub fn run() -> Result<(), anyhow::Error> {
    use clap::Parser;
    let args = Args::parse();

    // INTERPRET SETTINGS ///////////////
    let settings: Settings = args.try_into()?;

    let log_level = match settings.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    simple_logging::log_to_stderr(log_level);

    let env = Environment::capture()?;

    // RUN THE THING /////////////////
    let app = App::new(settings, env);
    app.run()?;

    Ok(())
}
