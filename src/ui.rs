use std::fmt::Display;

use colored::Colorize;

use util::Timer;

use crate::settings::Settings;

/// All user-facing progress output should go through this struct.
/// Everything is written to stderr, so stdout belongs to the box's own processes.
pub struct Ui {
    /// -v setting, displays extra text info to user
    pub verbose: bool,
    /// keeps track of time for each step
    timer: Timer,
}

impl Ui {
    pub fn new(settings: &Settings) -> Self {
        Self {
            verbose: settings.verbose > 0,
            timer: Timer::now(),
        }
    }

    /// Announce the start of a long-running step, e.g. `RUN hello/default`.
    pub fn start(&mut self, action: &str, what: impl Display) {
        self.timer.reset();
        eprintln!("{} {what}", action.green().bold());
    }

    /// Announce that the step started with `start` completed.
    pub fn finish(&self, what: impl Display) {
        if self.verbose {
            let elapsed = self.timer.elapsed();
            eprintln!("{} {what} ({elapsed:.1?})", "DONE".green().bold());
        } else {
            eprintln!("{} {what}", "DONE".green().bold());
        }
    }

    pub fn verbose_msg(&self, msg: &str) {
        if self.verbose {
            eprintln!("{}", msg);
        }
    }

    pub fn verbose_progress_debug<T: std::fmt::Debug>(&self, msg: &str, arg: T) {
        if self.verbose {
            eprint!("{} {:?}... ", msg.magenta(), arg);
        }
    }

    pub fn done(&self) {
        if self.verbose {
            eprintln!("{}.", "done".green());
        }
    }
}
