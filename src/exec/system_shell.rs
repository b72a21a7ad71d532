use std::io::{self, stderr, stdout, BufRead, BufReader, Read, Write};
use std::process::Stdio;
use std::thread;

use anyhow::{Context, Result};
use colored::Colorize;

use super::{Captured, CommandLine, Error, ExitStatus, Shell, NOT_FOUND};

/// `Shell` that spawns real subprocesses and blocks until they exit.
#[derive(Debug, Default)]
pub struct SystemShell {
    verbose: bool,
}

impl SystemShell {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl Shell for SystemShell {
    /// Based on:
    /// <https://stackoverflow.com/questions/66060139/how-to-tee-stdout-stderr-from-a-subprocess-in-rust>
    fn run(&mut self, cmd: &CommandLine) -> Result<ExitStatus> {
        log::info!("running: {cmd}");
        if self.verbose {
            eprintln!("{} {cmd}", "Running command".magenta());
        }

        let spawned = cmd
            .to_command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => return not_found_or(e, cmd),
        };

        let child_out = child.stdout.take().context("Cannot attach to child stdout")?;
        let child_err = child.stderr.take().context("Cannot attach to child stderr")?;

        let thread_out = thread::spawn(move || communicate(child_out, stdout()));
        let thread_err = thread::spawn(move || communicate(child_err, stderr()));

        thread_out
            .join()
            .expect("Error joining stdout thread")
            .context("error communicating with child stdout")?;
        thread_err
            .join()
            .expect("Error joining stderr thread")
            .context("error communicating with child stderr")?;

        let status: ExitStatus = child
            .wait()
            .with_context(|| format!("failed to wait on child process: {cmd}"))?
            .into();

        if self.verbose {
            eprintln!("{} with {status}.", "Process finished".green());
        }
        Ok(status)
    }

    fn capture(&mut self, cmd: &CommandLine) -> Result<Captured> {
        log::debug!("probing: {cmd}");
        let output = match cmd.to_command().stdin(Stdio::null()).output() {
            Ok(output) => output,
            Err(e) => {
                let status = not_found_or(e, cmd)?;
                return Ok(Captured {
                    status,
                    stdout: String::with_capacity(0),
                });
            }
        };
        Ok(Captured {
            status: output.status.into(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}

/// A missing program is reported the way a shell would report it,
/// so probes can treat it like any other failure.
fn not_found_or(e: io::Error, cmd: &CommandLine) -> Result<ExitStatus> {
    if e.kind() == io::ErrorKind::NotFound {
        log::debug!("program not found: {}", cmd.program);
        Ok(ExitStatus::from_code(NOT_FOUND))
    } else {
        Err(Error::Spawn {
            command: cmd.to_string(),
            source: e,
        }
        .into())
    }
}

/// Copy `stream` to `output` a line at a time, flushing after each line.
fn communicate<R: Read, W: Write>(stream: R, mut output: W) -> io::Result<()> {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::with_capacity(1024);
    loop {
        buf.clear();
        let num_read = reader.read_until(b'\n', &mut buf)?;
        if num_read == 0 {
            break;
        }
        output.write_all(&buf)?;
        output.flush()?;
    }
    Ok(())
}
