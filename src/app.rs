use std::fmt::Write;
use std::path::Path;

use anyhow::{Context, Result};

use catalog::{Catalog, Implementation, PythonEnv, RunnerConfig, RunnerRef};
use resolve::Resolver;

use crate::exec::{Shell, SystemShell};
use crate::runners::Runner;
use crate::settings::{Action, Environment, Settings};
use crate::ui::Ui;

/// This struct actually runs the command-line app.
pub struct App {
    /// Interpreted command line settings
    settings: Settings,
    /// Process environment captured at startup
    env: Environment,
    /// Where external commands are sent
    shell: Box<dyn Shell>,
    /// User interface
    ui: Ui,
}

impl App {
    /// Create a new `App` that runs external commands as real subprocesses.
    pub fn new(settings: Settings, env: Environment) -> Self {
        let shell = Box::new(SystemShell::new(settings.verbose > 0));
        Self::with_shell(settings, env, shell)
    }

    /// Create a new `App` that sends external commands to `shell`.
    pub fn with_shell(settings: Settings, env: Environment, shell: Box<dyn Shell>) -> Self {
        let ui = Ui::new(&settings);
        Self {
            settings,
            env,
            shell,
            ui,
        }
    }

    /// Run the app, using settings to determine which action to take.
    pub fn run(mut self) -> Result<()> {
        for (name, _) in self.settings.ignored_overrides() {
            log::warn!("parameter override \"{name}\" is only used by 'run'; ignoring it");
        }

        let catalog = self.load_catalog()?;
        match self.settings.action {
            Action::Describe => {
                let workspace = self.resolver(&catalog).workspace().to_path_buf();
                print!("{}", describe(&catalog, &workspace));
                Ok(())
            }
            Action::Configure => self.configure(&catalog),
            Action::Run => self.run_task(&catalog),
        }
    }

    fn load_catalog(&self) -> Result<Catalog> {
        let box_dir = self.env.cwd.join(&self.settings.box_dir);
        self.ui.verbose_progress_debug("Loading box", &box_dir);
        let catalog = Catalog::load(&box_dir)
            .with_context(|| format!("while loading box {:?}", self.settings.box_dir))?;
        self.ui.done();
        Ok(catalog)
    }

    fn resolver<'a>(&self, catalog: &'a Catalog) -> Resolver<'a> {
        Resolver::new(catalog, self.settings.workspace.as_deref(), &self.env.cwd)
    }

    /// Runner named on the command line, or the one matching the box's implementation.
    fn runner(&self, catalog: &Catalog) -> Result<Runner> {
        let config = match &self.settings.runner {
            Some(runner_ref) => {
                let runner_ref = RunnerRef {
                    file: self.env.cwd.join(&runner_ref.file),
                    name: runner_ref.name.clone(),
                };
                let (name, config) = RunnerConfig::load(&runner_ref).with_context(|| {
                    format!("while loading runner configuration {:?}", runner_ref.file)
                })?;
                self.ui.verbose_msg(&format!("Using runner \"{name}\" ({})", config.tag()));
                config
            }
            None => RunnerConfig::for_implementation(&catalog.implementation),
        };
        Ok(Runner::create(catalog, &config, &self.env)?)
    }
}

// CONFIGURE ////////////////
impl App {
    fn configure(&mut self, catalog: &Catalog) -> Result<()> {
        let mut runner = self.runner(catalog)?;

        self.ui.start("CONFIGURE", &catalog.name);
        runner
            .configure(self.shell.as_mut())
            .with_context(|| format!("while configuring box \"{}\"", catalog.name))?;
        self.ui.finish(&catalog.name);
        Ok(())
    }
}

// RUN //////////////////////
impl App {
    fn run_task(&mut self, catalog: &Catalog) -> Result<()> {
        let invocation = self.settings.invocation()?;

        // resolve everything before anything is spawned:
        let args = self
            .resolver(catalog)
            .resolve(&invocation)
            .with_context(|| format!("while resolving parameters for task \"{}\"", invocation.task))?;
        for arg in &args {
            log::info!("{} {} = {:?}", arg.direction, arg.name, arg.path);
        }

        let mut runner = self.runner(catalog)?;

        let target = format!("{}/{}", invocation.task, invocation.profile);
        self.ui.start("RUN", &target);
        let status = runner.execute(self.shell.as_mut(), &invocation, &args)?;
        log::debug!("task \"{}\" finished with {status}", invocation.task);
        self.ui.finish(&target);
        Ok(())
    }
}

// DESCRIBE /////////////////

/// Human-readable summary of a box.
pub fn describe(catalog: &Catalog, workspace: &Path) -> String {
    let mut out = String::with_capacity(512);
    // writing to a String can't fail:
    let _ = write_description(&mut out, catalog, workspace);
    out
}

fn write_description(out: &mut String, catalog: &Catalog, workspace: &Path) -> std::fmt::Result {
    let layout = &catalog.layout;
    writeln!(out, "Box: {}", catalog.name)?;
    writeln!(out, "  path: {}", layout.root().display())?;
    writeln!(out, "  workspace: {}", workspace.display())?;
    if layout.readme_file().is_file() {
        writeln!(out, "  readme: {}", layout.readme_file().display())?;
    }
    write!(out, "  implementation: {}", catalog.implementation.type_name())?;
    match &catalog.implementation {
        Implementation::Docker(d) => {
            writeln!(out, " (image {}, configure by {:?})", d.image, d.configure)?
        }
        Implementation::Singularity(s) => writeln!(out, " (image {})", s.image.display())?,
        Implementation::Python(p) => {
            let env = match &p.env {
                PythonEnv::System { interpreter } => format!("system {interpreter}"),
                PythonEnv::Virtualenv(v) => format!("virtualenv {}", v.location.display()),
                PythonEnv::Conda(c) => format!("conda env {}", c.name),
            };
            writeln!(out, " (entrypoint {}, {env})", p.entrypoint.display())?
        }
        Implementation::Exec(e) => writeln!(out, " ({} run steps)", e.run.len())?,
    };

    writeln!(out, "Tasks:")?;
    for task in catalog.tasks() {
        writeln!(out, "  {}", task.name)?;
        for (direction, param) in task.params() {
            writeln!(out, "    {direction} {}: {}", param.name, param.description)?;
        }
        let profiles: Vec<&str> = task.profiles().iter().map(|p| p.name.as_str()).collect();
        if profiles.is_empty() {
            writeln!(out, "    profiles: (none)")?;
        } else {
            writeln!(out, "    profiles: {}", profiles.join(", "))?;
        }
    }
    Ok(())
}
