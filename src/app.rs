use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use log::{info, warn};

use capres_analyzer::analysis::parse_parameter;
use capres_analyzer::config::AnalysisConfig;
use capres_analyzer::data::loader::list_export_files;
use capres_analyzer::report;
use capres_analyzer::state::Session;

// ---------------------------------------------------------------------------
// Command-line driver
// ---------------------------------------------------------------------------

/// Everything the command line can ask for.
#[derive(Debug, Default)]
pub struct CliOptions {
    pub inputs: Vec<PathBuf>,
    pub dir: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub window: Option<String>,
    pub contact_length: Option<String>,
    /// `(group, label)` pairs for the spacing table.
    pub spacing: Vec<(usize, String)>,
    pub select_all: bool,
    pub output: Option<PathBuf>,
    pub json: bool,
}

pub struct CapresApp {
    pub options: CliOptions,
}

impl CapresApp {
    pub fn new(options: CliOptions) -> Self {
        Self { options }
    }

    /// Explicit files, or every export in `--dir` in name order.
    fn input_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = self.options.inputs.clone();
        if let Some(dir) = &self.options.dir {
            files.extend(list_export_files(dir)?);
        }
        if files.is_empty() {
            bail!("no input files (pass <FILE>... or --dir <DIR>)");
        }
        Ok(files)
    }

    fn load_session(&self) -> Result<Session> {
        let mut files = self.input_files()?;
        let session = if files.len() == 1 {
            let path = files.remove(0);
            Session::load_single(path)?
        } else {
            Session::load_multi(files)?
        };
        info!(
            "loaded {} curves from {} file(s)",
            session.curves().len(),
            session.sources.len()
        );
        Ok(session)
    }

    fn apply_overrides(&self, session: &mut Session) -> Result<()> {
        if let Some(path) = &self.options.config {
            AnalysisConfig::load(path)?.apply(session);
        }
        if let Some(text) = &self.options.window {
            session.parameters.zero_bias_window = parse_parameter(text);
            if session.parameters.zero_bias_window.is_none() {
                warn!("--window {text:?} is not a number; zero-bias resistance unavailable");
            }
        }
        if let Some(text) = &self.options.contact_length {
            session.parameters.contact_length = parse_parameter(text);
            if session.parameters.contact_length.is_none() {
                warn!("--contact-length {text:?} is not a number; model fits unavailable");
            }
        }
        for (group, label) in &self.options.spacing {
            if !session.spacing_table.set(*group, label) {
                bail!("--spacing group {group} out of range (1-9)");
            }
        }
        if self.options.select_all {
            session.select_all();
        }
        Ok(())
    }

    pub fn run(&self) -> Result<()> {
        let mut session = self.load_session()?;
        self.apply_overrides(&mut session)?;

        let analysis = session.analyze();
        if self.options.json {
            println!("{}", report::to_json(&analysis)?);
        } else {
            print!("{}", report::sweep_table(session.curves(), &session.rows));
            println!();
            print!("{}", report::r0_list(&analysis.points));
            println!();
            println!("{}", report::spacing_fit_line(&analysis));
            for line in report::summary_lines(&analysis) {
                println!("{line}");
            }
        }

        if let Some(dir) = &self.options.output {
            let written = report::write_outputs(dir, &session.display(), &analysis)
                .with_context(|| format!("exporting to {}", dir.display()))?;
            for path in written {
                eprintln!("wrote {}", path.display());
            }
        }
        Ok(())
    }
}
