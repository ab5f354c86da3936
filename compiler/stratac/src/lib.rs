//! Strata command-line front end.
//!
//! Reads an input file, parses it with [`syntax::parse`], runs the
//! [`Synthesizer`] and writes the chosen plans with the emitters in
//! [`emit`].

pub mod emit;
pub mod options;
pub mod syntax;
mod tracing_setup;

use std::io::{IsTerminal as _, Write as _};
use std::path::{Path, PathBuf};

use strata_arrays::ArrayExtension;
use strata_synth::{
    CostModelError, FsPlanCache, QueryResult, Specification, SynthConfig, Synthesizer, WeightedCostModel,
};
use thiserror::Error;

pub use options::{parse_args, Options, Output, UsageError, USAGE};
pub use tracing_setup::init_tracing;

/// Fatal errors; the process exits with status 1.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Already rendered with the offending source.
    #[error("{0}")]
    Parse(String),
    #[error("cannot locate cost model {}: input was read from stdin", .0.display())]
    CostModelFromStdin(PathBuf),
    #[error(transparent)]
    CostModel(#[from] CostModelError),
    #[error("cannot encode JSON output: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parse `input` and synthesize every query in it.
///
/// `path` is where `input` came from, `None` for stdin; a `costmodel`
/// reference is resolved relative to its directory.
pub fn synthesize(
    input: &str,
    path: Option<&Path>,
    options: &Options,
) -> Result<(Specification, Vec<QueryResult>), CliError> {
    let name = path.map_or_else(|| "<stdin>".to_string(), |p| p.display().to_string());
    let color = std::io::stderr().is_terminal();
    let spec = syntax::parse(input).map_err(|e| CliError::Parse(e.report(&name, input, color)))?;

    let cost_model = match (&spec.cost_model, path) {
        (None, _) => None,
        (Some(file), None) => return Err(CliError::CostModelFromStdin(file.clone())),
        (Some(file), Some(path)) => {
            let resolved = path.parent().unwrap_or_else(|| Path::new("")).join(file);
            tracing::info!(path = %resolved.display(), "using cost model");
            Some(WeightedCostModel::load(&resolved)?)
        }
    };

    let config = SynthConfig {
        timeout: options.timeout,
        cache_enabled: !options.disable_cache,
        cache_dir: options.cache_dir.clone().unwrap_or_else(FsPlanCache::default_dir),
        ..SynthConfig::default()
    };
    let registry = ArrayExtension::registry();
    let mut synth = Synthesizer::new(config, &registry);
    if let Some(model) = cost_model {
        synth = synth.with_cost_model(model);
    }
    let results = synth.run(input, &spec);
    Ok((spec, results))
}

/// Read the input, synthesize, and write every selected emitter's output.
pub fn run(options: &Options) -> Result<(), CliError> {
    let input = match &options.file {
        Some(path) => std::fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.clone(),
            source,
        })?,
        None => std::io::read_to_string(std::io::stdin()).map_err(|source| CliError::Read {
            path: PathBuf::from("<stdin>"),
            source,
        })?,
    };
    let (spec, results) = synthesize(&input, options.file.as_deref(), options)?;

    if let Some(out) = &options.text {
        write_output(out, &emit::text(&spec, &results))?;
    }
    if let Some(out) = &options.json {
        write_output(out, &emit::json(&spec, &results)?)?;
    }
    Ok(())
}

fn write_output(out: &Output, contents: &str) -> Result<(), CliError> {
    match out {
        Output::Stdout => std::io::stdout()
            .lock()
            .write_all(contents.as_bytes())
            .map_err(|source| CliError::Write {
                path: PathBuf::from("<stdout>"),
                source,
            }),
        Output::File(path) => std::fs::write(path, contents).map_err(|source| CliError::Write {
            path: path.clone(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests;
