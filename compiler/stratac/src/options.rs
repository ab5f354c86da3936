//! Command-line flags.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const USAGE: &str = "\
Usage: strata [options] [FILE]

Synthesizes a data structure for the queries in FILE (stdin when omitted).

Options:
  -d, --disable-cache   Do not read or write the result cache
  -t, --timeout N       Per-query synthesis timeout in seconds
      --cache-dir DIR   Cache directory (default: $STRATA_CACHE_DIR or <tmp>/strata-cache)
      --text FILE|-     Write the chosen plans as text ('-' for stdout)
      --json FILE|-     Write the chosen plans as JSON ('-' for stdout)
  -h, --help            Show this message

Logging is controlled with RUST_LOG (default: info for strata crates).";

/// Where an emitter writes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Output {
    Stdout,
    File(PathBuf),
}

impl Output {
    fn parse(arg: &str) -> Self {
        if arg == "-" {
            Output::Stdout
        } else {
            Output::File(PathBuf::from(arg))
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Options {
    /// Input file; `None` reads stdin.
    pub file: Option<PathBuf>,
    pub disable_cache: bool,
    pub timeout: Option<Duration>,
    pub cache_dir: Option<PathBuf>,
    pub text: Option<Output>,
    pub json: Option<Output>,
    pub help: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("option {0} needs a value")]
    MissingValue(String),
    #[error("invalid timeout `{0}`: expected a non-negative number of seconds")]
    BadTimeout(String),
    #[error("unknown option {0}")]
    UnknownOption(String),
    #[error("more than one input file: {0}")]
    ExtraFile(String),
}

/// Parse the arguments after the program name.
///
/// With no emitter selected, text goes to stdout.
pub fn parse_args(args: &[String]) -> Result<Options, UsageError> {
    let mut options = Options::default();
    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        let mut value = || {
            i += 1;
            args.get(i).cloned().ok_or_else(|| UsageError::MissingValue(arg.to_string()))
        };
        match arg {
            "-h" | "--help" => options.help = true,
            "-d" | "--disable-cache" => options.disable_cache = true,
            "-t" | "--timeout" => {
                let v = value()?;
                let secs: f64 = v.parse().map_err(|_| UsageError::BadTimeout(v.clone()))?;
                let timeout = Duration::try_from_secs_f64(secs).map_err(|_| UsageError::BadTimeout(v.clone()))?;
                options.timeout = Some(timeout);
            }
            "--cache-dir" => options.cache_dir = Some(PathBuf::from(value()?)),
            "--text" => options.text = Some(Output::parse(&value()?)),
            "--json" => options.json = Some(Output::parse(&value()?)),
            // Explicit stdin.
            "-" => {}
            _ if arg.starts_with('-') => return Err(UsageError::UnknownOption(arg.to_string())),
            _ => {
                if options.file.is_some() {
                    return Err(UsageError::ExtraFile(arg.to_string()));
                }
                options.file = Some(PathBuf::from(arg));
            }
        }
        i += 1;
    }
    if options.text.is_none() && options.json.is_none() {
        options.text = Some(Output::Stdout);
    }
    Ok(options)
}

#[cfg(test)]
mod tests;
