//! Migrate command - one run from a parameter source to a result sink

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Args;
use reseed_core::{Config, Error, GitCli, MigrationOptions, MigrationResult, Migrator, RequestParams};

/// Exit code for unreadable input or configuration
const EXIT_INPUT_ERROR: u8 = 1;

/// Exit code for a failed migration step with `--fail-on-error`
const EXIT_STEP_FAILURE: u8 = 2;

/// Arguments for a migration run
#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// JSON parameter file; parameters are read from stdin when omitted
    #[arg(long, value_name = "PATH")]
    pub params_file: Option<PathBuf>,

    /// Pull and rebase onto the destination branch before pushing
    /// (overrides config and env; a request field overrides this)
    #[arg(long, value_name = "BOOL")]
    pub sync_before_push: Option<bool>,

    /// Exit with status 2 when a migration step fails
    #[arg(long)]
    pub fail_on_error: bool,
}

/// Where parameters come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamSource {
    File(PathBuf),
    Stdin,
}

impl ParamSource {
    fn read(&self) -> reseed_core::Result<String> {
        match self {
            ParamSource::File(path) => std::fs::read_to_string(path).map_err(|e| {
                Error::InputParse(format!("{}: {}", path.display(), e))
            }),
            ParamSource::Stdin => {
                let mut input = String::new();
                std::io::stdin()
                    .read_to_string(&mut input)
                    .map_err(|e| Error::InputParse(format!("stdin: {}", e)))?;
                Ok(input)
            }
        }
    }

    /// Sibling file the result is also written to, if any
    fn result_file(&self) -> Option<PathBuf> {
        match self {
            ParamSource::File(path) => Some(result_path_for(path)),
            ParamSource::Stdin => None,
        }
    }
}

impl MigrateArgs {
    fn source(&self) -> ParamSource {
        match self.params_file {
            Some(ref path) => ParamSource::File(path.clone()),
            None => ParamSource::Stdin,
        }
    }

    /// Execute the migration
    pub fn execute(&self, config: &Config) -> anyhow::Result<ExitCode> {
        let source = self.source();
        tracing::debug!(source = ?source, "Reading parameters");

        let params = match source.read().and_then(|input| RequestParams::from_json(&input)) {
            Ok(params) => params,
            Err(e) => return boundary_failure(&e),
        };

        let migrator = Migrator::new(GitCli::from_config(&config.git), MigrationOptions::from(config));
        let result = migrator.run_params(params);

        write_stdout(&result)?;

        if let Some(path) = source.result_file() {
            match write_result_file(&path, &result) {
                Ok(()) => tracing::info!("Results written to: {}", path.display()),
                Err(e) => tracing::warn!("Unable to write results to {}: {}", path.display(), e),
            }
        }

        if !result.is_success() && self.fail_on_error {
            return Ok(ExitCode::from(EXIT_STEP_FAILURE));
        }
        Ok(ExitCode::SUCCESS)
    }
}

/// Report an error that happened before any repository work
pub fn boundary_failure(error: &Error) -> anyhow::Result<ExitCode> {
    tracing::error!("{}", error);
    write_stdout(&MigrationResult::failure(error.to_string()))?;
    Ok(ExitCode::from(EXIT_INPUT_ERROR))
}

fn write_stdout(result: &MigrationResult) -> anyhow::Result<()> {
    let json = result.to_json()?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", json)?;
    stdout.flush()?;
    Ok(())
}

fn write_result_file(path: &Path, result: &MigrationResult) -> anyhow::Result<()> {
    std::fs::write(path, result.to_json_pretty()?)?;
    Ok(())
}

/// Derive the result file name from a parameter file name
///
/// `job_params.json` becomes `job_result.json`; any other name gets
/// `_result.json` appended to its stem so the input is never overwritten.
pub fn result_path_for(params: &Path) -> PathBuf {
    let name = params
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let result_name = match name.strip_suffix("_params.json") {
        Some(stem) => format!("{}_result.json", stem),
        None => {
            let stem = params
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "reseed".to_string());
            format!("{}_result.json", stem)
        }
    };

    params.with_file_name(result_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_path_params_suffix() {
        assert_eq!(
            result_path_for(Path::new("/tmp/jobs/core_params.json")),
            PathBuf::from("/tmp/jobs/core_result.json")
        );
    }

    #[test]
    fn test_result_path_other_names() {
        assert_eq!(
            result_path_for(Path::new("/tmp/input.json")),
            PathBuf::from("/tmp/input_result.json")
        );
        assert_eq!(
            result_path_for(Path::new("params")),
            PathBuf::from("params_result.json")
        );
    }

    #[test]
    fn test_result_path_never_input() {
        let input = Path::new("/tmp/x_result.json");
        assert_ne!(result_path_for(input), input);
    }

    #[test]
    fn test_source_selection() {
        let args = MigrateArgs {
            params_file: Some(PathBuf::from("/tmp/a_params.json")),
            sync_before_push: None,
            fail_on_error: false,
        };
        assert_eq!(args.source(), ParamSource::File(PathBuf::from("/tmp/a_params.json")));
        assert_eq!(
            args.source().result_file(),
            Some(PathBuf::from("/tmp/a_result.json"))
        );

        let args = MigrateArgs {
            params_file: None,
            sync_before_push: None,
            fail_on_error: false,
        };
        assert_eq!(args.source(), ParamSource::Stdin);
        assert!(args.source().result_file().is_none());
    }

    #[test]
    fn test_missing_file_is_input_error() {
        let source = ParamSource::File(PathBuf::from("/nonexistent/reseed_params.json"));
        assert!(matches!(source.read(), Err(Error::InputParse(_))));
    }
}
