use crate::logging::{LogFormat, LoggingConfig, DEFAULT_FILTER};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "schoold", about = "School records sidecar (line-delimited JSON over stdio)", version)]
pub struct CliArgs {
    #[arg(
        long,
        env = "SCHOOLD_WORKSPACE",
        value_name = "DIR",
        help = "Workspace directory to open at startup"
    )]
    pub workspace: Option<PathBuf>,

    #[arg(
        long,
        env = "SCHOOLD_LOG_FORMAT",
        value_enum,
        value_name = "FORMAT",
        default_value_t = LogFormat::Pretty,
        help = "Log format written to stderr"
    )]
    pub log_format: LogFormat,

    #[arg(
        long,
        env = "SCHOOLD_LOG",
        value_name = "FILTER",
        default_value = DEFAULT_FILTER,
        help = "Log filter directives (tracing EnvFilter syntax)"
    )]
    pub log_filter: String,
}

impl CliArgs {
    pub fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            format: self.log_format,
            filter: self.log_filter.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let args = CliArgs::parse_from([
            "schoold",
            "--workspace",
            "/tmp/ws",
            "--log-format",
            "json",
            "--log-filter",
            "schoold=debug",
        ]);
        assert_eq!(args.workspace, Some(PathBuf::from("/tmp/ws")));
        let logging = args.logging();
        assert_eq!(logging.format, LogFormat::Json);
        assert_eq!(logging.filter, "schoold=debug");
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        let parsed = CliArgs::try_parse_from(["schoold", "--log-format", "xml"]);
        assert!(parsed.is_err());
    }
}
