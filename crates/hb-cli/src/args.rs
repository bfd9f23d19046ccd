//! Command-line argument parsing.
//!
//! Raw flags map one-to-one onto [`Options`] fields; validation beyond
//! parsing (required roots, command tokenization, path absolutization)
//! lives in [`Options::build`] so diagnostics are consistent however the
//! options are constructed.

use camino::Utf8PathBuf;
use clap::Parser;

use hb_core::{ConfigError, Options};

/// Mirror watched source trees into an output directory and keep child
/// commands alive across changes.
#[derive(Parser, Debug)]
#[command(name = "harbor", version)]
pub struct Args {
    /// Source root path to watch (repeatable, at least one required)
    #[arg(short = 'w', long = "watch", value_name = "DIR")]
    pub watch: Vec<Utf8PathBuf>,

    /// Output root; wiped and recreated at startup
    #[arg(short = 'o', long = "output", value_name = "DIR")]
    pub output: Option<Utf8PathBuf>,

    /// Glob selecting files to pass through the transformer (repeatable)
    #[arg(short = 't', long = "transform", value_name = "GLOB")]
    pub transform: Vec<String>,

    /// Transformer hook command, run per gated file as
    /// `CMD <input> <output>` with file contents on stdin
    #[arg(short = 'u', long = "using", value_name = "CMD")]
    pub using: Option<String>,

    /// Command to run as a fork-style child with an IPC channel (repeatable)
    #[arg(short = 'f', long = "fork", value_name = "CMD")]
    pub fork: Vec<String>,

    /// Command to run as a spawn-style child (repeatable)
    #[arg(short = 's', long = "spawn", value_name = "CMD")]
    pub spawn: Vec<String>,

    /// Cleanup hook command, run as `CMD <command> <kind> <signal>`
    #[arg(short = 'c', long = "cleanup", value_name = "CMD")]
    pub cleanup: Option<String>,

    /// TCP port to kill on final shutdown (repeatable)
    #[arg(short = 'k', long = "kill", value_name = "PORT")]
    pub kill: Vec<u16>,

    /// Force-kill deadline in milliseconds
    #[arg(long = "wait", value_name = "MS", default_value_t = 3000)]
    pub wait: u64,

    /// Enable verbose vendor-path logging
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,
}

impl Args {
    /// Validates the raw flags into [`Options`].
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for missing roots, a missing output,
    /// nonexistent watch directories, or empty command strings.
    pub fn into_options(self) -> Result<Options, ConfigError> {
        Options::build(
            self.watch,
            self.output,
            self.transform,
            self.using,
            self.fork,
            self.spawn,
            self.cleanup,
            self.kill,
            self.wait,
            self.debug,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).expect("args should parse")
    }

    #[test]
    fn test_minimal_flags() {
        let args = parse(&["harbor", "-w", "src", "-o", "out"]);
        assert_eq!(args.watch, vec![Utf8PathBuf::from("src")]);
        assert_eq!(args.output, Some(Utf8PathBuf::from("out")));
        assert_eq!(args.wait, 3000);
        assert!(!args.debug);
    }

    #[test]
    fn test_repeatable_flags() {
        let args = parse(&[
            "harbor", "-w", "src", "-w", "lib", "-o", "out", "-t", "src/**/*.js", "-t",
            "lib/**/*.js", "-f", "node a.js", "-f", "node b.js", "-s", "python svc.py", "-k",
            "3000", "-k", "3001",
        ]);
        assert_eq!(args.watch.len(), 2);
        assert_eq!(args.transform.len(), 2);
        assert_eq!(args.fork, vec!["node a.js", "node b.js"]);
        assert_eq!(args.spawn, vec!["python svc.py"]);
        assert_eq!(args.kill, vec![3000, 3001]);
    }

    #[test]
    fn test_long_flags() {
        let args = parse(&[
            "harbor",
            "--watch",
            "src",
            "--output",
            "out",
            "--using",
            "upcase.sh",
            "--transform",
            "src/**/*.js",
            "--cleanup",
            "cleanup.sh",
            "--wait",
            "100",
            "--debug",
        ]);
        assert_eq!(args.using.as_deref(), Some("upcase.sh"));
        assert_eq!(args.cleanup.as_deref(), Some("cleanup.sh"));
        assert_eq!(args.wait, 100);
        assert!(args.debug);
    }

    #[test]
    fn test_invalid_port_rejected() {
        assert!(Args::try_parse_from(["harbor", "-w", "src", "-o", "out", "-k", "notaport"])
            .is_err());
    }

    #[test]
    fn test_missing_watch_fails_validation() {
        let args = parse(&["harbor", "-o", "out"]);
        let err = args.into_options().unwrap_err();
        assert!(matches!(err, ConfigError::MissingWatch));
    }

    #[test]
    fn test_missing_output_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap().to_owned();
        let args = parse(&["harbor", "-w", &root]);
        let err = args.into_options().unwrap_err();
        assert!(matches!(err, ConfigError::MissingOutput));
    }

    #[test]
    fn test_into_options_tokenizes_commands() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap().to_owned();
        let args = parse(&[
            "harbor", "-w", &root, "-o", "out", "-f", "node svr.js --port 3000",
        ]);
        let options = args.into_options().unwrap();
        assert_eq!(options.forks[0].program, "node");
        assert_eq!(options.forks[0].args, vec!["svr.js", "--port", "3000"]);
    }
}
