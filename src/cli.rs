use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "pinfix",
    about = "Upgrade pinned Python packages and repair the dependency conflicts the upgrade introduces",
    version,
    long_about = None
)]
pub struct Cli {
    /// Target pins, e.g. 'cryptography==42.0.8 Flask==3.0.2'.
    /// Several pins may share one quoted argument.
    #[arg(value_name = "PIN", required = true)]
    pub pins: Vec<String>,

    /// Keep the provided versions even when a requirement manifest pins
    /// a newer one.
    #[arg(long)]
    pub skip_max_version_check: bool,

    /// YAML file listing the requirement and task manifests to consult.
    #[arg(long, default_value = "files_config.yml", value_name = "FILE")]
    pub config: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pins_and_flags() {
        let cli = Cli::parse_from([
            "pinfix",
            "cryptography==42.0.8 Flask==3.0.2",
            "--skip-max-version-check",
        ]);
        assert_eq!(cli.pins, vec!["cryptography==42.0.8 Flask==3.0.2"]);
        assert!(cli.skip_max_version_check);
        assert_eq!(cli.config, PathBuf::from("files_config.yml"));
    }

    #[test]
    fn pins_are_required() {
        assert!(Cli::try_parse_from(["pinfix"]).is_err());
    }

    #[test]
    fn unknown_flags_are_rejected() {
        assert!(Cli::try_parse_from(["pinfix", "a==1.0", "--bogus"]).is_err());
    }
}
