use clap::Parser;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "The DRUDE++ Developers",
    version,
    about = "DRUDE++ CLI - Adds Drude induced-dipole particles to a molecular topology and its force-field description.",
    help_template = HELP_TEMPLATE,
)]
pub struct Cli {
    /// Polarizability parameter file [default: alpha.ff]
    #[arg(short = 'a', long, value_name = "PATH")]
    pub alpha: Option<PathBuf>,

    /// Radius of the random displacement given to each fresh Drude
    /// particle, in length units [default: 0.02]
    #[arg(short = 'd', long, value_name = "FLOAT")]
    pub jitter: Option<f64>,

    /// Input force-field XML file [default: field.xml]
    #[arg(short = 'f', long = "field", value_name = "PATH")]
    pub field_in: Option<PathBuf>,

    /// Output force-field XML file [default: field-p.xml]
    #[arg(long = "out-field", value_name = "PATH")]
    pub field_out: Option<PathBuf>,

    /// Input topology file, .pdb or .cif [default: config.pdb]
    #[arg(short = 'i', long = "input", value_name = "PATH")]
    pub topology_in: Option<PathBuf>,

    /// Output topology file [default: config-p.pdb]
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    pub topology_out: Option<PathBuf>,

    /// Simulation driver script to retarget at the polarized outputs
    #[arg(short = 's', long, value_name = "PATH")]
    pub script: Option<PathBuf>,

    /// Configuration file supplying the same defaults in TOML form
    #[arg(short = 'c', long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_defaults_as_absent() {
        let cli = Cli::parse_from(["drude"]);
        assert!(cli.alpha.is_none());
        assert!(cli.jitter.is_none());
        assert!(cli.script.is_none());
        assert_eq!(cli.verbose, 0);
        assert!(!cli.quiet);
    }

    #[test]
    fn parses_explicit_flags() {
        let cli = Cli::parse_from([
            "drude",
            "-a",
            "my-alpha.ff",
            "-d",
            "0.05",
            "-f",
            "in.xml",
            "--out-field",
            "out.xml",
            "-i",
            "box.cif",
            "-o",
            "box-p.cif",
            "-vv",
        ]);
        assert_eq!(cli.alpha, Some(PathBuf::from("my-alpha.ff")));
        assert_eq!(cli.jitter, Some(0.05));
        assert_eq!(cli.field_in, Some(PathBuf::from("in.xml")));
        assert_eq!(cli.field_out, Some(PathBuf::from("out.xml")));
        assert_eq!(cli.topology_in, Some(PathBuf::from("box.cif")));
        assert_eq!(cli.topology_out, Some(PathBuf::from("box-p.cif")));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["drude", "-q", "-v"]).is_err());
    }
}
