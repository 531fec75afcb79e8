use std::path::PathBuf;

use clap::{Arg, ArgAction, Command, value_parser};

use crate::consts::{BIN_NAME, VERSION};

pub const DIR_IN_ARG: &str = "dir_in";
pub const DIR_OUT_ARG: &str = "dir_out";
pub const NAME_ARG: &str = "name";
pub const CONTROL_ARG: &str = "control";
pub const SAMPLES_ARG: &str = "samples";
pub const VCF_ARG: &str = "vcf";
pub const CONFIG_ARG: &str = "config";
pub const THREADS_ARG: &str = "threads";
pub const TIMEOUT_ARG: &str = "timeout";
pub const VERBOSE_ARG: &str = "verbose";
pub const OVERWRITE_ARG: &str = "overwrite";

pub fn create_process_cli() -> Command {
    Command::new(BIN_NAME)
        .bin_name(BIN_NAME)
        .version(VERSION)
        .about("Processes CallableLoci files to generate merged, sorted intersections of sample and control regions, and calculates the surveyed region of the genome. Requires bedtools to be in your PATH.")
        .arg(
            Arg::new(DIR_IN_ARG)
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("The input directory. It should contain a separate folder with the CallableLoci output for each sample"),
        )
        .arg(
            Arg::new(DIR_OUT_ARG)
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("The output directory"),
        )
        .arg(
            Arg::new(NAME_ARG)
                .required(true)
                .help("The name of the experiment"),
        )
        .arg(
            Arg::new(CONTROL_ARG)
                .required(true)
                .help("The name of the control sample"),
        )
        .arg(
            Arg::new(SAMPLES_ARG)
                .long(SAMPLES_ARG)
                .num_args(0..)
                .help("The names of the samples. Normally these are read from the VCF header, but they can also be supplied manually"),
        )
        .arg(
            Arg::new(VCF_ARG)
                .long(VCF_ARG)
                .value_parser(value_parser!(PathBuf))
                .help("The VCF to read sample names from (default: <dir_in>/<name>.filtered_variants.vcf)"),
        )
        .arg(
            Arg::new(CONFIG_ARG)
                .long(CONFIG_ARG)
                .short('c')
                .value_parser(value_parser!(PathBuf))
                .help("TOML file with external tool settings (bedtools path, timeout)"),
        )
        .arg(
            Arg::new(THREADS_ARG)
                .long(THREADS_ARG)
                .short('t')
                .value_parser(value_parser!(usize))
                .default_value("1")
                .help("Number of samples to process in parallel"),
        )
        .arg(
            Arg::new(TIMEOUT_ARG)
                .long(TIMEOUT_ARG)
                .value_parser(value_parser!(u64))
                .help("Timeout in seconds for each external tool invocation (overrides the config file)"),
        )
        .arg(
            Arg::new(VERBOSE_ARG)
                .long(VERBOSE_ARG)
                .short('v')
                .action(ArgAction::SetTrue)
                .help("Print a line for every completed stage"),
        )
        .arg(
            Arg::new(OVERWRITE_ARG)
                .long(OVERWRITE_ARG)
                .action(ArgAction::SetTrue)
                .help("Regenerate every output, even when it already exists"),
        )
}
