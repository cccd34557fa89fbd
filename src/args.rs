use clap::Parser;

/// This is a tabulation program for weighted assembly votes.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The JSON file describing the event: groups and their weights,
    /// questions, choices, procurations and the ballots that were cast.
    /// For more information about the file format, read the documentation.
    #[clap(short, long, value_parser)]
    pub config: String,

    /// (file path) A reference file containing the expected summary of the event in
    /// JSON format. If provided, wvtally will check that the tabulated output
    /// matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary of the event will be
    /// written in JSON format to the given location. Setting this option overrides
    /// the output directory that may be specified in the configuration file.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
