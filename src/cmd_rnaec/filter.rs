use super::args;
use clap::*;
use rnaec::libs::config::MiConfig;
use rnaec::libs::msa::{load_path, LoadOptions};
use rnaec::libs::pipeline::Pipeline;
use std::io::Write;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    let cmd = Command::new("filter")
        .about("Filters an alignment and reports sequence weights")
        .after_help(
            r###"
Removes gappy sequences and columns, weighs the remaining sequences by
redundancy and keeps the most unique ones.

The output is FASTA, most unique sequence first. Each header carries the
normalised weight:

    >name weight=0.125000

Notes:
* Supports both plain text and gzipped (.gz) files
* Reads from stdin if input file is 'stdin'
* Weights sum to 1

Examples:
1. Filter with default thresholds:
   rnaec filter tests/msa/gappy.fa

2. Stricter gap filtering, keep at most 100 sequences:
   rnaec filter tests/msa/gappy.fa --gap-threshold 0.2 --max-sequences 100

"###,
        )
        .arg(
            Arg::new("infile")
                .required(true)
                .num_args(1)
                .index(1)
                .help("Input FASTA alignment"),
        )
        .arg(
            Arg::new("outfile")
                .long("outfile")
                .short('o')
                .num_args(1)
                .default_value("stdout")
                .help("Output filename. [stdout] for screen"),
        );

    args::filter_args(cmd)
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let infile = args.get_one::<String>("infile").unwrap();
    let config = args::apply_filter_args(args, MiConfig::default());
    let opt = LoadOptions {
        max_sequences: config.max_input,
        timeout: config.timeout,
    };

    //----------------------------
    // Ops
    //----------------------------
    let pipeline = Pipeline::new(config)?;
    let (aln, report) = load_path(infile, &opt)?;
    if report.length_mismatch > 0 {
        log::warn!(
            "{}: dropped {} sequences with a different length",
            infile,
            report.length_mismatch
        );
    }
    let filtered = pipeline.filter(&aln)?;

    //----------------------------
    // Output
    //----------------------------
    let mut writer = rnaec::writer(args.get_one::<String>("outfile").unwrap())?;
    let names = filtered.alignment.names();
    for (idx, seq) in filtered.alignment.seqs().iter().enumerate() {
        writer.write_fmt(format_args!(
            ">{} weight={:.6}\n{}\n",
            names[idx],
            filtered.weights[idx],
            String::from_utf8_lossy(seq)
        ))?;
    }

    Ok(())
}
