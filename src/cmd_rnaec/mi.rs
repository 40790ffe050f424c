use super::args;
use clap::*;
use rnaec::libs::features::*;
use rnaec::libs::pipeline::Pipeline;
use std::io::Write;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    let cmd = Command::new("mi")
        .about("Computes mutual-information coupling features of an RNA alignment")
        .after_help(
            r###"
Computes APC-corrected mutual information between every pair of alignment
columns and reports the feature bundle as JSON.

Steps:
* Drop sequences, then columns, with more gaps than --gap-threshold
* Weigh sequences by 1/(1 + number of others above --identity-threshold)
* Keep the --max-sequences most unique sequences
* Estimate MI with a pseudocount (adaptive unless --pseudocount is given)
* Average product correction, distance downweighting for |i-j| in 2..=8,
  light Gaussian smoothing
* Alignments longer than --max-length are split into windows of
  --chunk-size columns overlapping by --overlap, and blended back

Notes:
* Supports both plain text and gzipped (.gz) files
* Reads from stdin if input file is 'stdin'
* Positions in the output are 0-based indices of the retained columns
* --profile takes <hardware>,<length>,<quality>:
    * hardware: standard, limited, high
    * length: short, medium, long, very-long
    * quality: high, medium, low
  Explicit flags override the profile

Examples:
1. Features of one alignment:
   rnaec mi tests/msa/coupled.fa

2. Also write the matrix and the top pairs as TSV:
   rnaec mi tests/msa/coupled.fa --matrix coupled.tsv --pairs coupled.pairs.tsv

3. Fixed pseudocount, 4 threads:
   rnaec mi tests/msa/coupled.fa --pseudocount 0.5 --parallel 4

4. Force chunking of a short alignment:
   rnaec mi tests/msa/long.fa --max-length 40 --chunk-size 30 --overlap 10

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
            Arg::new("matrix")
                .long("matrix")
                .num_args(1)
                .help("Also write the coupling matrix as TSV"),
        )
        .arg(
            Arg::new("pairs")
                .long("pairs")
                .num_args(1)
                .help("Also write the top pairs as TSV"),
        )
        .arg(
            Arg::new("compact")
                .long("compact")
                .action(ArgAction::SetTrue)
                .help("Write JSON on a single line"),
        )
        .arg(
            Arg::new("outfile")
                .long("outfile")
                .short('o')
                .num_args(1)
                .default_value("stdout")
                .help("Output filename. [stdout] for screen"),
        );

    args::mi_args(cmd)
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let infile = args.get_one::<String>("infile").unwrap();
    let is_compact = args.get_flag("compact");
    let config = args::mi_config(args)?;

    //----------------------------
    // Ops
    //----------------------------
    let pipeline = Pipeline::new(config)?;
    let features = pipeline.run_path(infile)?;
    log::info!(
        "{}: {} sequences, {} positions, {}",
        infile,
        features.sequence_count,
        features.sequence_length,
        features.method_tag()
    );

    //----------------------------
    // Output
    //----------------------------
    let json = to_json(&features);
    let out_string = if is_compact {
        serde_json::to_string(&json)?
    } else {
        serde_json::to_string_pretty(&json)?
    };
    let mut writer = rnaec::writer(args.get_one::<String>("outfile").unwrap())?;
    writer.write_fmt(format_args!("{}\n", out_string))?;

    if let Some(path) = args.get_one::<String>("matrix") {
        let mut writer = rnaec::writer(path)?;
        write_matrix_tsv(&mut writer, &features.coupling_matrix)?;
    }
    if let Some(path) = args.get_one::<String>("pairs") {
        let mut writer = rnaec::writer(path)?;
        write_pairs_tsv(&mut writer, &features.top_pairs)?;
    }

    Ok(())
}
