use clap::*;
use rnaec::libs::features::{read_matrix_tsv, write_pairs_tsv};
use rnaec::libs::pairs::{extract, PairFilter};

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("top")
        .about("Ranks the pairs of a coupling matrix")
        .after_help(
            r###"
Reads a square TSV matrix (as written by `rnaec mi --matrix`) and prints the
highest-scoring pairs of its upper triangle as `i<TAB>j<TAB>score`.

Notes:
* Supports both plain text and gzipped (.gz) files
* Reads from stdin if input file is 'stdin'
* Ties keep row-major order
* Only positive scores are reported unless --all is given

Examples:
1. Top 100 pairs:
   rnaec top tests/msa/matrix.tsv

2. Top 3 pairs, zeros included:
   rnaec top tests/msa/matrix.tsv -k 3 --all

"###,
        )
        .arg(
            Arg::new("infile")
                .required(true)
                .num_args(1)
                .index(1)
                .help("Input TSV matrix"),
        )
        .arg(
            Arg::new("top")
                .short('k')
                .long("top")
                .value_parser(value_parser!(usize))
                .num_args(1)
                .default_value("100")
                .help("Number of pairs to report"),
        )
        .arg(
            Arg::new("all")
                .long("all")
                .action(ArgAction::SetTrue)
                .help("Rank every pair, not only positive ones"),
        )
        .arg(
            Arg::new("outfile")
                .long("outfile")
                .short('o')
                .num_args(1)
                .default_value("stdout")
                .help("Output filename. [stdout] for screen"),
        )
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    let k = *args.get_one::<usize>("top").unwrap();
    let filter = if args.get_flag("all") {
        PairFilter::All
    } else {
        PairFilter::Positive
    };

    let reader = rnaec::reader(args.get_one::<String>("infile").unwrap())?;
    let matrix = read_matrix_tsv(reader)?;
    let pairs = extract(&matrix, k, filter);

    let mut writer = rnaec::writer(args.get_one::<String>("outfile").unwrap())?;
    write_pairs_tsv(&mut writer, &pairs)?;

    Ok(())
}
