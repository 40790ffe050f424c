extern crate clap;
use clap::*;

mod cmd_rnaec;

fn main() -> anyhow::Result<()> {
    let app = Command::new("rnaec")
        .version(crate_version!())
        .author(crate_authors!())
        .about("`rnaec` - RNA Evolutionary Coupling")
        .propagate_version(true)
        .arg_required_else_help(true)
        .color(ColorChoice::Auto)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .action(ArgAction::Count)
                .global(true)
                .help("Increase log verbosity (-v info, -vv debug)"),
        )
        .subcommand(cmd_rnaec::mi::make_subcommand())
        .subcommand(cmd_rnaec::filter::make_subcommand())
        .subcommand(cmd_rnaec::batch::make_subcommand())
        .subcommand(cmd_rnaec::top::make_subcommand())
        .after_help(
            r###"Subcommand groups:

* Features:
    * mi    - Coupling features of one alignment
    * batch - Coupling features of many alignments

* Helpers:
    * filter - Gap filtering and sequence weights
    * top    - Rank the pairs of a coupling matrix

Logging goes to stderr; RUST_LOG overrides -v.

"###,
        );

    let matches = app.get_matches();

    env_logger::Builder::new()
        .filter_level(match matches.get_count("verbose") {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .parse_default_env()
        .format_timestamp(None)
        .format_target(false)
        .init();

    // Check which subcommand the user ran...
    match matches.subcommand() {
        Some(("mi", sub_matches)) => cmd_rnaec::mi::execute(sub_matches),
        Some(("filter", sub_matches)) => cmd_rnaec::filter::execute(sub_matches),
        Some(("batch", sub_matches)) => cmd_rnaec::batch::execute(sub_matches),
        Some(("top", sub_matches)) => cmd_rnaec::top::execute(sub_matches),
        _ => unreachable!(),
    }?;

    Ok(())
}
