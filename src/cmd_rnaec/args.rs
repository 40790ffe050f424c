use clap::*;
use rnaec::libs::config::*;
use rnaec::libs::mi::Weighting;
use std::time::Duration;

/// Gap, identity and execution options shared by every alignment command.
pub fn filter_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("gap_threshold")
            .long("gap-threshold")
            .value_parser(value_parser!(f64))
            .num_args(1)
            .help("Maximum gap fraction of a sequence or a column [default: 0.5]"),
    )
    .arg(
        Arg::new("identity_threshold")
            .long("identity-threshold")
            .value_parser(value_parser!(f64))
            .num_args(1)
            .help("Identity above which two sequences are redundant [default: 0.8]"),
    )
    .arg(
        Arg::new("max_sequences")
            .long("max-sequences")
            .value_parser(value_parser!(usize))
            .num_args(1)
            .help("Sequences kept after weighting [default: 5000]"),
    )
    .arg(
        Arg::new("max_input")
            .long("max-input")
            .value_parser(value_parser!(usize))
            .num_args(1)
            .help("Records read from the input at most [default: 10000]"),
    )
    .arg(
        Arg::new("batch_size")
            .long("batch-size")
            .value_parser(value_parser!(usize))
            .num_args(1)
            .help("Sequences per identity-weighting batch [default: 500]"),
    )
    .arg(
        Arg::new("timeout")
            .long("timeout")
            .value_parser(value_parser!(f64))
            .num_args(1)
            .help("Seconds allowed for one alignment, reading included"),
    )
    .arg(
        Arg::new("parallel")
            .long("parallel")
            .short('p')
            .value_parser(value_parser!(usize))
            .num_args(1)
            .help("Number of threads [default: cores - 1]"),
    )
}

/// Estimation and chunking options, on top of [`filter_args`].
pub fn mi_args(cmd: Command) -> Command {
    filter_args(cmd)
        .arg(
            Arg::new("profile")
                .long("profile")
                .num_args(1)
                .help("Start from a preset: <hardware>,<length>,<quality>"),
        )
        .arg(
            Arg::new("max_length")
                .long("max-length")
                .value_parser(value_parser!(usize))
                .num_args(1)
                .help("Longest alignment processed without chunking [default: 750]"),
        )
        .arg(
            Arg::new("chunk_size")
                .long("chunk-size")
                .value_parser(value_parser!(usize))
                .num_args(1)
                .help("Window width for long alignments [default: 600]"),
        )
        .arg(
            Arg::new("overlap")
                .long("overlap")
                .value_parser(value_parser!(usize))
                .num_args(1)
                .help("Columns shared by consecutive windows [default: 200]"),
        )
        .arg(
            Arg::new("pseudocount")
                .long("pseudocount")
                .value_parser(value_parser!(f64))
                .num_args(1)
                .help("Fixed pseudocount; adaptive when omitted"),
        )
        .arg(
            Arg::new("uniform")
                .long("uniform")
                .action(ArgAction::SetTrue)
                .help("Weigh every sequence equally when counting"),
        )
        .arg(
            Arg::new("conservation_min")
                .long("conservation-min")
                .value_parser(value_parser!(f64))
                .num_args(1)
                .help("Lower bound of the reported conservation range [default: 0.2]"),
        )
        .arg(
            Arg::new("conservation_max")
                .long("conservation-max")
                .value_parser(value_parser!(f64))
                .num_args(1)
                .help("Upper bound of the reported conservation range [default: 0.95]"),
        )
}

fn parse_profile(spec: &str) -> anyhow::Result<MiConfig> {
    let parts: Vec<&str> = spec.split(',').map(|s| s.trim()).collect();
    if parts.len() != 3 {
        anyhow::bail!(
            "--profile expects <hardware>,<length>,<quality>, e.g. limited,long,low; got {}",
            spec
        );
    }
    let hw: HardwareProfile = parts[0].parse()?;
    let len: LengthProfile = parts[1].parse()?;
    let quality: QualityProfile = parts[2].parse()?;
    Ok(MiConfig::from_profiles(hw, len, quality))
}

/// Applies the options of [`filter_args`] to `cfg`.
pub fn apply_filter_args(args: &ArgMatches, mut cfg: MiConfig) -> MiConfig {
    if let Some(v) = args.get_one::<f64>("gap_threshold") {
        cfg.gap_threshold = *v;
    }
    if let Some(v) = args.get_one::<f64>("identity_threshold") {
        cfg.identity_threshold = *v;
    }
    if let Some(v) = args.get_one::<usize>("max_sequences") {
        cfg.max_sequences = *v;
    }
    if let Some(v) = args.get_one::<usize>("max_input") {
        cfg.max_input = *v;
    }
    if let Some(v) = args.get_one::<usize>("batch_size") {
        cfg.batch_size = *v;
    }
    if let Some(v) = args.get_one::<f64>("timeout") {
        cfg.timeout = Some(Duration::from_secs_f64(v.max(0.0)));
    }
    if let Some(v) = args.get_one::<usize>("parallel") {
        cfg.n_jobs = Some(*v);
    }
    cfg
}

/// Builds the configuration of [`mi_args`]: profile first, flags over it.
pub fn mi_config(args: &ArgMatches) -> anyhow::Result<MiConfig> {
    let cfg = match args.get_one::<String>("profile") {
        Some(spec) => parse_profile(spec)?,
        None => MiConfig::default(),
    };
    let mut cfg = apply_filter_args(args, cfg);

    if let Some(v) = args.get_one::<usize>("max_length") {
        cfg.max_length = *v;
    }
    if let Some(v) = args.get_one::<usize>("chunk_size") {
        cfg.chunk_size = *v;
    }
    if let Some(v) = args.get_one::<usize>("overlap") {
        cfg.overlap = *v;
    }
    if let Some(v) = args.get_one::<f64>("pseudocount") {
        cfg.pseudocount = Some(*v);
    }
    if args.get_flag("uniform") {
        cfg.weighting = Weighting::Uniform;
    }
    if let Some(v) = args.get_one::<f64>("conservation_min") {
        cfg.conservation_range.0 = *v;
    }
    if let Some(v) = args.get_one::<f64>("conservation_max") {
        cfg.conservation_range.1 = *v;
    }

    cfg.validate()?;
    Ok(cfg)
}
