use super::args;
use clap::*;
use indexmap::IndexMap;
use rnaec::libs::features::to_json;
use rnaec::libs::pipeline::Pipeline;
use std::io::Write;
use std::path::Path;
use std::time::Instant;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    let cmd = Command::new("batch")
        .about("Computes coupling features of many alignments")
        .after_help(
            r###"
Runs `rnaec mi` on every input file and writes one JSON file per target into
--outdir, together with a summary.

Notes:
* The target id is the file name up to the first dot
    * tests/msa/coupled.fa.gz => coupled
* A failed target never stops the others
* summary.tsv columns: id, status, method, length, count, seconds, error
* Running in parallel mode with 1 reader, 1 writer and the corresponding
  number of workers
* --timeout bounds one target: it is checked while reading and between the
  filtering and coupling stages; a target over the limit is reported as
  failed

Examples:
1. Process all alignments of a directory:
   rnaec batch tests/msa/*.fa --outdir features

2. Four alignments at a time:
   rnaec batch tests/msa/*.fa --outdir features --parallel 4

"###,
        )
        .arg(
            Arg::new("infiles")
                .required(true)
                .num_args(1..)
                .index(1)
                .help("Input FASTA alignment(s)"),
        )
        .arg(
            Arg::new("outdir")
                .long("outdir")
                .short('o')
                .num_args(1)
                .required(true)
                .help("Output directory"),
        );

    args::mi_args(cmd)
}

struct Outcome {
    id: String,
    seconds: f64,
    result: Result<Done, String>,
}

struct Done {
    json: String,
    method: String,
    length: usize,
    count: usize,
}

/// Target id: file name up to the first dot.
fn target_id(path: &str) -> String {
    let name = Path::new(path)
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    name.split('.').next().unwrap_or_default().to_string()
}

fn proc_target(pipeline: &Pipeline, id: &str, infile: &str) -> Outcome {
    let start = Instant::now();
    log::info!("Processing {} from {}", id, infile);

    let result = pipeline
        .run_path(infile)
        .map_err(|e| e.to_string())
        .and_then(|features| {
            let json = serde_json::to_string_pretty(&to_json(&features))
                .map_err(|e| e.to_string())?;
            Ok(Done {
                json,
                method: features.method_tag(),
                length: features.sequence_length,
                count: features.sequence_count,
            })
        });

    if let Err(e) = &result {
        log::error!("Error processing {}: {}", infile, e);
    }
    Outcome {
        id: id.to_string(),
        seconds: start.elapsed().as_secs_f64(),
        result,
    }
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let config = args::mi_config(args)?;
    let parallel = config.n_jobs.unwrap_or(1);
    let outdir = args.get_one::<String>("outdir").unwrap();

    let mut targets: IndexMap<String, String> = IndexMap::new();
    for infile in args.get_many::<String>("infiles").unwrap() {
        let id = target_id(infile);
        if let Some(prev) = targets.insert(id.clone(), infile.to_string()) {
            anyhow::bail!("Duplicate target id {}: {} and {}", id, prev, infile);
        }
    }

    std::fs::create_dir_all(outdir)?;
    let pipeline = Pipeline::new(config)?;
    log::info!(
        "Processing {} alignments with {} workers",
        targets.len(),
        parallel
    );

    //----------------------------
    // Ops
    //----------------------------
    // Filled in input order, whatever the completion order
    let mut outcomes: IndexMap<String, Option<Outcome>> =
        targets.keys().map(|id| (id.clone(), None)).collect();

    // Channel 1 - Targets
    let (snd1, rcv1) = crossbeam::channel::bounded::<(String, String)>(10);
    // Channel 2 - Results
    let (snd2, rcv2) = crossbeam::channel::bounded::<Outcome>(10);

    crossbeam::scope(|s| {
        //----------------------------
        // Reader thread
        //----------------------------
        let targets = &targets;
        s.spawn(move |_| {
            for (id, infile) in targets {
                if snd1.send((id.clone(), infile.clone())).is_err() {
                    break;
                }
            }
            // Close the channel - this is necessary to exit the for-loop in the worker
            drop(snd1);
        });

        //----------------------------
        // Worker threads
        //----------------------------
        for _ in 0..parallel.max(1) {
            let (sendr, recvr) = (snd2.clone(), rcv1.clone());
            let pipeline = &pipeline;
            s.spawn(move |_| {
                for (id, infile) in recvr.iter() {
                    let outcome = proc_target(pipeline, &id, &infile);
                    if sendr.send(outcome).is_err() {
                        break;
                    }
                }
            });
        }
        // Close the channel, otherwise sink will never exit the for-loop
        drop(snd2);

        //----------------------------
        // Writer thread
        //----------------------------
        for mut outcome in rcv2.iter() {
            if let Ok(done) = &outcome.result {
                let path = Path::new(outdir).join(format!("{}.json", outcome.id));
                if let Err(e) = std::fs::write(&path, format!("{}\n", done.json)) {
                    log::error!("Could not write {}: {}", path.display(), e);
                    outcome.result = Err(e.to_string());
                }
            }
            outcomes.insert(outcome.id.clone(), Some(outcome));
        }
    })
    .map_err(|_| anyhow::anyhow!("A batch worker panicked"))?;

    //----------------------------
    // Output
    //----------------------------
    let summary = Path::new(outdir).join("summary.tsv");
    let mut writer = rnaec::writer(&summary.to_string_lossy())?;
    writer.write_all(b"id\tstatus\tmethod\tlength\tcount\tseconds\terror\n")?;

    let mut n_success = 0;
    let mut n_failed = 0;
    let mut total_seconds = 0.0;
    for (id, outcome) in &outcomes {
        match outcome {
            Some(Outcome {
                seconds,
                result: Ok(done),
                ..
            }) => {
                n_success += 1;
                total_seconds += seconds;
                writer.write_fmt(format_args!(
                    "{}\tsuccess\t{}\t{}\t{}\t{:.3}\t\n",
                    id, done.method, done.length, done.count, seconds
                ))?;
            }
            Some(Outcome {
                seconds,
                result: Err(e),
                ..
            }) => {
                n_failed += 1;
                writer.write_fmt(format_args!(
                    "{}\terror\t\t\t\t{:.3}\t{}\n",
                    id,
                    seconds,
                    e.replace(['\t', '\n'], " ")
                ))?;
            }
            None => {
                n_failed += 1;
                writer.write_fmt(format_args!("{}\terror\t\t\t\t\tnot processed\n", id))?;
            }
        }
    }
    writer.flush()?;

    eprintln!(
        "Processed {} alignments: {} succeeded, {} failed",
        outcomes.len(),
        n_success,
        n_failed
    );
    if n_success > 0 {
        eprintln!(
            "Average processing time: {:.2} seconds",
            total_seconds / n_success as f64
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_id() {
        assert_eq!(target_id("tests/msa/coupled.fa"), "coupled");
        assert_eq!(target_id("tests/msa/coupled.fa.gz"), "coupled");
        assert_eq!(target_id("R1107.afa"), "R1107");
        assert_eq!(target_id("noext"), "noext");
    }
}
