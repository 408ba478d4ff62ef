//! Score parsed CoNLL-X files against gold files
//!
//! Run with: cargo run --release -- -g gold.conllx -p parsed.conllx

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use conllx_eval::report::write_table;
use conllx_eval::{
    EvalConfig, Evaluator, HeaderKind, LcsOracle, MetricsReport, Statistics, load_corpus,
    write_corpus,
};
use rayon::prelude::*;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Compare parsed dependency trees against gold trees
#[derive(Debug, Parser)]
#[command(name = "conllx-eval", version, about)]
struct Cli {
    /// Gold file; repeat to evaluate several pairs
    #[arg(short, long, required = true)]
    gold: Vec<PathBuf>,

    /// Parsed file, paired with the --gold at the same position
    #[arg(short, long, required = true)]
    parsed: Vec<PathBuf>,

    /// Column layout of the input files: conllx (10 columns) or catib (6)
    #[arg(long, default_value = "conllx")]
    header: HeaderKind,

    /// Where to write the results table
    #[arg(short, long, default_value = "results.tsv")]
    output: PathBuf,

    /// Score sentence pairs on a single thread
    #[arg(long)]
    sequential: bool,

    /// Skip word accuracy over resegmented clitics
    #[arg(long)]
    no_word_accuracy: bool,

    /// Also write the aligned gold and parsed trees into this directory
    #[arg(long, value_name = "DIR")]
    dump_aligned: Option<PathBuf>,
}

impl Cli {
    fn config(&self) -> EvalConfig {
        EvalConfig {
            header: self.header,
            parallel: !self.sequential,
            word_accuracy: !self.no_word_accuracy,
        }
    }
}

fn file_label(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn evaluate_pair(
    evaluator: &Evaluator<LcsOracle>,
    gold_path: &Path,
    parsed_path: &Path,
    dump_dir: Option<&Path>,
) -> Result<Statistics> {
    let header = evaluator.config().header;
    let gold = load_corpus(gold_path, header)?;
    let parsed = load_corpus(parsed_path, header)?;

    let stats = evaluator
        .statistics(&gold, &parsed)
        .with_context(|| format!("scoring {}", parsed_path.display()))?;
    tracing::info!(
        gold = %gold_path.display(),
        parsed = %parsed_path.display(),
        sentences = stats.sentences,
        "evaluated"
    );

    if let Some(dir) = dump_dir {
        let aligned = evaluator.align_corpora(&gold, &parsed)?;
        let (gold_trees, parsed_trees): (Vec<_>, Vec<_>) =
            aligned.into_iter().map(|pair| (pair.left, pair.right)).unzip();
        let label = file_label(gold_path);
        for (suffix, trees) in [("gold", gold_trees), ("parsed", parsed_trees)] {
            let path = dir.join(format!("{}.{}.aligned.conllx", label, suffix));
            let mut out = BufWriter::new(
                File::create(&path).with_context(|| format!("creating {}", path.display()))?,
            );
            write_corpus(&mut out, &trees, true)
                .with_context(|| format!("writing {}", path.display()))?;
        }
    }

    Ok(stats)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("conllx_eval=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    if cli.gold.len() != cli.parsed.len() {
        bail!(
            "got {} gold files but {} parsed files",
            cli.gold.len(),
            cli.parsed.len()
        );
    }
    if let Some(dir) = &cli.dump_aligned {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let config = cli.config();
    let evaluator = Evaluator::new(LcsOracle, config);
    let dump_dir = cli.dump_aligned.as_deref();

    let pairs: Vec<(&PathBuf, &PathBuf)> = cli.gold.iter().zip(&cli.parsed).collect();
    let evaluate = |(gold, parsed): &(&PathBuf, &PathBuf)| {
        evaluate_pair(&evaluator, gold, parsed, dump_dir).map(|stats| (file_label(gold), stats))
    };
    let results: Vec<(String, Statistics)> = if config.parallel {
        pairs.par_iter().map(evaluate).collect::<Result<_>>()?
    } else {
        pairs.iter().map(evaluate).collect::<Result<_>>()?
    };

    let mut rows: Vec<(String, MetricsReport)> = results
        .iter()
        .map(|(label, stats)| (label.clone(), stats.report()))
        .collect();
    if results.len() > 1 {
        let total: Statistics = results.iter().map(|(_, stats)| *stats).sum();
        rows.push(("ALL".to_string(), total.report()));
    }

    let mut out = BufWriter::new(
        File::create(&cli.output).with_context(|| format!("creating {}", cli.output.display()))?,
    );
    write_table(&mut out, &rows)?;
    tracing::info!(output = %cli.output.display(), rows = rows.len(), "wrote results");

    for (label, report) in &rows {
        let summary: Vec<String> = report
            .metrics()
            .iter()
            .map(|(name, value)| format!("{}={:.3}", name, value))
            .collect();
        println!("{}\t{}", label, summary.join(" "));
    }

    Ok(())
}
