use std::path::PathBuf;

use conllx_eval::report::{round3, write_table};
use conllx_eval::{
    EvalConfig, Evaluator, HeaderKind, LcsOracle, MetricsReport, Statistics, Tree, load_corpus,
    write_corpus,
};

fn data(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

fn sample_statistics(config: EvalConfig) -> Statistics {
    let gold = load_corpus(data("sample.gold.conllx"), config.header).unwrap();
    let parsed = load_corpus(data("sample.parsed.conllx"), config.header).unwrap();
    Evaluator::new(LcsOracle, config)
        .statistics(&gold, &parsed)
        .unwrap()
}

#[test]
fn test_sample_corpus_scores() {
    let report = sample_statistics(EvalConfig::default()).report();

    assert_eq!(report.sentences, 2);
    // 15 matching tokens, 16 gold, 17 parsed
    assert_eq!(round3(report.tokenization_precision), 88.235);
    assert_eq!(report.tokenization_recall, 93.75);
    assert_eq!(round3(report.tokenization_f_score), 90.909);

    assert_eq!(report.pos, 93.75);
    assert_eq!(report.uas, 75.0);
    assert_eq!(report.label, 93.75);
    assert_eq!(report.las, 75.0);
    assert_eq!(report.pp_uas, 50.0);
    assert_eq!(report.pp_label, 50.0);
    assert_eq!(report.pp_las, 50.0);
    assert_eq!(report.word_accuracy, 100.0);

    assert_eq!(report.insertions, 1);
    assert_eq!(report.deletions, 0);
    assert_eq!(report.segmentation_failures, 0);
}

#[test]
fn test_sequential_and_parallel_agree() {
    let parallel = sample_statistics(EvalConfig::default());
    let sequential = sample_statistics(EvalConfig {
        parallel: false,
        ..EvalConfig::default()
    });
    assert_eq!(parallel, sequential);
}

#[test]
fn test_word_accuracy_can_be_disabled() {
    let stats = sample_statistics(EvalConfig {
        word_accuracy: false,
        ..EvalConfig::default()
    });
    assert_eq!(stats.counts.ref_words, 0);
    assert_eq!(stats.report().word_accuracy, 0.0);
    assert_eq!(stats.report().uas, 75.0);
}

#[test]
fn test_catib_corpus() {
    let config = EvalConfig {
        header: HeaderKind::Catib,
        ..EvalConfig::default()
    };
    let gold = load_corpus(data("sample.gold.catib"), HeaderKind::Catib).unwrap();
    let parsed = load_corpus(data("sample.parsed.catib"), HeaderKind::Catib).unwrap();
    assert_eq!(gold.trees[0].tokens[3].deprel, "OBJ");

    let report = Evaluator::new(LcsOracle, config)
        .score(&gold, &parsed)
        .unwrap();
    assert_eq!(report.tokenization_f_score, 100.0);
    assert_eq!(report.uas, 100.0);
    assert_eq!(report.label, 75.0);
    assert_eq!(report.las, 75.0);
    assert_eq!(report.pp_uas, 100.0);
    assert_eq!(report.pp_las, 0.0);
}

#[test]
fn test_wrong_header_is_rejected() {
    let err = load_corpus(data("sample.gold.catib"), HeaderKind::Conllx).unwrap_err();
    assert!(err.to_string().contains("expected 10 tab-separated fields"));
}

#[test]
fn test_combined_row_sums_counts() {
    let one = sample_statistics(EvalConfig::default());
    let total: Statistics = [one, one].into_iter().sum();
    let combined = total.report();
    let single = one.report();

    assert_eq!(combined.sentences, 4);
    assert_eq!(combined.insertions, 2);
    assert_eq!(combined.uas, single.uas);
    assert_eq!(combined.tokenization_f_score, single.tokenization_f_score);

    let rows: Vec<(String, MetricsReport)> = vec![
        ("sample".to_string(), single),
        ("ALL".to_string(), combined),
    ];
    let mut out = Vec::new();
    write_table(&mut out, &rows).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("sample\t90.909\t88.235\t93.750\t100.000"));
    assert!(lines[2].starts_with("ALL\t90.909"));
    assert!(lines[2].ends_with("\t4\t2\t0\t0"));
}

#[test]
fn test_dump_aligned_trees() {
    let gold = load_corpus(data("sample.gold.conllx"), HeaderKind::Conllx).unwrap();
    let parsed = load_corpus(data("sample.parsed.conllx"), HeaderKind::Conllx).unwrap();
    let aligned = Evaluator::new(LcsOracle, EvalConfig::default())
        .align_corpora(&gold, &parsed)
        .unwrap();
    assert_eq!(aligned.len(), 2);
    assert_eq!(aligned[0].left.len(), 13);
    assert_eq!(aligned[0].right.len(), 13);
    assert_eq!(aligned[1].len(), 4);

    let trees: Vec<Tree> = aligned.into_iter().map(|pair| pair.left).collect();
    let mut out = Vec::new();
    write_corpus(&mut out, &trees, true).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert!(text.contains("# text = wqAl Alwzyr An AlHkwmp stEml ElY Hl AlAzmp\n"));
    let tree_tokens = "# treeTokens = w+ qAl Al+ wzyr An Al+ Hkwmp stEml tok ElY Hl Al+ Azmp\n";
    assert!(text.contains(tree_tokens));
    assert!(text.contains("9\ttok\t_\t_\t_\t_\t-1\t_\t_\t_\n"));
    // Heads past the inserted null shift by one
    assert!(text.contains("10\tElY\t_\tADP\t_\t_\t11\tcase\t_\t_\n"));
    assert_eq!(text.matches("\n\n").count(), 2);
}
