use persona::benchmark::{EntryStatus, PretrainedModel};
use persona::{BenchmarkHarness, Config, Dataset, PretrainedModelSpec};

fn dataset() -> Dataset {
    let rows = [
        ("적극형", "I love a great challenge and feel excited to lead"),
        ("적극형", "happy to jump in, it is fun and amazing"),
        ("적극형", "excited and confident about new projects"),
        ("신중형", "I worry about mistakes and feel anxious"),
        ("신중형", "afraid of risk, I hate rushing"),
        ("신중형", "nervous and careful before every decision"),
        ("논리형", "I analyze the data before I decide"),
        ("논리형", "structure and logic guide my plans"),
        ("논리형", "I compare options using numbers and evidence"),
    ];
    let (labels, documents): (Vec<String>, Vec<String>) = rows
        .iter()
        .cycle()
        .take(rows.len() * 3)
        .map(|(l, d)| (l.to_string(), d.to_string()))
        .unzip();
    Dataset::new(documents, labels).unwrap()
}

fn config(models: &str) -> Config {
    Config::from_toml(&format!(
        r#"
        [benchmark]
        sample_size = 5
        timeout_secs = 2
        {}
        "#,
        models
    ))
    .unwrap()
}

#[tokio::test]
async fn test_unreachable_model_is_skipped() -> Result<(), Box<dyn std::error::Error>> {
    let harness = BenchmarkHarness::new(config(
        r#"
        [[benchmark.models]]
        kind = "remote_zero_shot"
        name = "offline-zero-shot"
        endpoint = "http://127.0.0.1:9/models/zero-shot"

        [[benchmark.models]]
        kind = "lexicon_sentiment"
        name = "lexicon"
        "#,
    ));
    let report = harness.run_on(&dataset()).await?;

    assert_eq!(report.entries.len(), 3);
    let offline = report.entry("offline-zero-shot").ok_or("missing entry")?;
    assert!(matches!(offline.status, EntryStatus::Skipped { .. }));

    let lexicon = report.entry("lexicon").ok_or("missing entry")?;
    assert!(lexicon.is_completed());
    assert_eq!(lexicon.sample_size, 5);
    assert!((0.0..=1.0).contains(&lexicon.accuracy));

    let baseline = report.entry("tfidf-logistic-regression").ok_or("missing entry")?;
    assert!(baseline.is_completed());
    assert!(report.best.is_some());
    assert_eq!(report.label_distribution.get("논리형"), Some(&9));

    assert_eq!(offline.accuracy, 0.0);
    Ok(())
}

#[tokio::test]
async fn test_baseline_only_run() -> Result<(), Box<dyn std::error::Error>> {
    let harness = BenchmarkHarness::new(config("models = []"));
    let report = harness.run_with_models(&dataset(), &[]).await?;

    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.best.as_deref(), Some("tfidf-logistic-regression"));
    assert!(report.to_string().contains("Best model: tfidf-logistic-regression"));
    Ok(())
}

#[tokio::test]
async fn test_prebuilt_models() -> Result<(), Box<dyn std::error::Error>> {
    let config = config("");
    let spec = PretrainedModelSpec::LexiconSentiment { name: "lexicon".into() };
    let model = PretrainedModel::from_spec(&spec, &[], &config.benchmark).await?;

    let report = BenchmarkHarness::new(config).run_with_models(&dataset(), &[model]).await?;
    let entry = report.entry("lexicon").ok_or("missing entry")?;
    assert_eq!(entry.kind, "scalar_remapping");
    assert!(!entry.examples.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_single_label_dataset_aborts() {
    let single = Dataset::new(vec!["a".into(), "b".into(), "c".into()], vec!["x".into(); 3]).unwrap();
    let harness = BenchmarkHarness::new(config(""));
    assert!(harness.run_with_models(&single, &[]).await.is_err());
}
