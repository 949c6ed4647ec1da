use env_logger::{Builder, Env};
use persona::pipeline::ARTIFACT_FILES;
use persona::{load_artifacts, load_dataset, PipelineError, Trainer, TrainerState};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

fn init() {
    let _ = Builder::from_env(Env::default().default_filter_or("warn")).try_init();
}

const COLLECTOR_ANSWERS: [&str; 4] = [
    "I collect every rare item and trophy",
    "completing the full collection of badges matters most",
    "I grind for rare skins and achievements",
    "my inventory of trophies and rare items keeps growing",
];

const EXPLORER_ANSWERS: [&str; 4] = [
    "I explore hidden maps and secret areas",
    "wandering off the path to discover new regions",
    "finding secret caves and unexplored territory",
    "I love to explore every corner of the world map",
];

fn session(label: &str, answer: &str) -> serde_json::Value {
    json!({
        "personality_type": label,
        "questions_answers": [
            { "question": "What do you enjoy most?", "answer": answer },
            { "question": "Anything else?", "answer": answer },
        ]
    })
}

/// Writes `per_label` sessions for each of collector and explorer.
fn write_dataset(dir: &Path, per_label: usize) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let sessions: Vec<_> = (0..per_label)
        .flat_map(|i| {
            [
                session("collector", COLLECTOR_ANSWERS[i % COLLECTOR_ANSWERS.len()]),
                session("explorer", EXPLORER_ANSWERS[i % EXPLORER_ANSWERS.len()]),
            ]
        })
        .collect();
    let path = dir.join("interview_dataset.json");
    fs::write(&path, serde_json::to_string_pretty(&sessions)?)?;
    Ok(path)
}

#[test]
fn test_train_persist_and_reload() -> Result<(), Box<dyn std::error::Error>> {
    init();
    let dir = tempfile::tempdir()?;
    let dataset_path = write_dataset(dir.path(), 10)?;
    let model_dir = dir.path().join("models");

    let mut trainer = Trainer::new(&dataset_path, &model_dir);
    let (artifacts, report) = trainer.run_default()?;

    assert_eq!(trainer.state(), TrainerState::Persisted);
    assert_eq!(report.train_size + report.test_size, 20);
    assert_eq!(report.label_distribution.get("collector"), Some(&10));
    assert!(report.train_accuracy > 0.9);
    assert!((0.0..=1.0).contains(&report.test_accuracy));
    for file in ARTIFACT_FILES {
        assert!(model_dir.join(file).exists(), "{} missing", file);
    }

    let collector = artifacts.predict("rare trophies for my collection")?;
    assert_eq!(collector.predicted_label, "collector");
    let explorer = artifacts.predict("discover secret areas on the map")?;
    assert_eq!(explorer.predicted_label, "explorer");

    let restored = load_artifacts(&model_dir)?;
    assert_eq!(restored.run_id(), artifacts.run_id());
    assert_eq!(restored.labels(), artifacts.labels());
    let again = restored.predict("rare trophies for my collection")?;
    assert_eq!(again.predicted_label, collector.predicted_label);
    assert!((again.confidence - collector.confidence).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_scores_cover_every_label() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let dataset_path = write_dataset(dir.path(), 6)?;
    let (artifacts, _) = Trainer::new(&dataset_path, dir.path().join("models")).run_default()?;

    // no known vocabulary at all
    let result = artifacts.predict("zzz qqq")?;
    assert_eq!(result.all_scores.len(), 2);
    let total: f64 = result.all_scores.values().sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert_eq!(result.all_scores[&result.predicted_label], result.confidence);

    let empty = artifacts.predict("")?;
    assert!(artifacts.labels().contains(&empty.predicted_label));
    Ok(())
}

#[test]
fn test_retraining_replaces_artifacts() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let dataset_path = write_dataset(dir.path(), 6)?;
    let model_dir = dir.path().join("models");

    let (first, _) = Trainer::new(&dataset_path, &model_dir).run_default()?;
    let (second, _) = Trainer::new(&dataset_path, &model_dir).run_default()?;
    assert_ne!(first.run_id(), second.run_id());
    assert_eq!(load_artifacts(&model_dir)?.run_id(), second.run_id());
    Ok(())
}

#[test]
fn test_single_label_dataset_persists_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let sessions: Vec<_> = (0..6).map(|i| session("collector", COLLECTOR_ANSWERS[i % 4])).collect();
    let dataset_path = dir.path().join("one_label.json");
    fs::write(&dataset_path, serde_json::to_string(&sessions)?)?;
    let model_dir = dir.path().join("models");

    let mut trainer = Trainer::new(&dataset_path, &model_dir);
    let result = trainer.run_default();
    assert!(matches!(result, Err(PipelineError::InsufficientData(_))));
    assert_eq!(trainer.state(), TrainerState::DataLoaded);
    assert!(ARTIFACT_FILES.iter().all(|f| !model_dir.join(f).exists()));
    Ok(())
}

#[test]
fn test_dataset_errors() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;

    let missing = load_dataset(dir.path().join("nope.json"));
    assert!(matches!(missing, Err(PipelineError::DatasetNotFound(_))));

    let no_answers = dir.path().join("no_answers.json");
    fs::write(
        &no_answers,
        r#"[{"personality_type": "collector", "questions_answers": []}]"#,
    )?;
    assert!(matches!(load_dataset(&no_answers), Err(PipelineError::DatasetMalformed(_))));

    let no_label = dir.path().join("no_label.json");
    fs::write(&no_label, r#"[{"questions_answers": [{"question": "q", "answer": "a"}]}]"#)?;
    assert!(matches!(load_dataset(&no_label), Err(PipelineError::DatasetMalformed(_))));
    Ok(())
}

#[test]
fn test_missing_artifact_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let dataset_path = write_dataset(dir.path(), 6)?;
    let model_dir = dir.path().join("models");
    Trainer::new(&dataset_path, &model_dir).run_default()?;

    fs::remove_file(model_dir.join(ARTIFACT_FILES[1]))?;
    assert!(matches!(
        load_artifacts(&model_dir),
        Err(PipelineError::ArtifactsNotFound(_))
    ));
    Ok(())
}

#[test]
fn test_collector_explorer_scenario() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let sessions: Vec<_> = (0..4)
        .flat_map(|_| {
            [
                session("collector", "I love collecting rare items and achievements"),
                session("explorer", "I enjoy discovering new maps and hidden areas"),
            ]
        })
        .collect();
    let dataset_path = dir.path().join("scenario.json");
    fs::write(&dataset_path, serde_json::to_string(&sessions)?)?;

    let (artifacts, report) = Trainer::new(&dataset_path, dir.path().join("models")).run_default()?;
    assert!((0.0..=1.0).contains(&report.test_accuracy));
    assert!((0.0..=1.0).contains(&report.train_accuracy));

    let result = artifacts.predict("I collect every rare item I find")?;
    assert!(["collector", "explorer"].contains(&result.predicted_label.as_str()));
    assert!((0.0..=1.0).contains(&result.confidence));
    let labels: Vec<_> = result.all_scores.keys().map(String::as_str).collect();
    assert_eq!(labels, vec!["collector", "explorer"]);
    assert!((result.all_scores.values().sum::<f64>() - 1.0).abs() < 1e-6);
    Ok(())
}
