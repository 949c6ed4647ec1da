use persona::pipeline::ARTIFACT_FILES;
use persona::{InferenceService, PipelineError, Trainer};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn write_sessions(path: &Path, sessions: &[(&str, &str)], copies: usize) -> Result<(), Box<dyn std::error::Error>> {
    let body: Vec<_> = (0..copies)
        .flat_map(|_| sessions.iter())
        .map(|(label, answer)| {
            json!({
                "personality_type": label,
                "questions_answers": [{ "question": "Tell me about yourself", "answer": answer }]
            })
        })
        .collect();
    fs::write(path, serde_json::to_string(&body)?)?;
    Ok(())
}

fn two_type_dataset(dir: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let path = dir.join("two.json");
    write_sessions(
        &path,
        &[
            ("collector", "I collect rare trophies and items"),
            ("collector", "a complete collection of rare badges"),
            ("explorer", "I explore hidden maps and secret areas"),
            ("explorer", "discovering secret regions of the map"),
        ],
        4,
    )?;
    Ok(path)
}

#[tokio::test]
async fn test_load_or_train_then_serve() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let dataset = two_type_dataset(dir.path())?;
    let model_dir = dir.path().join("models");

    let service = InferenceService::new();
    assert!(matches!(service.describe_model(), Err(PipelineError::ModelNotReady)));

    service.load_or_train(Trainer::new(&dataset, &model_dir)).await?;
    assert!(service.is_ready());
    let trained_run = service.describe_model()?.run_id;

    // a second start picks up the persisted version instead of retraining
    let restarted = InferenceService::new();
    restarted.load_or_train(Trainer::new(&dataset, &model_dir)).await?;
    assert_eq!(restarted.describe_model()?.run_id, trained_run);

    let description = restarted.describe_model()?;
    assert_eq!(description.supported_labels, vec!["collector", "explorer"]);
    assert_eq!(description.classifier_labels, description.supported_labels);
    assert_eq!(description.ngram_range, (1, 2));
    assert!(description.vocabulary_size > 0);
    Ok(())
}

#[tokio::test]
async fn test_batch_matches_single_predictions() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let dataset = two_type_dataset(dir.path())?;
    let service = InferenceService::new();
    service.reload(Trainer::new(&dataset, dir.path().join("models"))).await?;

    let texts = [
        "rare trophies",
        "",
        "secret map areas to discover, far away from every path anyone has walked before",
    ];
    let batch = service.predict_batch(&texts)?;
    assert_eq!(batch.total_analyzed, texts.len());

    for (item, text) in batch.results.iter().zip(texts) {
        let single = service.predict_one(text, Some("tester"))?;
        assert_eq!(item.predicted_label, single.predicted_label);
        assert!((item.confidence - single.confidence).abs() < 1e-12);
        assert_eq!(single.requester_id, "tester");
    }
    assert_eq!(batch.results[0].index, 0);
    assert_eq!(batch.results[2].index, 2);
    assert!(batch.results[2].text_preview.ends_with("..."));
    assert_eq!(batch.results[1].text_preview, "");

    assert_eq!(service.predict_one("x", None)?.requester_id, "anonymous");
    assert!(service.predict_batch::<&str>(&[])?.results.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_reload_replaces_the_whole_model() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let model_dir = dir.path().join("models");
    let dataset = two_type_dataset(dir.path())?;
    let service = InferenceService::new();

    service.reload(Trainer::new(&dataset, &model_dir)).await?;
    let before = service.snapshot()?;
    assert_eq!(before.labels().len(), 2);

    let three = dir.path().join("three.json");
    write_sessions(
        &three,
        &[
            ("collector", "I collect rare trophies and items"),
            ("explorer", "I explore hidden maps and secret areas"),
            ("socializer", "I chat with friends and join a guild"),
            ("socializer", "meeting people and talking in the guild chat"),
        ],
        6,
    )?;
    let response = service.reload(Trainer::new(&three, &model_dir)).await?;
    assert_eq!(response.status, "success");

    let after = service.describe_model()?;
    assert_eq!(after.supported_labels, vec!["collector", "explorer", "socializer"]);
    assert_eq!(Some(after.run_id.as_str()), response.report.as_ref().map(|r| r.run_id.as_str()));

    // a snapshot taken earlier still answers with the old version
    assert_eq!(before.labels().len(), 2);
    assert_eq!(before.predict("guild chat with friends")?.all_scores.len(), 2);
    assert_eq!(service.predict_one("guild chat with friends", None)?.all_scores.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_failed_reload_keeps_previous_model() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let model_dir = dir.path().join("models");
    let service = InferenceService::new();
    service.reload(Trainer::new(two_type_dataset(dir.path())?, &model_dir)).await?;
    let active = service.describe_model()?.run_id;

    let broken = dir.path().join("broken.json");
    fs::write(&broken, "{ not json")?;
    let result = service.reload(Trainer::new(&broken, &model_dir)).await;
    assert!(matches!(result, Err(PipelineError::DatasetMalformed(_))));
    assert_eq!(service.describe_model()?.run_id, active);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_reads_during_reload() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let dataset = two_type_dataset(dir.path())?;
    let model_dir = dir.path().join("models");
    let service = Arc::new(InferenceService::new());
    service.reload(Trainer::new(&dataset, &model_dir)).await?;

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let service = Arc::clone(&service);
            tokio::task::spawn_blocking(move || {
                (0..50).all(|_| {
                    service
                        .predict_one("rare trophies", None)
                        .map(|r| r.all_scores.len() == 2)
                        .unwrap_or(false)
                })
            })
        })
        .collect();
    service.reload(Trainer::new(&dataset, &model_dir)).await?;

    for reader in readers {
        assert!(reader.await?);
    }
    Ok(())
}

#[tokio::test]
async fn test_incomplete_model_dir_keeps_active_model() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let service = InferenceService::new();
    service
        .reload(Trainer::new(two_type_dataset(dir.path())?, dir.path().join("models")))
        .await?;
    let active = service.describe_model()?.run_id;

    let other_dir = dir.path().join("other");
    Trainer::new(two_type_dataset(dir.path())?, &other_dir).run_default()?;
    fs::remove_file(other_dir.join(ARTIFACT_FILES[0]))?;

    let result = service.load_from_dir(&other_dir);
    assert!(matches!(result, Err(PipelineError::ArtifactsNotFound(_))));
    assert_eq!(service.describe_model()?.run_id, active);
    assert!(service.predict_one("rare trophies", None).is_ok());
    Ok(())
}
