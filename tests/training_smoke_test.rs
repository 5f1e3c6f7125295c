//! Training Smoke Tests
//!
//! Quick validation that the training loop runs and checkpoints round-trip.

mod common;

use burn::backend::Autodiff;
use lblm::{DataLoader, Evaluator, SentenceDataset, TrainStats, Trainer, TrainingConfig};
use tempfile::tempdir;

type TestTrainBackend = Autodiff<common::TestBackend>;

fn quick_config() -> TrainingConfig {
    TrainingConfig {
        learning_rate: 1e-3,
        batch_size: 2,
        gradient_accumulation_steps: 1,
        warmup_steps: 0,
        max_steps: 5,
        gradient_clip: 1.0,
        save_every: 100,
        log_every: 1,
        ..Default::default()
    }
}

fn dataset(vocab: &lblm::Vocab) -> SentenceDataset {
    SentenceDataset::from_sentences(common::corpus().iter().map(|s| vocab.encode(s)).collect())
}

#[test]
fn test_training_steps_run_with_finite_losses() {
    let vocab = common::test_vocab();
    let special = vocab.special_ids();
    let model_config = common::test_model_config(&vocab);
    let data = dataset(&vocab);

    let mut trainer: Trainer<TestTrainBackend> =
        Trainer::new(&model_config, quick_config(), special, common::test_device());

    let mut stats_list: Vec<TrainStats> = Vec::new();
    for batch in DataLoader::new(&data, 2, special.pad).cycle().take(5) {
        if let Some(stats) = trainer.train_step(&batch).unwrap() {
            stats_list.push(stats);
        }
    }

    assert_eq!(stats_list.len(), 5);
    assert_eq!(trainer.step(), 5);
    for stats in &stats_list {
        assert!(stats.loss.is_finite());
        assert!(stats.word > 0.0);
        assert!(stats.lr > 0.0);
    }
}

#[test]
fn test_gradient_accumulation_delays_update() {
    let vocab = common::test_vocab();
    let special = vocab.special_ids();
    let data = dataset(&vocab);
    let config = TrainingConfig {
        gradient_accumulation_steps: 3,
        ..quick_config()
    };

    let mut trainer: Trainer<TestTrainBackend> =
        Trainer::new(&common::test_model_config(&vocab), config, special, common::test_device());

    let mut loader = DataLoader::new(&data, 1, special.pad);
    assert!(trainer.train_step(&loader.next().unwrap()).unwrap().is_none());
    assert!(trainer.train_step(&loader.next().unwrap()).unwrap().is_none());
    assert_eq!(trainer.micro_step(), 2);
    assert!(trainer.train_step(&loader.next().unwrap()).unwrap().is_some());
    assert_eq!(trainer.step(), 1);
    assert_eq!(trainer.micro_step(), 0);
}

#[test]
fn test_checkpoint_save_and_load() {
    let dir = tempdir().expect("Failed to create temp dir");
    let vocab = common::test_vocab();
    let special = vocab.special_ids();
    let model_config = common::test_model_config(&vocab);
    let data = dataset(&vocab);

    let mut trainer: Trainer<TestTrainBackend> =
        Trainer::new(&model_config, quick_config(), special, common::test_device());
    for batch in DataLoader::new(&data, 2, special.pad).take(2) {
        trainer.train_step(&batch).unwrap();
    }
    let path = dir.path().join("checkpoint_2");
    trainer.save_checkpoint(&path).unwrap();
    assert!(dir.path().join("checkpoint_2.mpk").exists());
    assert!(dir.path().join("checkpoint_2.meta").exists());

    let mut restored: Trainer<TestTrainBackend> =
        Trainer::new(&model_config, quick_config(), special, common::test_device());
    restored.load_checkpoint(&path).unwrap();
    assert_eq!(restored.step(), 2);

    // Same weights give the same Monte Carlo estimate
    let evaluator = Evaluator::new(3, 4, 7);
    let before = evaluator.evaluate(&trainer.valid_model(), &data, &special).unwrap();
    let after = evaluator.evaluate(&restored.valid_model(), &data, &special).unwrap();
    // CompactRecorder stores half precision
    assert!((before.nll - after.nll).abs() < 0.05);
    assert_eq!(before.words, data.num_tokens());
    assert_eq!(before.sentences, data.len());
}

#[test]
fn test_missing_checkpoint_is_an_error() {
    let dir = tempdir().expect("Failed to create temp dir");
    let vocab = common::test_vocab();
    let mut trainer: Trainer<TestTrainBackend> = Trainer::new(
        &common::test_model_config(&vocab),
        quick_config(),
        vocab.special_ids(),
        common::test_device(),
    );
    assert!(matches!(
        trainer.load_checkpoint(&dir.path().join("nope")),
        Err(lblm::LblmError::CheckpointLoad(_))
    ));
}

#[test]
fn test_checkpoint_step_sidecar() {
    let dir = tempdir().expect("Failed to create temp dir");
    let vocab = common::test_vocab();
    let special = vocab.special_ids();
    let model_config = common::test_model_config(&vocab);
    let data = dataset(&vocab);

    let mut trainer: Trainer<TestTrainBackend> =
        Trainer::new(&model_config, quick_config(), special, common::test_device());
    for batch in DataLoader::new(&data, 2, special.pad).take(3) {
        trainer.train_step(&batch).unwrap();
    }
    let path = dir.path().join("checkpoint_3");
    trainer.save_checkpoint(&path).unwrap();
    let meta = dir.path().join("checkpoint_3.meta");

    // Corrupt step: refuse to resume with a wrong schedule
    std::fs::write(&meta, "step=three\n").unwrap();
    let mut restored: Trainer<TestTrainBackend> =
        Trainer::new(&model_config, quick_config(), special, common::test_device());
    assert!(matches!(
        restored.load_checkpoint(&path),
        Err(lblm::LblmError::CheckpointLoad(_))
    ));

    // No sidecar: weights load, schedule starts over
    std::fs::remove_file(&meta).unwrap();
    let mut restored: Trainer<TestTrainBackend> =
        Trainer::new(&model_config, quick_config(), special, common::test_device());
    restored.load_checkpoint(&path).unwrap();
    assert_eq!(restored.step(), 0);
}
