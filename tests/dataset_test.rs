//! Dataset Integration Tests
//!
//! Corpus loading, batching and vocabulary persistence.

mod common;

use lblm::{DataLoader, LblmError, SentenceDataset, Vocab};
use tempfile::tempdir;

#[test]
fn test_from_file_drops_empty_and_long_sentences() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = common::write_corpus(
        dir.path(),
        "train.txt",
        &["the cat sat", "", "a b c d e f g h i j", "the bird sang"],
    );
    let vocab = common::test_vocab();

    let dataset = SentenceDataset::from_file(&path, &vocab, 8).expect("Failed to read dataset");
    assert_eq!(dataset.len(), 2);
    assert_eq!(dataset.num_tokens(), 6);
    assert_eq!(dataset.get(1).unwrap(), vocab.encode(&["the", "bird", "sang"]).as_slice());
}

#[test]
fn test_empty_corpus_is_an_error() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = common::write_corpus(dir.path(), "empty.txt", &[""]);
    let vocab = common::test_vocab();
    assert!(matches!(
        SentenceDataset::from_file(&path, &vocab, 8),
        Err(LblmError::DatasetEmpty { .. })
    ));
    assert!(matches!(
        SentenceDataset::from_file(&dir.path().join("absent.txt"), &vocab, 8),
        Err(LblmError::FileRead { .. })
    ));
}

#[test]
fn test_shuffle_is_seeded() {
    let vocab = common::test_vocab();
    let sentences: Vec<Vec<i64>> = common::corpus().iter().map(|s| vocab.encode(s)).collect();
    let mut a = SentenceDataset::from_sentences(sentences.clone());
    let mut b = SentenceDataset::from_sentences(sentences);
    a.shuffle(3);
    b.shuffle(3);

    let order = |d: &SentenceDataset| (0..d.len()).map(|i| d.get(i).unwrap().to_vec()).collect::<Vec<_>>();
    assert_eq!(order(&a), order(&b));
}

#[test]
fn test_loader_pads_to_longest() {
    let vocab = common::test_vocab();
    let special = vocab.special_ids();
    let dataset = SentenceDataset::from_sentences(common::corpus().iter().map(|s| vocab.encode(s)).collect());

    let batches: Vec<_> = DataLoader::new(&dataset, 3, special.pad).collect();
    assert_eq!(batches.len(), 2);
    let first = &batches[0];
    assert_eq!(first.width(), 6);
    assert_eq!(first.lengths, vec![6, 6, 3]);
    assert!(first.tokens[2][3..].iter().all(|&t| t == special.pad));
}

#[test]
fn test_vocab_json_round_trip() {
    let dir = tempdir().expect("Failed to create temp dir");
    let vocab = common::test_vocab();
    let path = dir.path().join("vocab.json");
    vocab.save(&path).unwrap();

    let loaded = Vocab::from_file(&path).unwrap();
    assert_eq!(loaded.special_ids(), vocab.special_ids());
    assert_eq!(loaded.size(), vocab.size());
    for sent in common::corpus() {
        assert_eq!(loaded.encode(&sent), vocab.encode(&sent));
    }
    assert_eq!(loaded.id("never-seen"), loaded.special_ids().unk);
    assert_eq!(loaded.word(loaded.special_ids().blank_id(3)), Some("<blank_3>"));
}

#[test]
fn test_truncated_vocab_is_rejected() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("vocab.json");
    std::fs::write(&path, r#"{"id_to_word":["<pad>","<unk>"],"max_len":4}"#).unwrap();
    assert!(matches!(Vocab::from_file(&path), Err(LblmError::VocabLoad(_))));
}
