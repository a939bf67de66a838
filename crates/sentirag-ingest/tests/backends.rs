//! TEI backend clients against wiremock HTTP mocks.

use sentirag_core::{SentimentLabel, EMBEDDING_DIM};
use sentirag_ingest::{
    EmbeddingBackend, IngestError, SentimentBackend, SentimentScorer, TeiClassifier, TeiEmbedder,
};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn tei_embedder_posts_inputs_and_parses_vectors() {
    let server = MockServer::start().await;
    let vectors = vec![vec![0.5_f32; EMBEDDING_DIM], vec![0.25_f32; EMBEDDING_DIM]];

    Mock::given(method("POST"))
        .and(path("/embed"))
        .and(body_json(serde_json::json!({ "inputs": ["first", "second"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(&vectors))
        .expect(1)
        .mount(&server)
        .await;

    let embedder = TeiEmbedder::new(&server.uri(), 5).unwrap();
    let out = embedder.embed_batch(&["first", "second"]).await.unwrap();

    assert_eq!(out, vectors);
}

#[tokio::test]
async fn tei_embedder_surfaces_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embed"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let embedder = TeiEmbedder::new(&server.uri(), 5).unwrap();
    let err = embedder.embed_batch(&["text"]).await.unwrap_err();

    assert!(matches!(err, IngestError::Embedding(ref m) if m.contains("503")));
}

#[tokio::test]
async fn tei_embedder_rejects_count_mismatch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embed"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(vec![vec![0.1_f32; EMBEDDING_DIM]]),
        )
        .mount(&server)
        .await;

    let embedder = TeiEmbedder::new(&server.uri(), 5).unwrap();
    let err = embedder.embed_batch(&["a", "b"]).await.unwrap_err();

    assert!(matches!(err, IngestError::Embedding(_)));
}

#[tokio::test]
async fn tei_classifier_scores_each_input() {
    let server = MockServer::start().await;
    let body = serde_json::json!([
        [
            { "label": "positive", "score": 0.8 },
            { "label": "neutral", "score": 0.15 },
            { "label": "negative", "score": 0.05 }
        ],
        [
            { "label": "negative", "score": 0.6 },
            { "label": "neutral", "score": 0.3 },
            { "label": "positive", "score": 0.1 }
        ]
    ]);

    Mock::given(method("POST"))
        .and(path("/predict"))
        .and(body_json(serde_json::json!({ "inputs": [["beats"], ["misses"]] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let classifier = TeiClassifier::new(&server.uri(), 5).unwrap();
    let scores: Vec<_> = classifier
        .score_batch(&["beats", "misses"])
        .await
        .unwrap()
        .into_iter()
        .flatten()
        .collect();

    assert_eq!(scores.len(), 2);
    assert_eq!(scores[0].label, SentimentLabel::Positive);
    assert!((scores[0].score - 0.75).abs() < 1e-6);
    assert_eq!(scores[1].label, SentimentLabel::Negative);
    assert!((scores[1].score + 0.5).abs() < 1e-6);
}

#[tokio::test]
async fn scorer_falls_back_when_classifier_is_down() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let classifier = TeiClassifier::new(&server.uri(), 5).unwrap();
    let scorer = SentimentScorer::new(std::sync::Arc::new(classifier));
    let scores = scorer
        .score_texts(&["stock surges to a record", "quiet session"])
        .await;

    assert_eq!(scores[0].label, SentimentLabel::Positive);
    assert_eq!(scores[1].label, SentimentLabel::Neutral);
}

#[tokio::test]
async fn scorer_keeps_model_scores_next_to_an_unusable_prediction() {
    let server = MockServer::start().await;
    let body = serde_json::json!([
        [
            { "label": "negative", "score": 0.9 },
            { "label": "neutral", "score": 0.07 },
            { "label": "positive", "score": 0.03 }
        ],
        [
            { "label": "LABEL_7", "score": 0.99 }
        ]
    ]);

    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .expect(1)
        .mount(&server)
        .await;

    let classifier = TeiClassifier::new(&server.uri(), 5).unwrap();
    let scorer = SentimentScorer::new(std::sync::Arc::new(classifier));
    let scores = scorer.score_texts(&["shares rally", "quiet"]).await;

    assert_eq!(scores.len(), 2);
    assert_eq!(scores[0].label, SentimentLabel::Negative);
    assert!((scores[0].score + 0.87).abs() < 1e-6, "got {}", scores[0].score);
    assert_eq!(scores[1].label, SentimentLabel::Neutral);
    assert_eq!(scores[1].score, 0.0);
}
