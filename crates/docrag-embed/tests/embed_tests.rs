use docrag_core::config::{Provider, Settings};
use docrag_embed::get_default_embedder;

fn fake_settings(dim: usize) -> Settings {
    let mut settings = Settings::default();
    settings.embedding.provider = Provider::Fake;
    settings.embedding.dimension = dim;
    settings
}

#[tokio::test]
async fn fake_embedder_shapes_and_determinism() {
    let embedder = get_default_embedder(&fake_settings(1024)).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).await.expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 1024, "embedding dim is 1024");

    // Norm approximately 1.0
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[tokio::test]
async fn fake_embedder_ranks_shared_substrings_higher() {
    let embedder = get_default_embedder(&fake_settings(256)).expect("embedder");
    let q = embedder.embed("RAGとは？").await.unwrap();
    let near = embedder.embed("RAGとは検索拡張生成です。").await.unwrap();
    let far = embedder.embed("今日の天気は晴れです").await.unwrap();
    let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
    assert!(dot(&q, &near) > dot(&q, &far));
}

#[test]
fn openai_provider_requires_api_key() {
    let mut settings = Settings::default();
    settings.embedding.provider = Provider::Openai;
    assert!(get_default_embedder(&settings).is_err());
}

#[tokio::test]
async fn zero_dimension_fake_embedder_is_clamped() {
    use docrag_core::traits::Embedder;
    let embedder = docrag_embed::FakeEmbedder::new(0);
    assert_eq!(embedder.dim(), 1);
    assert_eq!(embedder.embed("テスト").await.expect("embed").len(), 1);
}
