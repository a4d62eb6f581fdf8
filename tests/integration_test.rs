/// End-to-end integration tests for the greenlens pipeline.
///
/// Tests the complete flow:
///   Config → Chunker → Index build → Load → Orchestrated run
use std::fs;
use std::path::Path;
use std::sync::Arc;

use greenlens::chunker::{self, PAGE_BREAK};
use greenlens::config::Config;
use greenlens::embedder::ngram::NgramEmbedder;
use greenlens::feed::FeedItem;
use greenlens::feed::replay::ReplayFeed;
use greenlens::index::builder::IndexBuilder;
use greenlens::index::IndexStore;
use greenlens::llm::script::ScriptedGenerator;
use greenlens::orchestrator::Pipeline;
use greenlens::schema::{AgentSection, RiskLevel};
use tempfile::tempdir;

const CLAIMS_JSON: &str = r#"[{
    "claim_text": "2030年前溫室氣體排放量較2020年減少30%",
    "topic": "emissions",
    "metric": "GHG -30% by 2030",
    "target_year": 2030,
    "certainty": "high",
    "source_citations": [0]
}]"#;

/// Chunk the raw report files the way the index build does.
fn chunk_data_dir(data_dir: &Path, config: &Config) -> Vec<greenlens::chunker::Chunk> {
    let mut chunks = Vec::new();
    let mut paths: Vec<_> = fs::read_dir(data_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("txt"))
        .collect();
    paths.sort();

    for path in paths {
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap();
        let meta = chunker::derive_doc_meta(stem);
        let text = fs::read_to_string(&path).unwrap();
        chunks.extend(chunker::chunk_document(&meta, &text, &config.chunk));
    }
    chunks
}

/// Full pipeline: report texts → chunks → index → concurrent run → assessment
#[test]
fn test_full_pipeline() {
    // 1. Setup temp data dir with extracted report texts
    let temp_dir = tempdir().unwrap();
    let data_dir = temp_dir.path().join("data");
    let index_dir = temp_dir.path().join("index_out");
    fs::create_dir_all(&data_dir).unwrap();

    fs::write(
        data_dir.join("中油2024.txt"),
        format!(
            "本公司承諾於2030年前將溫室氣體排放量較2020年減少百分之三十。\
             逐年提升再生能源使用比例。持續推動製程節能改善方案。\
             {PAGE_BREAK}強化海域油污染防治與緊急應變量能。落實供應商永續管理。每年公開揭露減碳進度。"
        ),
    )
    .unwrap();

    fs::write(
        data_dir.join("台塑2023.txt"),
        "廢水回收率將於2026年提升至九成。六輕園區空氣品質監測站全面汰換更新。推動循環經濟與廢棄物減量。",
    )
    .unwrap();

    // An empty report must not sink the batch
    fs::write(data_dir.join("空白報告2024.txt"), "").unwrap();

    let mut config = Config::default();
    config.chunk.min_chars = 0;
    config.chunk.max_chars = 0;

    // 2. Chunk everything
    let chunks = chunk_data_dir(&data_dir, &config);
    assert!(!chunks.is_empty());
    assert!(chunks.iter().any(|c| c.company == "中油"));
    assert!(chunks.iter().any(|c| c.company == "台塑"));
    assert!(chunks.iter().any(|c| c.page == 2), "page markers respected");
    assert!(
        !chunks.iter().any(|c| c.company.contains("空白")),
        "empty report contributes no chunks"
    );
    let total = chunks.len();

    // 3. Build the index and load it back
    let embedder = NgramEmbedder::new(64);
    let report = IndexBuilder::new(&embedder, 8)
        .build(chunks.clone(), &index_dir)
        .unwrap();
    assert_eq!(report.embedded, total);
    assert_eq!(report.skipped, 0);

    let store = IndexStore::load(&index_dir).unwrap();
    assert_eq!(store.len(), total);

    // Ordinal alignment round-trip: every position resolves to its chunk
    for (i, chunk) in chunks.iter().enumerate() {
        let rec = store.chunk(i).unwrap();
        assert_eq!(rec.chunk_id, chunk.chunk_id);
        assert_eq!(rec.company, chunk.company);
        assert_eq!(rec.text, chunk.text);
    }

    // 4. Wire the pipeline with scripted external capabilities
    let generator = ScriptedGenerator::new()
        .then(CLAIMS_JSON)
        .then("二、中油承諾 2030 年前減碳三成（報告來源：0）。\n三、外部有漏油裁罰新聞。\nRISK: medium");
    let feed = ReplayFeed::new().with(
        "中油 漏油",
        vec![FeedItem {
            title: "中油外海漏油 遭環保機關裁罰".to_string(),
            link: "https://news.example.com/spill".to_string(),
            source: "測試媒體".to_string(),
            published: None,
            summary: "初步估計污染範圍三公里".to_string(),
        }],
    );

    let pipeline = Pipeline::new(
        Some(Arc::new(store)),
        Arc::new(NgramEmbedder::new(64)),
        Arc::new(generator),
        Arc::new(feed),
        Arc::new(config),
    )
    .unwrap();

    // 5. Run one request
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let response = runtime
        .block_on(pipeline.run("中油", "減碳目標"))
        .unwrap();

    // Commitments: at least one claim, traceable to the retrieval
    let commitments = response.commitments.data().expect("commitments section");
    assert!(commitments.company_matched);
    assert!(!commitments.claims.is_empty());
    let claim = &commitments.claims[0];
    assert_eq!(claim.topic, "emissions");
    assert!(claim.metric.contains("2030"));
    let retrieved: Vec<usize> = commitments.retrieved.iter().map(|p| p.ordinal).collect();
    for id in &claim.source_chunk_ids {
        assert!(retrieved.contains(id), "citation {id} outside retrieval");
    }

    // Events: deduped, ordered, non-empty
    let events = response.events.data().expect("events section");
    assert_eq!(events.candidates.len(), 1);
    assert!(events.candidates[0].relevance_score >= 0.0);
    assert!(events.candidates[0].relevance_score <= 1.0);

    // Assessment references the claim and carries the generated risk
    assert_eq!(response.assessment.risk, RiskLevel::Medium);
    assert!(response.assessment.referenced_claims.contains(&0));
    assert!(response.assessment.narrative.contains("2030"));

    // 6. The whole envelope serializes for the transport layer
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["commitments"]["status"], "ok");
    assert_eq!(json["events"]["status"], "ok");
    assert_eq!(json["assessment"]["risk"], "medium");
}

/// All external feeds down: commitments still flow, assessment proceeds.
#[test]
fn test_pipeline_with_total_feed_outage() {
    let temp_dir = tempdir().unwrap();
    let index_dir = temp_dir.path().join("index_out");

    let mut config = Config::default();
    config.chunk.min_chars = 0;
    config.chunk.max_chars = 0;

    let meta = chunker::derive_doc_meta("中油2024");
    let chunks: Vec<_> = chunker::chunk_document(
        &meta,
        "本公司承諾於2030年前將溫室氣體排放量減少百分之三十。提升再生能源比例。推動節能改善。",
        &config.chunk,
    )
    .collect();

    let embedder = NgramEmbedder::new(64);
    IndexBuilder::new(&embedder, 8)
        .build(chunks, &index_dir)
        .unwrap();
    let store = IndexStore::load(&index_dir).unwrap();

    let generator = ScriptedGenerator::new()
        .then(CLAIMS_JSON)
        .then("外部新聞無法取得，僅依報告承諾判讀。\nRISK: low");

    let pipeline = Pipeline::new(
        Some(Arc::new(store)),
        Arc::new(NgramEmbedder::new(64)),
        Arc::new(generator),
        Arc::new(ReplayFeed::new().failing_all()),
        Arc::new(config),
    )
    .unwrap();

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let response = runtime
        .block_on(pipeline.run("中油", "減碳目標"))
        .unwrap();

    // Checked-and-empty, not unavailable
    match &response.events {
        AgentSection::Ok { data } => assert!(data.candidates.is_empty()),
        AgentSection::Unavailable { .. } => panic!("feed outage must degrade, not fail"),
    }
    assert!(!response.commitments.data().unwrap().claims.is_empty());
    assert_eq!(response.assessment.risk, RiskLevel::Low);
}

/// Nothing matches anywhere: explicit insufficient-data verdict.
#[test]
fn test_pipeline_insufficient_data() {
    let temp_dir = tempdir().unwrap();
    let index_dir = temp_dir.path().join("index_out");

    let mut config = Config::default();
    config.chunk.min_chars = 0;
    config.chunk.max_chars = 0;

    let meta = chunker::derive_doc_meta("台塑2023");
    let chunks: Vec<_> = chunker::chunk_document(
        &meta,
        "廢水回收率將於2026年提升至九成。空氣品質監測站汰換。推動循環經濟。",
        &config.chunk,
    )
    .collect();

    let embedder = NgramEmbedder::new(64);
    IndexBuilder::new(&embedder, 8)
        .build(chunks, &index_dir)
        .unwrap();
    let store = IndexStore::load(&index_dir).unwrap();

    let pipeline = Pipeline::new(
        Some(Arc::new(store)),
        Arc::new(NgramEmbedder::new(64)),
        Arc::new(ScriptedGenerator::always("不應該被呼叫")),
        Arc::new(ReplayFeed::new()),
        Arc::new(config),
    )
    .unwrap();

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let response = runtime
        .block_on(pipeline.run("完全無關的公司", "減碳目標"))
        .unwrap();

    let commitments = response.commitments.data().unwrap();
    assert!(!commitments.company_matched);
    assert!(commitments.claims.is_empty());
    assert!(
        !commitments.retrieved.is_empty(),
        "no-match retrieval context is surfaced"
    );
    assert!(response.events.data().unwrap().candidates.is_empty());
    assert_eq!(response.assessment.risk, RiskLevel::InsufficientData);
}

/// Config defaults survive a save/load round trip.
#[test]
fn test_config_round_trip() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("config.json");
    let path_str = path.to_str().unwrap();

    let config = Config::default();
    assert!(config.validate().is_ok());
    config.save(path_str).unwrap();

    let loaded = Config::load(path_str).unwrap();
    assert_eq!(loaded.index_dir, config.index_dir);
    assert_eq!(loaded.chunk.window_sentences, config.chunk.window_sentences);
    assert_eq!(loaded.model.name, config.model.name);
}
