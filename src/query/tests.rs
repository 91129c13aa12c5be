use super::*;
use crate::database::{EmbeddingRecord, InMemoryVectorStore};
use crate::provider::Role;
use crate::test_util::{FakeChat, FakeEmbedder, FakeReranker};

const QUESTION: &str = "how do I configure the tool?";

fn metadata(i: usize) -> ChunkMetadata {
    ChunkMetadata {
        document_id: format!("doc-{}", i),
        file_path: format!("data/doc{}.md", i),
        file_name: format!("doc{}.md", i),
        chunk_index: 0,
        token_count: 3,
        created_at: "2024-01-01T00:00:00Z".to_string(),
    }
}

/// Five chunks whose similarity to the question decreases with their number
async fn seeded_store() -> Arc<InMemoryVectorStore> {
    let store = Arc::new(InMemoryVectorStore::new());
    let records = (0..5)
        .map(|i| EmbeddingRecord {
            id: format!("id-{}", i),
            vector: vec![1.0, i as f32 * 0.5],
            text: format!("chunk {}", i),
            metadata: metadata(i),
        })
        .collect();
    store
        .upsert("docs", records)
        .await
        .expect("seeding should succeed");
    store
}

fn pipeline(store: Arc<InMemoryVectorStore>, chat: &Arc<FakeChat>) -> QueryPipeline {
    let embedder = FakeEmbedder::new().with_vector(QUESTION, vec![1.0, 0.0]);
    QueryPipeline::new(
        Arc::new(embedder),
        store,
        Arc::clone(chat) as Arc<dyn ChatModel>,
        "docs",
    )
}

fn request(top_k: usize, rerank: bool, top_n: Option<usize>) -> QueryRequest {
    QueryRequest {
        question: QUESTION.to_string(),
        top_k,
        rerank,
        top_n,
    }
}

fn texts(contexts: &[RetrievedResult]) -> Vec<&str> {
    contexts.iter().map(|c| c.text.as_str()).collect()
}

#[tokio::test]
async fn retrieval_without_rerank_keeps_top_k_by_similarity() {
    let chat = Arc::new(FakeChat::new("answer"));
    let pipeline = pipeline(seeded_store().await, &chat);

    let response = pipeline
        .ask(&request(3, false, None))
        .await
        .expect("ask should succeed");

    assert_eq!(response.answer, "answer");
    assert_eq!(texts(&response.contexts), vec!["chunk 0", "chunk 1", "chunk 2"]);
    assert!(
        response
            .contexts
            .iter()
            .all(|c| c.score_kind == ScoreKind::Similarity)
    );
    assert!(
        response
            .contexts
            .windows(2)
            .all(|pair| pair[0].score >= pair[1].score)
    );
    assert_eq!(
        response.contexts.iter().map(|c| c.rank).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
}

#[tokio::test]
async fn rerank_replaces_context_and_scores() {
    let chat = Arc::new(FakeChat::new("answer"));
    let reranker = Arc::new(FakeReranker::new(&[(3, 0.9), (0, 0.5)]));
    let pipeline = pipeline(seeded_store().await, &chat)
        .with_reranker(Arc::clone(&reranker) as Arc<dyn Reranker>);

    let response = pipeline
        .ask(&request(5, true, Some(2)))
        .await
        .expect("ask should succeed");

    assert_eq!(texts(&response.contexts), vec!["chunk 3", "chunk 0"]);
    assert_eq!(
        response.contexts.iter().map(|c| c.score).collect::<Vec<_>>(),
        vec![0.9, 0.5]
    );
    assert!(
        response
            .contexts
            .iter()
            .all(|c| c.score_kind == ScoreKind::Relevance)
    );
    assert_eq!(reranker.requests(), vec![(5, 2)]);

    let received = chat.received();
    assert_eq!(received.len(), 1);
    let user = &received[0][1];
    assert_eq!(user.role, Role::User);
    assert!(user.content.contains("chunk 3"));
    assert!(user.content.contains("chunk 0"));
    assert!(!user.content.contains("chunk 1"));
    assert!(user.content.contains(QUESTION));
}

#[tokio::test]
async fn rerank_top_n_defaults_to_five_or_fewer() {
    let chat = Arc::new(FakeChat::new("answer"));
    let reranker = Arc::new(FakeReranker::new(&[(2, 0.8), (1, 0.6), (0, 0.1)]));
    let pipeline = pipeline(seeded_store().await, &chat)
        .with_reranker(Arc::clone(&reranker) as Arc<dyn Reranker>);

    pipeline
        .ask(&request(3, true, None))
        .await
        .expect("ask should succeed");

    assert_eq!(reranker.requests(), vec![(3, 3)]);
}

#[tokio::test]
async fn rerank_without_reranker_is_validation_error() {
    let chat = Arc::new(FakeChat::new("answer"));
    let pipeline = pipeline(seeded_store().await, &chat);

    let result = pipeline.ask(&request(3, true, Some(2))).await;

    assert!(matches!(result, Err(RagError::Validation(_))));
    assert!(chat.received().is_empty());
}

#[tokio::test]
async fn rerank_skipped_when_nothing_retrieved() {
    let chat = Arc::new(FakeChat::new("I do not know."));
    let reranker = Arc::new(FakeReranker::new(&[(0, 1.0)]));
    let pipeline = pipeline(Arc::new(InMemoryVectorStore::new()), &chat)
        .with_reranker(Arc::clone(&reranker) as Arc<dyn Reranker>);

    let response = pipeline
        .ask(&request(3, true, None))
        .await
        .expect("ask should succeed");

    assert!(response.contexts.is_empty());
    assert!(reranker.requests().is_empty());
    assert_eq!(response.answer, "I do not know.");
}

#[tokio::test]
async fn rerank_index_out_of_range_is_invalid_response() {
    let chat = Arc::new(FakeChat::new("answer"));
    let reranker = Arc::new(FakeReranker::new(&[(9, 0.9)]));
    let pipeline = pipeline(seeded_store().await, &chat)
        .with_reranker(Arc::clone(&reranker) as Arc<dyn Reranker>);

    let result = pipeline.ask(&request(3, true, Some(1))).await;

    assert!(matches!(result, Err(RagError::InvalidResponse(_))));
}

#[tokio::test]
async fn empty_question_rejected() {
    let chat = Arc::new(FakeChat::new("answer"));
    let pipeline = pipeline(seeded_store().await, &chat);

    let mut empty = request(3, false, None);
    empty.question = "   ".to_string();

    let result = pipeline.ask(&empty).await;
    assert!(matches!(result, Err(RagError::Validation(_))));
}

#[tokio::test]
async fn json_output_lists_every_context() {
    let chat = Arc::new(FakeChat::new("the answer"));
    let reranker = Arc::new(FakeReranker::new(&[(3, 0.9), (0, 0.5)]));
    let pipeline = pipeline(seeded_store().await, &chat)
        .with_reranker(Arc::clone(&reranker) as Arc<dyn Reranker>);

    let response = pipeline
        .ask(&request(5, true, Some(2)))
        .await
        .expect("ask should succeed");
    let output = render(&response, OutputFormat::Json).expect("render should succeed");

    let value: serde_json::Value = serde_json::from_str(&output).expect("output is JSON");
    assert_eq!(value["answer"], "the answer");
    let contexts = value["contexts"].as_array().expect("contexts is an array");
    assert_eq!(contexts.len(), 2);
    for (i, context) in contexts.iter().enumerate() {
        assert_eq!(context["rank"], i + 1);
    }
    assert_eq!(contexts[0]["text"], "chunk 3");
    assert_eq!(contexts[0]["metadata"]["file_path"], "data/doc3.md");
    assert!(contexts[0].get("score_kind").is_none());
}

#[test]
fn messages_hold_system_then_user() {
    let contexts = vec![RetrievedResult {
        rank: 1,
        score: 0.8,
        metadata: metadata(7),
        text: "The config lives in config.yaml.".to_string(),
        score_kind: ScoreKind::Similarity,
    }];

    let messages = build_messages("where is the config?", &contexts);

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::System);
    assert_eq!(messages[1].role, Role::User);
    assert!(messages[1].content.contains("file_path: data/doc7.md"));
    assert!(messages[1].content.contains("The config lives in config.yaml."));
    assert!(messages[1].content.ends_with("Query: where is the config?\nAnswer: "));
}

#[test]
fn context_block_flattens_and_truncates() {
    let response = AnswerResponse {
        answer: "done".to_string(),
        contexts: vec![
            RetrievedResult {
                rank: 1,
                score: 0.5,
                metadata: metadata(1),
                text: "line one\nline two".to_string(),
                score_kind: ScoreKind::Similarity,
            },
            RetrievedResult {
                rank: 2,
                score: 0.25,
                metadata: metadata(2),
                text: "y".repeat(1500),
                score_kind: ScoreKind::Similarity,
            },
        ],
    };

    let output = render(&response, OutputFormat::Context).expect("render should succeed");

    let expected = format!(
        "done\n\n--- CONTEXT ---\n\
         [1] score=0.5 src=data/doc1.md\nline one line two\n\n\
         [2] score=0.25 src=data/doc2.md\n{}\n",
        "y".repeat(1200)
    );
    assert_eq!(output, expected);
}

#[test]
fn plain_output_is_answer_only() {
    let response = AnswerResponse {
        answer: "just this".to_string(),
        contexts: Vec::new(),
    };

    assert_eq!(
        render(&response, OutputFormat::Plain).expect("render should succeed"),
        "just this"
    );
}

#[test]
fn json_flag_implies_context() {
    assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Plain);
    assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Context);
    assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Json);
    assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Json);
}

#[test]
fn user_message_lists_each_source_in_order() {
    let contexts: Vec<RetrievedResult> = (1..=2)
        .map(|i| RetrievedResult {
            rank: i,
            score: 0.5,
            metadata: metadata(i),
            text: format!("body {}", i),
            score_kind: ScoreKind::Similarity,
        })
        .collect();

    let messages = build_messages("q", &contexts);

    assert!(messages[1].content.contains(
        "---------------------\n\
         file_path: data/doc1.md\n\nbody 1\n\n\
         file_path: data/doc2.md\n\nbody 2\n\n\
         ---------------------\n"
    ));
}
