//! Test doubles for the provider capability traits

use std::collections::HashMap;
use std::sync::Mutex;

use crate::Result;
use crate::provider::{ChatMessage, ChatModel, Embedder, RerankHit, Reranker};

pub const FAKE_DIMENSION: usize = 8;

/// Deterministic bag-of-words embedder.
///
/// Texts registered with [`FakeEmbedder::with_vector`] embed to that exact
/// vector; everything else is hashed into [`FAKE_DIMENSION`] buckets.
#[derive(Debug, Default)]
pub struct FakeEmbedder {
    fixed: HashMap<String, Vec<f32>>,
    batch_sizes: Mutex<Vec<usize>>,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.fixed.insert(text.to_string(), vector);
        self
    }

    /// Size of every batch received so far, in call order
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().expect("lock poisoned").clone()
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        if let Some(vector) = self.fixed.get(text) {
            return vector.clone();
        }

        let mut vector = vec![0.0; FAKE_DIMENSION];
        for word in text.split_whitespace() {
            let bucket = word
                .bytes()
                .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
            vector[bucket % FAKE_DIMENSION] += 1.0;
        }
        vector[FAKE_DIMENSION - 1] += 0.01;
        vector
    }
}

impl Embedder for FakeEmbedder {
    fn embed(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        self.batch_sizes
            .lock()
            .expect("lock poisoned")
            .push(batch.len());
        Ok(batch.iter().map(|text| self.vector_for(text)).collect())
    }
}

/// Chat model that returns a canned answer and records what it was sent
#[derive(Debug)]
pub struct FakeChat {
    answer: String,
    received: Mutex<Vec<Vec<ChatMessage>>>,
}

impl FakeChat {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn received(&self) -> Vec<Vec<ChatMessage>> {
        self.received.lock().expect("lock poisoned").clone()
    }
}

impl ChatModel for FakeChat {
    fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        self.received
            .lock()
            .expect("lock poisoned")
            .push(messages.to_vec());
        Ok(self.answer.clone())
    }
}

/// Reranker that returns canned hits and records each request's `top_n`
#[derive(Debug)]
pub struct FakeReranker {
    hits: Vec<RerankHit>,
    requests: Mutex<Vec<(usize, usize)>>,
}

impl FakeReranker {
    pub fn new(hits: &[(usize, f32)]) -> Self {
        Self {
            hits: hits
                .iter()
                .map(|&(index, score)| RerankHit { index, score })
                .collect(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// `(document count, top_n)` for every call
    pub fn requests(&self) -> Vec<(usize, usize)> {
        self.requests.lock().expect("lock poisoned").clone()
    }
}

impl Reranker for FakeReranker {
    fn rerank(&self, _query: &str, documents: &[String], top_n: usize) -> Result<Vec<RerankHit>> {
        self.requests
            .lock()
            .expect("lock poisoned")
            .push((documents.len(), top_n));
        Ok(self.hits.iter().copied().take(top_n).collect())
    }
}
