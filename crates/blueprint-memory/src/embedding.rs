use async_trait::async_trait;
use blueprint_core::Credentials;
use std::collections::HashMap;

/// Embedding collaborator.
///
/// Implementations must not fail: an unsupported provider/model or a transport
/// error yields `None`, and callers skip the semantic step.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str, credentials: &Credentials) -> Option<Vec<f32>>;
}

/// Hashed bag-of-words embedding. Needs no network and is stable across
/// runs, so it doubles as the knowledge index's encoder.
pub struct LocalEmbedding {
    dimension: usize,
}

impl LocalEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Term frequencies hashed into two buckets each (the second at half
    /// weight), then L2-normalised. `None` when the text has no words.
    pub fn embed_text(&self, text: &str) -> Option<Vec<f32>> {
        let text = text.to_lowercase();
        let mut counts: HashMap<&str, u32> = HashMap::new();
        for term in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() > 1)
        {
            *counts.entry(term).or_default() += 1;
        }
        let terms: u32 = counts.values().sum();
        if terms == 0 {
            return None;
        }

        let mut dense = vec![0.0f32; self.dimension];
        for (term, n) in counts {
            let weight = n as f32 / terms as f32;
            let primary = fnv1a(term.bytes()) as usize % self.dimension;
            let secondary = fnv1a(term.bytes().chain([1u8])) as usize % self.dimension;
            dense[primary] += weight;
            dense[secondary] += weight * 0.5;
        }

        let length = dense.iter().map(|v| v * v).sum::<f32>().sqrt();
        if length > 0.0 {
            dense.iter_mut().for_each(|v| *v /= length);
        }
        Some(dense)
    }
}

impl Default for LocalEmbedding {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedding {
    async fn embed(&self, text: &str, _credentials: &Credentials) -> Option<Vec<f32>> {
        self.embed_text(text)
    }
}

/// FNV-1a, stable across runs and platforms.
fn fnv1a(bytes: impl IntoIterator<Item = u8>) -> u32 {
    bytes
        .into_iter()
        .fold(0x811c_9dc5, |h: u32, b| (h ^ u32::from(b)).wrapping_mul(0x0100_0193))
}

/// Cosine similarity; 0.0 for mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let magnitude = |v: &[f32]| v.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denominator = magnitude(a) * magnitude(b);
    if denominator == 0.0 {
        return 0.0;
    }
    a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>() / denominator
}
