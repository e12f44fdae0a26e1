use std::hash::{Hash, Hasher};

use twox_hash::XxHash64;

use localrag_core::{EmbedError, Embedder, Embedding};

/// Deterministic bag-of-words embedder: every lowercased token is hashed into
/// one of `dim` buckets and the result is L2-normalised. No model, no network.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
    id: String,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim, id: format!("hashing:xxh64:d{}", dim) }
    }
}

impl Embedder for HashingEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbedError> {
        if text.is_empty() {
            return Err(EmbedError::EmptyInput);
        }
        if self.dim == 0 {
            return Err(EmbedError::MalformedResponse("hashing embedder configured with zero dimensions".to_string()));
        }
        let mut v = vec![0f32; self.dim];
        let tokens = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase);
        for token in tokens {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            v[idx] += sign * (0.5 + ((h >> 32) as u32) as f32 / u32::MAX as f32);
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_dimensions_is_an_error_not_a_panic() {
        assert!(matches!(HashingEmbedder::new(0).embed("returns"), Err(EmbedError::MalformedResponse(_))));
    }

    #[test]
    fn deterministic_and_normalised() {
        let e = HashingEmbedder::new(64);
        let a = e.embed("Returns are accepted within 30 days").unwrap();
        let b = e.embed("Returns are accepted within 30 days").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "norm={norm}");
    }

    #[test]
    fn case_and_punctuation_do_not_matter() {
        let e = HashingEmbedder::new(32);
        assert_eq!(e.embed("Hello, World!").unwrap(), e.embed("hello world").unwrap());
    }

    #[test]
    fn punctuation_only_text_is_the_zero_vector() {
        let e = HashingEmbedder::new(8);
        assert!(e.embed("?!").unwrap().iter().all(|x| *x == 0.0));
    }

    #[test]
    fn empty_text_is_rejected() {
        assert!(matches!(HashingEmbedder::new(8).embed(""), Err(EmbedError::EmptyInput)));
    }
}
