// SPDX-License-Identifier: Apache-2.0

//! TTL cache for the summary and properties responses, keyed by route and
//! the tables the response was computed against.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct CachedResponse {
    pub body: Vec<u8>,
    pub etag: String,
    pub created_at: Instant,
}

pub struct ResponseCache {
    ttl: Duration,
    max_entries: usize,
    entries: HashMap<String, CachedResponse>,
}

impl ResponseCache {
    #[must_use]
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries,
            entries: HashMap::new(),
        }
    }

    pub fn get(&mut self, key: &str) -> Option<CachedResponse> {
        self.entries
            .retain(|_, v| v.created_at.elapsed() <= self.ttl);
        self.entries.get(key).cloned()
    }

    pub fn insert(&mut self, key: String, body: Vec<u8>) -> CachedResponse {
        self.entries
            .retain(|_, v| v.created_at.elapsed() <= self.ttl);
        if self.entries.len() >= self.max_entries {
            if let Some(victim) = self
                .entries
                .iter()
                .min_by_key(|(_, v)| v.created_at)
                .map(|(k, _)| k.clone())
            {
                self.entries.remove(&victim);
            }
        }
        let entry = CachedResponse {
            etag: body_etag(&body),
            body,
            created_at: Instant::now(),
        };
        self.entries.insert(key, entry.clone());
        entry
    }
}

#[must_use]
pub fn body_etag(body: &[u8]) -> String {
    let digest = Sha256::digest(body);
    format!("\"{}\"", hex::encode(&digest[..16]))
}
