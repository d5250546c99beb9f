use std::collections::{HashSet, VecDeque};

/// Bounded set of recently seen transaction signatures; oldest evicted first
pub struct SignatureCache {
    capacity: usize,
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl SignatureCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    /// Returns false when the signature was already recorded
    pub fn insert(&mut self, signature: &str) -> bool {
        if self.seen.contains(signature) {
            return false;
        }

        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }

        self.order.push_back(signature.to_string());
        self.seen.insert(signature.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }
}
