//! Bounded LRU of recently seen object identifiers.
//!
//! Owned by a single directory task, so there is no locking. Files in one
//! directory usually share objects (packed small files), and checking here
//! first keeps most of them away from the global index mutex.

#[derive(Debug)]
struct Node {
    key: Box<str>,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Most-recently-used list with tail eviction.
///
/// Nodes live in an arena and link by index; freed slots are reused.
#[derive(Debug)]
pub struct PerTaskCache {
    nodes: Vec<Node>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
    capacity: usize,
}

impl PerTaskCache {
    /// Create a cache holding at most `capacity` keys (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            nodes: Vec::with_capacity(capacity.min(1024) + 1),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
            capacity,
        }
    }

    /// Look up `key`; a hit is promoted to most recently used.
    pub fn probe(&mut self, key: &str) -> bool {
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            if &*self.nodes[idx].key == key {
                self.unlink(idx);
                self.push_front(idx);
                return true;
            }
            cursor = self.nodes[idx].next;
        }
        false
    }

    /// Insert `key` as most recently used, evicting the oldest key when full.
    ///
    /// Callers probe first; inserting a key already present stores it twice.
    pub fn insert(&mut self, key: &str) {
        let node = Node {
            key: key.into(),
            prev: None,
            next: None,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };
        self.push_front(idx);
        self.len += 1;

        if self.len > self.capacity {
            if let Some(tail) = self.tail {
                self.unlink(tail);
                self.nodes[tail].key = Box::from("");
                self.free.push(tail);
                self.len -= 1;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Keys from most to least recently used
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let idx = cursor?;
            cursor = self.nodes[idx].next;
            Some(&*self.nodes[idx].key)
        })
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
        self.nodes[idx].prev = None;
        self.nodes[idx].next = None;
    }

    fn push_front(&mut self, idx: usize) {
        self.nodes[idx].prev = None;
        self.nodes[idx].next = self.head;
        if let Some(h) = self.head {
            self.nodes[h].prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }
}
