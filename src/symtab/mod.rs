//! Chained hash table with definition history
//!
//! Separate chaining over the djb2 hash. Each visible entry carries a
//! stack of shadowed prior values so `pushdef`/`popdef` can save and
//! restore definitions without disturbing the collision chain.

pub struct Entry<V> {
    name: String,
    val: V,
    /// Shadowed prior values, most recent first.
    hist: Option<Box<Entry<V>>>,
    next: Option<Box<Entry<V>>>,
}

pub struct SymTab<V> {
    buckets: Vec<Option<Box<Entry<V>>>>,
}

/// djb2, XOR variant.
fn hash(name: &str) -> u64 {
    let mut h: u64 = 5381;
    for &ch in name.as_bytes() {
        h = h.wrapping_mul(33) ^ u64::from(ch);
    }
    h
}

impl<V> SymTab<V> {
    pub fn new(num_buckets: usize) -> Self {
        let mut buckets = Vec::with_capacity(num_buckets);
        buckets.resize_with(num_buckets, || None);
        SymTab { buckets }
    }

    fn bucket(&self, name: &str) -> usize {
        (hash(name) % self.buckets.len() as u64) as usize
    }

    pub fn lookup(&self, name: &str) -> Option<&V> {
        let mut e = self.buckets[self.bucket(name)].as_deref();
        while let Some(entry) = e {
            if entry.name == name {
                return Some(&entry.val);
            }
            e = entry.next.as_deref();
        }
        None
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Insert or update. With `push_hist`, an existing definition is
    /// shadowed rather than replaced: the prior value moves into a
    /// history node beneath the visible entry, which takes the new
    /// value and keeps its chain position.
    pub fn upsert(&mut self, name: &str, val: V, push_hist: bool) {
        let idx = self.bucket(name);

        let mut e = self.buckets[idx].as_deref_mut();
        while let Some(entry) = e {
            if entry.name == name {
                if push_hist {
                    let old = std::mem::replace(&mut entry.val, val);
                    let shadowed = Entry {
                        name: entry.name.clone(),
                        val: old,
                        hist: entry.hist.take(),
                        next: None,
                    };
                    entry.hist = Some(Box::new(shadowed));
                } else {
                    entry.val = val;
                }
                return;
            }
            e = entry.next.as_deref_mut();
        }

        // New entry at the head of the collision chain
        let new_e = Entry {
            name: name.to_string(),
            val,
            hist: None,
            next: self.buckets[idx].take(),
        };
        self.buckets[idx] = Some(Box::new(new_e));
    }

    /// Remove a definition. With `pop_hist`, a shadowed prior value is
    /// promoted into the visible slot; otherwise the entry and its
    /// whole history are dropped. Returns false when the name is
    /// unknown.
    pub fn delete(&mut self, name: &str, pop_hist: bool) -> bool {
        let idx = self.bucket(name);

        let mut link = &mut self.buckets[idx];
        loop {
            if link.as_ref().is_none_or(|e| e.name == name) {
                break;
            }
            link = &mut link.as_mut().unwrap().next;
        }

        match link.as_mut() {
            None => false,
            Some(e) => {
                if pop_hist && e.hist.is_some() {
                    let h = e.hist.take().unwrap();
                    e.val = h.val;
                    e.hist = h.hist;
                } else {
                    let e = link.take().unwrap();
                    *link = e.next;
                }
                true
            }
        }
    }

    /// Visit every visible entry.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.buckets.iter().flat_map(|head| {
            let mut out = Vec::new();
            let mut e = head.as_deref();
            while let Some(entry) = e {
                out.push((entry.name.as_str(), &entry.val));
                e = entry.next.as_deref();
            }
            out
        })
    }
}
