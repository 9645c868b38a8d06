// src/shader/defines.rs
//! Preprocessor define sets.
//!
//! A `DefineSet` is part of the key that selects a compiled program variant, so
//! equality and hashing only look at the sorted entries, never at the cached
//! text. The compiled `#define` block is built once per change and reused.

use std::borrow::Cow;
use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::hash::{Hash, Hasher};

use xxhash_rust::xxh3::Xxh3;

/// Marker stored for presence-only defines and `true` booleans.
const PRESENT: &str = "1";

/// Value written through [`DefineSet::set`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefineValue {
    /// `true` stores `1`, `false` removes the define.
    Boolean(bool),
    Int(i64),
    Float(f32),
    /// Any other parameter type: only presence matters.
    Present,
}

impl DefineValue {
    fn render(self) -> Option<Cow<'static, str>> {
        match self {
            DefineValue::Boolean(true) | DefineValue::Present => Some(Cow::Borrowed(PRESENT)),
            DefineValue::Boolean(false) => None,
            DefineValue::Int(i) => Some(Cow::Owned(i.to_string())),
            // Debug keeps a decimal point ("1.0") so GLSL sees a float literal.
            DefineValue::Float(f) => Some(Cow::Owned(format!("{:?}", f))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DefineSet {
    entries: BTreeMap<String, Cow<'static, str>>,
    compiled: OnceCell<String>,
}

impl DefineSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|v| v.as_ref())
    }

    /// Writes `key`. `None` (and `Boolean(false)`) removes it. Returns true only
    /// when the stored representation actually changed.
    pub fn set(&mut self, key: &str, value: Option<DefineValue>) -> bool {
        let rendered = match value.and_then(DefineValue::render) {
            Some(r) => r,
            None => return self.remove(key),
        };

        let changed = match self.entries.get_mut(key) {
            Some(existing) => {
                let same = match (&*existing, &rendered) {
                    (Cow::Borrowed(a), Cow::Borrowed(b)) if std::ptr::eq(*a, *b) => true,
                    (a, b) => a == b,
                };
                if !same {
                    *existing = rendered;
                }
                !same
            }
            None => {
                self.entries.insert(key.to_owned(), rendered);
                true
            }
        };

        if changed {
            self.compiled.take();
        }
        changed
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.compiled.take();
        }
        removed
    }

    /// Merges every entry of `other`, overwriting on conflict.
    pub fn add_from(&mut self, other: &DefineSet) {
        for (k, v) in &other.entries {
            self.entries.insert(k.clone(), v.clone());
        }
        self.compiled.take();
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.compiled.take();
    }

    /// `#define KEY VALUE\n` for every entry in ascending key order.
    pub fn compiled(&self) -> &str {
        self.compiled.get_or_init(|| {
            let mut out = String::new();
            for (k, v) in &self.entries {
                let _ = writeln!(out, "#define {} {}", k, v);
            }
            out
        })
    }

    /// Stable 64-bit digest of the entries, for logs and cache diagnostics.
    pub fn fingerprint(&self) -> u64 {
        let mut h = Xxh3::new();
        for (k, v) in &self.entries {
            h.update(k.as_bytes());
            h.update(&[0]);
            h.update(v.as_bytes());
            h.update(&[0]);
        }
        h.digest()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }
}

impl PartialEq for DefineSet {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for DefineSet {}

impl Hash for DefineSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.entries.hash(state);
    }
}
