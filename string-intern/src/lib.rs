use std::collections::HashSet;
use std::fmt;
use std::sync::{LazyLock, Mutex};

use serde::de::{Deserialize, Deserializer, Visitor};
use serde::ser::{Serialize, Serializer};

static INTERNED: LazyLock<Mutex<HashSet<&'static str>>> =
    LazyLock::new(|| Mutex::new(HashSet::new()));

/// A process-lifetime interned string. Copying is free, equality and
/// hashing are pointer operations.
#[derive(Clone, Copy)]
pub struct Intern(&'static str);

impl Intern {
    pub fn new(s: impl AsRef<str>) -> Self {
        let s = s.as_ref();
        let mut set = INTERNED.lock().unwrap();
        if let Some(&existing) = set.get(s) {
            return Intern(existing);
        }
        // First sighting: leak to get a &'static str
        let leaked: &'static str = Box::leak(s.to_owned().into_boxed_str());
        set.insert(leaked);
        Intern(leaked)
    }

    /// Intern a string literal without leaking a copy of it.
    pub fn from_static(s: &'static str) -> Self {
        let mut set = INTERNED.lock().unwrap();
        if let Some(&existing) = set.get(s) {
            return Intern(existing);
        }
        set.insert(s);
        Intern(s)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

// Equality and hashing go through the pointer. Interning guarantees one
// address per distinct string content.
impl PartialEq for Intern {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.0.as_ptr(), other.0.as_ptr())
    }
}

impl Eq for Intern {}

impl std::hash::Hash for Intern {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.as_ptr().hash(state);
    }
}

// Ordering stays string-based so sorted output reads sensibly.
impl PartialOrd for Intern {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Intern {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        if std::ptr::eq(self.0.as_ptr(), other.0.as_ptr()) {
            std::cmp::Ordering::Equal
        } else {
            self.0.cmp(other.0)
        }
    }
}

impl fmt::Display for Intern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl fmt::Debug for Intern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Intern({:?})", self.0)
    }
}

impl AsRef<str> for Intern {
    fn as_ref(&self) -> &str {
        self.0
    }
}

impl AsRef<std::path::Path> for Intern {
    fn as_ref(&self) -> &std::path::Path {
        std::path::Path::new(self.0)
    }
}

impl std::ops::Deref for Intern {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.0
    }
}

impl From<&str> for Intern {
    fn from(value: &str) -> Self {
        Intern::new(value)
    }
}

impl From<String> for Intern {
    fn from(value: String) -> Self {
        Intern::new(value)
    }
}

impl Serialize for Intern {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0)
    }
}

impl<'de> Deserialize<'de> for Intern {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct InternVisitor;

        impl Visitor<'_> for InternVisitor {
            type Value = Intern;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Intern::new(v))
            }

            fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Intern::new(v))
            }
        }

        deserializer.deserialize_str(InternVisitor)
    }
}
