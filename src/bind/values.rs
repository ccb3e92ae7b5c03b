//! Decoded `application/x-www-form-urlencoded` / query-string data.

/// Ordered multimap of decoded key/value pairs.
#[derive(Clone, Debug, Default)]
pub struct Values {
    pairs: Vec<(String, String)>,
}

impl Values {
    pub fn parse(raw: &[u8]) -> Result<Self, serde_urlencoded::de::Error> {
        let pairs = serde_urlencoded::from_bytes::<Vec<(String, String)>>(raw)?;
        Ok(Self { pairs })
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Appends `other`'s pairs after this one's.
    pub fn extend(&mut self, other: Values) {
        self.pairs.extend(other.pairs);
    }

    /// Every value for `key`, in wire order.
    pub fn all(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

impl From<Vec<(String, String)>> for Values {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }
}
