use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;

/// Key matching every entry that has no explicit mapping.
pub const WILDCARD: &str = "*";

/// Target of one rename entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawTarget", into = "RawTarget")]
pub enum RenameTarget {
    /// Rename to this name; an empty name drops the entry
    Name(String),
    /// Keep the key unchanged (`true`)
    Keep,
    /// Drop the entry (`false`)
    Drop,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum RawTarget {
    Flag(bool),
    Name(String),
}

impl From<RawTarget> for RenameTarget {
    fn from(value: RawTarget) -> Self {
        match value {
            RawTarget::Flag(true) => RenameTarget::Keep,
            RawTarget::Flag(false) => RenameTarget::Drop,
            RawTarget::Name(name) => RenameTarget::Name(name),
        }
    }
}

impl From<RenameTarget> for RawTarget {
    fn from(value: RenameTarget) -> Self {
        match value {
            RenameTarget::Name(name) => RawTarget::Name(name),
            RenameTarget::Keep => RawTarget::Flag(true),
            RenameTarget::Drop => RawTarget::Flag(false),
        }
    }
}

impl From<&str> for RenameTarget {
    fn from(value: &str) -> Self {
        RenameTarget::Name(value.to_owned())
    }
}

impl From<bool> for RenameTarget {
    fn from(value: bool) -> Self {
        if value {
            RenameTarget::Keep
        } else {
            RenameTarget::Drop
        }
    }
}

/// Ordered rename map, column label to property name when reading and
/// property name to column label when writing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenameMap(IndexMap<String, RenameTarget>);

impl RenameMap {
    pub fn new() -> Self {
        RenameMap::default()
    }

    pub fn insert(&mut self, key: &str, target: impl Into<RenameTarget>) -> &mut Self {
        self.0.insert(key.to_owned(), target.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&RenameTarget> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RenameTarget)> {
        self.0.iter()
    }

    /// Resolves a key: the explicit entry, else the wildcard, else the key itself.
    /// `None` means the key is dropped.
    pub fn resolve(&self, key: &str) -> Option<String> {
        match self.0.get(key).or_else(|| self.0.get(WILDCARD)) {
            None | Some(RenameTarget::Keep) => Some(key.to_owned()),
            Some(RenameTarget::Drop) => None,
            Some(RenameTarget::Name(name)) if name.is_empty() => None,
            Some(RenameTarget::Name(name)) => Some(name.to_owned()),
        }
    }

    /// Builds the opposite-direction map.
    ///
    /// Renames are swapped, boolean entries stay on their key. A wildcard
    /// renaming to a fixed name cannot be reversed and becomes a wildcard drop.
    pub fn invert(&self) -> RenameMap {
        let mut inverted = RenameMap::new();
        for (key, target) in &self.0 {
            match target {
                RenameTarget::Name(_) if key == WILDCARD => {
                    inverted.insert(WILDCARD, RenameTarget::Drop);
                }
                RenameTarget::Name(name) if name.is_empty() => {
                    inverted.insert(key, RenameTarget::Drop);
                }
                RenameTarget::Name(name) => {
                    inverted.insert(name, key.as_str());
                }
                other => {
                    inverted.insert(key, other.clone());
                }
            }
        }
        inverted
    }
}

impl<K: AsRef<str>, T: Into<RenameTarget>> FromIterator<(K, T)> for RenameMap {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        let mut map = RenameMap::new();
        for (key, target) in iter {
            map.insert(key.as_ref(), target);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_explicit_then_wildcard_then_keep() {
        let map: RenameMap = [("A", RenameTarget::from("name")), ("B", RenameTarget::Drop), ("C", RenameTarget::Keep)]
            .into_iter()
            .collect();
        assert_eq!(map.resolve("A"), Some("name".to_owned()));
        assert_eq!(map.resolve("B"), None);
        assert_eq!(map.resolve("C"), Some("C".to_owned()));
        assert_eq!(map.resolve("D"), Some("D".to_owned()));

        let mut dropping = map.clone();
        dropping.insert(WILDCARD, false);
        assert_eq!(dropping.resolve("D"), None);
        assert_eq!(dropping.resolve("A"), Some("name".to_owned()));

        let mut renaming = RenameMap::new();
        renaming.insert(WILDCARD, "other");
        assert_eq!(renaming.resolve("Z"), Some("other".to_owned()));
    }

    #[test]
    fn empty_name_drops() {
        let mut map = RenameMap::new();
        map.insert("A", "");
        assert_eq!(map.resolve("A"), None);
    }

    #[test]
    fn invert_swaps_names_and_keeps_sentinels() {
        let map: RenameMap = serde_json::from_str(r#"{"*": false, "A": "string_field", "B": true}"#).unwrap();
        let inverted = map.invert();
        assert_eq!(inverted.resolve("string_field"), Some("A".to_owned()));
        assert_eq!(inverted.resolve("B"), Some("B".to_owned()));
        assert_eq!(inverted.resolve("other"), None);
        assert_eq!(inverted.get(WILDCARD), Some(&RenameTarget::Drop));

        let mut fixed = RenameMap::new();
        fixed.insert(WILDCARD, "everything");
        assert_eq!(fixed.invert().resolve("x"), None);
    }

    #[test]
    fn json_round_trip_keeps_order() -> Result<(), serde_json::Error> {
        let text = r#"{"B":"b","*":false,"A":true}"#;
        let map: RenameMap = serde_json::from_str(text)?;
        let keys: Vec<&str> = map.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, vec!["B", "*", "A"]);
        assert_eq!(serde_json::to_string(&map)?, text);
        Ok(())
    }
}
