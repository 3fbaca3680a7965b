//! JSON side-files written next to the manifest (`exif.json`, `colorTreemap.json`, ...).

use serde::de::{DeserializeOwned, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::path::Path;

use crate::error::Result;

/// `src -> T` pairs written as a JSON object in manifest order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedIndex<T>(Vec<(String, T)>);

impl<T> OrderedIndex<T> {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, src: String, value: T) {
        self.0.push((src, value));
    }

    pub fn get(&self, src: &str) -> Option<&T> {
        self.0.iter().find(|(key, _)| key == src).map(|(_, value)| value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T> Default for OrderedIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<(String, T)> for OrderedIndex<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<T: Serialize> Serialize for OrderedIndex<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for OrderedIndex<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct IndexVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for IndexVisitor<T> {
            type Value = OrderedIndex<T>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object keyed by image src")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
                let mut index = OrderedIndex::new();
                while let Some((key, value)) = access.next_entry()? {
                    index.push(key, value);
                }
                Ok(index)
            }
        }

        deserializer.deserialize_map(IndexVisitor(PhantomData))
    }
}

/// Read a `src -> T` side-file; a missing file is an empty map.
pub async fn read_index<T: DeserializeOwned>(path: &Path) -> Result<BTreeMap<String, T>> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => Ok(serde_json::from_str(&raw)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(e.into()),
    }
}

pub async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, json).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ExifSummary;

    #[tokio::test]
    async fn index_round_trips_and_defaults_to_empty() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("_data").join("exif.json");

        let empty: BTreeMap<String, ExifSummary> = read_index(&path).await.unwrap();
        assert!(empty.is_empty());

        let mut index = BTreeMap::new();
        index.insert(
            "a.jpg".to_string(),
            ExifSummary {
                model: Some("X100V".to_string()),
                ..Default::default()
            },
        );
        write_json(&path, &index).await.unwrap();

        let loaded: BTreeMap<String, ExifSummary> = read_index(&path).await.unwrap();
        assert_eq!(loaded, index);
    }

    #[tokio::test]
    async fn ordered_index_keeps_insertion_order() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("colors.json");

        let index: OrderedIndex<u32> = [("zebra.jpg", 1), ("apple.jpg", 2), ("mango.jpg", 3)]
            .into_iter()
            .map(|(src, n)| (src.to_string(), n))
            .collect();
        write_json(&path, &index).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let zebra = raw.find("zebra.jpg").unwrap();
        let apple = raw.find("apple.jpg").unwrap();
        let mango = raw.find("mango.jpg").unwrap();
        assert!(zebra < apple && apple < mango);
        assert_eq!(index.get("apple.jpg"), Some(&2));

        let loaded: BTreeMap<String, u32> = read_index(&path).await.unwrap();
        assert_eq!(loaded.len(), 3);

        let reread: OrderedIndex<u32> = serde_json::from_str(&raw).unwrap();
        assert_eq!(reread, index);
    }
}
