use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use unicode_normalization::UnicodeNormalization;

use crate::manifest::GalleryEntry;
use crate::metadata::ExifSummary;
use crate::sidecar::OrderedIndex;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub slug: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LensCount {
    pub lens: String,
    pub slug: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LensRef {
    pub label: String,
    pub slug: String,
}

/// Tag and lens index used by the gallery filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryThemes {
    pub tags: Vec<TagCount>,
    pub lenses: Vec<LensCount>,
    pub image_lens: OrderedIndex<LensRef>,
    pub last_generated: String,
    pub source: String,
}

pub fn build_themes(
    entries: &[GalleryEntry],
    exif: &BTreeMap<String, ExifSummary>,
    source: &str,
) -> GalleryThemes {
    let mut tag_counts: HashMap<String, usize> = HashMap::new();
    let mut lens_counts: HashMap<String, usize> = HashMap::new();
    let mut image_lens = OrderedIndex::new();

    for entry in entries {
        for tag in entry.tags.iter().flatten() {
            let tag = tag.trim();
            if !tag.is_empty() {
                *tag_counts.entry(tag.to_string()).or_default() += 1;
            }
        }

        let lens = exif
            .get(&entry.src)
            .and_then(|summary| summary.lens.as_deref())
            .filter(|lens| !lens.is_empty());
        if let Some(lens) = lens {
            *lens_counts.entry(lens.to_string()).or_default() += 1;
            image_lens.push(
                entry.src.clone(),
                LensRef {
                    label: lens.to_string(),
                    slug: slugify(lens),
                },
            );
        }
    }

    let mut tags: Vec<TagCount> = tag_counts
        .into_iter()
        .map(|(tag, count)| TagCount {
            slug: slugify(&tag),
            tag,
            count,
        })
        .collect();
    tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| collate(&a.tag, &b.tag)));

    let mut lenses: Vec<LensCount> = lens_counts
        .into_iter()
        .map(|(lens, count)| LensCount {
            slug: slugify(&lens),
            lens,
            count,
        })
        .collect();
    lenses.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| collate(&a.lens, &b.lens)));

    GalleryThemes {
        tags,
        lenses,
        image_lens,
        last_generated: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        source: source.to_string(),
    }
}

/// URL-safe lower-case slug; compatibility-decomposed with accents dropped.
pub fn slugify(value: &str) -> String {
    let folded = fold(value);
    let mut slug = String::with_capacity(folded.len());
    let mut pending_dash = false;

    for c in folded.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// NFKD, combining marks removed, lower-cased.
fn fold(value: &str) -> String {
    value
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036f}').contains(&c)
}

/// Display-order comparison: base letters first, then accents, then case
/// with lower-case ahead of upper-case.
fn collate(a: &str, b: &str) -> Ordering {
    let accented = |value: &str| value.nfkd().collect::<String>().to_lowercase();
    fold(a)
        .cmp(&fold(b))
        .then_with(|| accented(a).cmp(&accented(b)))
        .then_with(|| b.cmp(a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;

    #[test]
    fn slugify_collapses_and_trims() {
        assert_eq!(slugify("  Street Photography! "), "street-photography");
        assert_eq!(slugify("XF 23mm F1.4 R"), "xf-23mm-f1-4-r");
        assert_eq!(slugify("Café -- Noir"), "cafe-noir");
        assert_eq!(slugify("Cafe\u{0301}"), "cafe");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn slugify_folds_any_decomposable_character() {
        assert_eq!(slugify("Şişli"), "sisli");
        assert_eq!(slugify("Ångström Ők"), "angstrom-ok");
        assert_eq!(slugify("ﬁlm Ｆｕｊｉ"), "film-fuji");
    }

    #[test]
    fn ties_sort_case_and_accent_insensitively() {
        let manifest = Manifest::from_json(
            r#"[{"src": "a.jpg", "tags": ["beach", "Zebra", "apple", "Éclair", "Apple"]}]"#,
        )
        .unwrap();

        let themes = build_themes(&manifest.entries, &BTreeMap::new(), "test");

        let tags: Vec<_> = themes.tags.iter().map(|t| t.tag.as_str()).collect();
        assert_eq!(tags, vec!["apple", "Apple", "beach", "Éclair", "Zebra"]);
    }

    #[test]
    fn timestamp_is_utc_with_milliseconds() {
        let themes = build_themes(&[], &BTreeMap::new(), "test");

        assert!(themes.last_generated.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&themes.last_generated).is_ok());
        let fraction = themes.last_generated.rsplit('.').next().unwrap();
        assert_eq!(fraction.len(), 4);
    }

    #[test]
    fn counts_tags_and_lenses() {
        let manifest = Manifest::from_json(
            r#"[
                {"src": "a.jpg", "tags": ["night", " city "]},
                {"src": "b.jpg", "tags": ["city", ""]},
                {"src": "c.jpg", "tags": ["alley"]},
                {"src": "d.jpg"}
            ]"#,
        )
        .unwrap();

        let mut exif = BTreeMap::new();
        for (src, lens) in [("a.jpg", "XF23mm"), ("b.jpg", "XF23mm"), ("c.jpg", "Summicron 35")] {
            exif.insert(
                src.to_string(),
                ExifSummary {
                    lens: Some(lens.to_string()),
                    ..Default::default()
                },
            );
        }

        let themes = build_themes(&manifest.entries, &exif, "test");

        let tags: Vec<_> = themes.tags.iter().map(|t| (t.tag.as_str(), t.count)).collect();
        assert_eq!(tags, vec![("city", 2), ("alley", 1), ("night", 1)]);
        assert_eq!(themes.lenses[0].lens, "XF23mm");
        assert_eq!(themes.lenses[0].count, 2);
        assert_eq!(themes.lenses[1].slug, "summicron-35");
        assert_eq!(themes.image_lens.get("c.jpg").unwrap().label, "Summicron 35");
        assert!(themes.image_lens.get("d.jpg").is_none());
        let keyed: Vec<_> = themes.image_lens.keys().collect();
        assert_eq!(keyed, vec!["a.jpg", "b.jpg", "c.jpg"]);

        let json = serde_json::to_value(&themes).unwrap();
        assert!(json.get("imageLens").is_some());
        assert!(json.get("lastGenerated").is_some());
    }
}
