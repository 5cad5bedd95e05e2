//! Domain-aware keyword expansion for report search.
//!
//! Query terms are mapped through a fixed synonym table covering the three
//! descriptive report fields (environment, camouflage, equipment). If no
//! table term occurs, we fall back to plain stop-word removal so arbitrary
//! phrasing still produces something searchable.

/// Synonym table in iteration order. Matching is substring containment
/// over the lowercased query, so "camo" also fires on "camouflage" — the
/// resulting duplicates are harmless to the store's OR search.
const SYNONYMS: &[(&str, &str)] = &[
    // Environment terms
    ("woodland", "woodland"),
    ("forest", "woodland"),
    ("desert", "desert"),
    ("urban", "urban"),
    ("mountain", "mountain"),
    ("jungle", "jungle"),
    ("field", "field"),
    ("terrain", "terrain"),
    // Camouflage patterns
    ("camouflage", "camouflage"),
    ("camo", "camouflage"),
    ("uniform", "camouflage"),
    ("pattern", "pattern"),
    ("digital", "digital"),
    ("multicam", "multicam"),
    ("ghillie", "ghillie"),
    // Equipment terms
    ("equipment", "equipment"),
    ("weapon", "weapon rifle"),
    ("rifle", "rifle"),
    ("gear", "gear"),
    ("backpack", "backpack"),
    ("tactical", "tactical"),
    ("helmet", "helmet"),
    ("vest", "vest"),
];

const STOPWORDS: &[&str] = &[
    "what", "when", "where", "who", "how", "many", "is", "are", "was", "were",
    "the", "a", "an", "in", "on", "at", "to", "for", "of", "with", "by",
    "tell", "me", "about", "show", "give", "find", "get", "any", "all",
    "detected", "detection", "report", "reports",
];

/// Expand the query into a canonical search string.
///
/// Returns the space-joined mapped values of every synonym-table term
/// found in the query, in table order. With no table hits, falls back to
/// stop-word removal over the case-folded query (dropping tokens of
/// length two or less). An empty result is valid and means "no usable
/// keywords."
pub fn expand_keywords(query: &str) -> String {
    let q = query.to_lowercase();

    let mapped: Vec<&str> = SYNONYMS
        .iter()
        .filter(|(term, _)| q.contains(term))
        .map(|(_, canonical)| *canonical)
        .collect();

    if !mapped.is_empty() {
        return mapped.join(" ");
    }

    q.split_whitespace()
        .filter(|w| !STOPWORDS.contains(w) && w.len() > 2)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_terms_map_to_canonical_forms() {
        let expanded = expand_keywords("any soldiers in the forest?");
        assert_eq!(expanded, "woodland");
    }

    #[test]
    fn test_camo_gear_expands_to_both_canonical_terms() {
        let expanded = expand_keywords("Tell me about camo gear");
        assert!(expanded.contains("camouflage"));
        assert!(expanded.contains("gear"));
    }

    #[test]
    fn test_weapon_maps_to_two_terms() {
        assert_eq!(expand_keywords("weapon sightings"), "weapon rifle");
    }

    #[test]
    fn test_table_order_and_duplicates_preserved() {
        // "camouflage" fires both the "camouflage" and "camo" entries.
        let expanded = expand_keywords("woodland camouflage");
        assert_eq!(expanded, "woodland camouflage camouflage");
    }

    #[test]
    fn test_stopword_fallback() {
        let expanded = expand_keywords("What did the sentries observe");
        assert_eq!(expanded, "did sentries observe");
    }

    #[test]
    fn test_short_tokens_dropped_in_fallback() {
        assert_eq!(expand_keywords("is it up or ok"), "");
    }

    #[test]
    fn test_empty_query_yields_empty_keywords() {
        assert_eq!(expand_keywords(""), "");
    }
}
