//! Character variant folding (old/new kanji forms, kana spelling variants).
use ahash::AHashMap;

/// Maps variant characters to one canonical character.
///
/// Built from textual rules so language crates can ship their tables as
/// plain strings and users can extend them from configuration.
#[derive(Debug, Clone, Default)]
pub struct VariantMap {
    map: AHashMap<char, char>,
}

impl VariantMap {
    /// Create a new empty VariantMap.
    pub fn new() -> Self {
        Self {
            map: AHashMap::new(),
        }
    }

    /// Build a `VariantMap` from rule strings.
    ///
    /// Rules look like `"舊=旧"` (one variant) or `"ヶ|ケ|ガ=が"` (several
    /// variants folding to the same canonical character). Malformed rules and
    /// multi-character sides are skipped.
    pub fn from_rules(rules: &[String]) -> Self {
        let mut vm = VariantMap::new();
        for rule in rules {
            let Some((from, to)) = rule.split_once('=') else {
                tracing::warn!(rule = %rule, "skipping variant rule without '='");
                continue;
            };
            let Some(to) = single_char(to) else {
                tracing::warn!(rule = %rule, "skipping variant rule with bad target");
                continue;
            };
            for variant in from.split('|') {
                if let Some(v) = single_char(variant) {
                    vm.add_rule(v, to);
                }
            }
        }
        vm
    }

    /// Fold `from` to `to`. Self-mappings are ignored.
    pub fn add_rule(&mut self, from: char, to: char) {
        if from != to {
            self.map.insert(from, to);
        }
    }

    /// Canonical form of `ch` (itself when no rule applies).
    pub fn fold(&self, ch: char) -> char {
        self.map.get(&ch).copied().unwrap_or(ch)
    }

    /// Fold every character of `s`.
    pub fn fold_str(&self, s: &str) -> String {
        s.chars().map(|c| self.fold(c)).collect()
    }

    /// Whether two characters share a canonical form.
    pub fn is_equivalent(&self, a: char, b: char) -> bool {
        self.fold(a) == self.fold(b)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.trim().chars();
    let ch = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    Some(ch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rules() {
        let rules = vec![
            "舊=旧".to_string(),
            "ヶ|ケ|ガ=が".to_string(),
            "broken".to_string(),
            "ab=c".to_string(),
        ];
        let vm = VariantMap::from_rules(&rules);
        assert_eq!(vm.fold('舊'), '旧');
        assert_eq!(vm.fold('ヶ'), 'が');
        assert_eq!(vm.fold('ケ'), 'が');
        assert_eq!(vm.fold('東'), '東');
        assert_eq!(vm.len(), 4);
        assert!(vm.is_equivalent('ヶ', 'ガ'));
        assert_eq!(vm.fold_str("箱根ヶ崎"), "箱根が崎");
    }

    #[test]
    fn test_self_mapping_ignored() {
        let vm = VariantMap::from_rules(&["が|ヶ=が".to_string()]);
        assert_eq!(vm.len(), 1);
        assert_eq!(vm.fold('が'), 'が');
    }

    #[test]
    fn test_malformed_rules_are_skipped() {
        let rules = vec!["x=".to_string(), "=y".to_string(), "a=bc".to_string()];
        let vm = VariantMap::from_rules(&rules);
        assert_eq!(vm.len(), 0);
        assert_eq!(vm.fold('a'), 'a');
    }
}
