// geocoder/src/normalize.rs
//
// Reversible normalization of address text.
//
// The same function produces both the Char Sequence of an input line and the
// trie key of a dictionary name, so both sides always agree:
// - NFKC per character (full-width digits and letters become ASCII)
// - whitespace and control characters become ignored cells
// - hyphen look-alikes become '-' ('ー' only next to a digit)
// - variant folding (old kanji, ヶ/ケ/ガ, ノ/之), then katakana → hiragana
// - kanji numerals in front of 丁目/番/号/... become arabic digits

use jpaddr_core::{utils, Cell, CharSequence, VariantMap};
use phf::phf_map;

static KANJI_DIGITS: phf::Map<char, u64> = phf_map! {
    '〇' => 0,
    '零' => 0,
    '一' => 1,
    '壱' => 1,
    '二' => 2,
    '弐' => 2,
    '三' => 3,
    '参' => 3,
    '四' => 4,
    '五' => 5,
    '六' => 6,
    '七' => 7,
    '八' => 8,
    '九' => 9,
};

static KANJI_UNITS: phf::Map<char, u64> = phf_map! {
    '十' => 10,
    '拾' => 10,
    '百' => 100,
    '千' => 1000,
};

/// Characters that turn a preceding kanji numeral into a number.
const NUMBER_SUFFIXES: &[&str] = &["丁", "番", "号", "地割", "条", "線", "-"];

const HYPHENS: &[char] = &[
    '‐', '‑', '‒', '–', '—', '―', '−', '─', '━', '⁃', '﹣', '－',
];

const PROLONGED_SOUND_MARK: char = 'ー';

/// Builds normalized Char Sequences and trie keys.
#[derive(Debug, Clone, Default)]
pub struct AddressNormalizer {
    variants: VariantMap,
}

impl AddressNormalizer {
    pub fn new(variants: VariantMap) -> Self {
        Self { variants }
    }

    /// Normalizer with the built-in Japanese variant table.
    pub fn standard() -> Self {
        Self::new(VariantMap::from_rules(&crate::standard_variant_rules()))
    }

    /// Normalized, reversible sequence for `input`.
    pub fn normalize(&self, input: &str) -> CharSequence {
        let mut cells = Vec::with_capacity(input.len());
        for ch in input.chars() {
            if ch.is_whitespace() || ch.is_control() {
                cells.push(Cell {
                    original: Some(ch),
                    normalized: ch,
                    ignore: true,
                });
                continue;
            }
            let mut expanded = utils::nfkc_char(ch).into_iter();
            match expanded.next() {
                Some(first) => {
                    cells.push(Cell {
                        original: Some(ch),
                        normalized: first,
                        ignore: first.is_whitespace(),
                    });
                    cells.extend(expanded.map(Cell::synthetic));
                }
                None => cells.push(Cell {
                    original: Some(ch),
                    normalized: ch,
                    ignore: true,
                }),
            }
        }

        self.fold_hyphens(&mut cells);
        for cell in cells.iter_mut().filter(|c| !c.ignore) {
            cell.normalized = utils::katakana_to_hiragana(self.variants.fold(cell.normalized));
        }
        let cells = convert_kanji_numerals(cells);
        CharSequence::from_cells(cells)
    }

    /// Trie key for a dictionary name.
    pub fn key(&self, name: &str) -> String {
        self.normalize(name).to_normalized_string()
    }

    fn fold_hyphens(&self, cells: &mut [Cell]) {
        let live: Vec<usize> = (0..cells.len()).filter(|&i| !cells[i].ignore).collect();
        for (k, &i) in live.iter().enumerate() {
            let ch = cells[i].normalized;
            if HYPHENS.contains(&ch) {
                cells[i].normalized = '-';
            } else if ch == PROLONGED_SOUND_MARK {
                let prev_digit = k > 0 && cells[live[k - 1]].normalized.is_ascii_digit();
                let next_digit = live
                    .get(k + 1)
                    .is_some_and(|&n| cells[n].normalized.is_ascii_digit());
                if prev_digit || next_digit {
                    cells[i].normalized = '-';
                }
            }
        }
    }
}

fn is_kanji_numeral(ch: char) -> bool {
    KANJI_DIGITS.contains_key(&ch) || KANJI_UNITS.contains_key(&ch)
}

/// Value of a run of kanji numerals: `二十三` → 23, `百五` → 105, and
/// positional runs without units: `一二` → 12.
pub fn parse_kanji_number(run: &[char]) -> Option<u64> {
    if run.is_empty() || !run.iter().all(|&c| is_kanji_numeral(c)) {
        return None;
    }
    if !run.iter().any(|c| KANJI_UNITS.contains_key(c)) {
        return run.iter().try_fold(0u64, |acc, c| {
            acc.checked_mul(10)?.checked_add(*KANJI_DIGITS.get(c)?)
        });
    }
    let mut total = 0u64;
    let mut current = 0u64;
    for c in run {
        if let Some(&d) = KANJI_DIGITS.get(c) {
            current = current.checked_mul(10)?.checked_add(d)?;
        } else if let Some(&unit) = KANJI_UNITS.get(c) {
            let factor = if current == 0 { 1 } else { current };
            total = total.checked_add(factor.checked_mul(unit)?)?;
            current = 0;
        }
    }
    total.checked_add(current)
}

fn convert_kanji_numerals(cells: Vec<Cell>) -> Vec<Cell> {
    let mut cells = cells;
    let live: Vec<usize> = (0..cells.len()).filter(|&i| !cells[i].ignore).collect();
    // (cell index, synthetic cells to insert after it)
    let mut inserts: Vec<(usize, Vec<Cell>)> = Vec::new();

    let mut k = 0;
    while k < live.len() {
        if !is_kanji_numeral(cells[live[k]].normalized) {
            k += 1;
            continue;
        }
        let start = k;
        while k < live.len() && is_kanji_numeral(cells[live[k]].normalized) {
            k += 1;
        }
        let following: String = live[k..]
            .iter()
            .take(2)
            .map(|&i| cells[i].normalized)
            .collect();
        if !NUMBER_SUFFIXES.iter().any(|s| following.starts_with(s)) {
            continue;
        }
        let run: Vec<char> = live[start..k].iter().map(|&i| cells[i].normalized).collect();
        let Some(value) = parse_kanji_number(&run) else {
            continue;
        };
        let digits: Vec<char> = value.to_string().chars().collect();
        for (n, &i) in live[start..k].iter().enumerate() {
            match digits.get(n) {
                Some(&d) => cells[i].normalized = d,
                None => cells[i].ignore = true,
            }
        }
        if digits.len() > k - start {
            let extra = digits[k - start..].iter().map(|&d| Cell::synthetic(d)).collect();
            inserts.push((live[k - 1], extra));
        }
    }

    if inserts.is_empty() {
        return cells;
    }
    let mut out = Vec::with_capacity(cells.len() + inserts.len());
    let mut pending = inserts.into_iter().peekable();
    for (i, cell) in cells.into_iter().enumerate() {
        out.push(cell);
        if let Some((_, extra)) = pending.next_if(|(at, _)| *at == i) {
            out.extend(extra);
        }
    }
    out
}
