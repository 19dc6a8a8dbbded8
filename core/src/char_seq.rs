//! Reversible character sequence for address text.
//!
//! A `CharSequence` is a view (`start..end`) into a shared arena of cells.
//! Each cell keeps the character as written and the character used for
//! matching, plus an `ignore` flag for soft deletion. Splitting a sequence
//! never copies the arena; only mutation of a shared arena does.
use std::fmt;
use std::sync::Arc;

/// One character of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    /// Character as written in the input. `None` for cells synthesized during
    /// normalization (e.g. the `0` of `十` → `10`).
    pub original: Option<char>,
    /// Character compared against dictionary keys.
    pub normalized: char,
    /// Ignored cells are skipped during comparison but kept for
    /// reconstructing the original text.
    pub ignore: bool,
}

impl Cell {
    pub fn new(ch: char) -> Self {
        Self {
            original: Some(ch),
            normalized: ch,
            ignore: false,
        }
    }

    pub fn synthetic(normalized: char) -> Self {
        Self {
            original: None,
            normalized,
            ignore: false,
        }
    }
}

/// Splice-friendly sequence of `Cell`s.
///
/// # Example
/// ```
/// use jpaddr_core::CharSequence;
///
/// let seq = CharSequence::from_string("東京 都");
/// let mut seq = seq.deep_copy();
/// seq.mark_ignored(|c| c.normalized == ' ');
/// assert_eq!(seq.to_normalized_string(), "東京都");
/// assert_eq!(seq.to_original_string(), "東京 都");
///
/// let (head, rest) = seq.consume(2);
/// assert_eq!(head.to_normalized_string(), "東京");
/// assert_eq!(rest.to_normalized_string(), "都");
/// ```
#[derive(Clone)]
pub struct CharSequence {
    cells: Arc<Vec<Cell>>,
    start: usize,
    end: usize,
}

impl CharSequence {
    /// Build a sequence with one cell per character, nothing ignored.
    pub fn from_string(text: &str) -> Self {
        Self::from_cells(text.chars().map(Cell::new).collect())
    }

    pub fn from_cells(cells: Vec<Cell>) -> Self {
        let end = cells.len();
        Self {
            cells: Arc::new(cells),
            start: 0,
            end,
        }
    }

    pub fn empty() -> Self {
        Self::from_cells(Vec::new())
    }

    /// Cells covered by this view, ignored ones included.
    pub fn cells(&self) -> &[Cell] {
        &self.cells[self.start..self.end]
    }

    /// Normalized characters of the non-ignored cells.
    pub fn chars(&self) -> impl Iterator<Item = char> + '_ {
        self.cells()
            .iter()
            .filter(|c| !c.ignore)
            .map(|c| c.normalized)
    }

    /// Number of non-ignored cells.
    pub fn len(&self) -> usize {
        self.cells().iter().filter(|c| !c.ignore).count()
    }

    /// True when no non-ignored cell remains.
    pub fn is_empty(&self) -> bool {
        self.cells().iter().all(|c| c.ignore)
    }

    /// Number of cells in the view, ignored ones included.
    pub fn raw_len(&self) -> usize {
        self.end - self.start
    }

    pub fn to_normalized_string(&self) -> String {
        self.chars().collect()
    }

    pub fn to_original_string(&self) -> String {
        self.cells().iter().filter_map(|c| c.original).collect()
    }

    /// Split after the `n`-th non-ignored cell.
    ///
    /// Ignored cells between consumed cells go with the consumed part; ignored
    /// cells after the last consumed one stay with the remainder. Both halves
    /// share the arena, so this is O(prefix).
    pub fn consume(&self, n: usize) -> (CharSequence, CharSequence) {
        let mut taken = 0;
        let mut split = self.start;
        if n > 0 {
            split = self.end;
            for (idx, cell) in self.cells().iter().enumerate() {
                if cell.ignore {
                    continue;
                }
                taken += 1;
                if taken == n {
                    split = self.start + idx + 1;
                    break;
                }
            }
        }
        let head = CharSequence {
            cells: Arc::clone(&self.cells),
            start: self.start,
            end: split,
        };
        let tail = CharSequence {
            cells: Arc::clone(&self.cells),
            start: split,
            end: self.end,
        };
        (head, tail)
    }

    /// The view advanced past leading ignored cells.
    pub fn trim_ignored_start(&self) -> CharSequence {
        let skip = self.cells().iter().take_while(|c| c.ignore).count();
        CharSequence {
            cells: Arc::clone(&self.cells),
            start: self.start + skip,
            end: self.end,
        }
    }

    /// Copy the view into its own arena.
    pub fn deep_copy(&self) -> CharSequence {
        Self::from_cells(self.cells().to_vec())
    }

    /// Mark every cell matching `pred` as ignored.
    pub fn mark_ignored<F>(&mut self, mut pred: F)
    where
        F: FnMut(&Cell) -> bool,
    {
        for cell in self.cells_mut() {
            if !cell.ignore && pred(cell) {
                cell.ignore = true;
            }
        }
    }

    /// Mark the first `n` non-ignored cells as ignored.
    pub fn ignore_prefix(&mut self, n: usize) {
        let mut left = n;
        for cell in self.cells_mut() {
            if left == 0 {
                break;
            }
            if !cell.ignore {
                cell.ignore = true;
                left -= 1;
            }
        }
    }

    /// Ignore leading non-ignored cells while `pred` holds.
    pub fn ignore_leading<F>(&mut self, mut pred: F)
    where
        F: FnMut(char) -> bool,
    {
        for cell in self.cells_mut() {
            if cell.ignore {
                continue;
            }
            if !pred(cell.normalized) {
                break;
            }
            cell.ignore = true;
        }
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        let mut chars = self.chars();
        prefix.chars().all(|p| chars.next() == Some(p))
    }

    // Mutable access to the view's cells. A shared arena is replaced by a
    // private copy of the view first, so siblings never observe the change.
    fn cells_mut(&mut self) -> &mut [Cell] {
        if Arc::get_mut(&mut self.cells).is_none() {
            let own = self.cells().to_vec();
            self.end = own.len();
            self.start = 0;
            self.cells = Arc::new(own);
        }
        let (start, end) = (self.start, self.end);
        match Arc::get_mut(&mut self.cells) {
            Some(cells) => &mut cells[start..end],
            None => &mut [],
        }
    }
}

impl Default for CharSequence {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for CharSequence {
    fn eq(&self, other: &Self) -> bool {
        self.cells() == other.cells()
    }
}

impl Eq for CharSequence {}

impl fmt::Debug for CharSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CharSequence")
            .field("normalized", &self.to_normalized_string())
            .field("original", &self.to_original_string())
            .finish()
    }
}

impl fmt::Display for CharSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ch in self.chars() {
            write!(f, "{}", ch)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_original_roundtrip() {
        let text = "東京都千代田区紀尾井町1-3";
        let seq = CharSequence::from_string(text);
        assert_eq!(seq.to_original_string(), text);
        assert_eq!(seq.to_normalized_string(), text);
        assert_eq!(seq.len(), text.chars().count());
    }

    #[test]
    fn test_consume_skips_ignored() {
        let mut seq = CharSequence::from_string("a b c");
        seq.mark_ignored(|c| c.normalized == ' ');
        let (head, rest) = seq.consume(2);
        assert_eq!(head.to_original_string(), "a b");
        assert_eq!(rest.to_original_string(), " c");
        assert_eq!(rest.to_normalized_string(), "c");
        assert_eq!(rest.trim_ignored_start().to_original_string(), "c");
    }

    #[test]
    fn test_consume_more_than_len() {
        let seq = CharSequence::from_string("ab");
        let (head, rest) = seq.consume(5);
        assert_eq!(head.to_normalized_string(), "ab");
        assert!(rest.is_empty());
        assert_eq!(rest.raw_len(), 0);

        let (head, rest) = seq.consume(0);
        assert!(head.is_empty());
        assert_eq!(rest.to_normalized_string(), "ab");
    }

    #[test]
    fn test_fully_ignored() {
        let mut seq = CharSequence::from_string("  ");
        seq.mark_ignored(|_| true);
        assert_eq!(seq.to_normalized_string(), "");
        assert_eq!(seq.to_original_string(), "  ");
        assert!(seq.is_empty());
    }

    #[test]
    fn test_mutating_fork_does_not_touch_sibling() {
        let seq = CharSequence::from_string("大字本町");
        let (_, rest) = seq.consume(0);
        let mut fork = rest.clone();
        fork.ignore_prefix(2);
        assert_eq!(fork.to_normalized_string(), "本町");
        assert_eq!(rest.to_normalized_string(), "大字本町");
        assert_eq!(seq.to_normalized_string(), "大字本町");
    }

    #[test]
    fn test_synthetic_cells_are_not_original() {
        let seq = CharSequence::from_cells(vec![
            Cell {
                original: Some('十'),
                normalized: '1',
                ignore: false,
            },
            Cell::synthetic('0'),
        ]);
        assert_eq!(seq.to_normalized_string(), "10");
        assert_eq!(seq.to_original_string(), "十");
    }

    #[test]
    fn test_ignore_leading_and_starts_with() {
        let mut seq = CharSequence::from_string("--3号");
        assert!(seq.starts_with("--"));
        seq.ignore_leading(|c| c == '-');
        assert_eq!(seq.to_normalized_string(), "3号");
        assert!(seq.starts_with("3"));
        assert!(!seq.starts_with("3号室"));
    }
}
