//! Exact byte-pattern search using Boyer-Moore.
//!
//! The tables are built once per query and the matcher is `Clone`, so every
//! content worker owns its own copy and nothing is shared mutably.

const ALPHABET: usize = 256;

#[derive(Debug, Clone)]
pub struct PatternMatcher {
    pattern: Vec<u8>,
    /// Distance from the last occurrence of each byte (final byte excluded)
    /// to the end of the pattern; `m` for absent bytes.
    bad_char: [usize; ALPHABET],
    /// Good suffix shifts indexed by mismatch position + 1
    good_suffix: Vec<usize>,
}

impl PatternMatcher {
    pub fn new(pattern: &[u8]) -> Self {
        Self {
            pattern: pattern.to_vec(),
            bad_char: build_bad_char_table(pattern),
            good_suffix: build_good_suffix_table(pattern),
        }
    }

    /// Returns the offset of the first occurrence of the pattern in `haystack`.
    ///
    /// An empty pattern never matches.
    pub fn search(&self, haystack: &[u8]) -> Option<usize> {
        let m = self.pattern.len();
        if m == 0 || haystack.len() < m {
            return None;
        }

        let pat = self.pattern.as_slice();
        let last = haystack.len() - m;
        let mut s = 0;
        while s <= last {
            let mut j = m;
            while j > 0 && pat[j - 1] == haystack[s + j - 1] {
                j -= 1;
            }
            if j == 0 {
                return Some(s);
            }

            // `j - 1` is the mismatch index. The bad character table is
            // measured from the pattern end, so rebase it onto the mismatch.
            let mismatch = j - 1;
            let bad = self.bad_char[usize::from(haystack[s + mismatch])]
                .saturating_sub(m - 1 - mismatch);
            s += bad.max(self.good_suffix[mismatch + 1]);
        }
        None
    }

    pub fn is_match(&self, haystack: &[u8]) -> bool {
        self.search(haystack).is_some()
    }
}

fn build_bad_char_table(pat: &[u8]) -> [usize; ALPHABET] {
    let m = pat.len();
    let mut table = [m; ALPHABET];
    for (i, &byte) in pat.iter().enumerate().take(m.saturating_sub(1)) {
        table[usize::from(byte)] = m - 1 - i;
    }
    table
}

/// Strong good suffix rule, built from the border array of the pattern.
fn build_good_suffix_table(pat: &[u8]) -> Vec<usize> {
    let m = pat.len();
    let mut table = vec![0usize; m + 1];
    let mut border = vec![0usize; m + 1];

    let mut i = m;
    let mut j = m + 1;
    border[i] = j;
    while i > 0 {
        while j <= m && pat[i - 1] != pat[j - 1] {
            if table[j] == 0 {
                table[j] = j - i;
            }
            j = border[j];
        }
        i -= 1;
        j -= 1;
        border[i] = j;
    }

    let mut k = border[0];
    for (i, shift) in table.iter_mut().enumerate() {
        if *shift == 0 {
            *shift = k;
        }
        if i == k {
            k = border[k];
        }
    }
    table
}
