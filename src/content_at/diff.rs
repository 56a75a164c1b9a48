/*!
 * Character level diff between two plain texts.
 *
 * Myers' O(ND) algorithm over chars, after trimming the common prefix and
 * suffix. The edit path is kept as compact per-step snapshots so memory grows
 * with the square of the edit distance, not with the text length. Past
 * `MAX_EDIT_DISTANCE` the middle part is reported as one replacement.
 */

use log::debug;

/// Edit distance beyond which the diff falls back to a single replacement
const MAX_EDIT_DISTANCE: usize = 4096;

/// One diff instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOp {
    Equal(String),
    Delete(String),
    Insert(String),
}

impl DiffOp {
    pub fn text(&self) -> &str {
        match self {
            Self::Equal(t) | Self::Delete(t) | Self::Insert(t) => t,
        }
    }

    pub fn char_len(&self) -> usize {
        self.text().chars().count()
    }
}

/// A changed region, in character offsets of both texts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: usize,
    pub old_end: usize,
    pub new_start: usize,
    pub new_end: usize,
}

impl Hunk {
    /// Character distance from an old offset to this hunk (0 when touching)
    pub fn distance_to(&self, old_offset: usize) -> usize {
        if old_offset < self.old_start {
            self.old_start - old_offset
        } else if old_offset > self.old_end {
            old_offset - self.old_end
        } else {
            0
        }
    }
}

/// Diff of two texts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDiff {
    ops: Vec<DiffOp>,
}

impl TextDiff {
    /// Compute the diff of two strings
    pub fn new(old: &str, new: &str) -> Self {
        let a: Vec<char> = old.chars().collect();
        let b: Vec<char> = new.chars().collect();
        Self {
            ops: coalesce(diff_chars(&a, &b)),
        }
    }

    pub fn ops(&self) -> &[DiffOp] {
        &self.ops
    }

    /// Whether both texts are identical
    pub fn is_identity(&self) -> bool {
        self.ops.iter().all(|op| matches!(op, DiffOp::Equal(_)))
    }

    /// Number of characters both texts share along the edit path
    pub fn common_len(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, DiffOp::Equal(_)))
            .map(DiffOp::char_len)
            .sum()
    }

    /// Map an old offset to the new text.
    ///
    /// The offset is anchored to the character that follows it: inside an
    /// unchanged run it moves with that character, inside a deletion it lands
    /// where the deleted text used to be.
    pub fn map_offset(&self, old_offset: usize) -> usize {
        let mut old_pos = 0;
        let mut new_pos = 0;
        for op in &self.ops {
            let len = op.char_len();
            match op {
                DiffOp::Equal(_) => {
                    if old_offset < old_pos + len {
                        return new_pos + (old_offset - old_pos);
                    }
                    old_pos += len;
                    new_pos += len;
                }
                DiffOp::Delete(_) => {
                    if old_offset < old_pos + len {
                        return new_pos;
                    }
                    old_pos += len;
                }
                DiffOp::Insert(_) => new_pos += len,
            }
        }
        new_pos
    }

    /// Changed regions in order
    pub fn hunks(&self) -> Vec<Hunk> {
        let mut hunks = Vec::new();
        let mut old_pos = 0;
        let mut new_pos = 0;
        let mut current: Option<Hunk> = None;
        for op in &self.ops {
            let len = op.char_len();
            match op {
                DiffOp::Equal(_) => {
                    if let Some(hunk) = current.take() {
                        hunks.push(hunk);
                    }
                    old_pos += len;
                    new_pos += len;
                }
                DiffOp::Delete(_) | DiffOp::Insert(_) => {
                    let hunk = current.get_or_insert(Hunk {
                        old_start: old_pos,
                        old_end: old_pos,
                        new_start: new_pos,
                        new_end: new_pos,
                    });
                    if matches!(op, DiffOp::Delete(_)) {
                        old_pos += len;
                        hunk.old_end = old_pos;
                    } else {
                        new_pos += len;
                        hunk.new_end = new_pos;
                    }
                }
            }
        }
        if let Some(hunk) = current {
            hunks.push(hunk);
        }
        hunks
    }
}

/// Longest common subsequence length of two strings, in characters
pub fn lcs_len(a: &str, b: &str) -> usize {
    TextDiff::new(a, b).common_len()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edit {
    Equal(char),
    Delete(char),
    Insert(char),
}

fn diff_chars(a: &[char], b: &[char]) -> Vec<Edit> {
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();

    let mut edits: Vec<Edit> = a[..prefix].iter().map(|c| Edit::Equal(*c)).collect();
    let a_mid = &a[prefix..a.len() - suffix];
    let b_mid = &b[prefix..b.len() - suffix];
    match myers(a_mid, b_mid) {
        Some(middle) => edits.extend(middle),
        None => {
            debug!(
                "Edit distance above {}, diffing {} vs {} chars as one replacement",
                MAX_EDIT_DISTANCE,
                a_mid.len(),
                b_mid.len()
            );
            edits.extend(a_mid.iter().map(|c| Edit::Delete(*c)));
            edits.extend(b_mid.iter().map(|c| Edit::Insert(*c)));
        }
    }
    edits.extend(a[a.len() - suffix..].iter().map(|c| Edit::Equal(*c)));
    edits
}

// @returns: Minimal edit script, or None when the distance exceeds the cap
fn myers(a: &[char], b: &[char]) -> Option<Vec<Edit>> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    let max = (n + m) as usize;
    if max == 0 {
        return Some(Vec::new());
    }
    let offset = max as isize + 1;
    let idx = |k: isize| (k + offset) as usize;

    let mut v = vec![0u32; 2 * max + 3];
    // trace[d] holds x for diagonals -d..=d after step d
    let mut trace: Vec<Vec<u32>> = Vec::new();

    'search: for d in 0..=max as isize {
        if d as usize > MAX_EDIT_DISTANCE {
            return None;
        }
        let mut k = -d;
        while k <= d {
            let mut x = if k == -d || (k != d && v[idx(k - 1)] < v[idx(k + 1)]) {
                v[idx(k + 1)] as isize
            } else {
                v[idx(k - 1)] as isize + 1
            };
            let mut y = x - k;
            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            v[idx(k)] = x as u32;
            if x >= n && y >= m {
                trace.push(v[idx(-d)..=idx(d)].to_vec());
                break 'search;
            }
            k += 2;
        }
        trace.push(v[idx(-d)..=idx(d)].to_vec());
    }

    let mut edits = Vec::new();
    let mut x = n;
    let mut y = m;
    for d in (1..trace.len() as isize).rev() {
        let prev = &trace[(d - 1) as usize];
        let get = |k: isize| prev[(k + d - 1) as usize] as isize;
        let k = x - y;
        let prev_k = if k == -d || (k != d && get(k - 1) < get(k + 1)) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = get(prev_k);
        let prev_y = prev_x - prev_k;
        while x > prev_x && y > prev_y {
            edits.push(Edit::Equal(a[(x - 1) as usize]));
            x -= 1;
            y -= 1;
        }
        if prev_k == k + 1 {
            edits.push(Edit::Insert(b[prev_y as usize]));
        } else {
            edits.push(Edit::Delete(a[prev_x as usize]));
        }
        x = prev_x;
        y = prev_y;
    }
    while x > 0 && y > 0 {
        edits.push(Edit::Equal(a[(x - 1) as usize]));
        x -= 1;
        y -= 1;
    }
    edits.reverse();
    Some(edits)
}

// Merge runs of edits into ops; inside a changed run deletions come first
fn coalesce(edits: Vec<Edit>) -> Vec<DiffOp> {
    let mut ops = Vec::new();
    let mut equal = String::new();
    let mut deleted = String::new();
    let mut inserted = String::new();

    let flush_changes = |ops: &mut Vec<DiffOp>, deleted: &mut String, inserted: &mut String| {
        if !deleted.is_empty() {
            ops.push(DiffOp::Delete(std::mem::take(deleted)));
        }
        if !inserted.is_empty() {
            ops.push(DiffOp::Insert(std::mem::take(inserted)));
        }
    };

    for edit in edits {
        match edit {
            Edit::Equal(c) => {
                flush_changes(&mut ops, &mut deleted, &mut inserted);
                equal.push(c);
            }
            Edit::Delete(c) | Edit::Insert(c) => {
                if !equal.is_empty() {
                    ops.push(DiffOp::Equal(std::mem::take(&mut equal)));
                }
                if matches!(edit, Edit::Delete(_)) {
                    deleted.push(c);
                } else {
                    inserted.push(c);
                }
            }
        }
    }
    flush_changes(&mut ops, &mut deleted, &mut inserted);
    if !equal.is_empty() {
        ops.push(DiffOp::Equal(equal));
    }
    ops
}
