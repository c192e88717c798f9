//! The data model shared by the reader, kernel, and writer: a tracked
//! position, a region built from them, and a named pair of regions carrying
//! the alignment outputs once C4/C5 have run.

/// One column of a region: a base symbol plus K binary epigenomic marks.
///
/// `marks` is stored as a dense bitmask rather than a `Vec<bool>` or a
/// string-keyed map, per the design note against string-keyed state: the
/// combined 2^K epi-state space is meant to be a flat table index, and a
/// `u32` is the natural carrier for up to 32 tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedPosition {
    pub base:  u8,
    pub marks: u32,
}

impl TrackedPosition {
    pub fn new(base: u8, marks: u32) -> Self {
        Self { base, marks }
    }
}

/// An ordered sequence of [`TrackedPosition`]s with a name, the unit C3
/// produces and C4 consumes read-only.
#[derive(Debug, Clone)]
pub struct Region {
    pub name:      String,
    pub positions: Vec<TrackedPosition>,
    /// Number of epigenomic tracks (K). Fixed across every region in a run.
    pub num_tracks: usize,
}

impl Region {
    pub fn new(name: String, positions: Vec<TrackedPosition>, num_tracks: usize) -> Self {
        Self {
            name,
            positions,
            num_tracks,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// An endpoint or start-point in the DP matrix: (query row, target column).
pub type MatrixPoint = (usize, usize);

/// Two regions sharing a name, query S1 and target S2, augmented with the
/// outputs of alignment once C4 (and optionally C5) have run.
#[derive(Debug, Clone)]
pub struct RegionPair {
    pub name: String,
    pub s1:   Region,
    pub s2:   Region,

    /// Carried through verbatim from the `$$$n1$n2...` header suffix, if
    /// present; opaque to the core, echoed on output.
    pub header_suffix: Option<String>,

    pub score:          Option<f64>,
    pub averaged_score: Option<f64>,
    pub start_point:    Option<MatrixPoint>,
    pub endpoint:       Option<MatrixPoint>,
    pub score_vector:   Option<Vec<f64>>,
    pub alignment_path: Option<AlignmentPath>,
}

impl RegionPair {
    pub fn new(name: String, s1: Region, s2: Region, header_suffix: Option<String>) -> Self {
        Self {
            name,
            s1,
            s2,
            header_suffix,
            score: None,
            averaged_score: None,
            start_point: None,
            endpoint: None,
            score_vector: None,
            alignment_path: None,
        }
    }

    /// `name` with the verbatim header suffix (if any) reattached, exactly
    /// as it must be echoed on every output stream.
    pub fn display_name(&self) -> String {
        match &self.header_suffix {
            Some(suffix) => format!("{}{}", self.name, suffix),
            None => self.name.clone(),
        }
    }
}

/// The reconstructed traceback of a [`RegionPair`]: aligned base strings,
/// per-track strings, and the match-marker string, all the same length.
#[derive(Debug, Clone)]
pub struct AlignmentPath {
    pub s1_bases:  String,
    pub s2_bases:  String,
    pub markers:   String,
    pub s1_tracks: Vec<String>,
    pub s2_tracks: Vec<String>,
}

impl AlignmentPath {
    /// Swaps the S1/S2 labels, used when the kernel placed S2 (not S1) on
    /// the query/row axis because it was the shorter region.
    pub fn swapped(self) -> Self {
        Self {
            s1_bases:  self.s2_bases,
            s2_bases:  self.s1_bases,
            markers:   self.markers,
            s1_tracks: self.s2_tracks,
            s2_tracks: self.s1_tracks,
        }
    }
}
