//! Clause allocator.
use std::mem::transmute;
use std::slice;

use intersat_formula::{Lit, LitIdx};

use super::header::HEADER_LEN;
use super::{Clause, ClauseHeader};

/// Integer type used to store offsets into [`ClauseAlloc`]'s memory.
type ClauseOffset = u32;

/// Bump allocator for clause storage.
///
/// Clauses are allocated from a single continuous buffer. Clauses cannot be
/// freed individually; to reclaim the space of deleted clauses, the garbage
/// collector copies the remaining clauses into a fresh `ClauseAlloc` and
/// remaps all external [`ClauseRef`]s (see
/// [`collect_garbage`](super::gc::collect_garbage)).
///
/// When the buffer is full it is reallocated with the growing strategy of
/// [`Vec`]. References store offsets, not pointers, so growing does not
/// invalidate them.
///
/// **Safety**: using the safe methods is always memory safe, even when
/// invariants of the clause storage are violated, e.g. by passing a
/// `ClauseRef` of a different `ClauseAlloc`. Internal unsafe code relies on
/// such invariants, so they must be upheld within this crate nevertheless.
#[derive(Default)]
pub struct ClauseAlloc {
    buffer: Vec<LitIdx>,
}

impl ClauseAlloc {
    /// Create an empty clause allocator.
    pub fn new() -> ClauseAlloc {
        ClauseAlloc::default()
    }

    /// Create a clause allocator with preallocated capacity.
    pub fn with_capacity(capacity: usize) -> ClauseAlloc {
        ClauseAlloc {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Allocate space for and add a new clause.
    ///
    /// Clauses have a minimal size of 4: unit clauses are represented on the
    /// trail, binary and ternary clauses live inline in the watch lists.
    /// Enforcing this here avoids extra bound checks when accessing the
    /// initial literals of a clause.
    ///
    /// The length stored in the header is overwritten with the length of the
    /// given slice.
    pub fn add_clause(&mut self, mut header: ClauseHeader, lits: &[Lit]) -> ClauseRef {
        let offset = self.buffer.len();

        assert!(
            lits.len() >= 4,
            "ClauseAlloc only stores clauses of length 4 and up"
        );

        assert!(
            offset <= (ClauseOffset::max_value() as usize),
            "Exceeded ClauseAlloc's maximal buffer size"
        );

        header.set_len(lits.len());

        self.buffer.extend_from_slice(&header.data);

        let lit_idx_slice = unsafe {
            // This is safe as Lit and LitIdx have the same representation
            slice::from_raw_parts(lits.as_ptr() as *const LitIdx, lits.len())
        };

        self.buffer.extend_from_slice(lit_idx_slice);

        ClauseRef {
            offset: offset as ClauseOffset,
        }
    }

    /// Access the header of a clause.
    pub fn header(&self, cref: ClauseRef) -> &ClauseHeader {
        let offset = cref.offset as usize;
        assert!(
            offset + HEADER_LEN <= self.buffer.len(),
            "ClauseRef out of bounds"
        );
        unsafe {
            let header_ptr = self.buffer.as_ptr().add(offset) as *const ClauseHeader;
            &*header_ptr
        }
    }

    /// Mutate the header of a clause.
    pub fn header_mut(&mut self, cref: ClauseRef) -> &mut ClauseHeader {
        let offset = cref.offset as usize;
        assert!(
            offset + HEADER_LEN <= self.buffer.len(),
            "ClauseRef out of bounds"
        );
        unsafe {
            let header_ptr = self.buffer.as_mut_ptr().add(offset) as *mut ClauseHeader;
            &mut *header_ptr
        }
    }

    /// Access a clause.
    pub fn clause(&self, cref: ClauseRef) -> &Clause {
        let len = self.header(cref).len();
        let offset = cref.offset as usize;
        assert!(
            offset + HEADER_LEN + len <= self.buffer.len(),
            "ClauseRef out of bounds"
        );
        unsafe {
            transmute::<&[LitIdx], &Clause>(slice::from_raw_parts(
                self.buffer.as_ptr().add(offset),
                len + HEADER_LEN,
            ))
        }
    }

    /// Mutate a clause.
    pub fn clause_mut(&mut self, cref: ClauseRef) -> &mut Clause {
        let len = self.header(cref).len();
        let offset = cref.offset as usize;
        assert!(
            offset + HEADER_LEN + len <= self.buffer.len(),
            "ClauseRef out of bounds"
        );
        unsafe {
            transmute::<&mut [LitIdx], &mut Clause>(slice::from_raw_parts_mut(
                self.buffer.as_mut_ptr().add(offset),
                len + HEADER_LEN,
            ))
        }
    }

    /// Literals of a clause.
    pub fn lits(&self, cref: ClauseRef) -> &[Lit] {
        self.clause(cref).lits()
    }

    /// Current buffer size in multiples of [`LitIdx`].
    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }
}

/// Compact reference to a clause.
///
/// Stays valid while the owning [`ClauseAlloc`] grows, and is remapped by
/// garbage collection.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct ClauseRef {
    offset: ClauseOffset,
}
