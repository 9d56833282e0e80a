//! Trace sinks for clause events.
//!
//! The solver reports every clause it learns and every clause it deletes to
//! an optional sink. A sink receives learned clauses before they are used
//! and deleted clauses before their storage is reclaimed. What the sink does
//! with the events is its own business; the writers provided here emit
//! textual DRUP and binary DRAT, which lets an external checker verify
//! unsatisfiability results.
use std::io::{BufWriter, Write};

use intersat_formula::Lit;

/// Receives learned and deleted clause events.
///
/// Sinks are assumed infallible from the solver's perspective. A sink that
/// can fail, e.g. one writing to a file, has to buffer the error and report
/// it to its own caller.
pub trait TraceSink {
    /// A clause was derived. The empty clause marks unsatisfiability.
    fn learned_clause(&mut self, lits: &[Lit]);

    /// A clause is about to be removed.
    fn deleted_clause(&mut self, lits: &[Lit]);
}

/// Holds the optional sink registered with the solver.
#[derive(Default)]
pub struct Trace<'a> {
    sink: Option<Box<dyn TraceSink + 'a>>,
}

impl<'a> Trace<'a> {
    /// Register a sink. Replaces a previously registered sink.
    pub fn set_sink(&mut self, sink: impl TraceSink + 'a) {
        self.sink = Some(Box::new(sink));
    }

    /// Whether a sink is registered.
    ///
    /// Use this to avoid building clause copies that nobody will see.
    pub fn is_active(&self) -> bool {
        self.sink.is_some()
    }

    /// Emit a learned clause event.
    pub fn learned(&mut self, lits: &[Lit]) {
        if let Some(sink) = &mut self.sink {
            sink.learned_clause(lits);
        }
    }

    /// Emit a deleted clause event.
    pub fn deleted(&mut self, lits: &[Lit]) {
        if let Some(sink) = &mut self.sink {
            sink.deleted_clause(lits);
        }
    }
}

/// Writes textual DRUP: `1 -2 0` lines for additions, `d 1 -2 0` for
/// deletions.
pub struct DrupWriter<W: Write> {
    target: BufWriter<W>,
    error: bool,
}

impl<W: Write> DrupWriter<W> {
    pub fn new(target: W) -> DrupWriter<W> {
        DrupWriter {
            target: BufWriter::new(target),
            error: false,
        }
    }

    /// Flush buffered output and report whether any write failed.
    pub fn finish(mut self) -> std::io::Result<()> {
        self.target.flush()?;
        if self.error {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "earlier write to the proof file failed",
            ));
        }
        Ok(())
    }

    fn write_lits(&mut self, lits: &[Lit]) {
        for &lit in lits {
            self.error |= itoa::write(&mut self.target, lit.to_dimacs()).is_err();
            self.error |= self.target.write_all(b" ").is_err();
        }
        self.error |= self.target.write_all(b"0\n").is_err();
    }
}

impl<W: Write> TraceSink for DrupWriter<W> {
    fn learned_clause(&mut self, lits: &[Lit]) {
        self.write_lits(lits);
    }

    fn deleted_clause(&mut self, lits: &[Lit]) {
        self.error |= self.target.write_all(b"d ").is_err();
        self.write_lits(lits);
    }
}

/// Writes binary DRAT: `a`/`d` tags followed by LEB128 encoded literals.
pub struct BinaryDratWriter<W: Write> {
    target: BufWriter<W>,
    error: bool,
}

impl<W: Write> BinaryDratWriter<W> {
    pub fn new(target: W) -> BinaryDratWriter<W> {
        BinaryDratWriter {
            target: BufWriter::new(target),
            error: false,
        }
    }

    /// Flush buffered output and report whether any write failed.
    pub fn finish(mut self) -> std::io::Result<()> {
        self.target.flush()?;
        if self.error {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "earlier write to the proof file failed",
            ));
        }
        Ok(())
    }

    fn write_lits(&mut self, lits: &[Lit]) {
        for &lit in lits {
            let code = lit.code() as u64 + 2;
            self.error |= leb128::write::unsigned(&mut self.target, code).is_err();
        }
        self.error |= self.target.write_all(&[0]).is_err();
    }
}

impl<W: Write> TraceSink for BinaryDratWriter<W> {
    fn learned_clause(&mut self, lits: &[Lit]) {
        self.error |= self.target.write_all(b"a").is_err();
        self.write_lits(lits);
    }

    fn deleted_clause(&mut self, lits: &[Lit]) {
        self.error |= self.target.write_all(b"d").is_err();
        self.write_lits(lits);
    }
}

/// Test sink that records all events in order.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingSink {
    pub events: std::rc::Rc<std::cell::RefCell<Vec<(bool, Vec<Lit>)>>>,
}

#[cfg(test)]
impl TraceSink for RecordingSink {
    fn learned_clause(&mut self, lits: &[Lit]) {
        self.events.borrow_mut().push((true, lits.to_vec()));
    }

    fn deleted_clause(&mut self, lits: &[Lit]) {
        self.events.borrow_mut().push((false, lits.to_vec()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drup_format() {
        let mut buffer = vec![];
        {
            let mut writer = DrupWriter::new(&mut buffer);
            writer.learned_clause(&[Lit::from_dimacs(1), Lit::from_dimacs(-2)]);
            writer.deleted_clause(&[Lit::from_dimacs(3)]);
            writer.learned_clause(&[]);
            writer.finish().unwrap();
        }
        assert_eq!(&buffer[..], b"1 -2 0\nd 3 0\n0\n");
    }

    #[test]
    fn binary_drat_format() {
        let mut buffer = vec![];
        {
            let mut writer = BinaryDratWriter::new(&mut buffer);
            writer.learned_clause(&[Lit::from_dimacs(1)]);
            writer.deleted_clause(&[Lit::from_dimacs(-1)]);
            writer.finish().unwrap();
        }
        // lit 1 has code 0, encoded as 2; lit -1 has code 1, encoded as 3.
        assert_eq!(&buffer[..], b"a\x02\x00d\x03\x00");
    }
}
