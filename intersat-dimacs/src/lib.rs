//! DIMACS CNF parser and writer for the Intersat SAT solver.
//!
//! Variables are 1-based signed integers, `0` terminates a clause and a
//! `p cnf <vars> <clauses>` header announces the formula size. The header
//! counts are treated as hints and verified at the end of the input.
use std::{io, mem::replace};

use anyhow::Error;
use thiserror::Error;

use intersat_formula::{CnfFormula, Lit, Var};

/// Possible errors while parsing a DIMACS CNF formula.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("line {line}: unexpected character in DIMACS CNF input: {unexpected:?}")]
    UnexpectedInput { line: usize, unexpected: char },
    #[error("line {line}: literal index too large: {index}")]
    LiteralTooLarge { line: usize, index: u64 },
    #[error("line {line}: invalid header syntax: {header:?}")]
    InvalidHeader { line: usize, header: String },
    #[error("unterminated clause at end of input")]
    UnterminatedClause,
    #[error("formula has {var_count} variables while the header specifies {header_var_count}")]
    VarCount {
        var_count: usize,
        header_var_count: usize,
    },
    #[error("formula has {clause_count} clauses while the header specifies {header_clause_count}")]
    ClauseCount {
        clause_count: usize,
        header_clause_count: usize,
    },
}

/// Variable and clause count of a DIMACS CNF header.
#[derive(Copy, Clone, Debug)]
pub struct DimacsHeader {
    pub var_count: usize,
    pub clause_count: usize,
}

#[derive(Copy, Clone, Eq, PartialEq)]
enum ParserState {
    /// Between tokens, at the start of a line when `start_of_line`.
    Interspace,
    /// Inside a comment or the header line.
    CommentOrHeader,
    /// Inside a literal token.
    Lit,
}

/// Parser for DIMACS CNF files.
///
/// The input can be consumed in chunks; the formula parsed so far can be
/// taken out between chunks, which bounds memory usage on large inputs.
pub struct DimacsParser {
    formula: CnfFormula,
    partial_clause: Vec<Lit>,
    header: Option<DimacsHeader>,

    line_number: usize,
    clause_count: usize,
    max_var_count: usize,
    partial_lit: u64,
    negate_next_lit: bool,

    state: ParserState,
    start_of_line: bool,
    header_line: Vec<u8>,
}

impl Default for DimacsParser {
    fn default() -> DimacsParser {
        DimacsParser::new()
    }
}

impl DimacsParser {
    /// Create a new DIMACS CNF parser.
    pub fn new() -> DimacsParser {
        DimacsParser {
            formula: CnfFormula::new(),
            partial_clause: vec![],
            header: None,

            line_number: 1,
            clause_count: 0,
            max_var_count: 0,
            partial_lit: 0,
            negate_next_lit: false,

            state: ParserState::Interspace,
            start_of_line: true,
            header_line: vec![],
        }
    }

    /// Parse a complete input, checking the header if present.
    pub fn parse(input: impl io::Read) -> Result<CnfFormula, Error> {
        let mut buffer = io::BufReader::new(input);
        let mut parser = DimacsParser::new();

        loop {
            use io::BufRead;
            let data = buffer.fill_buf()?;
            if data.is_empty() {
                break;
            }
            parser.parse_chunk(data)?;
            let len = data.len();
            buffer.consume(len);
        }
        parser.eof()?;
        parser.check_header()?;
        Ok(parser.take_formula())
    }

    /// Parse one chunk of input.
    pub fn parse_chunk(&mut self, chunk: &[u8]) -> Result<(), ParserError> {
        for &byte in chunk {
            if byte == b'\n' {
                self.end_of_line()?;
                continue;
            }

            match self.state {
                ParserState::CommentOrHeader => {
                    if !self.header_line.is_empty() {
                        self.header_line.push(byte);
                    }
                }
                ParserState::Interspace | ParserState::Lit => match byte {
                    b'0'..=b'9' => {
                        if self.state == ParserState::Interspace {
                            self.state = ParserState::Lit;
                            self.partial_lit = 0;
                        }
                        self.partial_lit = self.partial_lit * 10 + (byte - b'0') as u64;
                        if self.partial_lit > Var::max_count() as u64 {
                            return Err(ParserError::LiteralTooLarge {
                                line: self.line_number,
                                index: self.partial_lit,
                            });
                        }
                    }
                    b'-' if self.state == ParserState::Interspace => {
                        self.state = ParserState::Lit;
                        self.partial_lit = 0;
                        self.negate_next_lit = true;
                    }
                    b' ' | b'\t' | b'\r' => self.end_of_token()?,
                    b'c' if self.start_of_line => {
                        self.state = ParserState::CommentOrHeader;
                    }
                    b'p' if self.start_of_line => {
                        self.state = ParserState::CommentOrHeader;
                        self.header_line.push(byte);
                    }
                    _ => {
                        return Err(ParserError::UnexpectedInput {
                            line: self.line_number,
                            unexpected: byte as char,
                        })
                    }
                },
            }

            self.start_of_line = false;
        }
        Ok(())
    }

    /// Signal the end of the input.
    pub fn eof(&mut self) -> Result<(), ParserError> {
        self.end_of_line()?;
        if !self.partial_clause.is_empty() {
            return Err(ParserError::UnterminatedClause);
        }
        Ok(())
    }

    /// Verify the formula size against the header, if one was present.
    pub fn check_header(&self) -> Result<(), ParserError> {
        if let Some(header) = self.header {
            if self.var_count() != header.var_count {
                return Err(ParserError::VarCount {
                    var_count: self.var_count(),
                    header_var_count: header.var_count,
                });
            }
            if self.clause_count != header.clause_count {
                return Err(ParserError::ClauseCount {
                    clause_count: self.clause_count,
                    header_clause_count: header.clause_count,
                });
            }
        }
        Ok(())
    }

    /// The header of the input, if one was parsed so far.
    pub fn header(&self) -> Option<DimacsHeader> {
        self.header
    }

    /// Number of variables seen so far, or the header count if larger.
    pub fn var_count(&self) -> usize {
        match self.header {
            Some(header) => header.var_count.max(self.max_var_count),
            None => self.max_var_count,
        }
    }

    /// Number of completed clauses seen so far.
    pub fn clause_count(&self) -> usize {
        self.clause_count
    }

    /// Take the clauses parsed since the last call.
    ///
    /// The returned formula covers all variables seen so far, so chunked
    /// consumers observe a consistent variable count.
    pub fn take_formula(&mut self) -> CnfFormula {
        let mut formula = replace(&mut self.formula, CnfFormula::new());
        formula.set_var_count(self.var_count());
        self.formula.set_var_count(formula.var_count());
        formula
    }

    fn end_of_token(&mut self) -> Result<(), ParserError> {
        if self.state != ParserState::Lit {
            return Ok(());
        }
        self.state = ParserState::Interspace;

        let negative = replace(&mut self.negate_next_lit, false);

        if self.partial_lit == 0 {
            if negative {
                return Err(ParserError::UnexpectedInput {
                    line: self.line_number,
                    unexpected: ' ',
                });
            }
            let clause = replace(&mut self.partial_clause, vec![]);
            self.formula.add_clause(clause);
            self.clause_count += 1;
            return Ok(());
        }

        let index = (self.partial_lit - 1) as usize;
        self.max_var_count = self.max_var_count.max(index + 1);
        self.partial_clause
            .push(Lit::from_index(index, !negative));
        Ok(())
    }

    fn end_of_line(&mut self) -> Result<(), ParserError> {
        self.end_of_token()?;

        if !self.header_line.is_empty() {
            let header_line = replace(&mut self.header_line, vec![]);
            self.parse_header(&header_line)?;
        }

        self.state = ParserState::Interspace;
        self.start_of_line = true;
        self.line_number += 1;
        Ok(())
    }

    fn parse_header(&mut self, header_line: &[u8]) -> Result<(), ParserError> {
        let invalid = || ParserError::InvalidHeader {
            line: self.line_number,
            header: String::from_utf8_lossy(header_line).into_owned(),
        };

        let header = std::str::from_utf8(header_line).map_err(|_| invalid())?;
        let mut tokens = header.split_whitespace();

        if tokens.next() != Some("p") || tokens.next() != Some("cnf") {
            return Err(invalid());
        }

        let var_count: usize = tokens
            .next()
            .and_then(|token| token.parse().ok())
            .ok_or_else(invalid)?;
        let clause_count: usize = tokens
            .next()
            .and_then(|token| token.parse().ok())
            .ok_or_else(invalid)?;

        if tokens.next().is_some() {
            return Err(invalid());
        }

        self.header = Some(DimacsHeader {
            var_count,
            clause_count,
        });
        Ok(())
    }
}

/// Write a formula in DIMACS CNF format.
pub fn write_dimacs(target: &mut impl io::Write, formula: &CnfFormula) -> io::Result<()> {
    writeln!(
        target,
        "p cnf {} {}",
        formula.var_count(),
        formula.len()
    )?;

    for clause in formula.iter() {
        for &lit in clause {
            itoa::write(&mut *target, lit.to_dimacs())?;
            target.write_all(b" ")?;
        }
        target.write_all(b"0\n")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use intersat_formula::{cnf_formula, lits};

    #[test]
    fn parses_a_simple_formula() {
        let input = b"c a comment\np cnf 4 3\n1 2 0\n-3 4 0\n-1 -2 -4 0\n";

        let formula = DimacsParser::parse(&input[..]).unwrap();

        assert_eq!(formula.var_count(), 4);
        assert_eq!(formula.len(), 3);

        let clauses: Vec<_> = formula.iter().collect();
        assert_eq!(clauses[0], &lits![1, 2][..]);
        assert_eq!(clauses[1], &lits![-3, 4][..]);
        assert_eq!(clauses[2], &lits![-1, -2, -4][..]);
    }

    #[test]
    fn accepts_missing_header_and_multi_clause_lines() {
        let input = b"1 -2 0 2 3 0\n";

        let formula = DimacsParser::parse(&input[..]).unwrap();
        assert_eq!(formula.len(), 2);
        assert_eq!(formula.var_count(), 3);
    }

    #[test]
    fn rejects_header_mismatch() {
        let input = b"p cnf 2 2\n1 2 0\n";
        assert!(DimacsParser::parse(&input[..]).is_err());
    }

    #[test]
    fn rejects_unterminated_clause() {
        let input = b"1 2\n";
        assert!(DimacsParser::parse(&input[..]).is_err());
    }

    #[test]
    fn rejects_garbage() {
        let input = b"1 x 0\n";
        assert!(DimacsParser::parse(&input[..]).is_err());
    }

    #[test]
    fn writer_roundtrips() {
        let formula = cnf_formula![
            1, 2, 3;
            -2, 4;
            -1;
        ];

        let mut output = vec![];
        write_dimacs(&mut output, &formula).unwrap();

        assert_eq!(
            std::str::from_utf8(&output).unwrap(),
            "p cnf 4 3\n1 2 3 0\n-2 4 0\n-1 0\n"
        );

        let parsed = DimacsParser::parse(&output[..]).unwrap();
        assert_eq!(parsed, formula);
    }

    proptest! {
        #[test]
        fn roundtrip_random_formulas(
            formula in intersat_formula::cnf::strategy::cnf_formula(1..50usize, 0..100, 1..10)
        ) {
            let mut output = vec![];
            write_dimacs(&mut output, &formula).unwrap();

            let parsed = DimacsParser::parse(&output[..]).unwrap();
            prop_assert_eq!(parsed, formula);
        }
    }
}
