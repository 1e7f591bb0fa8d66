//! DIMACS CNF parser and writer.
//!
//! Parses the subset of the format produced by standard CNF generators: an
//! optional `p cnf <vars> <clauses>` header, `c` comment lines and
//! zero-terminated clauses. The header counts are checked when present.
use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::Context;
use thiserror::Error;

use crate::cnf::CnfFormula;
use crate::lit::Lit;

/// Errors while parsing a DIMACS CNF file.
#[derive(Debug, Error)]
pub enum DimacsError {
    #[error("line {line}: unexpected token {token:?}")]
    UnexpectedToken { line: usize, token: String },
    #[error("line {line}: invalid header")]
    InvalidHeader { line: usize },
    #[error("unterminated clause at end of input")]
    UnterminatedClause,
    #[error("header declared {declared} clauses but {found} were found")]
    ClauseCountMismatch { declared: usize, found: usize },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Parse a DIMACS CNF formula from a reader.
pub fn parse_dimacs(input: impl io::Read) -> Result<CnfFormula, DimacsError> {
    let reader = io::BufReader::new(input);

    let mut formula = CnfFormula::new();
    let mut clause: Vec<Lit> = vec![];
    let mut header: Option<(usize, usize)> = None;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = line_no + 1;
        let mut tokens = line.split_whitespace().peekable();

        match tokens.peek() {
            None => continue,
            Some(&"c") => continue,
            Some(&"p") => {
                let parse_header = || -> Option<(usize, usize)> {
                    let mut tokens = line.split_whitespace();
                    tokens.next();
                    if tokens.next() != Some("cnf") {
                        return None;
                    }
                    let vars = tokens.next()?.parse().ok()?;
                    let clauses = tokens.next()?.parse().ok()?;
                    Some((vars, clauses))
                };
                header =
                    Some(parse_header().ok_or(DimacsError::InvalidHeader { line: line_no })?);
                continue;
            }
            Some(_) => {}
        }

        for token in tokens {
            let code: i32 = token.parse().map_err(|_| DimacsError::UnexpectedToken {
                line: line_no,
                token: token.to_owned(),
            })?;
            if code == 0 {
                formula.add_clause(&clause);
                clause.clear();
            } else {
                clause.push(Lit::from_dimacs(code));
            }
        }
    }

    if !clause.is_empty() {
        return Err(DimacsError::UnterminatedClause);
    }

    if let Some((vars, clauses)) = header {
        formula.set_var_count(vars);
        if formula.len() != clauses {
            return Err(DimacsError::ClauseCountMismatch {
                declared: clauses,
                found: formula.len(),
            });
        }
    }

    Ok(formula)
}

/// Read and parse a DIMACS CNF file from disk.
pub fn read_dimacs_file(path: impl AsRef<Path>) -> anyhow::Result<CnfFormula> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    parse_dimacs(file).with_context(|| format!("cannot parse {}", path.display()))
}

/// Write a formula in DIMACS CNF format.
pub fn write_dimacs(target: &mut impl Write, formula: &CnfFormula) -> io::Result<()> {
    let mut target = io::BufWriter::new(target);

    writeln!(target, "p cnf {} {}", formula.var_count(), formula.len())?;

    for clause in formula.iter() {
        for &lit in clause {
            itoa::write(&mut target, lit.to_dimacs())?;
            target.write_all(b" ")?;
        }
        target.write_all(b"0\n")?;
    }

    target.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lit::lits_from_dimacs;

    #[test]
    fn parses_header_comments_and_clauses() {
        let input = b"c generated\np cnf 4 3\n1 -2 0\nc mid comment\n3 4 0\n-1 0\n" as &[u8];
        let formula = parse_dimacs(input).unwrap();

        assert_eq!(formula.var_count(), 4);
        let clauses: Vec<_> = formula.iter().collect();
        assert_eq!(clauses[0], &lits_from_dimacs(&[1, -2])[..]);
        assert_eq!(clauses[1], &lits_from_dimacs(&[3, 4])[..]);
        assert_eq!(clauses[2], &lits_from_dimacs(&[-1])[..]);
    }

    #[test]
    fn clause_spanning_lines() {
        let input = b"p cnf 3 1\n1 2\n3 0\n" as &[u8];
        let formula = parse_dimacs(input).unwrap();
        assert_eq!(formula.iter().next().unwrap(), &lits_from_dimacs(&[1, 2, 3])[..]);
    }

    #[test]
    fn rejects_garbage_token() {
        let input = b"p cnf 1 1\n1 x 0\n" as &[u8];
        match parse_dimacs(input) {
            Err(DimacsError::UnexpectedToken { line: 2, token }) => assert_eq!(token, "x"),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn rejects_clause_count_mismatch() {
        let input = b"p cnf 2 2\n1 2 0\n" as &[u8];
        assert!(matches!(
            parse_dimacs(input),
            Err(DimacsError::ClauseCountMismatch {
                declared: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn write_then_parse_roundtrip() {
        let mut formula = CnfFormula::new();
        formula.add_clause(&lits_from_dimacs(&[1, -3]));
        formula.add_clause(&lits_from_dimacs(&[2]));

        let mut buf: Vec<u8> = vec![];
        write_dimacs(&mut buf, &formula).unwrap();
        let parsed = parse_dimacs(&buf[..]).unwrap();
        assert_eq!(parsed, formula);
    }
}
