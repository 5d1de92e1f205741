//! Matrix Market and plain vector formats.

use std::fmt::Write as _;

use crate::error::{Result, SolverError};
use crate::matrix::{CsrMatrix, TripletMatrix};

const BANNER: &str = "%%matrixmarket";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Real,
    Integer,
    Pattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Symmetry {
    General,
    Symmetric,
    SkewSymmetric,
}

/// Parse the banner `%%MatrixMarket matrix coordinate <field> <symmetry>`.
fn parse_banner(line: &str) -> Result<(Field, Symmetry)> {
    let words: Vec<String> = line.split_whitespace().map(str::to_lowercase).collect();
    if words.len() != 5 || words[0] != BANNER || words[1] != "matrix" {
        return Err(SolverError::parse(1, "expected '%%MatrixMarket matrix ...' banner"));
    }
    if words[2] != "coordinate" {
        return Err(SolverError::parse(
            1,
            format!("unsupported format '{}', only coordinate is read", words[2]),
        ));
    }
    let field = match words[3].as_str() {
        "real" | "double" => Field::Real,
        "integer" => Field::Integer,
        "pattern" => Field::Pattern,
        other => return Err(SolverError::parse(1, format!("unsupported field '{}'", other))),
    };
    let symmetry = match words[4].as_str() {
        "general" => Symmetry::General,
        "symmetric" => Symmetry::Symmetric,
        "skew-symmetric" => Symmetry::SkewSymmetric,
        other => return Err(SolverError::parse(1, format!("unsupported symmetry '{}'", other))),
    };
    Ok((field, symmetry))
}

fn parse_number<T: std::str::FromStr>(token: Option<&str>, line: usize, what: &str) -> Result<T> {
    let token = token.ok_or_else(|| SolverError::parse(line, format!("missing {}", what)))?;
    token
        .parse()
        .map_err(|_| SolverError::parse(line, format!("invalid {} '{}'", what, token)))
}

/// Read a coordinate Matrix Market matrix.
///
/// Symmetric files store one triangle; the other is mirrored here and the
/// result is flagged symmetric.
pub fn read_matrix_market(input: &str) -> Result<TripletMatrix> {
    let mut lines = input.lines().enumerate().map(|(i, l)| (i + 1, l.trim()));

    let (_, banner) = lines
        .next()
        .ok_or_else(|| SolverError::parse(1, "empty input"))?;
    let (field, symmetry) = parse_banner(banner)?;

    let mut data = lines.filter(|(_, l)| !l.is_empty() && !l.starts_with('%'));

    let (size_line, size) = data
        .next()
        .ok_or_else(|| SolverError::parse(1, "missing size line"))?;
    let mut tokens = size.split_whitespace();
    let nrows: usize = parse_number(tokens.next(), size_line, "row count")?;
    let ncols: usize = parse_number(tokens.next(), size_line, "column count")?;
    let nnz: usize = parse_number(tokens.next(), size_line, "entry count")?;
    if symmetry != Symmetry::General && nrows != ncols {
        return Err(SolverError::parse(
            size_line,
            format!("{} matrix must be square, got {}x{}", banner, nrows, ncols),
        ));
    }

    if nrows.checked_mul(ncols).is_some_and(|cells| nnz > cells) {
        return Err(SolverError::parse(
            size_line,
            format!("{} entries cannot fit in {}x{}", nnz, nrows, ncols),
        ));
    }

    let mut matrix = TripletMatrix::try_new(nrows, ncols)?;
    let mut count = 0;
    for (line, text) in data {
        if count == nnz {
            return Err(SolverError::parse(line, format!("more than {} entries", nnz)));
        }
        let mut tokens = text.split_whitespace();
        let i: usize = parse_number(tokens.next(), line, "row index")?;
        let j: usize = parse_number(tokens.next(), line, "column index")?;
        let value = match field {
            Field::Pattern => 1.0,
            Field::Integer => parse_number::<i64>(tokens.next(), line, "value")? as f64,
            Field::Real => parse_number::<f64>(tokens.next(), line, "value")?,
        };
        if i == 0 || j == 0 || i > nrows || j > ncols {
            return Err(SolverError::wrong_index(
                "read_matrix_market",
                format!("entry ({}, {}) at line {} outside {}x{}", i, j, line, nrows, ncols),
            ));
        }
        let (i, j) = (i - 1, j - 1);
        matrix.add_interaction(i, j, value)?;
        if i != j {
            match symmetry {
                Symmetry::General => {}
                Symmetry::Symmetric => matrix.add_interaction(j, i, value)?,
                Symmetry::SkewSymmetric => matrix.add_interaction(j, i, -value)?,
            }
        }
        count += 1;
    }
    if count != nnz {
        return Err(SolverError::parse(
            input.lines().count(),
            format!("expected {} entries, found {}", nnz, count),
        ));
    }

    matrix.set_symmetric(symmetry == Symmetry::Symmetric);
    Ok(matrix)
}

/// Write `a` in coordinate Matrix Market format.
///
/// Matrices flagged symmetric are written as their lower triangle.
pub fn write_matrix_market(a: &CsrMatrix) -> String {
    let symmetric = a.is_symmetric();
    let (rows, cols, values) = a.to_coordinates();
    let entries: Vec<(usize, usize, f64)> = rows
        .into_iter()
        .zip(cols)
        .zip(values)
        .map(|((i, j), v)| (i, j, v))
        .filter(|&(i, j, _)| !symmetric || j <= i)
        .collect();

    let mut out = String::new();
    let _ = writeln!(
        out,
        "%%MatrixMarket matrix coordinate real {}",
        if symmetric { "symmetric" } else { "general" }
    );
    let _ = writeln!(out, "{} {} {}", a.nrows(), a.ncols(), entries.len());
    for (i, j, v) in entries {
        let _ = writeln!(out, "{} {} {}", i + 1, j + 1, v);
    }
    out
}

/// Read a whitespace-separated list of numbers.
///
/// Lines starting with `%` or `#` are comments. A Matrix Market `array`
/// file with a single column is accepted as well.
pub fn read_vector(input: &str) -> Result<Vec<f64>> {
    let mut values = Vec::new();
    let mut expected = None;
    let mut lines = input.lines().enumerate().map(|(i, l)| (i + 1, l.trim())).peekable();

    if let Some((_, first)) = lines.peek() {
        if first.to_lowercase().starts_with(BANNER) {
            if !first.to_lowercase().contains(" array") {
                return Err(SolverError::parse(1, "vector files must use the array format"));
            }
            lines.next();
            let (line, size) = lines
                .by_ref()
                .find(|(_, l)| !l.is_empty() && !l.starts_with('%'))
                .ok_or_else(|| SolverError::parse(1, "missing size line"))?;
            let mut tokens = size.split_whitespace();
            let m: usize = parse_number(tokens.next(), line, "row count")?;
            let n: usize = parse_number(tokens.next(), line, "column count")?;
            if n != 1 {
                return Err(SolverError::parse(line, format!("expected one column, got {}", n)));
            }
            expected = Some(m);
        }
    }

    for (line, text) in lines {
        if text.is_empty() || text.starts_with('%') || text.starts_with('#') {
            continue;
        }
        for token in text.split_whitespace() {
            values.push(parse_number::<f64>(Some(token), line, "value")?);
        }
    }

    if let Some(m) = expected {
        if values.len() != m {
            return Err(SolverError::wrong_dim(
                "read_vector",
                format!("header announces {} values, found {}", m, values.len()),
            ));
        }
    }
    Ok(values)
}

/// One value per line.
pub fn write_vector(x: &[f64]) -> String {
    let mut out = String::with_capacity(x.len() * 24);
    for v in x {
        let _ = writeln!(out, "{}", v);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_general() {
        let input = "%%MatrixMarket matrix coordinate real general\n\
                     % comment\n\
                     3 4 3\n\
                     1 1 2.5\n\
                     3 4 -1\n\
                     1 1 0.5\n";
        let m = read_matrix_market(input).unwrap();
        assert_eq!((m.nrows(), m.ncols()), (3, 4));
        assert_eq!(m.get(0, 0), 3.0);
        assert_eq!(m.get(2, 3), -1.0);
        assert!(!m.is_symmetric());
    }

    #[test]
    fn test_read_symmetric_pattern() {
        let input = "%%MatrixMarket matrix coordinate pattern symmetric\n2 2 2\n1 1\n2 1\n";
        let m = read_matrix_market(input).unwrap();
        assert_eq!(m.get(0, 1), 1.0);
        assert_eq!(m.get(1, 0), 1.0);
        assert_eq!(m.nnz(), 3);
        assert!(m.is_symmetric());
    }

    #[test]
    fn test_read_errors() {
        let bad_value = "%%MatrixMarket matrix coordinate real general\n2 2 1\n1 1 abc\n";
        assert!(matches!(
            read_matrix_market(bad_value),
            Err(SolverError::Parse { line: 3, .. })
        ));

        let out_of_range = "%%MatrixMarket matrix coordinate real general\n2 2 1\n3 1 1.0\n";
        assert!(matches!(
            read_matrix_market(out_of_range),
            Err(SolverError::WrongIndex { .. })
        ));

        let short = "%%MatrixMarket matrix coordinate real general\n2 2 2\n1 1 1.0\n";
        assert!(matches!(read_matrix_market(short), Err(SolverError::Parse { .. })));

        assert!(read_matrix_market("%%MatrixMarket matrix array real general\n").is_err());
    }

    #[test]
    fn test_huge_header_is_an_error() {
        let huge = "%%MatrixMarket matrix coordinate real general\n10000000000000000 1 0\n";
        assert!(matches!(
            read_matrix_market(huge),
            Err(SolverError::OutOfMemory { .. })
        ));

        let crowded = "%%MatrixMarket matrix coordinate real general\n2 2 5\n1 1 1.0\n";
        assert!(matches!(
            read_matrix_market(crowded),
            Err(SolverError::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn test_write_then_read() {
        let mut a =
            CsrMatrix::from_coordinates(2, 2, &[0, 1, 1], &[0, 0, 1], &[4.0, -1.5, 2.0]).unwrap();
        let text = write_matrix_market(&a);
        assert!(text.starts_with("%%MatrixMarket matrix coordinate real general\n2 2 3\n"));
        assert_eq!(CsrMatrix::from(read_matrix_market(&text).unwrap()), a);

        a.set_symmetric(true);
        let text = write_matrix_market(&a);
        assert!(text.contains("symmetric\n2 2 2\n"));
    }

    #[test]
    fn test_read_vector() {
        assert_eq!(
            read_vector("# rhs\n1 2.5\n-3e-1\n").unwrap(),
            vec![1.0, 2.5, -0.3]
        );
        let array = "%%MatrixMarket matrix array real general\n% c\n2 1\n1.0\n2.0\n";
        assert_eq!(read_vector(array).unwrap(), vec![1.0, 2.0]);
        assert!(matches!(
            read_vector("1\nx\n"),
            Err(SolverError::Parse { line: 2, .. })
        ));
        assert_eq!(write_vector(&[1.5, -2.0]), "1.5\n-2\n");
    }
}
