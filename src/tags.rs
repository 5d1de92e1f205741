//! Operation tags for matrix products and triangular solves.
//!
//! Each tag is a small `Copy` enum carrying only its semantic flag. The
//! character codes follow the usual BLAS/LAPACK conventions so a tag can be
//! handed to a routine that expects them.

/// Which operator a product or solve applies: `A`, `Aᵀ` or `Aᴴ`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transpose {
    #[default]
    NoTrans,
    Trans,
    ConjTrans,
}

impl Transpose {
    /// BLAS character code.
    pub fn char(self) -> char {
        match self {
            Transpose::NoTrans => 'N',
            Transpose::Trans => 'T',
            Transpose::ConjTrans => 'C',
        }
    }

    /// Character code of the reverse operation.
    pub fn rev_char(self) -> char {
        match self {
            Transpose::NoTrans => 'T',
            Transpose::Trans | Transpose::ConjTrans => 'N',
        }
    }

    /// True for `Trans` and `ConjTrans`; matrices here are real so both
    /// act identically.
    pub fn is_transposed(self) -> bool {
        !matches!(self, Transpose::NoTrans)
    }

    /// The opposite operation (`NoTrans` <-> `Trans`).
    pub fn reversed(self) -> Self {
        if self.is_transposed() {
            Transpose::NoTrans
        } else {
            Transpose::Trans
        }
    }
}

/// Which triangle of a matrix is referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Uplo {
    Upper,
    Lower,
}

impl Uplo {
    pub fn char(self) -> char {
        match self {
            Uplo::Upper => 'U',
            Uplo::Lower => 'L',
        }
    }

    /// Triangle referenced after transposition.
    pub fn rev(self) -> Self {
        match self {
            Uplo::Upper => Uplo::Lower,
            Uplo::Lower => Uplo::Upper,
        }
    }
}

/// Whether a triangular matrix has an implicit unit diagonal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diag {
    NonUnit,
    Unit,
}

impl Diag {
    pub fn char(self) -> char {
        match self {
            Diag::NonUnit => 'N',
            Diag::Unit => 'U',
        }
    }
}

/// Side from which a matrix multiplies or is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn char(self) -> char {
        match self {
            Side::Left => 'L',
            Side::Right => 'R',
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transpose_codes() {
        assert_eq!(Transpose::NoTrans.char(), 'N');
        assert_eq!(Transpose::Trans.char(), 'T');
        assert_eq!(Transpose::ConjTrans.rev_char(), 'N');
        assert_eq!(Transpose::Trans.reversed(), Transpose::NoTrans);
        assert!(Transpose::ConjTrans.is_transposed());
    }

    #[test]
    fn test_uplo_reverse() {
        assert_eq!(Uplo::Upper.rev(), Uplo::Lower);
        assert_eq!(Diag::Unit.char(), 'U');
        assert_eq!(Side::Right.char(), 'R');
    }
}
