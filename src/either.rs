//! Two-case sum type shared by path navigation and the content cache

/// A value that is one of two alternatives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Either<L, R> {
    Left(L),
    Right(R),
}

impl<L, R> Either<L, R> {
    /// Collapse both cases into a single type
    pub fn either<T>(self, f: impl FnOnce(L) -> T, g: impl FnOnce(R) -> T) -> T {
        match self {
            Self::Left(l) => f(l),
            Self::Right(r) => g(r),
        }
    }
}

impl<T> Either<T, T> {
    /// Unwrap when both sides carry the same type
    pub fn into_inner(self) -> T {
        match self {
            Self::Left(v) | Self::Right(v) => v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapse() {
        let value: Either<i32, fn() -> i32> = Either::Right(|| 7);
        assert_eq!(value.either(|v| v, |f| f()), 7);
        assert_eq!(Either::<u8, u8>::Left(3).into_inner(), 3);
        assert_eq!(Either::<u8, u8>::Right(4).into_inner(), 4);
    }
}
