/// Sliding window of two over a fallible row stream.
///
/// Yields each row together with the row that follows it, or `None` for the
/// last row. The look-ahead row is held back and becomes the current row on
/// the next step, so every row is pulled from the source exactly once.
pub struct Lookahead<I, T> {
    inner: I,
    pending: Option<T>,
}

impl<I, T> Lookahead<I, T> {
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            pending: None,
        }
    }
}

impl<I, T, E> Iterator for Lookahead<I, T>
where
    I: Iterator<Item = Result<T, E>>,
    T: Clone,
{
    type Item = Result<(T, Option<T>), E>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = match self.pending.take() {
            Some(row) => row,
            None => match self.inner.next()? {
                Ok(row) => row,
                Err(e) => return Some(Err(e)),
            },
        };

        match self.inner.next() {
            None => Some(Ok((current, None))),
            Some(Ok(next)) => {
                self.pending = Some(next.clone());
                Some(Ok((current, Some(next))))
            }
            Some(Err(e)) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_each_row_with_its_successor() {
        let rows = vec![Ok::<_, ()>(1), Ok(2), Ok(3)];
        let pairs: Vec<_> = Lookahead::new(rows.into_iter())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(pairs, vec![(1, Some(2)), (2, Some(3)), (3, None)]);
    }

    #[test]
    fn single_row_has_no_successor() {
        let pairs: Vec<_> = Lookahead::new(vec![Ok::<_, ()>("only")].into_iter())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(pairs, vec![("only", None)]);
    }

    #[test]
    fn empty_stream_yields_nothing() {
        let rows: Vec<Result<u8, ()>> = Vec::new();
        assert_eq!(Lookahead::new(rows.into_iter()).count(), 0);
    }

    #[test]
    fn error_in_lookahead_row_surfaces_early() {
        let rows = vec![Ok(1), Err("bad row"), Ok(3)];
        let mut window = Lookahead::new(rows.into_iter());
        assert_eq!(window.next(), Some(Err("bad row")));
    }
}
