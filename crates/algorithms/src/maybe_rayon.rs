//! `into_par_iter` with or without rayon
//!
//! Column imputation in the matrix builder and per-row index grids call
//! `into_par_iter()` on owned collections and ranges. With the `parallel`
//! feature that is rayon's; without it the same call resolves to
//! `into_iter()`, and the chained adapters are the ordinary `Iterator` ones.
//! Both paths preserve input order on `collect()`.

#[cfg(feature = "parallel")]
pub use rayon::prelude::*;

#[cfg(not(feature = "parallel"))]
pub use sequential::IntoParallelIterator;

#[cfg(not(feature = "parallel"))]
mod sequential {
    pub trait IntoParallelIterator: IntoIterator + Sized {
        fn into_par_iter(self) -> Self::IntoIter {
            self.into_iter()
        }
    }

    impl<I: IntoIterator> IntoParallelIterator for I {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_preserved() {
        let squares: Vec<usize> = (0..64usize).into_par_iter().map(|i| i * i).collect();
        assert_eq!(squares.len(), 64);
        assert!(squares.iter().enumerate().all(|(i, &v)| v == i * i));

        let columns = vec![vec![1.0, 2.0], vec![3.0]];
        let lens: Vec<usize> = columns.into_par_iter().map(|c: Vec<f64>| c.len()).collect();
        assert_eq!(lens, vec![2, 1]);
    }
}
