//! Distribution of independent work units over a fixed number of workers.
//!
//! The work units (atom pairs or k-points) are split into contiguous chunks, one per worker
//! rank. Every worker returns a partial result of a fixed size and the partial vectors are
//! summed on rank 0 in the order of the ranks. For a given number of workers the
//! floating-point summation order is therefore always the same and the results are bitwise
//! reproducible, independent of the number of threads that execute the workers.
use crate::error::MbdError;
use log::trace;
use ndarray::prelude::*;
use rayon::prelude::*;
use std::ops::Range;

/// Transport of the partial results to rank 0.
pub trait Reducer: Sync {
    /// Sums the partial vectors of all ranks. `partials[rank]` is the contribution of `rank`,
    /// all of them have the same length.
    fn reduce(&self, partials: Vec<Array1<f64>>) -> Array1<f64>;
}

/// Linear reduction in rank order, performed in the current process.
#[derive(Clone, Copy, Debug, Default)]
pub struct RankOrderedSum;

impl Reducer for RankOrderedSum {
    fn reduce(&self, partials: Vec<Array1<f64>>) -> Array1<f64> {
        let mut iter = partials.into_iter();
        match iter.next() {
            Some(first) => iter.fold(first, |mut total, partial| {
                total += &partial;
                total
            }),
            None => Array1::zeros(0),
        }
    }
}

/// Static partition of the work units into `n_workers` contiguous chunks.
#[derive(Clone, Copy, Debug)]
pub struct WorkPartition {
    pub n_workers: usize,
}

impl WorkPartition {
    pub fn new(n_workers: usize) -> Self {
        Self {
            n_workers: n_workers.max(1),
        }
    }

    /// Everything is done by rank 0.
    pub fn serial() -> Self {
        Self::new(1)
    }

    /// The range of work units of every rank. The first `n_units % n_workers` ranks get
    /// one unit more than the others; surplus ranks get empty ranges.
    pub fn chunks(&self, n_units: usize) -> Vec<Range<usize>> {
        let base: usize = n_units / self.n_workers;
        let remainder: usize = n_units % self.n_workers;
        let mut start: usize = 0;
        (0..self.n_workers)
            .map(|rank| {
                let size: usize = base + usize::from(rank < remainder);
                let range: Range<usize> = start..start + size;
                start += size;
                range
            })
            .collect()
    }

    /// Runs `f(rank, units)` for the chunk of every rank and returns the results ordered by
    /// rank. The ranks are executed on the rayon thread pool. The first error aborts the
    /// computation and is returned together with the rank of the worker. A serial partition
    /// runs on the calling thread and passes errors through unchanged.
    pub fn map<U, R, F>(&self, units: &[U], f: F) -> Result<Vec<R>, MbdError>
    where
        U: Sync,
        R: Send,
        F: Fn(usize, &[U]) -> Result<R, MbdError> + Sync,
    {
        if self.n_workers == 1 {
            return Ok(vec![f(0, units)?]);
        }
        self.chunks(units.len())
            .into_par_iter()
            .enumerate()
            .map(|(rank, range)| {
                trace!("worker {} processes the units {:?}", rank, range);
                f(rank, &units[range]).map_err(|error| error.in_worker(rank))
            })
            .collect()
    }

    /// [WorkPartition::map] followed by the reduction of the partial vectors of length `len`.
    pub fn map_reduce<U, F, T>(
        &self,
        units: &[U],
        len: usize,
        reducer: &T,
        f: F,
    ) -> Result<Array1<f64>, MbdError>
    where
        U: Sync,
        T: Reducer,
        F: Fn(usize, &[U]) -> Result<Array1<f64>, MbdError> + Sync,
    {
        let partials: Vec<Array1<f64>> = self.map(units, f)?;
        if let Some((rank, partial)) = partials
            .iter()
            .enumerate()
            .find(|(_, partial)| partial.len() != len)
        {
            return Err(MbdError::Worker {
                rank,
                source: Box::new(MbdError::InvalidInput(format!(
                    "partial result of length {} instead of {}",
                    partial.len(),
                    len
                ))),
            });
        }
        Ok(reducer.reduce(partials))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_cover_all_units() {
        let partition = WorkPartition::new(4);
        let chunks = partition.chunks(10);
        assert_eq!(chunks, vec![0..3, 3..6, 6..8, 8..10]);
        let chunks = partition.chunks(2);
        assert_eq!(chunks, vec![0..1, 1..2, 2..2, 2..2]);
    }

    #[test]
    fn reduction_is_independent_of_the_worker_count() {
        let units: Vec<usize> = (0..37).collect();
        let sum = |n_workers: usize| -> Array1<f64> {
            WorkPartition::new(n_workers)
                .map_reduce(&units, 2, &RankOrderedSum, |_, chunk| {
                    let mut partial: Array1<f64> = Array1::zeros(2);
                    for unit in chunk.iter() {
                        partial[0] += *unit as f64;
                        partial[1] += 1.0;
                    }
                    Ok(partial)
                })
                .unwrap()
        };
        for n_workers in [1, 2, 4, 64] {
            assert_eq!(sum(n_workers), array![666.0, 37.0]);
        }
    }

    #[test]
    fn worker_error_carries_the_rank() {
        let units: Vec<usize> = (0..8).collect();
        let result = WorkPartition::new(4).map(&units, |rank, chunk| {
            if chunk.contains(&5) {
                Err(MbdError::InvalidInput(String::from("bad unit")))
            } else {
                Ok(rank)
            }
        });
        match result {
            Err(MbdError::Worker { rank, source }) => {
                assert_eq!(rank, 2);
                assert!(matches!(*source, MbdError::InvalidInput(_)));
            }
            other => panic!("expected a worker error, got {:?}", other),
        }
    }
}
