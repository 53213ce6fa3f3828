//! Progress reporting for long-running assemblies.
//!
//! The library holds no global logging state. Callers that want feedback pass
//! an observer, which may be invoked concurrently from worker threads.

/// Events emitted while the cost function is assembled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AssemblyEvent {
    /// Assembly is about to start.
    Started {
        /// Number of grid points in the input.
        points: usize,
        /// Number of unknowns (rows of A).
        unknowns: usize,
        /// Number of reciprocal vectors in the long-range sum.
        reciprocal_terms: usize,
    },
    /// A chunk of grid points has been processed.
    Progress {
        /// Chunks finished so far.
        completed: usize,
        /// Total number of chunks.
        total: usize,
    },
    /// Assembly has completed.
    Finished {
        /// Number of grid points that carried a non-zero weight.
        used_points: usize,
    },
}

/// Receives [`AssemblyEvent`]s.
///
/// Any `Fn(AssemblyEvent) + Sync` closure is an observer.
pub trait AssemblyObserver: Sync {
    fn on_event(&self, event: AssemblyEvent);
}

impl<F> AssemblyObserver for F
where
    F: Fn(AssemblyEvent) + Sync,
{
    fn on_event(&self, event: AssemblyEvent) {
        self(event)
    }
}
