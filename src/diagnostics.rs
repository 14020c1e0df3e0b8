//! Structured diagnostics returned alongside solver results.
//!
//! The solvers never print. Anything a caller might want to know about a run
//! beyond its status rides back as a [`DiagnosticEvent`], mirrored to the
//! `log` facade at the matching level so long-running fits remain observable
//! without a side channel.

/// A noteworthy condition observed during a solve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticEvent {
    /// One or more samples produced a near-singular BFGS curvature pair; the
    /// configured curvature policy decides whether their approximations were
    /// still updated.
    CurvatureFallback {
        iteration: usize,
        samples: Vec<usize>,
    },
    /// The ridge system could not be factorized (LLT and LDLT both failed);
    /// the solve terminates with a diverged status.
    FactorizationFailed { iteration: usize },
    /// The strong-Wolfe search exhausted its attempts; the best evaluated
    /// point was used instead.
    LineSearchStalled { iteration: usize },
    /// The iteration budget ran out before convergence or divergence.
    IterationCapReached { max_iter: usize },
}

impl DiagnosticEvent {
    fn log(&self) {
        match self {
            DiagnosticEvent::CurvatureFallback { iteration, samples } => {
                log::warn!(
                    "iteration {iteration}: near-singular curvature pair for {} sample(s)",
                    samples.len()
                );
            }
            DiagnosticEvent::FactorizationFailed { iteration } => {
                log::warn!("iteration {iteration}: ridge system factorization failed");
            }
            DiagnosticEvent::LineSearchStalled { iteration } => {
                log::debug!("iteration {iteration}: line search stalled; using best point seen");
            }
            DiagnosticEvent::IterationCapReached { max_iter } => {
                log::warn!("iteration budget of {max_iter} exhausted before convergence");
            }
        }
    }
}

/// Log an event and append it to a run's event list.
pub fn record(events: &mut Vec<DiagnosticEvent>, event: DiagnosticEvent) {
    event.log();
    events.push(event);
}
