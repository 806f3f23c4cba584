use thiserror::Error;

/// Fatal lowering failures for one compilation unit.
///
/// There are no recoverable errors in this core: every variant is either a
/// resolver inconsistency in the input tree or an input shape the lowering
/// rules do not cover. The surrounding driver reports the diagnostic and
/// moves on to the next unit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LowerError {
    /// No constructor anywhere up the superclass chain accepts the forwarded
    /// arguments. A well-typed input never produces this.
    #[error("no superclass constructor of `{ty}` accepts {arity} argument(s)")]
    NoMatchingSuperConstructor { ty: String, arity: usize },

    /// A constructor's formal parameter count diverged from its binding's
    /// parameter-type count; checked eagerly at every synthesis site.
    #[error(
        "constructor of `{ty}` declares {params} parameter(s) but its binding lists {binding}"
    )]
    ConstructorArityMismatch {
        ty: String,
        params: usize,
        binding: usize,
    },

    /// A capture pattern the lowering rules do not anticipate, e.g. a closure
    /// in a static context reaching for enclosing instance state.
    #[error("unsupported capture in `{ty}`: {reason}")]
    UnsupportedCapture { ty: String, reason: String },
}

pub type Result<T, E = LowerError> = std::result::Result<T, E>;
