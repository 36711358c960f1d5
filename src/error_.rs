use std::{error, fmt, io};

/// Errors reported by the lock core and the benchmark harness.
#[derive(Debug)]
pub enum Error {
    /// A worker thread could not be created. The scenario is aborted.
    ResourceExhausted {
        worker: String,
        source: io::Error,
    },

    /// The guarding mutex was poisoned by a thread that panicked while
    /// holding it.
    PoisonedState,

    /// A worker terminated abnormally before finishing its operations.
    WorkerPanicked(String),

    /// A release was requested without a matching acquisition.
    NotHeld(&'static str),

    /// The protected state violates the reader/writer exclusion invariants.
    Inconsistent {
        active_readers: usize,
        writer_active: bool,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ResourceExhausted { worker, source } => {
                write!(f, "failed to spawn worker `{worker}`: {source}")
            }
            Error::PoisonedState => {
                write!(f, "lock state guard poisoned by a panicked thread")
            }
            Error::WorkerPanicked(worker) => {
                write!(f, "worker `{worker}` terminated abnormally")
            }
            Error::NotHeld(op) => {
                write!(f, "`{op}` called without a matching acquisition")
            }
            Error::Inconsistent { active_readers, writer_active } => write!(
                f,
                "inconsistent lock state: active_readers({active_readers}), \
                writer_active({writer_active})",
            ),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::ResourceExhausted { source, .. } => Option::Some(source),
            _ => Option::None,
        }
    }
}
