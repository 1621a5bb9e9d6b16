use clap::ValueEnum;

pub mod benches;
pub mod clock;
pub mod error;
pub mod harness;
pub mod payload;
pub mod schema;
pub mod store;

/// Storage medium the flash benches write to.
#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum StoreKind {
    /// Files in a directory on the host (a temp dir unless `--dir` is given).
    #[default]
    Dir,
    /// In-memory store; useful for checking harness overhead.
    Mem,
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Dir => "dir",
            StoreKind::Mem => "mem",
        }
    }
}
