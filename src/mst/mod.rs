pub mod csr;
pub mod depot;
pub mod incremental;
pub mod mldists;

pub use csr::CsrMst;
pub use depot::CsrDepot;
pub use incremental::{IncrementalMst, InvalidInput};
pub use mldists::MultiLevelDists;
