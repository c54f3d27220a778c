//! Reading and writing training problems

pub mod libsvm;

pub use self::libsvm::{parse_line, save_problem, write_problem, LibSVMDataset};
