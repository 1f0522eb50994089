pub mod result_table;

pub use result_table::*;
