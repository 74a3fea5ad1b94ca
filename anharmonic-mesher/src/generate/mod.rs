mod monkhorst_pack;

pub use monkhorst_pack::*;
