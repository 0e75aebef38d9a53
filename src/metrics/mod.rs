pub mod function;
pub mod requests;
pub mod util;
pub mod worker;
