pub mod catalog;
pub mod generate;
pub mod history;
pub mod report;
pub mod utils;
pub mod validate;
