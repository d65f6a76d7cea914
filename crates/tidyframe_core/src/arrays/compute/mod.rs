pub mod binary;
pub mod concat;
pub mod strings;
pub mod take;
