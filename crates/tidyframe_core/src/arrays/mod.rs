pub mod array;
pub mod bitmap;
pub mod column;
pub mod compute;
pub mod datatype;
pub mod row;
pub mod scalar;
pub mod schema;
pub mod selection;
pub mod table;
