pub mod modified;
