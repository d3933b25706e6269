pub mod int21;
