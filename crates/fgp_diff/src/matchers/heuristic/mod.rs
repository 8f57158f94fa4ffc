pub mod fgp;
