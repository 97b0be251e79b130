// gattscope-mobile — Native mobile bindings for iOS and Android
// This crate exports the gattscope plugin API via UniFFI

pub use gattscope_core::*;
