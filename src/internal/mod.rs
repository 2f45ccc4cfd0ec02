//! Internal building blocks (object model, pack reader/writer, zlib streaming)
//! that power the public fetch/stage/push/clone surfaces.

pub mod object;
pub mod pack;
pub mod zlib;
