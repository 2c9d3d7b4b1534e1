pub mod codec;
pub mod config;
pub mod decode;
pub mod domain;
pub mod export;
pub mod geometry;
pub mod import;
pub mod numerics;
pub mod scheduling;
pub mod sequence;
pub mod simulation;
pub mod store;
pub mod table;
pub mod validate;
