pub mod fixture_cmd;

pub use fixture_cmd::ReplayCli;
