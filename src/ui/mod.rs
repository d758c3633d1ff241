/// User interface module
///
/// Only the toolkit smoke-test window lives here (smoke.rs).

pub mod smoke;
