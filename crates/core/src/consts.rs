//! Reserved coefficient IDs and solver tuning constants.

/// The term contributes nothing, whatever the wire value.
pub const COEFF_ID_ZERO: u32 = 0;
/// Coefficient one.
pub const COEFF_ID_ONE: u32 = 1;
/// Coefficient two.
pub const COEFF_ID_TWO: u32 = 2;
/// Coefficient minus one.
pub const COEFF_ID_MINUS_ONE: u32 = 3;
/// First coefficient ID that indexes the user coefficient pool. IDs below
/// this have fixed semantics and are never read from the pool.
pub const FIRST_USER_COEFF_ID: u32 = 4;

/// Minimum number of constraints a solver task should hold. A level with
/// fewer constraints than this runs sequentially on the calling thread.
pub const MIN_WORK_PER_WORKER: usize = 50;
