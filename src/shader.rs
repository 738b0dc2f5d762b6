/// Embedded HLSL for the built-in compute stages.
///
/// Every shader reads the frame from `t0`, writes it to `u0` and uses
/// `[numthreads(8, 8, 1)]`.
///
/// - `INVERT_HLSL`: inverts colour channels, keeps alpha.
pub const INVERT_HLSL: &str = include_str!("shader/invert.hlsl");
