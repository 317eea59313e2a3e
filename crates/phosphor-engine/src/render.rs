//! The per-frame render IR: instanced geometry passes.

use phosphor_arena::{BufferPool, LaneBuffer};
use phosphor_core::id::Revision;
use phosphor_core::op::PrimitiveKind;

/// One instanced pass.
///
/// Buffers are owned by the pass until the frame is recycled; the
/// rasterizer reads them without copying.
#[derive(Debug)]
pub struct RenderPass {
    /// Primitive drawn per instance.
    pub primitive: PrimitiveKind,
    /// Instance count.
    pub count: u32,
    /// Per-instance positions (vec2 lanes).
    pub position: LaneBuffer,
    /// Per-instance colors (RGBA lanes), when wired.
    pub color: Option<LaneBuffer>,
    /// Per-instance shape/size values, when wired.
    pub shape: Option<LaneBuffer>,
    /// Uniform scale for the whole pass.
    pub scale: f32,
}

/// The render description produced by one frame.
///
/// Valid until recycled into the pool at the next frame boundary; the
/// caller must consume it before then.
#[derive(Debug, Default)]
pub struct RenderFrame {
    /// Revision of the program that produced the frame.
    pub revision: Revision,
    /// Absolute frame time, milliseconds.
    pub t_abs_ms: f64,
    /// Passes in emission order.
    pub passes: Vec<RenderPass>,
}

impl RenderFrame {
    /// Return every pass buffer to the pool, consuming the frame.
    ///
    /// The host calls this at the next frame boundary; the pool's
    /// ledger then balances over the whole frame cycle.
    pub fn recycle(self, pool: &mut BufferPool) {
        for pass in self.passes {
            pool.release(pass.position);
            if let Some(color) = pass.color {
                pool.release(color);
            }
            if let Some(shape) = pass.shape {
                pool.release(shape);
            }
        }
    }
}
