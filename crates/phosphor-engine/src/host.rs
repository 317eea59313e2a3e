//! The engine host: compile, hot-swap, and the frame loop.
//!
//! [`Engine`] owns everything a playback session needs: registry,
//! adapter table, session state, buffer pool, event bus, and the
//! current program. The authoring layer calls [`Engine::apply_patch`]
//! after its debounce and [`Engine::render_frame`] on every tick;
//! program swaps happen only between frames.

use std::time::Instant;

use crossbeam_channel::Receiver;

use phosphor_arena::BufferPool;
use phosphor_compiler::frontend::snapshot::FrontendSnapshot;
use phosphor_compiler::program::CompiledProgram;
use phosphor_compiler::{compile, CompileOptions};
use phosphor_core::diag::RuntimeWarning;
use phosphor_core::event::{EngineEvent, EventSink, FrameStats, MemoryStats, SwapMode};
use phosphor_core::id::{CompileId, Revision};
use phosphor_core::AdapterRegistry;
use phosphor_graph::{BlockRegistry, Patch};
use phosphor_runtime::{flush_to_session, migrate_state, ProgramState, SessionState};

use crate::bus::EventBus;
use crate::executor::execute_frame;
use crate::metrics::FrameMetrics;
use crate::render::RenderFrame;

/// Host configuration.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Minimum milliseconds between health snapshots. Default 1000.
    pub health_interval_ms: f64,
    /// Soft compile budget in microseconds. Default 8000.
    pub compile_budget_us: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            health_interval_ms: 1000.0,
            compile_budget_us: 8_000,
        }
    }
}

/// A playback session: compiler inputs, runtime state, and the frame
/// loop, glued together by the event bus.
pub struct Engine {
    registry: BlockRegistry,
    adapters: AdapterRegistry,
    config: EngineConfig,
    session: SessionState,
    pool: BufferPool,
    bus: EventBus,
    program: Option<CompiledProgram>,
    state: Option<ProgramState>,
    snapshot: Option<FrontendSnapshot>,
    last_frame: Option<RenderFrame>,
    last_metrics: FrameMetrics,
    next_compile: u64,
    // Health throttle bookkeeping.
    last_health_t: Option<f64>,
    frames_since_health: u64,
    anomalies_since_health: u64,
    avg_frame_us: u64,
    started: Instant,
}

impl Engine {
    /// Create a session over a block registry, with the standard
    /// adapter table.
    pub fn new(registry: BlockRegistry) -> Self {
        Self::with_config(registry, EngineConfig::default())
    }

    /// Create a session with explicit configuration.
    pub fn with_config(registry: BlockRegistry, config: EngineConfig) -> Self {
        Self {
            registry,
            adapters: AdapterRegistry::standard(),
            config,
            session: SessionState::new(),
            pool: BufferPool::new(),
            bus: EventBus::new(),
            program: None,
            state: None,
            snapshot: None,
            last_frame: None,
            last_metrics: FrameMetrics::default(),
            next_compile: 1,
            last_health_t: None,
            frames_since_health: 0,
            anomalies_since_health: 0,
            avg_frame_us: 0,
            started: Instant::now(),
        }
    }

    /// Subscribe to the session's event stream.
    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        self.bus.subscribe()
    }

    /// The currently running program, if any.
    pub fn program(&self) -> Option<&CompiledProgram> {
        self.program.as_ref()
    }

    /// The most recent frontend snapshot, if any compile has run.
    pub fn snapshot(&self) -> Option<&FrontendSnapshot> {
        self.snapshot.as_ref()
    }

    /// Metrics of the most recent frame.
    pub fn last_metrics(&self) -> &FrameMetrics {
        &self.last_metrics
    }

    /// The session's persistent state (for inspection and tests).
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Compile a patch snapshot and, on success, hot-swap to the new
    /// program at this frame boundary.
    ///
    /// On failure the previous program keeps running untouched; the
    /// returned snapshot carries the diagnostics either way.
    pub fn apply_patch(&mut self, patch: &Patch) -> &FrontendSnapshot {
        let opts = CompileOptions {
            compile_id: CompileId(self.next_compile),
            soft_budget_us: self.config.compile_budget_us,
        };
        self.next_compile += 1;
        let output = compile(patch, &self.registry, &self.adapters, &opts, &self.bus);

        if let Some(new_program) = output.program {
            // Flush the outgoing program's state to the session so the
            // incoming one can claim it by stable ID.
            let mode = match (self.program.take(), self.state.take()) {
                (Some(old_program), Some(old_state)) => {
                    flush_to_session(&old_program, &old_state, &mut self.session);
                    SwapMode::Soft
                }
                _ => SwapMode::Hard,
            };

            let mut state = ProgramState::for_program(&new_program);
            let stats = migrate_state(&new_program, &mut state, &self.session);
            if stats.discarded > 0 || stats.initialized > 0 {
                self.bus.emit(EngineEvent::Warning {
                    revision: new_program.revision,
                    warning: RuntimeWarning::StateMigrationMismatch {
                        discarded: stats.discarded,
                        initialized: stats.initialized,
                    },
                });
            }

            let instance_counts = new_program
                .instances
                .iter()
                .map(|def| {
                    let lanes = self
                        .session
                        .lane_table(&def.stable_key)
                        .map(|t| t.len() as u32)
                        .unwrap_or(0);
                    (def.label.clone(), lanes)
                })
                .collect();
            self.bus.emit(EngineEvent::ProgramSwapped {
                revision: new_program.revision,
                compile: new_program.compile_id,
                mode,
                instance_counts,
            });

            self.program = Some(new_program);
            self.state = Some(state);
        }

        &*self.snapshot.insert(output.snapshot)
    }

    /// Borrow the pieces a step-debug session needs, mutably and
    /// disjointly. Returns `None` when no program is installed.
    pub fn debug_parts(
        &mut self,
    ) -> Option<(
        &CompiledProgram,
        &mut ProgramState,
        &mut SessionState,
        &mut BufferPool,
    )> {
        // A debug frame replaces the normal one; drop any held frame so
        // its buffers return to the pool on the next reconcile.
        if let Some(previous) = self.last_frame.take() {
            previous.recycle(&mut self.pool);
        }
        self.pool.reconcile();
        match (&self.program, &mut self.state) {
            (Some(program), Some(state)) => {
                Some((program, state, &mut self.session, &mut self.pool))
            }
            _ => None,
        }
    }

    /// Execute one frame at the given absolute time.
    ///
    /// Recycles the previous frame's pass buffers, reconciles the pool
    /// ledger (reporting leaks), runs the schedule, and returns the new
    /// render frame. Returns `None` when no program is installed.
    pub fn render_frame(&mut self, t_abs_ms: f64) -> Option<&RenderFrame> {
        let program = self.program.as_ref()?;
        let state = self.state.as_mut()?;

        // Close the previous frame's buffer cycle before opening a new
        // one; a leak here resets the pool and the frame proceeds.
        if let Some(previous) = self.last_frame.take() {
            previous.recycle(&mut self.pool);
        }
        let report = self.pool.reconcile();
        if !report.balanced {
            self.bus.emit(EngineEvent::Warning {
                revision: program.revision,
                warning: RuntimeWarning::BufferPoolLeak {
                    granted: report.granted,
                    returned: report.returned,
                },
            });
        }

        let result = execute_frame(
            program,
            state,
            &mut self.session,
            &mut self.pool,
            &self.bus,
            None,
            t_abs_ms,
        );

        self.frames_since_health += 1;
        self.anomalies_since_health += result.metrics.anomalies;
        self.avg_frame_us = if self.avg_frame_us == 0 {
            result.metrics.total_us
        } else {
            (self.avg_frame_us * 7 + result.metrics.total_us) / 8
        };
        self.maybe_emit_health(program.revision, t_abs_ms, &result.metrics);

        self.last_metrics = result.metrics;
        self.last_frame = Some(result.frame);
        self.last_frame.as_ref()
    }

    /// Uptime of this session.
    pub fn uptime_us(&self) -> u64 {
        self.started.elapsed().as_micros() as u64
    }

    fn maybe_emit_health(&mut self, revision: Revision, t_abs_ms: f64, metrics: &FrameMetrics) {
        let due = match self.last_health_t {
            None => true,
            Some(last) => t_abs_ms - last >= self.config.health_interval_ms,
        };
        if !due {
            return;
        }
        self.last_health_t = Some(t_abs_ms);
        self.bus.emit(EngineEvent::HealthSnapshot {
            revision,
            frame: FrameStats {
                last_frame_us: metrics.total_us,
                avg_frame_us: self.avg_frame_us,
                frames: self.frames_since_health,
                anomalies: self.anomalies_since_health,
            },
            memory: MemoryStats {
                pool_bytes: metrics.pool_bytes,
                pool_free: self.pool.free_count(),
                state_bytes: metrics.state_bytes,
            },
        });
        self.frames_since_health = 0;
        self.anomalies_since_health = 0;
    }
}
