//! Per-guild command lane.
//!
//! Control commands are queued per guild and drained by at most one worker at
//! a time. The worker is only spawned when there is something to drain and it
//! exits as soon as the lane is empty, so idle guilds cost nothing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::{
    collections::VecDeque,
    sync::{Arc, Weak},
};
use tokio::runtime::Handle;
use tracing::debug;

use super::queue::LoopMode;

/// Comandos de control que pasan por el carril del guild
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Saltar `n` tracks (el actual cuenta como uno)
    Skip(usize),
    Stop,
    TogglePause,
    SetLoopMode(LoopMode),
}

/// Quien ejecuta los comandos drenados del carril
#[async_trait]
pub trait CommandExecutor: Send + Sync + 'static {
    type Command: Send + 'static;

    async fn execute(&self, command: Self::Command);
}

struct LaneState<C> {
    pending: VecDeque<C>,
    draining: bool,
}

/// Carril FIFO con un único worker bajo demanda
pub struct CommandLane<E: CommandExecutor> {
    state: Arc<Mutex<LaneState<E::Command>>>,
    executor: Weak<E>,
    runtime: Handle,
}

impl<E: CommandExecutor> CommandLane<E> {
    pub fn new(executor: Weak<E>, runtime: Handle) -> Self {
        Self {
            state: Arc::new(Mutex::new(LaneState {
                pending: VecDeque::new(),
                draining: false,
            })),
            executor,
            runtime,
        }
    }

    /// Encola sin bloquear; lanza el worker solo si no hay uno activo
    pub fn submit(&self, command: E::Command) {
        let spawn_worker = {
            let mut lane = self.state.lock();
            lane.pending.push_back(command);
            !std::mem::replace(&mut lane.draining, true)
        };

        if spawn_worker {
            debug!("🚦 Iniciando worker del carril de comandos");
            self.runtime
                .spawn(drain(Arc::clone(&self.state), self.executor.clone()));
        }
    }

    /// Comandos aún sin ejecutar
    pub fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }
}

async fn drain<E: CommandExecutor>(state: Arc<Mutex<LaneState<E::Command>>>, executor: Weak<E>) {
    loop {
        // Comprobar vacío y liberar el flag es un único paso atómico
        let command = {
            let mut lane = state.lock();
            match lane.pending.pop_front() {
                Some(command) => command,
                None => {
                    lane.draining = false;
                    return;
                }
            }
        };

        let Some(executor) = executor.upgrade() else {
            let mut lane = state.lock();
            lane.pending.clear();
            lane.draining = false;
            return;
        };

        executor.execute(command).await;
    }
}
