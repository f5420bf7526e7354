//! Plataforma de testes no host.
//!
//! Cada thread do harness recebe um ID de CPU estável, de modo que os
//! shards per-CPU se comportam como em uma máquina SMP.

use core::sync::atomic::{AtomicUsize, Ordering};

use super::Platform;
use crate::mm::config::MAX_CPUS;

static NEXT_CPU: AtomicUsize = AtomicUsize::new(0);

std::thread_local! {
    static CPU: usize = NEXT_CPU.fetch_add(1, Ordering::Relaxed) % MAX_CPUS;
}

pub struct HostPlatform;

impl Platform for HostPlatform {
    fn cpu_id(&self) -> usize {
        CPU.with(|cpu| *cpu)
    }

    fn ticks(&self) -> u64 {
        super::JIFFIES.load(Ordering::Relaxed)
    }

    fn park(&self, _channel: usize) {
        std::thread::yield_now();
    }

    fn wake(&self, _channel: usize) {}
}

static HOST: HostPlatform = HostPlatform;

/// Instala a plataforma de host (idempotente)
pub fn install() {
    super::install(&HOST);
}
