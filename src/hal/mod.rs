//! Hardware Abstraction Layer (HAL)
//!
//! Interface mínima que os contadores per-CPU e o alocador físico usam da
//! plataforma: identidade da CPU, relógio em ticks, bloqueio de threads e
//! console para os logs.
//!
//! A plataforma é instalada uma única vez durante o boot (`install`). Antes
//! disso vale a plataforma de boot: CPU 0, jiffies internos avançados por
//! `tick()`, espera ocupada e console mudo.

pub mod platform;

#[cfg(test)]
pub mod testing;

pub use platform::Platform;

use core::sync::atomic::{AtomicU64, Ordering};
use spin::Once;

use crate::mm::config::MAX_CPUS;

/// Frequência do Tick da plataforma de boot (Ticks por segundo)
pub const HZ: u64 = 100;

static PLATFORM: Once<&'static dyn Platform> = Once::new();

/// Ticks desde o boot enquanto nenhuma plataforma foi instalada.
static JIFFIES: AtomicU64 = AtomicU64::new(0);

/// Instala a plataforma. Retorna false se outra já estava instalada.
pub fn install(platform: &'static dyn Platform) -> bool {
    let mut installed = false;
    PLATFORM.call_once(|| {
        installed = true;
        platform
    });
    installed
}

#[inline]
fn current() -> Option<&'static dyn Platform> {
    PLATFORM.get().copied()
}

/// ID da CPU atual
#[inline]
pub fn cpu_id() -> usize {
    match current() {
        Some(p) => p.cpu_id(),
        None => 0,
    }
}

/// Índice do shard per-CPU da CPU atual
#[inline]
pub fn shard_id() -> usize {
    cpu_id() % MAX_CPUS
}

/// Ticks desde o boot
#[inline]
pub fn ticks() -> u64 {
    match current() {
        Some(p) => p.ticks(),
        None => JIFFIES.load(Ordering::Relaxed),
    }
}

/// Ticks por segundo
#[inline]
pub fn hz() -> u64 {
    match current() {
        Some(p) => p.hz(),
        None => HZ,
    }
}

/// Avança os jiffies da plataforma de boot.
/// Deve ser chamado APENAS pelo handler do timer.
#[inline]
pub fn tick() {
    JIFFIES.fetch_add(1, Ordering::Relaxed);
}

/// Bloqueia até `wake(channel)` (ou despertar espúrio)
pub fn park(channel: usize) {
    match current() {
        Some(p) => p.park(channel),
        None => core::hint::spin_loop(),
    }
}

/// Acorda quem dorme em `channel`
pub fn wake(channel: usize) {
    if let Some(p) = current() {
        p.wake(channel);
    }
}

/// Sinal pendente para a thread atual?
pub fn signal_pending() -> bool {
    match current() {
        Some(p) => p.signal_pending(),
        None => false,
    }
}

// =============================================================================
// CONSOLE
// =============================================================================

/// Escreve string no console
pub fn emit_str(s: &str) {
    if let Some(p) = current() {
        p.emit_str(s);
    }
}

/// Escreve valor em hexadecimal (sem core::fmt)
pub fn emit_hex(value: u64) {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut buf = [0u8; 18];
    buf[0] = b'0';
    buf[1] = b'x';

    let nibbles = if value == 0 {
        1
    } else {
        (16 - value.leading_zeros() as usize / 4).max(1)
    };
    for i in 0..nibbles {
        let shift = (nibbles - 1 - i) * 4;
        buf[2 + i] = DIGITS[((value >> shift) & 0xF) as usize];
    }

    // Somente dígitos ASCII foram escritos
    if let Ok(s) = core::str::from_utf8(&buf[..2 + nibbles]) {
        emit_str(s);
    }
}

/// Emite newline
pub fn emit_nl() {
    emit_str("\n");
}
