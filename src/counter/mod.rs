//! # Per-CPU Counters
//!
//! Contadores de 64 bits fragmentados por CPU.
//!
//! ## 🎯 Propósito
//!
//! Estatísticas quentes (páginas livres, tamanho das filas, taxa de eventos)
//! são incrementadas por todas as CPUs ao mesmo tempo. Um único atômico
//! compartilhado faria a cache line ricochetear entre os cores a cada
//! incremento.
//!
//! ## 🏗️ Arquitetura
//!
//! Cada CPU soma no seu próprio shard, alinhado a cache line. A leitura soma
//! todos os shards:
//!
//! 1. add()   → fetch_add no shard local (sem lock, sem contenção)
//! 2. fetch() → soma de todos os shards (aproximada sob concorrência)
//! 3. zero()  → zera shard a shard (não atômico com add concorrente)
//!
//! A soma é feita em aritmética modular: um shard pode acumular valores
//! "negativos" (add com delta < 0 em uma CPU, positivo em outra) e o total
//! continua correto.
//!
//! ## Submódulos
//!
//! - `rate`:  detector de taxa por segundo (ratecheck)
//! - `quota`: contador com orçamento por CPU e pool compartilhado

pub mod quota;
pub mod rate;

pub use quota::{CancelToken, QuotaCounter, QuotaFlags};
pub use rate::RateCheck;

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use crate::hal;
use crate::mm::config::MAX_CPUS;
use crate::mm::error::{MmError, MmResult};

// =============================================================================
// POLÍTICA DE ALOCAÇÃO
// =============================================================================

/// Pode a alocação bloquear esperando memória?
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocWait {
    /// Pode esperar (nunca falha)
    Wait,
    /// Falha imediatamente se não houver memória
    NoWait,
}

// =============================================================================
// SHARD
// =============================================================================

/// Slot de uma CPU
///
/// Alinhado a cache line para evitar false sharing entre CPUs.
#[repr(C, align(64))]
struct Shard(AtomicU64);

impl Shard {
    const fn new() -> Self {
        Self(AtomicU64::new(0))
    }
}

// =============================================================================
// CONTADOR
// =============================================================================

/// Contador escalável
///
/// Handle dono dos shards. `free` (ou drop) libera a memória; o tipo impede
/// leitura após liberação.
pub struct Counter {
    shards: Box<[Shard]>,
}

impl Counter {
    /// Aloca contador zerado (pode esperar memória)
    pub fn new() -> Self {
        let shards: Vec<Shard> = (0..MAX_CPUS).map(|_| Shard::new()).collect();
        Self {
            shards: shards.into_boxed_slice(),
        }
    }

    /// Aloca contador zerado segundo a política `wait`
    pub fn alloc(wait: AllocWait) -> MmResult<Self> {
        match wait {
            AllocWait::Wait => Ok(Self::new()),
            AllocWait::NoWait => {
                let mut shards = Vec::new();
                shards
                    .try_reserve_exact(MAX_CPUS)
                    .map_err(|_| MmError::OutOfMemory)?;
                shards.extend((0..MAX_CPUS).map(|_| Shard::new()));
                Ok(Self {
                    shards: shards.into_boxed_slice(),
                })
            }
        }
    }

    /// Libera o contador
    #[inline]
    pub fn free(self) {
        drop(self);
    }

    /// Soma `delta` no shard da CPU atual. Nunca bloqueia.
    #[inline(always)]
    pub fn add(&self, delta: i64) {
        self.local().fetch_add(delta as u64, Ordering::Relaxed);
    }

    /// Zera todos os shards
    pub fn zero(&self) {
        for shard in self.shards.iter() {
            shard.0.store(0, Ordering::Relaxed);
        }
    }

    /// Soma de todos os shards
    pub fn fetch(&self) -> u64 {
        self.shards
            .iter()
            .fold(0u64, |acc, s| acc.wrapping_add(s.0.load(Ordering::Relaxed)))
    }

    /// Soma de todos os shards, interpretada com sinal
    #[inline]
    pub fn fetch_i64(&self) -> i64 {
        self.fetch() as i64
    }

    /// Shard da CPU atual
    #[inline(always)]
    pub(crate) fn local(&self) -> &AtomicU64 {
        &self.shards[hal::shard_id()].0
    }

    /// Todos os shards, em ordem de CPU
    pub(crate) fn shards(&self) -> impl Iterator<Item = &AtomicU64> {
        self.shards.iter().map(|s| &s.0)
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Counter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("Counter").field(&self.fetch()).finish()
    }
}

// =============================================================================
// OPERAÇÕES EM LOTE
// =============================================================================

/// Aloca `n` contadores. Em falha nenhum contador sobrevive.
pub fn alloc_array(n: usize, wait: AllocWait) -> MmResult<Vec<Counter>> {
    let mut counters = Vec::new();
    if wait == AllocWait::NoWait {
        counters
            .try_reserve_exact(n)
            .map_err(|_| MmError::OutOfMemory)?;
    }
    for _ in 0..n {
        counters.push(Counter::alloc(wait)?);
    }
    Ok(counters)
}

/// Libera todos os contadores
pub fn free_array(counters: Vec<Counter>) {
    for counter in counters {
        counter.free();
    }
}

/// Zera todos os contadores
pub fn zero_array(counters: &[Counter]) {
    for counter in counters {
        counter.zero();
    }
}

/// Copia o valor de cada contador para `dst` (na mesma ordem)
pub fn copy_array(counters: &[Counter], dst: &mut [u64]) {
    debug_assert!(dst.len() >= counters.len());
    for (slot, counter) in dst.iter_mut().zip(counters) {
        *slot = counter.fetch();
    }
}
