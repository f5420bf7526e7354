//! Rate check sobre contador per-CPU.
//!
//! O tempo é dividido em janelas de um segundo (`hz` ticks). O primeiro
//! chamador que observa uma janela nova tenta adquirir o flag `lock`; quem
//! consegue zera o contador e limpa o estado "acima do limite". Quem perde
//! a corrida segue sem zerar. Não é uma barreira: um reset pode ser perdido
//! ou duplicado, em troca de um caminho quente sem lock.

use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::Counter;
use crate::hal;

/// Estado de rate check de uma classe de eventos
pub struct RateCheck {
    /// Eventos desde o último reset
    rate: Counter,
    /// Flag para limpar a estrutura
    lock: AtomicBool,
    /// Tick do último reset
    ticks: AtomicU64,
    /// Acima do limite desde `ticks`?
    over: AtomicBool,
    /// Contagem da janela anterior, capturada no reset
    last: AtomicU64,
}

impl RateCheck {
    pub fn new() -> Self {
        Self {
            rate: Counter::new(),
            lock: AtomicBool::new(false),
            ticks: AtomicU64::new(hal::ticks()),
            over: AtomicBool::new(false),
            last: AtomicU64::new(0),
        }
    }

    /// Conta um evento contra `limit` por segundo.
    ///
    /// Retorna -1 enquanto a janela atual estiver acima do limite; caso
    /// contrário, o número de eventos contados na janela atual.
    #[inline]
    pub fn check(&self, limit: i64) -> i64 {
        self.check_at(hal::ticks(), hal::hz(), limit)
    }

    /// `check` com relógio explícito
    pub fn check_at(&self, now: u64, hz: u64, limit: i64) -> i64 {
        let start = self.ticks.load(Ordering::Acquire);
        if now.wrapping_sub(start) >= hz.max(1) {
            // Leitura sem lock primeiro, depois o CAS
            if !self.lock.load(Ordering::Relaxed)
                && self
                    .lock
                    .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
            {
                // Outro chamador pode ter acabado de resetar
                if now.wrapping_sub(self.ticks.load(Ordering::Relaxed)) >= hz.max(1) {
                    self.last.store(self.rate.fetch(), Ordering::Relaxed);
                    self.rate.zero();
                    self.over.store(false, Ordering::Relaxed);
                    self.ticks.store(now, Ordering::Release);
                }
                self.lock.store(false, Ordering::Release);
            }
        }

        self.rate.add(1);

        if self.over.load(Ordering::Relaxed) {
            return -1;
        }

        let count = self.rate.fetch_i64();
        if count > limit {
            if !self.over.swap(true, Ordering::Relaxed) {
                crate::kdebug!("(Rate) Limite excedido na janela, eventos=", count);
            }
            return -1;
        }
        count
    }

    /// A janela atual já excedeu o limite?
    #[inline]
    pub fn is_over(&self) -> bool {
        self.over.load(Ordering::Relaxed)
    }

    /// Eventos contados na janela anterior ao último reset
    #[inline]
    pub fn last_rate(&self) -> u64 {
        self.last.load(Ordering::Relaxed)
    }
}

impl Default for RateCheck {
    fn default() -> Self {
        Self::new()
    }
}
