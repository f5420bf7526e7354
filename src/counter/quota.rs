//! # Quota Counter
//!
//! Contador de recurso limitado, otimizado para leitura rápida às custas de
//! precisão.
//!
//! O recurso disponível é `pool + Σ crédito local`. Cada CPU mantém um
//! crédito local (até `budget` unidades) retirado do pool, de modo que a
//! maioria dos `get`/`add` não toca no mutex.
//!
//! - `fetch()`    → lê só o pool. Barato, pode subcontar até
//!   `budget × shards`.
//! - `fetchall()` → drena todos os créditos locais para o pool sob o mutex e
//!   retorna o total exato. Caro.
//!
//! O pool pode ficar negativo (add com delta negativo = consumo sem reserva):
//! o limite é aproximado.

use core::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use bitflags::bitflags;
use spin::{Mutex, MutexGuard};

use super::{AllocWait, Counter};
use crate::mm::error::{MmError, MmResult};
use crate::sync::{CondVar, WaitStatus};

bitflags! {
    /// Opções de `QuotaCounter::get`
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct QuotaFlags: u32 {
        /// Não espera pelo mutex nem reconcilia os shards
        const NOBLOCK = 0x0000_0001;
        /// Pode reconciliar, mas nunca dorme
        const NOSLEEP = 0x0000_0002;
    }
}

/// Cancelamento explícito de um `get` bloqueado
#[derive(Debug, Default)]
pub struct CancelToken(AtomicBool);

impl CancelToken {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Estado protegido pelo mutex
struct Pool {
    /// Unidades disponíveis fora dos shards (pode ser negativo)
    pool: i64,
    /// Há threads dormindo em `get`
    waiters: bool,
}

/// Contador com orçamento por CPU e pool compartilhado
pub struct QuotaCounter {
    /// Crédito local de cada CPU (i64 em complemento de dois)
    credit: Counter,
    /// Crédito máximo por shard
    budget: i64,
    state: Mutex<Pool>,
    /// Cópia do pool para `fetch` sem lock
    snapshot: AtomicI64,
    /// Espelho de `Pool::waiters` lido pelo caminho rápido de `add`
    waiters: AtomicBool,
    cv: CondVar,
}

impl QuotaCounter {
    /// Cria contador com `budget` por shard e `pool` unidades iniciais
    pub fn init(budget: u64, pool: u64, wait: AllocWait) -> MmResult<Self> {
        let budget = i64::try_from(budget).map_err(|_| MmError::InvalidParameter)?;
        let pool = i64::try_from(pool).map_err(|_| MmError::InvalidParameter)?;

        Ok(Self {
            credit: Counter::alloc(wait)?,
            budget,
            state: Mutex::new(Pool {
                pool,
                waiters: false,
            }),
            snapshot: AtomicI64::new(pool),
            waiters: AtomicBool::new(false),
            cv: CondVar::new(),
        })
    }

    /// Destrói o contador
    pub fn fini(self) {
        drop(self);
    }

    /// Total aproximado: apenas o pool, sem os créditos locais
    #[inline]
    pub fn fetch(&self) -> u64 {
        self.snapshot.load(Ordering::Relaxed).max(0) as u64
    }

    /// Total exato: reconcilia todos os shards no pool
    pub fn fetchall(&self) -> u64 {
        let mut st = self.state.lock();
        self.drain(&mut st);
        st.pool.max(0) as u64
    }

    /// Devolve (`delta > 0`) ou consome (`delta < 0`) unidades no shard local
    pub fn add(&self, delta: i64) {
        let prev = self.credit.local().fetch_add(delta as u64, Ordering::SeqCst) as i64;
        let now = prev.wrapping_add(delta);

        if now.unsigned_abs() > self.budget as u64
            || (delta > 0 && self.waiters.load(Ordering::SeqCst))
        {
            self.settle();
        }
    }

    /// Reserva `amount` unidades.
    ///
    /// Sem flags, dorme até haver quota ou até um sinal pendente
    /// (`hal::signal_pending`). `label` identifica a espera nos logs.
    pub fn get(&self, amount: i64, flags: QuotaFlags, label: &str) -> bool {
        self.reserve(amount, flags, label, &crate::hal::signal_pending)
    }

    /// Como `get`, mas a espera também é abandonada quando `token` é
    /// cancelado. Cancelamento nunca concede quota parcial.
    pub fn get_cancellable(
        &self,
        amount: i64,
        flags: QuotaFlags,
        label: &str,
        token: &CancelToken,
    ) -> bool {
        self.reserve(amount, flags, label, &|| {
            token.is_cancelled() || crate::hal::signal_pending()
        })
    }

    fn reserve(
        &self,
        amount: i64,
        flags: QuotaFlags,
        label: &str,
        interrupted: &dyn Fn() -> bool,
    ) -> bool {
        if amount <= 0 {
            return true;
        }

        // Fast path: crédito local, sem lock
        if self.take_local(amount) {
            return true;
        }

        let mut st = if flags.contains(QuotaFlags::NOBLOCK) {
            match self.state.try_lock() {
                Some(guard) => guard,
                None => return false,
            }
        } else {
            self.state.lock()
        };

        loop {
            if self.take_pool(&mut st, amount) {
                return true;
            }
            if flags.contains(QuotaFlags::NOBLOCK) {
                return false;
            }

            // Anunciar a espera ANTES de drenar: um add concorrente ou cai
            // no dreno ou vê o flag e reconcilia.
            let announced = !flags.contains(QuotaFlags::NOSLEEP) && !st.waiters;
            if announced {
                self.set_waiters(&mut st, true);
            }

            self.drain(&mut st);
            if self.take_pool(&mut st, amount) {
                // Ninguém mais dorme se o flag estava limpo antes do anúncio
                if announced {
                    self.set_waiters(&mut st, false);
                }
                return true;
            }
            if flags.contains(QuotaFlags::NOSLEEP) {
                return false;
            }

            crate::kdebug!(label, amount);
            let (guard, status) = self.cv.wait(&self.state, st, interrupted);
            st = guard;

            if status == WaitStatus::Interrupted {
                crate::kdebug!("(Quota) Espera interrompida, pedido=", amount);
                return false;
            }
        }
    }

    #[inline]
    fn take_local(&self, amount: i64) -> bool {
        self.credit
            .local()
            .fetch_update(Ordering::SeqCst, Ordering::Relaxed, |v| {
                let v = v as i64;
                (v >= amount).then(|| (v - amount) as u64)
            })
            .is_ok()
    }

    /// Retira `amount` do pool e recarrega o crédito local
    fn take_pool(&self, st: &mut MutexGuard<'_, Pool>, amount: i64) -> bool {
        if st.pool < amount {
            return false;
        }
        st.pool -= amount;

        let refill = self.budget.min(st.pool);
        if refill > 0 {
            st.pool -= refill;
            self.credit.local().fetch_add(refill as u64, Ordering::SeqCst);
        }

        self.snapshot.store(st.pool, Ordering::Relaxed);
        true
    }

    /// Move o crédito de todos os shards para o pool
    fn drain(&self, st: &mut MutexGuard<'_, Pool>) {
        for shard in self.credit.shards() {
            st.pool += shard.swap(0, Ordering::SeqCst) as i64;
        }
        self.snapshot.store(st.pool, Ordering::Relaxed);
    }

    #[inline]
    fn set_waiters(&self, st: &mut MutexGuard<'_, Pool>, waiters: bool) {
        st.waiters = waiters;
        self.waiters.store(waiters, Ordering::SeqCst);
    }

    /// Move o crédito local para o pool e acorda quem espera
    fn settle(&self) {
        let mut st = self.state.lock();
        st.pool += self.credit.local().swap(0, Ordering::SeqCst) as i64;
        self.snapshot.store(st.pool, Ordering::Relaxed);

        if st.waiters {
            self.set_waiters(&mut st, false);
            drop(st);
            self.cv.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal;
    use crate::mm::config::MAX_CPUS;
    use alloc::sync::Arc;
    use alloc::vec::Vec;
    use core::sync::atomic::AtomicUsize;

    fn other_shard(q: &QuotaCounter) -> &core::sync::atomic::AtomicU64 {
        let other = (hal::shard_id() + 1) % MAX_CPUS;
        q.credit.shards().nth(other).unwrap()
    }

    #[test]
    fn test_get_from_pool_then_exhaust() {
        let q = QuotaCounter::init(4, 10, AllocWait::NoWait).unwrap();
        assert!(q.get(3, QuotaFlags::NOSLEEP, "test"));
        // 3 concedidos, 4 em crédito local, 3 no pool
        assert_eq!(q.fetch(), 3);
        assert_eq!(q.fetchall(), 7);

        assert!(q.get(7, QuotaFlags::NOSLEEP, "test"));
        assert!(!q.get(1, QuotaFlags::NOSLEEP, "test"));
        assert!(!q.get(1, QuotaFlags::NOBLOCK, "test"));
        assert_eq!(q.fetchall(), 0);
        q.fini();
    }

    #[test]
    fn test_add_settles_over_budget() {
        let q = QuotaCounter::init(8, 0, AllocWait::Wait).unwrap();
        q.add(5);
        // Dentro do orçamento: fica no shard
        assert_eq!(q.fetch(), 0);
        q.add(5);
        assert_eq!(q.fetch(), 10);
        assert_eq!(q.fetchall(), 10);
    }

    #[test]
    fn test_negative_pool_is_oversubscription() {
        let q = QuotaCounter::init(2, 1, AllocWait::Wait).unwrap();
        q.add(-5);
        assert_eq!(q.fetch(), 0);
        assert_eq!(q.fetchall(), 0);
        assert!(!q.get(1, QuotaFlags::NOSLEEP, "test"));
        q.add(6);
        assert_eq!(q.fetchall(), 2);
    }

    #[test]
    fn test_noblock_does_not_reconcile() {
        let q = QuotaCounter::init(16, 0, AllocWait::Wait).unwrap();
        other_shard(&q).store(2, Ordering::SeqCst);

        assert!(!q.get(2, QuotaFlags::NOBLOCK, "test"));
        assert!(q.get(2, QuotaFlags::NOSLEEP, "test"));
        assert_eq!(q.fetchall(), 0);
    }

    #[test]
    fn test_reconciled_get_withdraws_waiter_flag() {
        hal::testing::install();
        let q = QuotaCounter::init(16, 0, AllocWait::Wait).unwrap();
        other_shard(&q).store(3, Ordering::SeqCst);

        // O dreno basta: o get bloqueante nunca chega a dormir
        assert!(q.get(3, QuotaFlags::empty(), "test"));
        assert!(!q.waiters.load(Ordering::SeqCst));
        assert!(!q.state.lock().waiters);

        // Um add posterior dentro do orçamento fica no shard local
        q.add(1);
        assert_eq!(q.fetch(), 0);
        assert_eq!(q.fetchall(), 1);
    }

    #[test]
    fn test_concurrent_grants_never_exceed_pool() {
        hal::testing::install();

        const POOL: u64 = 100;
        const BUDGET: u64 = 4;
        let q = Arc::new(QuotaCounter::init(BUDGET, POOL, AllocWait::Wait).unwrap());
        let granted = Arc::new(AtomicUsize::new(0));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let q = q.clone();
                let granted = granted.clone();
                std::thread::spawn(move || {
                    while q.get(1, QuotaFlags::NOSLEEP, "test") {
                        granted.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let granted = granted.load(Ordering::Relaxed) as u64;
        assert!(granted <= POOL + BUDGET * 8);
        assert_eq!(granted, POOL);
        assert_eq!(q.fetchall(), 0);
    }

    #[test]
    fn test_blocking_get_wakes_on_add() {
        hal::testing::install();

        let q = Arc::new(QuotaCounter::init(8, 0, AllocWait::Wait).unwrap());
        let waiter = {
            let q = q.clone();
            std::thread::spawn(move || q.get(3, QuotaFlags::empty(), "quotawt"))
        };

        // Espera o waiter dormir (ou já ter reservado)
        while !q.waiters.load(Ordering::SeqCst) && !waiter.is_finished() {
            std::thread::yield_now();
        }
        q.add(3);

        assert!(waiter.join().unwrap());
        assert_eq!(q.fetchall(), 0);
    }

    #[test]
    fn test_cancelled_wait_grants_nothing() {
        hal::testing::install();

        let q = Arc::new(QuotaCounter::init(4, 2, AllocWait::Wait).unwrap());
        let token = Arc::new(CancelToken::new());

        let waiter = {
            let q = q.clone();
            let token = token.clone();
            std::thread::spawn(move || q.get_cancellable(5, QuotaFlags::empty(), "quotawt", &token))
        };

        while !q.waiters.load(Ordering::SeqCst) {
            std::thread::yield_now();
        }
        token.cancel();

        assert!(!waiter.join().unwrap());
        assert_eq!(q.fetchall(), 2);
    }
}
