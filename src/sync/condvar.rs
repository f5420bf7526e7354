//! Condition Variable

use core::sync::atomic::{AtomicUsize, Ordering};

use spin::{Mutex, MutexGuard};

use crate::hal;

/// Motivo do retorno de `CondVar::wait`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// Houve `notify` depois de começarmos a esperar
    Notified,
    /// O predicado de interrupção disparou antes de qualquer notify
    Interrupted,
}

/// Condition Variable
/// Permite que threads esperem por uma condição específica.
///
/// Cada notificação incrementa a geração. Quem espera lê a geração ainda com
/// o lock adquirido, de modo que um notify emitido após a mudança de estado
/// nunca se perde. A thread dorme via `hal::park` no canal desta CondVar.
pub struct CondVar {
    generation: AtomicUsize,
}

impl CondVar {
    pub const fn new() -> Self {
        Self {
            generation: AtomicUsize::new(0),
        }
    }

    #[inline]
    fn channel(&self) -> usize {
        self as *const Self as usize
    }

    /// Espera pela condição.
    ///
    /// Libera `guard`, bloqueia até ser notificado ou até `interrupted()`
    /// retornar true, e readquire `mutex`. Quem chama deve reavaliar a
    /// condição em ambos os casos.
    pub fn wait<'a, T>(
        &self,
        mutex: &'a Mutex<T>,
        guard: MutexGuard<'a, T>,
        interrupted: impl Fn() -> bool,
    ) -> (MutexGuard<'a, T>, WaitStatus) {
        let seen = self.generation.load(Ordering::Acquire);
        drop(guard);

        let status = loop {
            if self.generation.load(Ordering::Acquire) != seen {
                break WaitStatus::Notified;
            }
            if interrupted() {
                break WaitStatus::Interrupted;
            }
            hal::park(self.channel());
        };

        (mutex.lock(), status)
    }

    /// Acorda todas as threads esperando.
    ///
    /// Não há despertar individual: quem perde a corrida volta a dormir ao
    /// reavaliar a condição.
    pub fn notify_all(&self) {
        self.generation.fetch_add(1, Ordering::Release);
        hal::wake(self.channel());
    }
}

impl Default for CondVar {
    fn default() -> Self {
        Self::new()
    }
}
