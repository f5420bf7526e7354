//! # Synchronization Primitives
//!
//! Os locks do alocador são os do crate `spin`. Este módulo adiciona apenas
//! o que o `spin` não oferece: uma variável de condição que bloqueia via HAL.
//!
//! ## Hierarquia de Uso
//!
//! ```text
//! spin::Mutex   → Seções críticas curtas (free lists, filas, pool de quota)
//! spin::RwLock  → Tabela de ranges fictícios (muitos leitores)
//! spin::Once    → Instalação única (plataforma, alocador global)
//! CondVar       → Espera por condição (quota bloqueante)
//! ```
//!
//! ## Regras
//!
//! - **Ordem de Lock**: free list do domínio → fila de páginas. Nunca o inverso.
//! - Contadores per-CPU nunca são atualizados com lock adquirido por contrato:
//!   o lock protege a estrutura, não a contagem.

/// Condition Variable
pub mod condvar;

pub use condvar::{CondVar, WaitStatus};
