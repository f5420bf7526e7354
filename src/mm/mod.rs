//! # Memory Management (MM)
//!
//! Gerência de memória física do Forge: descritores de página, alocador
//! buddy por domínio e filas de páginas por domínio.
//!
//! ## 🏗️ Arquitetura dos Módulos
//!
//! | Módulo      | Responsabilidade |
//! |-------------|------------------|
//! | `addr`      | `PhysAddr` e aritmética de alinhamento |
//! | `config`    | Constantes de compilação (ordens, pools, limites) |
//! | `page`      | Descritor de página (`Page`) referenciado por índice |
//! | `phys`      | Registro de segmentos, buddy, runs contíguos, páginas fictícias |
//! | `pagequeue` | Filas nomeadas por domínio para o reclaim externo |
//!
//! ## Ordem de inicialização
//!
//! ```text
//! SegmentRegistry::add_segment / set_affinity   (boot, single-thread)
//!        │
//!        ▼
//! initialize() ──▶ PhysAllocator ──▶ populate() ──▶ install()
//! ```
//!
//! ## Locks
//!
//! - Lock de free lists do domínio: protege a estrutura buddy. Contagens de
//!   livres são ajustadas depois de soltá-lo.
//! - Lock de cada fila de páginas: independente do lock do domínio; nunca
//!   adquirido com ele.
//! - `RwLock` dos ranges fictícios: folha.

pub mod addr;
pub mod config;
pub mod error;
pub mod page;
pub mod pagequeue;
pub mod phys;

#[cfg(feature = "self_test")]
pub mod test;

pub use addr::PhysAddr;
pub use error::{MmError, MmResult};
pub use page::{Page, PageId};
