// =============================================================================
// KERNEL LOGGING SYSTEM - ZERO OVERHEAD
// =============================================================================
//
// Logs do alocador físico com custo ZERO quando desligados.
//
// ARQUITETURA:
// - Usa features do Cargo para filtrar em compile-time
// - Com feature "no_logs", TODOS os macros viram expressões vazias
// - SEM core::fmt - Evita formatação no caminho quente do alocador
// - SEM alocação - Apenas strings literais e um valor em hex
// - Escreve no console da plataforma (hal::emit_str)
//
// NÍVEIS DE LOG (do mais crítico ao menos):
// - ERROR: Erros fatais ou críticos
// - WARN:  Situações suspeitas mas recuperáveis
// - INFO:  Fluxo normal de execução (boot do registro de segmentos)
// - DEBUG: Informações de debugging
// - TRACE: Detalhes extremos (cada split, cada merge)
//
// COMO USAR:
//   kinfo!("(Phys) Inicializando...");           // Apenas string
//   kinfo!("(Phys) Segmentos=", nsegs);           // String + hex
//
// =============================================================================

pub const P_ERROR: &str = "\x1b[1;31m[ERRO]\x1b[0m ";
pub const P_WARN: &str = "\x1b[1;33m[WARN]\x1b[0m ";
pub const P_INFO: &str = "\x1b[32m[INFO]\x1b[0m ";
pub const P_DEBUG: &str = "\x1b[36m[DEBG]\x1b[0m ";
pub const P_TRACE: &str = "\x1b[35m[TRAC]\x1b[0m ";

// =============================================================================
// MACROS DE LOG - NÍVEL ERROR
// =============================================================================

#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! kerror {
    ($msg:expr) => {{
        $crate::hal::emit_str($crate::klib::logging::P_ERROR);
        $crate::hal::emit_str($msg);
        $crate::hal::emit_nl();
    }};
    ($msg:expr, $val:expr) => {{
        $crate::hal::emit_str($crate::klib::logging::P_ERROR);
        $crate::hal::emit_str($msg);
        $crate::hal::emit_hex(($val) as u64);
        $crate::hal::emit_nl();
    }};
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! kerror {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL WARN
// =============================================================================

#[cfg(not(any(feature = "no_logs", feature = "log_error")))]
#[macro_export]
macro_rules! kwarn {
    ($msg:expr) => {{
        $crate::hal::emit_str($crate::klib::logging::P_WARN);
        $crate::hal::emit_str($msg);
        $crate::hal::emit_nl();
    }};
    ($msg:expr, $val:expr) => {{
        $crate::hal::emit_str($crate::klib::logging::P_WARN);
        $crate::hal::emit_str($msg);
        $crate::hal::emit_hex(($val) as u64);
        $crate::hal::emit_nl();
    }};
}

#[cfg(any(feature = "no_logs", feature = "log_error"))]
#[macro_export]
macro_rules! kwarn {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL INFO
// =============================================================================

#[cfg(not(any(feature = "no_logs", feature = "log_error")))]
#[macro_export]
macro_rules! kinfo {
    ($msg:expr) => {{
        $crate::hal::emit_str($crate::klib::logging::P_INFO);
        $crate::hal::emit_str($msg);
        $crate::hal::emit_nl();
    }};
    ($msg:expr, $val:expr) => {{
        $crate::hal::emit_str($crate::klib::logging::P_INFO);
        $crate::hal::emit_str($msg);
        $crate::hal::emit_hex(($val) as u64);
        $crate::hal::emit_nl();
    }};
}

#[cfg(any(feature = "no_logs", feature = "log_error"))]
#[macro_export]
macro_rules! kinfo {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL DEBUG
// =============================================================================
//
// kdebug! - Ativo apenas com log_debug ou log_trace
//

#[cfg(all(
    not(feature = "no_logs"),
    any(feature = "log_debug", feature = "log_trace")
))]
#[macro_export]
macro_rules! kdebug {
    ($msg:expr) => {{
        $crate::hal::emit_str($crate::klib::logging::P_DEBUG);
        $crate::hal::emit_str($msg);
        $crate::hal::emit_nl();
    }};
    ($msg:expr, $val:expr) => {{
        $crate::hal::emit_str($crate::klib::logging::P_DEBUG);
        $crate::hal::emit_str($msg);
        $crate::hal::emit_hex(($val) as u64);
        $crate::hal::emit_nl();
    }};
}

#[cfg(not(all(
    not(feature = "no_logs"),
    any(feature = "log_debug", feature = "log_trace")
)))]
#[macro_export]
macro_rules! kdebug {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL TRACE
// =============================================================================
//
// ktrace! - Ativo apenas com log_trace
//

#[cfg(all(not(feature = "no_logs"), feature = "log_trace"))]
#[macro_export]
macro_rules! ktrace {
    ($msg:expr) => {{
        $crate::hal::emit_str($crate::klib::logging::P_TRACE);
        $crate::hal::emit_str($msg);
        $crate::hal::emit_nl();
    }};
    ($msg:expr, $val:expr) => {{
        $crate::hal::emit_str($crate::klib::logging::P_TRACE);
        $crate::hal::emit_str($msg);
        $crate::hal::emit_hex(($val) as u64);
        $crate::hal::emit_nl();
    }};
}

#[cfg(not(all(not(feature = "no_logs"), feature = "log_trace")))]
#[macro_export]
macro_rules! ktrace {
    ($($t:tt)*) => {{}};
}
