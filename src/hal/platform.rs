//! Trait de Plataforma
//!
//! Tudo o que o alocador físico precisa do resto do kernel. Implementado pela
//! camada de arquitetura (APIC ID, timer, scheduler, serial).

/// Abstração da plataforma em execução.
///
/// Os métodos com implementação padrão descrevem uma máquina de boot:
/// nenhum sinal pendente e console mudo.
pub trait Platform: Sync {
    /// ID lógico da CPU atual (0..N-1)
    fn cpu_id(&self) -> usize;

    /// Ticks desde o boot
    fn ticks(&self) -> u64;

    /// Ticks por segundo
    fn hz(&self) -> u64 {
        super::HZ
    }

    /// Bloqueia a thread atual até `wake(channel)` ou um despertar espúrio.
    ///
    /// Quem chama sempre reavalia a condição depois de retornar.
    fn park(&self, channel: usize);

    /// Acorda todas as threads bloqueadas em `channel`.
    fn wake(&self, channel: usize);

    /// Há sinal pendente para a thread atual? (interrompe esperas)
    fn signal_pending(&self) -> bool {
        false
    }

    /// Escreve no console do kernel
    fn emit_str(&self, _s: &str) {}
}
