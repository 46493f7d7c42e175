//! Backend auto-selection.

use super::Backend;

/// Compiled backends that can run here, hardware first.
pub fn detect_backends() -> Vec<Backend> {
    let mut found = Vec::with_capacity(2);
    if Backend::Cuda.is_available() {
        found.push(Backend::Cuda);
    }
    found.push(Backend::Cpu);
    found
}

/// Preferred backend; the emulated device when no hardware is present.
pub fn select_best_backend() -> Backend {
    select_hardware_backend().unwrap_or(Backend::Cpu)
}

/// Preferred backend backed by real hardware, if any.
pub fn select_hardware_backend() -> Option<Backend> {
    detect_backends().into_iter().find(|b| b.is_hardware())
}

/// One line per backend kind, `+` when it can run here.
pub fn describe_backends() -> String {
    let available = detect_backends();
    [Backend::Cuda, Backend::Cpu]
        .iter()
        .map(|b| {
            let mark = if available.contains(b) { '+' } else { '-' };
            format!("[{mark}] {}\n", b.name())
        })
        .collect()
}
