// ABOUTME: Runtime configuration: resource quotas and debugger settings

pub const LANG_VERSION: &str = "0.8.0";
pub const DEFAULT_ENTRY_FILE: &str = "main.nx";

/// Cooperative resource limits threaded explicitly through the interpreter.
/// A non-positive limit disables the corresponding guard. These are step
/// counters, not a memory tracker — the interpreter counts, it doesn't
/// account for actual byte usage.
#[derive(Debug, Clone, Copy)]
pub struct Quotas {
    pub max_alloc: i64,
    pub max_steps: i64,
    pub max_call_depth: i64,
}

impl Default for Quotas {
    fn default() -> Self {
        Quotas {
            max_alloc: -1,
            max_steps: -1,
            max_call_depth: 2048,
        }
    }
}

impl Quotas {
    pub fn alloc_enabled(&self) -> bool {
        self.max_alloc > 0
    }
    pub fn steps_enabled(&self) -> bool {
        self.max_steps > 0
    }
    pub fn call_depth_enabled(&self) -> bool {
        self.max_call_depth > 0
    }
}

/// Controls the interactive single-step debugger. Disabled by default;
/// enabling it never mutates global state, it is threaded alongside
/// `Quotas` through the interpreter's context.
#[derive(Debug, Clone, Default)]
pub struct DebugConfig {
    pub enabled: bool,
    pub step: bool,
    pub step_count: u32,
    pub breakpoints: Vec<u32>,
    pub no_prompt: bool,
}

impl DebugConfig {
    pub fn is_breakpoint(&self, line: u32) -> bool {
        self.breakpoints.contains(&line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_quotas_disable_alloc_and_steps() {
        let q = Quotas::default();
        assert!(!q.alloc_enabled());
        assert!(!q.steps_enabled());
        assert!(q.call_depth_enabled());
    }
}
