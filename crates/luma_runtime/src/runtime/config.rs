//! VM configuration.

/// VM configuration options.
#[derive(Clone, Copy, Debug)]
pub struct VmConfig {
    /// Inline slots reserved by `Vm::new_table`.
    pub default_inline_capacity: u32,
    /// Vector capacity preallocated by `Vm::new_table`.
    pub default_array_capacity: u32,
    /// Expected number of globals, sizes the global dictionary.
    pub global_anticipated_slots: u32,
    /// Log every structure transition at `debug` instead of `trace`.
    pub trace_transitions: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            default_inline_capacity: 8,
            default_array_capacity: 0,
            global_anticipated_slots: 128,
            trace_transitions: false,
        }
    }
}

impl VmConfig {
    pub const TRACE_SHAPES_ENV: &'static str = "LUMA_TRACE_SHAPES";

    /// Defaults, with `trace_transitions` switched on by `LUMA_TRACE_SHAPES`.
    pub fn from_env() -> Self {
        let value = std::env::var(Self::TRACE_SHAPES_ENV).ok();
        Self::from_trace_setting(value.as_deref())
    }

    /// Any value other than empty or `0` enables tracing.
    fn from_trace_setting(value: Option<&str>) -> Self {
        let trace_transitions = value.is_some_and(|v| !v.is_empty() && v != "0");
        Self {
            trace_transitions,
            ..Self::default()
        }
    }
}
