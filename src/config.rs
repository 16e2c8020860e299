//! Assembler configuration

/// Placeholder operand-stack bound written into every compiled method.
/// The serializer computes the real value.
pub const DEFAULT_MAX_STACK: u16 = 0xFF;

/// Default cap on instruction visits during verification
pub const DEFAULT_MAX_VERIFY_ITERATIONS: usize = 100_000;

/// Options controlling one `MethodAssembler`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Run the abstract-interpretation verifier after compilation
    pub verify: bool,
    /// Emit a local variable table
    pub variables: bool,
    /// Value written to `max_stack`
    pub max_stack: u16,
    /// Fixed-point visits allowed before verification gives up
    pub max_verify_iterations: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verify: true,
            variables: true,
            max_stack: DEFAULT_MAX_STACK,
            max_verify_iterations: DEFAULT_MAX_VERIFY_ITERATIONS,
        }
    }
}

impl Config {
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn with_variables(mut self, variables: bool) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_max_stack(mut self, max_stack: u16) -> Self {
        self.max_stack = max_stack;
        self
    }

    pub fn with_max_verify_iterations(mut self, limit: usize) -> Self {
        self.max_verify_iterations = limit.max(1);
        self
    }

    /// Default configuration overridden by `JASM_VERIFY`, `JASM_VARIABLES`
    /// and `JASM_MAX_VERIFY_ITERATIONS` when they are set
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(verify) = env_flag("JASM_VERIFY") {
            config.verify = verify;
        }
        if let Some(variables) = env_flag("JASM_VARIABLES") {
            config.variables = variables;
        }
        if let Some(limit) = std::env::var("JASM_MAX_VERIFY_ITERATIONS")
            .ok()
            .and_then(|s| s.trim().parse::<usize>().ok())
        {
            config = config.with_max_verify_iterations(limit);
        }
        config
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let value = std::env::var(name).ok()?;
    Some(parse_flag(&value))
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "off" | "no" | ""
    )
}
