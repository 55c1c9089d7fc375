/// Interpreter registers, snapshotted once per executed unit when tracing.
#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct Registers {
    /// Clock Cycle Counter, one tick per unit
    pub clk: u64,
    /// Instruction Pointer, a byte offset into the program
    pub ip: usize,
    /// Current control byte
    pub ci: u8,
    /// Memory Pointer
    pub mp: usize,
    /// Memory Value (i.e. [MP])
    pub mv: u8,
}

impl Registers {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Display for Registers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "clk:{}, ip:{}, ci:{:#04x}, mp:{}, mv:{}",
            self.clk, self.ip, self.ci, self.mp, self.mv
        )
    }
}
