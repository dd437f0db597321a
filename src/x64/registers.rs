//! x86-64 register codes, in hardware encoding order.

pub const RAX: u8 = 0;
pub const RCX: u8 = 1;
pub const RDX: u8 = 2;
pub const RBX: u8 = 3;
pub const RSP: u8 = 4;
pub const RBP: u8 = 5;
pub const RSI: u8 = 6;
pub const RDI: u8 = 7;
pub const R8: u8 = 8;
pub const R9: u8 = 9;
pub const R10: u8 = 10;
pub const R11: u8 = 11;
pub const R12: u8 = 12;
pub const R13: u8 = 13;
pub const R14: u8 = 14;
pub const R15: u8 = 15;

pub const XMM0: u8 = 0;
pub const XMM1: u8 = 1;

const GP_NAMES: [&str; 16] = [
    "rax", "rcx", "rdx", "rbx", "rsp", "rbp", "rsi", "rdi", "r8", "r9", "r10", "r11", "r12", "r13",
    "r14", "r15",
];

const XMM_NAMES: [&str; 16] = [
    "xmm0", "xmm1", "xmm2", "xmm3", "xmm4", "xmm5", "xmm6", "xmm7", "xmm8", "xmm9", "xmm10",
    "xmm11", "xmm12", "xmm13", "xmm14", "xmm15",
];

pub fn register_name(code: u8) -> &'static str {
    GP_NAMES.get(code as usize).copied().unwrap_or("r?")
}

pub fn double_register_name(code: u8) -> &'static str {
    XMM_NAMES.get(code as usize).copied().unwrap_or("xmm?")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_follow_encoding() {
        assert_eq!(register_name(RDI), "rdi");
        assert_eq!(register_name(R9), "r9");
        assert_eq!(double_register_name(XMM1), "xmm1");
        assert_eq!(register_name(42), "r?");
    }
}
