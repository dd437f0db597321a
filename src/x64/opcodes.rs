//! x86-64 opcodes produced by the instruction selector.

/// Target opcodes. Plain names operate on 64-bit values, the `32` suffix on
/// 32-bit values; `I` variants take an immediate instead of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum X64Opcode {
    Add,
    Add32,
    And,
    And32,
    Cmp,
    Cmp32,
    Test,
    Test32,
    Or,
    Or32,
    Xor,
    Xor32,
    Sub,
    Sub32,
    Imul,
    Imul32,
    Idiv,
    Idiv32,
    Udiv,
    Udiv32,
    Not,
    Not32,
    Neg,
    Neg32,
    Shl,
    Shl32,
    Shr,
    Shr32,
    Sar,
    Sar32,
    Push,
    PushI,
    CallCodeObject,
    CallAddress,
    CallJSFunction,
    SSEFloat64Cmp,
    SSEFloat64Add,
    SSEFloat64Sub,
    SSEFloat64Mul,
    SSEFloat64Div,
    SSEFloat64Mod,
    SSEFloat64ToInt32,
    SSEFloat64ToUint32,
    SSEInt32ToFloat64,
    SSEUint32ToFloat64,
    SSELoad,
    SSEStore,
    Int32ToInt64,
    Int64ToInt32,
    LoadWord8,
    LoadWord16,
    LoadWord32,
    LoadWord64,
    StoreWord8,
    StoreWord8I,
    StoreWord16,
    StoreWord16I,
    StoreWord32,
    StoreWord32I,
    StoreWord64,
    StoreWord64I,
    StoreWriteBarrier,
}

impl X64Opcode {
    pub fn mnemonic(self) -> &'static str {
        use X64Opcode::*;
        match self {
            Add => "x64_add",
            Add32 => "x64_add32",
            And => "x64_and",
            And32 => "x64_and32",
            Cmp => "x64_cmp",
            Cmp32 => "x64_cmp32",
            Test => "x64_test",
            Test32 => "x64_test32",
            Or => "x64_or",
            Or32 => "x64_or32",
            Xor => "x64_xor",
            Xor32 => "x64_xor32",
            Sub => "x64_sub",
            Sub32 => "x64_sub32",
            Imul => "x64_imul",
            Imul32 => "x64_imul32",
            Idiv => "x64_idiv",
            Idiv32 => "x64_idiv32",
            Udiv => "x64_udiv",
            Udiv32 => "x64_udiv32",
            Not => "x64_not",
            Not32 => "x64_not32",
            Neg => "x64_neg",
            Neg32 => "x64_neg32",
            Shl => "x64_shl",
            Shl32 => "x64_shl32",
            Shr => "x64_shr",
            Shr32 => "x64_shr32",
            Sar => "x64_sar",
            Sar32 => "x64_sar32",
            Push => "x64_push",
            PushI => "x64_pushi",
            CallCodeObject => "x64_call_code_object",
            CallAddress => "x64_call_address",
            CallJSFunction => "x64_call_js_function",
            SSEFloat64Cmp => "sse_float64_cmp",
            SSEFloat64Add => "sse_float64_add",
            SSEFloat64Sub => "sse_float64_sub",
            SSEFloat64Mul => "sse_float64_mul",
            SSEFloat64Div => "sse_float64_div",
            SSEFloat64Mod => "sse_float64_mod",
            SSEFloat64ToInt32 => "sse_float64_to_int32",
            SSEFloat64ToUint32 => "sse_float64_to_uint32",
            SSEInt32ToFloat64 => "sse_int32_to_float64",
            SSEUint32ToFloat64 => "sse_uint32_to_float64",
            SSELoad => "sse_load",
            SSEStore => "sse_store",
            Int32ToInt64 => "x64_int32_to_int64",
            Int64ToInt32 => "x64_int64_to_int32",
            LoadWord8 => "x64_load_word8",
            LoadWord16 => "x64_load_word16",
            LoadWord32 => "x64_load_word32",
            LoadWord64 => "x64_load_word64",
            StoreWord8 => "x64_store_word8",
            StoreWord8I => "x64_store_word8i",
            StoreWord16 => "x64_store_word16",
            StoreWord16I => "x64_store_word16i",
            StoreWord32 => "x64_store_word32",
            StoreWord32I => "x64_store_word32i",
            StoreWord64 => "x64_store_word64",
            StoreWord64I => "x64_store_word64i",
            StoreWriteBarrier => "x64_store_write_barrier",
        }
    }

    /// Whether the opcode transfers control to another function.
    pub fn is_call(self) -> bool {
        matches!(
            self,
            X64Opcode::CallCodeObject | X64Opcode::CallAddress | X64Opcode::CallJSFunction
        )
    }
}
