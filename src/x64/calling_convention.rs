// This module implements the x86-64 calling conventions the instruction selector lowers calls
// and incoming parameters against. A CCAssigner walks the parameters of a signature in
// order and assigns each one a LinkageLocation; the descriptor builders below turn those
// assignments into CallDescriptors. SysVAssigner follows the System V AMD64 ABI: integer
// and pointer arguments go to RDI, RSI, RDX, RCX, R8 and R9, floating point arguments to
// XMM0-XMM7, and everything else to caller pushed stack slots, the first stack argument
// being the last one pushed. Results come back in RAX or XMM0. JsAssigner models the managed
// function convention: the callee function object travels in RDI, every argument is pushed
// (the receiver first, so it ends up deepest), and the tagged result comes back in RAX.
// Code stub calls reuse the JS argument layout but name the callee by its code object.

//! x86-64 calling conventions.

use std::rc::Rc;

use bumpalo::{collections::Vec as BumpVec, Bump};

use super::registers::{R8, R9, RAX, RCX, RDI, RDX, RSI, XMM0, XMM1};
use crate::ir::MachineType;
use crate::select::{CallDescriptor, CallKind, Linkage, LinkageLocation};

/// Register banks for different register types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegBank {
    GeneralPurpose,
    Xmm,
}

impl RegBank {
    pub fn of(representation: MachineType) -> Self {
        match representation {
            MachineType::Float64 => RegBank::Xmm,
            _ => RegBank::GeneralPurpose,
        }
    }
}

/// One parameter or result waiting for a location.
#[derive(Debug, Clone, Copy)]
pub struct CCAssignment {
    pub representation: MachineType,
    pub bank: RegBank,
    /// Filled in by the assigner.
    pub location: Option<LinkageLocation>,
}

impl CCAssignment {
    pub fn new(representation: MachineType) -> Self {
        Self {
            representation,
            bank: RegBank::of(representation),
            location: None,
        }
    }
}

/// Assigns locations to the parameters of a signature, in order.
pub trait CCAssigner {
    /// Assign the next argument.
    fn assign_arg(&mut self, arg: &mut CCAssignment);

    /// Assign the next return value.
    fn assign_ret(&mut self, ret: &mut CCAssignment);

    /// Reset state for a new signature.
    fn reset(&mut self);

    /// Number of caller pushed slots assigned so far.
    fn stack_slot_count(&self) -> usize;
}

/// System V x86-64 calling convention assigner.
#[derive(Debug, Default)]
pub struct SysVAssigner {
    gp_cnt: usize,
    xmm_cnt: usize,
    stack_slots: usize,
    ret_gp_cnt: usize,
    ret_xmm_cnt: usize,
}

impl SysVAssigner {
    pub const GP_ARG_REGS: [u8; 6] = [RDI, RSI, RDX, RCX, R8, R9];

    pub const XMM_ARG_COUNT: u8 = 8;

    const RET_GP_REGS: [u8; 2] = [RAX, RDX];

    const RET_XMM_REGS: [u8; 2] = [XMM0, XMM1];

    pub fn new() -> Self {
        Self::default()
    }

    pub fn gp_used(&self) -> usize {
        self.gp_cnt
    }

    pub fn xmm_used(&self) -> usize {
        self.xmm_cnt
    }

    fn next_stack_slot(&mut self, representation: MachineType) -> LinkageLocation {
        self.stack_slots += 1;
        LinkageLocation::stack_slot(representation, -(self.stack_slots as i32))
    }
}

impl CCAssigner for SysVAssigner {
    fn assign_arg(&mut self, arg: &mut CCAssignment) {
        let location = match arg.bank {
            RegBank::GeneralPurpose if self.gp_cnt < Self::GP_ARG_REGS.len() => {
                let reg = Self::GP_ARG_REGS[self.gp_cnt];
                self.gp_cnt += 1;
                LinkageLocation::register(arg.representation, reg)
            }
            RegBank::Xmm if self.xmm_cnt < Self::XMM_ARG_COUNT as usize => {
                let reg = self.xmm_cnt as u8;
                self.xmm_cnt += 1;
                LinkageLocation::double_register(reg)
            }
            _ => self.next_stack_slot(arg.representation),
        };
        arg.location = Some(location);
    }

    fn assign_ret(&mut self, ret: &mut CCAssignment) {
        ret.location = match ret.bank {
            RegBank::GeneralPurpose => Self::RET_GP_REGS.get(self.ret_gp_cnt).map(|&reg| {
                self.ret_gp_cnt += 1;
                LinkageLocation::register(ret.representation, reg)
            }),
            RegBank::Xmm => Self::RET_XMM_REGS.get(self.ret_xmm_cnt).map(|&reg| {
                self.ret_xmm_cnt += 1;
                LinkageLocation::double_register(reg)
            }),
        };
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn stack_slot_count(&self) -> usize {
        self.stack_slots
    }
}

/// Managed function convention: every argument is pushed.
#[derive(Debug)]
pub struct JsAssigner {
    parameter_count: usize,
    assigned: usize,
}

impl JsAssigner {
    /// `parameter_count` arguments, receiver included.
    pub fn new(parameter_count: usize) -> Self {
        Self {
            parameter_count,
            assigned: 0,
        }
    }
}

impl CCAssigner for JsAssigner {
    fn assign_arg(&mut self, arg: &mut CCAssignment) {
        // Argument i sits parameter_count - i slots above the stack pointer.
        let slot = self.assigned as i32 - self.parameter_count as i32;
        self.assigned += 1;
        arg.location = Some(LinkageLocation::stack_slot(MachineType::Tagged, slot));
    }

    fn assign_ret(&mut self, ret: &mut CCAssignment) {
        ret.location = Some(LinkageLocation::register(MachineType::Tagged, RAX));
    }

    fn reset(&mut self) {
        self.assigned = 0;
    }

    fn stack_slot_count(&self) -> usize {
        self.assigned
    }
}

/// Run `assigner` over a signature. The callee location comes first.
fn assign_signature(
    arena: &Bump,
    assigner: &mut dyn CCAssigner,
    callee: LinkageLocation,
    params: &[MachineType],
    ret: Option<MachineType>,
) -> (Vec<LinkageLocation>, Vec<LinkageLocation>) {
    let mut inputs = BumpVec::with_capacity_in(params.len() + 1, arena);
    inputs.push(callee);
    for &rep in params {
        let mut arg = CCAssignment::new(rep);
        assigner.assign_arg(&mut arg);
        if let Some(location) = arg.location {
            inputs.push(location);
        }
    }
    let mut returns = Vec::new();
    if let Some(rep) = ret {
        let mut r = CCAssignment::new(rep);
        assigner.assign_ret(&mut r);
        returns.extend(r.location);
    }
    (inputs.iter().copied().collect(), returns)
}

/// Descriptor of a call to a C function at a raw address.
pub fn c_call_descriptor(
    arena: &Bump,
    name: &str,
    params: &[MachineType],
    ret: Option<MachineType>,
) -> CallDescriptor {
    let mut assigner = SysVAssigner::new();
    let (inputs, returns) = assign_signature(
        arena,
        &mut assigner,
        LinkageLocation::any_register(MachineType::Word64),
        params,
        ret,
    );
    CallDescriptor::new(CallKind::Address, returns, inputs, false, name)
}

/// Descriptor of a call through a function object with `parameter_count`
/// arguments, receiver included.
pub fn js_call_descriptor(
    arena: &Bump,
    name: &str,
    parameter_count: usize,
    lazy_deoptimization: bool,
) -> CallDescriptor {
    let mut assigner = JsAssigner::new(parameter_count);
    let params = vec![MachineType::Tagged; parameter_count];
    let (inputs, returns) = assign_signature(
        arena,
        &mut assigner,
        LinkageLocation::register(MachineType::Tagged, RDI),
        &params,
        Some(MachineType::Tagged),
    );
    CallDescriptor::new(CallKind::JSFunction, returns, inputs, lazy_deoptimization, name)
}

/// Descriptor of a call into a code stub taking `parameter_count` pushed
/// arguments.
pub fn code_stub_call_descriptor(
    arena: &Bump,
    name: &str,
    parameter_count: usize,
    lazy_deoptimization: bool,
) -> CallDescriptor {
    let mut assigner = JsAssigner::new(parameter_count);
    let params = vec![MachineType::Tagged; parameter_count];
    let (inputs, returns) = assign_signature(
        arena,
        &mut assigner,
        LinkageLocation::any_register(MachineType::Tagged),
        &params,
        Some(MachineType::Tagged),
    );
    CallDescriptor::new(CallKind::CodeObject, returns, inputs, lazy_deoptimization, name)
}

/// Linkage of a function compiled with the C convention.
pub fn c_linkage(arena: &Bump, name: &str, params: &[MachineType], ret: Option<MachineType>) -> Linkage {
    Linkage::new(Rc::new(c_call_descriptor(arena, name, params, ret)))
}

/// Linkage of a managed function with `parameter_count` parameters.
pub fn js_linkage(arena: &Bump, name: &str, parameter_count: usize) -> Linkage {
    Linkage::new(Rc::new(js_call_descriptor(arena, name, parameter_count, false)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::select::LocationKind;

    #[test]
    fn test_sysv_gp_argument_assignment() {
        let mut assigner = SysVAssigner::new();

        for i in 0..6 {
            let mut arg = CCAssignment::new(MachineType::Word64);
            assigner.assign_arg(&mut arg);
            assert_eq!(
                arg.location.unwrap().kind,
                LocationKind::Register(SysVAssigner::GP_ARG_REGS[i])
            );
        }

        let mut arg7 = CCAssignment::new(MachineType::Word32);
        assigner.assign_arg(&mut arg7);
        assert_eq!(arg7.location.unwrap().kind, LocationKind::StackSlot(-1));
        assert_eq!(assigner.stack_slot_count(), 1);
    }

    #[test]
    fn test_sysv_xmm_argument_assignment() {
        let mut assigner = SysVAssigner::new();

        for i in 0..8 {
            let mut arg = CCAssignment::new(MachineType::Float64);
            assigner.assign_arg(&mut arg);
            assert_eq!(arg.location.unwrap().kind, LocationKind::DoubleRegister(i));
        }

        let mut arg9 = CCAssignment::new(MachineType::Float64);
        assigner.assign_arg(&mut arg9);
        assert!(arg9.location.unwrap().is_stack_slot());
        assert_eq!(assigner.gp_used(), 0);
        assert_eq!(assigner.xmm_used(), 8);
    }

    #[test]
    fn test_sysv_return_value_assignment() {
        let mut assigner = SysVAssigner::new();

        let mut ret_gp = CCAssignment::new(MachineType::Word32);
        assigner.assign_ret(&mut ret_gp);
        assert_eq!(ret_gp.location.unwrap().kind, LocationKind::Register(RAX));

        let mut ret_xmm = CCAssignment::new(MachineType::Float64);
        assigner.assign_ret(&mut ret_xmm);
        assert_eq!(ret_xmm.location.unwrap().kind, LocationKind::DoubleRegister(XMM0));
    }

    #[test]
    fn test_js_arguments_are_all_pushed() {
        let arena = Bump::new();
        let d = js_call_descriptor(&arena, "f", 3, true);
        assert_eq!(d.kind(), CallKind::JSFunction);
        assert_eq!(d.input_count(), 4);
        assert_eq!(d.input_location(0).unwrap().kind, LocationKind::Register(RDI));
        assert_eq!(d.input_location(1).unwrap().kind, LocationKind::StackSlot(-3));
        assert_eq!(d.input_location(3).unwrap().kind, LocationKind::StackSlot(-1));
        assert_eq!(d.return_location(0).unwrap().kind, LocationKind::Register(RAX));
        assert!(d.can_lazily_deoptimize());
    }

    #[test]
    fn test_c_descriptor_mixes_registers_and_stack() {
        let arena = Bump::new();
        let params = vec![MachineType::Word32; 8];
        let d = c_call_descriptor(&arena, "many", &params, Some(MachineType::Word32));
        assert_eq!(d.input_count(), 9);
        assert_eq!(d.stack_parameter_count(), 2);
        assert_eq!(d.input_location(7).unwrap().kind, LocationKind::StackSlot(-1));
        assert_eq!(d.input_location(8).unwrap().kind, LocationKind::StackSlot(-2));
    }
}
