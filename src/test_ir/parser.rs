//! TIR parser.
//!
//! The format is line oriented; see the module documentation of
//! [`crate::test_ir`] for an example. Every error carries the 1-based line
//! it was found on.

use std::rc::Rc;

use bumpalo::Bump;
use hashbrown::HashMap;
use log::{debug, trace};

use super::{TirFunction, TirModule};
use crate::core::{CompileError, CompileResult};
use crate::ir::{
    BailoutId, BlockId, ContextAccess, Graph, Heap, HeapRef, MachineType, NodeId, Operator,
    Schedule, StoreRepresentation, WriteBarrierKind,
};
use crate::select::{CallDescriptor, Linkage};
use crate::x64::{c_call_descriptor, code_stub_call_descriptor, js_call_descriptor};

/// Parse a whole `.tir` file.
pub fn parse_module(text: &str) -> CompileResult<TirModule> {
    let mut parser = Parser::new();
    for (index, raw) in text.lines().enumerate() {
        parser.line = index + 1;
        let line = match raw.find(';') {
            Some(comment) => &raw[..comment],
            None => raw,
        }
        .trim();
        if line.is_empty() {
            continue;
        }
        parser.parse_line(line)?;
    }
    parser.finish()
}

/// A forward reference waiting for its target to be defined.
#[derive(Debug)]
struct Resolve<'t> {
    user: NodeId,
    index: usize,
    name: &'t str,
    line: usize,
}

#[derive(Debug)]
struct FunctionBuilder<'t> {
    name: String,
    linkage: Linkage,
    graph: Graph,
    nodes: HashMap<&'t str, NodeId>,
    resolves: Vec<Resolve<'t>>,
    placeholder: Option<NodeId>,
    blocks: Vec<(usize, &'t str)>,
    specialization: Option<(usize, &'t str, HeapRef)>,
}

/// Parsed `name(kind, args..., [lazy]) [-> rep]`.
struct Signature<'t> {
    name: &'t str,
    kind: &'t str,
    args: Vec<&'t str>,
    lazy: bool,
    ret: Option<MachineType>,
}

struct Parser<'t> {
    line: usize,
    arena: Bump,
    heap: Heap,
    objects: HashMap<&'t str, HeapRef>,
    callees: HashMap<&'t str, Rc<CallDescriptor>>,
    functions: Vec<TirFunction>,
    current: Option<FunctionBuilder<'t>>,
}

fn strip_keyword<'t>(line: &'t str, keyword: &str) -> Option<&'t str> {
    let rest = line.strip_prefix(keyword)?;
    if rest.starts_with(char::is_whitespace) {
        Some(rest.trim_start())
    } else {
        None
    }
}

fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c.is_whitespace() || c == ',').filter(|t| !t.is_empty())
}

impl<'t> Parser<'t> {
    fn new() -> Self {
        let heap = Heap::new();
        let mut objects = HashMap::new();
        objects.insert("undefined", heap.undefined());
        objects.insert("the_hole", heap.the_hole());
        Self {
            line: 0,
            arena: Bump::new(),
            heap,
            objects,
            callees: HashMap::new(),
            functions: Vec::new(),
            current: None,
        }
    }

    fn error(&self, reason: impl Into<String>) -> CompileError {
        CompileError::Parse {
            line: self.line,
            reason: reason.into(),
        }
    }

    fn parse_line(&mut self, line: &'t str) -> CompileResult<()> {
        if let Some(rest) = strip_keyword(line, "function") {
            self.finish_function()?;
            return self.parse_function(rest);
        }
        if let Some(rest) = strip_keyword(line, "object") {
            return self.parse_object(rest);
        }
        if let Some(rest) = strip_keyword(line, "slot") {
            return self.parse_slot(rest);
        }
        if let Some(rest) = strip_keyword(line, "callee") {
            return self.parse_callee(rest);
        }
        if let Some(rest) = strip_keyword(line, "block") {
            let line_no = self.line;
            self.function_mut()?.blocks.push((line_no, rest));
            return Ok(());
        }
        if let Some(rest) = strip_keyword(line, "specialize") {
            return self.parse_specialize(rest);
        }
        if line.starts_with('%') {
            return self.parse_node(line);
        }
        Err(self.error(format!("unrecognized line '{}'", line)))
    }

    fn function_mut(&mut self) -> CompileResult<&mut FunctionBuilder<'t>> {
        let line = self.line;
        self.current.as_mut().ok_or(CompileError::Parse {
            line,
            reason: "node or block outside of a function".to_string(),
        })
    }

    // Declarations.

    fn parse_signature(&self, text: &'t str) -> CompileResult<Signature<'t>> {
        let open = text.find('(').ok_or_else(|| self.error("expected '(' in signature"))?;
        let close = text.rfind(')').ok_or_else(|| self.error("expected ')' in signature"))?;
        if close < open {
            return Err(self.error("malformed signature"));
        }
        let name = text[..open].trim();
        if name.is_empty() {
            return Err(self.error("signature without a name"));
        }
        let mut parts = tokens(&text[open + 1..close]);
        let kind = parts.next().ok_or_else(|| self.error("signature without a kind"))?;
        let mut args = Vec::new();
        let mut lazy = false;
        for part in parts {
            if part == "lazy" {
                lazy = true;
            } else {
                args.push(part);
            }
        }
        let tail = text[close + 1..].trim();
        let ret = if tail.is_empty() {
            None
        } else {
            let rep = tail
                .strip_prefix("->")
                .ok_or_else(|| self.error(format!("unexpected '{}' after signature", tail)))?
                .trim();
            Some(self.parse_rep(rep)?)
        };
        Ok(Signature {
            name,
            kind,
            args,
            lazy,
            ret,
        })
    }

    fn parse_rep(&self, text: &str) -> CompileResult<MachineType> {
        MachineType::from_name(text).ok_or_else(|| self.error(format!("unknown representation '{}'", text)))
    }

    fn parse_count(&self, args: &[&str]) -> CompileResult<usize> {
        match args {
            [count] => count
                .parse()
                .map_err(|_| self.error(format!("expected a parameter count, got '{}'", count))),
            _ => Err(self.error("expected a single parameter count")),
        }
    }

    fn descriptor(&self, signature: &Signature<'t>) -> CompileResult<CallDescriptor> {
        match signature.kind {
            "c" => {
                if signature.lazy {
                    return Err(self.error("C calls cannot lazily deoptimize"));
                }
                let params = signature
                    .args
                    .iter()
                    .map(|rep| self.parse_rep(rep))
                    .collect::<CompileResult<Vec<_>>>()?;
                Ok(c_call_descriptor(&self.arena, signature.name, &params, signature.ret))
            }
            "js" => {
                let count = self.parse_count(&signature.args)?;
                Ok(js_call_descriptor(&self.arena, signature.name, count, signature.lazy))
            }
            "stub" => {
                let count = self.parse_count(&signature.args)?;
                Ok(code_stub_call_descriptor(&self.arena, signature.name, count, signature.lazy))
            }
            other => Err(self.error(format!("unknown call kind '{}'", other))),
        }
    }

    fn parse_function(&mut self, rest: &'t str) -> CompileResult<()> {
        let signature = self.parse_signature(rest)?;
        let descriptor = self.descriptor(&signature)?;
        if self.functions.iter().any(|f| f.name == signature.name) {
            return Err(self.error(format!("function '{}' defined twice", signature.name)));
        }
        trace!("tir: function {}", signature.name);
        self.current = Some(FunctionBuilder {
            name: signature.name.to_string(),
            linkage: Linkage::new(Rc::new(descriptor)),
            graph: Graph::new(),
            nodes: HashMap::new(),
            resolves: Vec::new(),
            placeholder: None,
            blocks: Vec::new(),
            specialization: None,
        });
        Ok(())
    }

    fn parse_callee(&mut self, rest: &'t str) -> CompileResult<()> {
        let signature = self.parse_signature(rest)?;
        let descriptor = self.descriptor(&signature)?;
        if self.callees.insert(signature.name, Rc::new(descriptor)).is_some() {
            return Err(self.error(format!("callee '{}' declared twice", signature.name)));
        }
        Ok(())
    }

    fn object(&self, name: &str) -> CompileResult<HeapRef> {
        self.objects
            .get(name)
            .copied()
            .ok_or_else(|| self.error(format!("unknown object '{}'", name)))
    }

    fn parse_object(&mut self, rest: &'t str) -> CompileResult<()> {
        let (name, body) = rest
            .split_once('=')
            .ok_or_else(|| self.error("expected 'object NAME = KIND ...'"))?;
        let name = name.trim();
        let body = body.trim();
        let (kind, args) = body.split_once(char::is_whitespace).unwrap_or((body, ""));
        let args = args.trim();
        let handle = match kind {
            "number" => {
                let value = args
                    .parse::<f64>()
                    .map_err(|_| self.error(format!("bad number '{}'", args)))?;
                self.heap.number(value)
            }
            "string" => self.heap.string(args),
            "code" => self.heap.code(args),
            "context" => {
                let parts: Vec<&str> = tokens(args).collect();
                let [parent, slots] = parts[..] else {
                    return Err(self.error("expected 'context PARENT|none SLOTS'"));
                };
                let parent = match parent {
                    "none" => None,
                    parent => Some(self.object(parent)?),
                };
                let slots = slots
                    .parse::<usize>()
                    .map_err(|_| self.error(format!("bad slot count '{}'", slots)))?;
                self.heap.context(parent, slots)
            }
            other => return Err(self.error(format!("unknown object kind '{}'", other))),
        };
        if self.objects.insert(name, handle).is_some() {
            return Err(self.error(format!("object '{}' declared twice", name)));
        }
        Ok(())
    }

    fn parse_slot(&mut self, rest: &'t str) -> CompileResult<()> {
        let (target, value) = rest
            .split_once('=')
            .ok_or_else(|| self.error("expected 'slot CONTEXT INDEX = OBJECT'"))?;
        let parts: Vec<&str> = tokens(target).collect();
        let [context, index] = parts[..] else {
            return Err(self.error("expected 'slot CONTEXT INDEX = OBJECT'"));
        };
        let context = self.object(context)?;
        let index = index
            .parse::<u32>()
            .map_err(|_| self.error(format!("bad slot index '{}'", index)))?;
        let value = self.object(value.trim())?;
        let line = self.line;
        self.heap
            .set_context_slot(context, index, value)
            .map_err(|e| CompileError::Parse {
                line,
                reason: e.to_string(),
            })
    }

    fn parse_specialize(&mut self, rest: &'t str) -> CompileResult<()> {
        let parts: Vec<&str> = tokens(rest).collect();
        let [parameter, context] = parts[..] else {
            return Err(self.error("expected 'specialize %PARAMETER CONTEXT'"));
        };
        let parameter = parameter
            .strip_prefix('%')
            .ok_or_else(|| self.error("specialize expects a node name"))?;
        let context = self.object(context)?;
        let line = self.line;
        self.function_mut()?.specialization = Some((line, parameter, context));
        Ok(())
    }

    // Nodes.

    fn int_param<T: TryFrom<i128>>(&self, text: &str) -> CompileResult<T> {
        let text = text.trim();
        let (negative, digits) = match text.strip_prefix('-') {
            Some(digits) => (true, digits),
            None => (false, text),
        };
        let magnitude = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
            Some(hex) => i128::from_str_radix(hex, 16),
            None => digits.parse::<i128>(),
        }
        .map_err(|_| self.error(format!("bad integer '{}'", text)))?;
        let value = if negative { -magnitude } else { magnitude };
        T::try_from(value).map_err(|_| self.error(format!("integer '{}' out of range", text)))
    }

    fn float_param(&self, text: &str) -> CompileResult<f64> {
        text.trim()
            .parse::<f64>()
            .map_err(|_| self.error(format!("bad float '{}'", text)))
    }

    fn single<'p>(&self, op: &str, params: &[&'p str]) -> CompileResult<&'p str> {
        match params {
            [one] => Ok(one),
            _ => Err(self.error(format!("{} takes exactly one parameter", op))),
        }
    }

    fn context_access(&self, op: &str, params: &[&str]) -> CompileResult<ContextAccess> {
        let [depth, index, mutability] = params else {
            return Err(self.error(format!("{} takes [depth, index, immutable|mutable]", op)));
        };
        let immutable = match *mutability {
            "immutable" => true,
            "mutable" => false,
            other => return Err(self.error(format!("expected immutable or mutable, got '{}'", other))),
        };
        Ok(ContextAccess::new(self.int_param(depth)?, self.int_param(index)?, immutable))
    }

    fn parse_operator(&self, name: &str, params: &[&str]) -> CompileResult<Operator> {
        let op = match name {
            "Loop" => Operator::Loop(self.int_param(self.single(name, params)?)?),
            "Merge" => Operator::Merge(self.int_param(self.single(name, params)?)?),
            "Phi" => Operator::Phi(self.int_param(self.single(name, params)?)?),
            "EffectPhi" => Operator::EffectPhi(self.int_param(self.single(name, params)?)?),
            "StateValues" => Operator::StateValues(self.int_param(self.single(name, params)?)?),
            "Parameter" => Operator::Parameter(self.int_param(self.single(name, params)?)?),
            "Projection" => Operator::Projection(self.int_param(self.single(name, params)?)?),
            "FrameState" => Operator::FrameState(BailoutId(self.int_param(self.single(name, params)?)?)),
            "Int32Constant" => Operator::Int32Constant(self.int_param(self.single(name, params)?)?),
            "Int64Constant" => Operator::Int64Constant(self.int_param(self.single(name, params)?)?),
            "Float64Constant" => Operator::Float64Constant(self.float_param(self.single(name, params)?)?),
            "NumberConstant" => Operator::NumberConstant(self.float_param(self.single(name, params)?)?),
            "ExternalConstant" => Operator::ExternalConstant(self.int_param(self.single(name, params)?)?),
            "HeapConstant" => Operator::HeapConstant(self.object(self.single(name, params)?)?),
            "Call" => {
                let callee = self.single(name, params)?;
                let descriptor = self
                    .callees
                    .get(callee)
                    .ok_or_else(|| self.error(format!("unknown callee '{}'", callee)))?;
                Operator::Call(Rc::clone(descriptor))
            }
            "LoadContext" => Operator::LoadContext(self.context_access(name, params)?),
            "StoreContext" => Operator::StoreContext(self.context_access(name, params)?),
            "Load" => Operator::Load(self.parse_rep(self.single(name, params)?)?),
            "Store" => {
                let (rep, write_barrier) = match params {
                    [rep] => (rep, WriteBarrierKind::NoWriteBarrier),
                    [rep, barrier] if *barrier == "barrier" => (rep, WriteBarrierKind::FullWriteBarrier),
                    _ => return Err(self.error("Store takes [rep] or [rep, barrier]")),
                };
                Operator::Store(StoreRepresentation {
                    rep: self.parse_rep(rep)?,
                    write_barrier,
                })
            }
            _ => {
                let op = Operator::simple_from_mnemonic(name)
                    .ok_or_else(|| self.error(format!("unknown operator '{}'", name)))?;
                if !params.is_empty() {
                    return Err(self.error(format!("{} takes no parameters", name)));
                }
                op
            }
        };
        Ok(op)
    }

    /// `%name = Op[params] %input ...`
    fn parse_node(&mut self, line: &'t str) -> CompileResult<()> {
        let (lhs, rhs) = line
            .split_once('=')
            .ok_or_else(|| self.error("expected '%name = Operator ...'"))?;
        let name = lhs.trim().trim_start_matches('%');
        if name.is_empty() {
            return Err(self.error("node without a name"));
        }
        let rhs = rhs.trim();

        let op_end = rhs
            .find(|c: char| c == '[' || c.is_whitespace())
            .unwrap_or(rhs.len());
        let op_name = &rhs[..op_end];
        let mut rest = &rhs[op_end..];
        let mut params = Vec::new();
        if let Some(bracketed) = rest.strip_prefix('[') {
            let close = bracketed
                .find(']')
                .ok_or_else(|| self.error("unterminated operator parameters"))?;
            params = bracketed[..close]
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .collect();
            rest = &bracketed[close + 1..];
        }
        let op = self.parse_operator(op_name, &params)?;

        let mut inputs = Vec::new();
        for token in tokens(rest) {
            let input = token
                .strip_prefix('%')
                .ok_or_else(|| self.error(format!("expected an input node, got '{}'", token)))?;
            inputs.push(input);
        }

        let line_no = self.line;
        let function = self.function_mut()?;
        if function.nodes.contains_key(name) {
            return Err(CompileError::Parse {
                line: line_no,
                reason: format!("node '%{}' defined twice", name),
            });
        }

        let mut ids = Vec::with_capacity(inputs.len());
        let mut pending = Vec::new();
        for (index, input) in inputs.iter().enumerate() {
            match function.nodes.get(input) {
                Some(&id) => ids.push(id),
                None => {
                    let placeholder = match function.placeholder {
                        Some(placeholder) => placeholder,
                        None => {
                            let placeholder = function.graph.new_node(Operator::Dead, &[])?;
                            function.placeholder = Some(placeholder);
                            placeholder
                        }
                    };
                    ids.push(placeholder);
                    pending.push((index, *input));
                }
            }
        }

        let is_start = matches!(op, Operator::Start);
        let is_end = matches!(op, Operator::End);
        let id = function.graph.new_node(op, &ids).map_err(|e| CompileError::Parse {
            line: line_no,
            reason: e.to_string(),
        })?;
        if is_start {
            function.graph.set_start(id);
        }
        if is_end {
            function.graph.set_end(id);
        }
        function.nodes.insert(name, id);
        for (index, input) in pending {
            function.resolves.push(Resolve {
                user: id,
                index,
                name: input,
                line: line_no,
            });
        }
        Ok(())
    }

    // Function completion.

    fn finish_function(&mut self) -> CompileResult<()> {
        let Some(mut function) = self.current.take() else {
            return Ok(());
        };

        for resolve in &function.resolves {
            let target = function.nodes.get(resolve.name).copied().ok_or_else(|| CompileError::Parse {
                line: resolve.line,
                reason: format!("undefined node '%{}'", resolve.name),
            })?;
            function.graph.replace_input(resolve.user, resolve.index, target)?;
        }

        let specialization = match function.specialization {
            Some((line, parameter, context)) => {
                let node = function.nodes.get(parameter).copied().ok_or_else(|| CompileError::Parse {
                    line,
                    reason: format!("undefined node '%{}'", parameter),
                })?;
                Some((node, context))
            }
            None => None,
        };

        let (schedule, blocks) = build_schedule(&function)?;
        let scheduled = !function.blocks.is_empty();
        debug!(
            "tir: parsed {} with {} nodes and {} blocks",
            function.name,
            function.graph.node_count(),
            function.blocks.len()
        );
        self.functions.push(TirFunction {
            name: function.name,
            linkage: function.linkage,
            graph: function.graph,
            schedule,
            scheduled,
            nodes: function.nodes.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            blocks,
            specialization,
        });
        Ok(())
    }

    fn finish(mut self) -> CompileResult<TirModule> {
        self.finish_function()?;
        Ok(TirModule {
            heap: self.heap,
            objects: self.objects.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            callees: self.callees.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            functions: self.functions,
        })
    }
}

/// Build the schedule from the block lines of `function`:
/// `block NAME [deferred]: %node ... -> CONTROL`.
fn build_schedule(function: &FunctionBuilder<'_>) -> CompileResult<(Schedule, HashMap<String, BlockId>)> {
    let mut schedule = Schedule::new();
    let mut ids: HashMap<&str, BlockId> = HashMap::new();
    let mut parsed = Vec::with_capacity(function.blocks.len());

    for (position, &(line, text)) in function.blocks.iter().enumerate() {
        let error = |reason: String| CompileError::Parse { line, reason };
        let (header, body) = text
            .split_once(':')
            .ok_or_else(|| error("expected 'block NAME: ... -> CONTROL'".to_string()))?;
        let mut header = tokens(header);
        let name = header
            .next()
            .ok_or_else(|| error("block without a name".to_string()))?;
        let deferred = match header.next() {
            None => false,
            Some("deferred") => true,
            Some(other) => return Err(error(format!("unexpected '{}' in block header", other))),
        };
        let id = if position == 0 {
            schedule.entry()
        } else {
            schedule.new_block()
        };
        if ids.insert(name, id).is_some() {
            return Err(error(format!("block '{}' defined twice", name)));
        }
        if deferred {
            schedule.mark_deferred(id)?;
        }
        parsed.push((line, id, body));
    }

    for (line, block, body) in parsed {
        let error = |reason: String| CompileError::Parse { line, reason };
        let node = |token: &str| -> CompileResult<NodeId> {
            let name = token
                .strip_prefix('%')
                .ok_or_else(|| error(format!("expected a node, got '{}'", token)))?;
            function
                .nodes
                .get(name)
                .copied()
                .ok_or_else(|| error(format!("undefined node '%{}'", name)))
        };
        let target = |token: Option<&str>| -> CompileResult<BlockId> {
            let name = token.ok_or_else(|| error("missing successor block".to_string()))?;
            ids.get(name)
                .copied()
                .ok_or_else(|| error(format!("undefined block '{}'", name)))
        };

        let (nodes, control) = body
            .split_once("->")
            .ok_or_else(|| error("block without a control ('->')".to_string()))?;
        for token in tokens(nodes) {
            schedule.add_node(block, node(token)?)?;
        }

        let mut control = tokens(control);
        let kind = control
            .next()
            .ok_or_else(|| error("missing block control".to_string()))?;
        match kind {
            "goto" => schedule.add_goto(block, target(control.next())?)?,
            "branch" => {
                let branch = node(control.next().unwrap_or(""))?;
                let if_true = target(control.next())?;
                let if_false = target(control.next())?;
                schedule.add_branch(block, branch, if_true, if_false)?;
            }
            "return" => schedule.add_return(block, node(control.next().unwrap_or(""))?)?,
            "throw" => schedule.add_throw(block, node(control.next().unwrap_or(""))?)?,
            "deoptimize" => schedule.add_deoptimize(block, node(control.next().unwrap_or(""))?)?,
            "call" => {
                let call = node(control.next().unwrap_or(""))?;
                let continuation = target(control.next())?;
                let deoptimization = target(control.next())?;
                schedule.add_call(block, call, continuation, deoptimization)?;
            }
            other => return Err(error(format!("unknown block control '{}'", other))),
        }
        if let Some(extra) = control.next() {
            return Err(error(format!("unexpected '{}' after block control", extra)));
        }
    }

    if !function.blocks.is_empty() {
        schedule.compute_rpo();
    }
    let names = ids.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    Ok((schedule, names))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ControlKind;

    const DIAMOND: &str = "
        function pick(c, word32) -> word32
        %start = Start
        %x = Parameter[0] %start
        %br = Branch %x %start
        %t = IfTrue %br
        %f = IfFalse %br
        %one = Int32Constant[1]
        %two = Int32Constant[2]
        %r1 = Return %one %start %t
        %r2 = Return %two %start %f  ; comment
        block entry: %x -> branch %br then else
        block then: %one -> return %r1
        block else deferred: %two -> return %r2
    ";

    #[test]
    fn test_parse_scheduled_function() {
        let module = parse_module(DIAMOND).unwrap();
        let function = module.function("pick").unwrap();
        assert!(function.scheduled);
        let entry = function.block("entry").unwrap();
        let block = function.schedule.block(entry);
        assert_eq!(block.control(), ControlKind::Branch);
        assert_eq!(block.control_input(), function.node("br"));
        let other = function.schedule.block(function.block("else").unwrap());
        assert!(other.is_deferred());
        assert_eq!(function.schedule.rpo_order().len(), 3);
        assert_eq!(function.graph.start(), function.node("start"));
    }

    #[test]
    fn test_forward_references_are_resolved() {
        let text = "
            function count(c) -> word32
            %start = Start
            %loop = Loop[2] %start %start
            %phi = Phi[2] %zero %next %loop
            %zero = Int32Constant[0]
            %one = Int32Constant[1]
            %next = Int32Add %phi %one
        ";
        let module = parse_module(text).unwrap();
        let function = module.function("count").unwrap();
        let phi = function.node("phi").unwrap();
        assert_eq!(function.graph.inputs(phi)[0], function.node("zero").unwrap());
        assert_eq!(function.graph.inputs(phi)[1], function.node("next").unwrap());
        assert!(!function.graph.to_string().contains("Dead"));
    }

    #[test]
    fn test_heap_objects_and_context_access() {
        let text = "
            object answer = number 42
            object outer = context none 2
            slot outer 1 = answer
            function f(js, 1)
            %start = Start
            %ctx = HeapConstant[outer]
            %load = LoadContext[0, 1, immutable] %ctx %start
        ";
        let module = parse_module(text).unwrap();
        let outer = module.object("outer").unwrap();
        assert_eq!(module.heap.context_slot(outer, 1).unwrap(), module.object("answer").unwrap());
        let function = module.function("f").unwrap();
        let load = function.node("load").unwrap();
        assert_eq!(
            *function.graph.op(load),
            Operator::LoadContext(ContextAccess::new(0, 1, true))
        );
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let text = "function f(c)\n%start = Start\n%x = Frobnicate %start\n";
        match parse_module(text) {
            Err(CompileError::Parse { line, reason }) => {
                assert_eq!(line, 3);
                assert!(reason.contains("Frobnicate"));
            }
            other => panic!("expected a parse error, got {:?}", other.map(|m| m.functions.len())),
        }

        let text = "function f(c)\n%start = Start\n%r = Return %missing %start %start\n";
        assert!(matches!(parse_module(text), Err(CompileError::Parse { line: 3, .. })));
    }

    #[test]
    fn test_call_descriptor_declarations() {
        let text = "
            callee add(c, word32, word32) -> word32
            callee target(js, 2, lazy)
        ";
        let module = parse_module(text).unwrap();
        assert_eq!(module.callees["add"].input_count(), 3);
        assert!(module.callees["target"].can_lazily_deoptimize());
        assert!(module.functions.is_empty());
    }
}
