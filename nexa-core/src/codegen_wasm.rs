//! WASM backend: translates an IR [`Module`](ir::Module) into a wasm
//! binary using the `wasm-encoder` crate.
//!
//! Each IR value becomes a local. Stack slots and string constants get
//! static addresses in linear memory:
//!
//! ```text
//! 0        16               align 8                   align 8
//! | guard  | string globals | vararg buffer | alloca | alloca | ...
//! ```
//!
//! Basic blocks are laid out as a dispatch loop. A `pc` local holds the
//! index of the next block and a `br_table` at the loop head jumps to it:
//!
//! ```text
//! loop
//!   block ... block        ;; one per basic block
//!     local.get $pc
//!     br_table 0 1 .. n-1
//!   end  ;; block 0 code
//!   ...
//!   end  ;; block n-1 code
//! end
//! unreachable
//! ```
//!
//! Variadic externs such as `printf` are imported with their fixed
//! parameters followed by an `i32` pointer to the vararg buffer, where
//! every extra argument occupies one 8-byte slot.

use std::borrow::Cow;
use std::collections::HashMap;

use wasm_encoder::{
    BlockType, CodeSection, ConstExpr, DataSection, EntityType, ExportKind, ExportSection,
    Function, FunctionSection, ImportSection, Instruction, MemArg, MemorySection, MemoryType,
    Module, TypeSection, ValType,
};

use crate::error::CoreError;
use crate::ir::{self, BinOp, CastOp, CmpPred, InstKind, IrType, Operand, Terminator, ValueId};

/// Module providing imported externs.
pub const IMPORT_MODULE: &str = "env";
/// Name of the exported linear memory.
pub const MEMORY_EXPORT: &str = "memory";

const GLOBAL_BASE: u32 = 16;
const VARARG_SLOT: u32 = 8;
const PAGE_SIZE: u32 = 65536;

fn unsupported(message: impl Into<String>) -> CoreError {
    CoreError::WasmError(message.into())
}

fn align8(offset: u32) -> u32 {
    offset.div_ceil(8) * 8
}

fn val_type(ty: IrType) -> Option<ValType> {
    match ty {
        IrType::I1 | IrType::I8 | IrType::I32 | IrType::Ptr => Some(ValType::I32),
        IrType::I64 => Some(ValType::I64),
        IrType::F32 => Some(ValType::F32),
        IrType::F64 => Some(ValType::F64),
        IrType::Void => None,
    }
}

/// Static memory addresses for a module.
#[derive(Debug)]
struct Layout {
    globals: Vec<u32>,
    varargs: u32,
    allocas: HashMap<(usize, ValueId), u32>,
    end: u32,
}

impl Layout {
    fn compute(module: &ir::Module) -> Result<Layout, CoreError> {
        let mut offset = GLOBAL_BASE;
        let mut globals = Vec::with_capacity(module.globals.len());
        for global in &module.globals {
            globals.push(offset);
            offset += global.bytes.len() as u32;
        }

        let mut max_varargs = 1;
        for function in &module.functions {
            for inst in function.blocks.iter().flat_map(|b| &b.insts) {
                if let InstKind::Call { callee, args } = &inst.kind {
                    let ext = module
                        .find_extern(callee)
                        .ok_or_else(|| unsupported(format!("call to undeclared `{callee}`")))?;
                    if ext.variadic {
                        max_varargs = max_varargs.max(args.len().saturating_sub(ext.params.len()));
                    }
                }
            }
        }
        let varargs = align8(offset);
        offset = varargs + VARARG_SLOT * max_varargs as u32;

        let mut allocas = HashMap::new();
        for (index, function) in module.functions.iter().enumerate() {
            for inst in function.blocks.iter().flat_map(|b| &b.insts) {
                if let (Some(result), InstKind::Alloca { ty, count }) = (inst.result, &inst.kind) {
                    offset = align8(offset);
                    allocas.insert((index, result), offset);
                    offset += ty.size().max(1) * count;
                }
            }
        }

        Ok(Layout {
            globals,
            varargs,
            allocas,
            end: offset,
        })
    }

    fn pages(&self) -> u64 {
        u64::from(self.end.div_ceil(PAGE_SIZE).max(1))
    }
}

/// Translate `module` into a wasm binary exporting its functions and memory.
#[tracing::instrument(level = "debug", skip_all, fields(module = %module.name))]
pub fn generate_wasm(module: &ir::Module) -> Result<Vec<u8>, CoreError> {
    let layout = Layout::compute(module)?;

    let mut types = TypeSection::new();
    for ext in &module.externs {
        let mut params = ext
            .params
            .iter()
            .map(|ty| val_type(*ty).ok_or_else(|| unsupported("void parameter")))
            .collect::<Result<Vec<_>, _>>()?;
        if ext.variadic {
            params.push(ValType::I32);
        }
        types.ty().function(params, val_type(ext.ret));
    }
    for function in &module.functions {
        types
            .ty()
            .function(Vec::<ValType>::new(), val_type(function.ret));
    }

    let mut imports = ImportSection::new();
    let mut extern_indices = HashMap::new();
    for (index, ext) in module.externs.iter().enumerate() {
        imports.import(
            IMPORT_MODULE,
            &ext.name,
            EntityType::Function(index as u32),
        );
        extern_indices.insert(ext.name.as_str(), index as u32);
    }

    let import_count = module.externs.len() as u32;
    let mut functions = FunctionSection::new();
    let mut exports = ExportSection::new();
    let mut code = CodeSection::new();
    for (index, function) in module.functions.iter().enumerate() {
        // Function types follow the extern types, in the same order.
        let type_index = import_count + index as u32;
        let func_index = import_count + index as u32;
        functions.function(type_index);
        exports.export(&function.name, ExportKind::Func, func_index);
        let body = FunctionEmitter::new(module, function, index, &layout, &extern_indices)
            .emit()?;
        code.function(&body);
    }
    exports.export(MEMORY_EXPORT, ExportKind::Memory, 0);

    let mut memories = MemorySection::new();
    memories.memory(MemoryType {
        minimum: layout.pages(),
        maximum: None,
        memory64: false,
        shared: false,
        page_size_log2: None,
    });

    let mut data = DataSection::new();
    for (global, offset) in module.globals.iter().zip(&layout.globals) {
        data.active(
            0,
            &ConstExpr::i32_const(*offset as i32),
            global.bytes.iter().copied(),
        );
    }

    let mut wasm = Module::new();
    wasm.section(&types);
    if !module.externs.is_empty() {
        wasm.section(&imports);
    }
    wasm.section(&functions);
    wasm.section(&memories);
    wasm.section(&exports);
    wasm.section(&code);
    if !module.globals.is_empty() {
        wasm.section(&data);
    }

    let bytes = wasm.finish();
    tracing::debug!(
        bytes = bytes.len(),
        memory_end = layout.end,
        "emitted wasm module"
    );
    Ok(bytes)
}

fn mem_arg(ty: IrType) -> MemArg {
    let align = match ty {
        IrType::I1 | IrType::I8 => 0,
        IrType::I32 | IrType::F32 | IrType::Ptr => 2,
        IrType::I64 | IrType::F64 => 3,
        IrType::Void => 0,
    };
    MemArg {
        offset: 0,
        align,
        memory_index: 0,
    }
}

struct FunctionEmitter<'a> {
    module: &'a ir::Module,
    function: &'a ir::Function,
    index: usize,
    layout: &'a Layout,
    extern_indices: &'a HashMap<&'a str, u32>,
    body: Function,
    pc: u32,
}

impl<'a> FunctionEmitter<'a> {
    fn new(
        module: &'a ir::Module,
        function: &'a ir::Function,
        index: usize,
        layout: &'a Layout,
        extern_indices: &'a HashMap<&'a str, u32>,
    ) -> Self {
        let mut locals: Vec<(u32, ValType)> = function
            .values
            .iter()
            .map(|info| (1, val_type(info.ty).unwrap_or(ValType::I32)))
            .collect();
        locals.push((1, ValType::I32));
        FunctionEmitter {
            module,
            function,
            index,
            layout,
            extern_indices,
            body: Function::new(locals),
            pc: function.values.len() as u32,
        }
    }

    fn emit(mut self) -> Result<Function, CoreError> {
        let function = self.function;
        let blocks = function.blocks.len() as u32;
        self.op(Instruction::Loop(BlockType::Empty));
        for _ in 0..blocks {
            self.op(Instruction::Block(BlockType::Empty));
        }
        self.op(Instruction::LocalGet(self.pc));
        let targets: Vec<u32> = (0..blocks).collect();
        self.op(Instruction::BrTable(Cow::Owned(targets), blocks - 1));

        for (position, block) in function.blocks.iter().enumerate() {
            self.op(Instruction::End);
            for inst in &block.insts {
                self.emit_inst(inst.result, &inst.kind)?;
            }
            // Branch depth from this block's code back to the loop head.
            let depth = blocks - 1 - position as u32;
            match &block.terminator {
                Some(terminator) => self.emit_terminator(terminator, depth)?,
                None => {
                    return Err(unsupported(format!(
                        "block `{}` has no terminator",
                        block.label
                    )));
                }
            }
        }

        self.op(Instruction::End);
        self.op(Instruction::Unreachable);
        self.op(Instruction::End);
        Ok(self.body)
    }

    fn op(&mut self, instruction: Instruction<'_>) {
        self.body.instruction(&instruction);
    }

    fn operand_type(&self, operand: &Operand) -> Result<IrType, CoreError> {
        self.function
            .operand_type(operand)
            .ok_or_else(|| unsupported(format!("unknown operand {operand:?}")))
    }

    fn push(&mut self, operand: &Operand) -> Result<(), CoreError> {
        let instruction = match *operand {
            Operand::Int(IrType::I64, value) => Instruction::I64Const(value),
            Operand::Int(IrType::I1 | IrType::I8 | IrType::I32 | IrType::Ptr, value) => {
                Instruction::I32Const(value as i32)
            }
            Operand::Float(IrType::F32, value) => Instruction::F32Const((value as f32).into()),
            Operand::Float(IrType::F64, value) => Instruction::F64Const(value.into()),
            Operand::Value(id) => Instruction::LocalGet(id.0),
            Operand::Global(id) => {
                let address = self
                    .layout
                    .globals
                    .get(id.0 as usize)
                    .ok_or_else(|| unsupported(format!("unknown global {}", id.0)))?;
                Instruction::I32Const(*address as i32)
            }
            other => return Err(unsupported(format!("malformed constant {other:?}"))),
        };
        self.op(instruction);
        Ok(())
    }

    fn set(&mut self, result: Option<ValueId>) -> Result<(), CoreError> {
        let id = result.ok_or_else(|| unsupported("instruction result has no value"))?;
        self.op(Instruction::LocalSet(id.0));
        Ok(())
    }

    fn emit_inst(&mut self, result: Option<ValueId>, kind: &InstKind) -> Result<(), CoreError> {
        match kind {
            InstKind::Alloca { .. } => {
                let id = result.ok_or_else(|| unsupported("alloca without a result"))?;
                let address = self
                    .layout
                    .allocas
                    .get(&(self.index, id))
                    .copied()
                    .ok_or_else(|| unsupported("alloca has no address"))?;
                self.op(Instruction::I32Const(address as i32));
                self.set(result)
            }
            InstKind::Load { ty, ptr } => {
                self.push(ptr)?;
                let arg = mem_arg(*ty);
                self.op(match ty {
                    IrType::I1 | IrType::I8 => Instruction::I32Load8U(arg),
                    IrType::I32 | IrType::Ptr => Instruction::I32Load(arg),
                    IrType::I64 => Instruction::I64Load(arg),
                    IrType::F32 => Instruction::F32Load(arg),
                    IrType::F64 => Instruction::F64Load(arg),
                    IrType::Void => return Err(unsupported("load of void")),
                });
                self.set(result)
            }
            InstKind::Store { value, ptr } => {
                self.push(ptr)?;
                self.push(value)?;
                let ty = self.operand_type(value)?;
                self.store(ty)
            }
            InstKind::ElementPtr { elem, base, index } => {
                self.push(base)?;
                self.push(index)?;
                if self.operand_type(index)? == IrType::I64 {
                    self.op(Instruction::I32WrapI64);
                }
                self.op(Instruction::I32Const(elem.size() as i32));
                self.op(Instruction::I32Mul);
                self.op(Instruction::I32Add);
                self.set(result)
            }
            InstKind::Binary { op, ty, lhs, rhs } => {
                self.push(lhs)?;
                self.push(rhs)?;
                self.op(binary_instruction(*op, *ty)?);
                self.set(result)
            }
            InstKind::FNeg { ty, operand } => {
                self.push(operand)?;
                self.op(match ty {
                    IrType::F32 => Instruction::F32Neg,
                    IrType::F64 => Instruction::F64Neg,
                    other => return Err(unsupported(format!("fneg on {}", other.name()))),
                });
                self.set(result)
            }
            InstKind::Cmp { pred, ty, lhs, rhs } => {
                self.push(lhs)?;
                self.push(rhs)?;
                self.op(compare_instruction(*pred, *ty)?);
                self.set(result)
            }
            InstKind::Cast {
                op,
                from,
                to,
                value,
            } => {
                self.push(value)?;
                for instruction in cast_instructions(*op, *from, *to)? {
                    self.op(instruction);
                }
                self.set(result)
            }
            InstKind::Call { callee, args } => self.emit_call(result, callee, args),
        }
    }

    fn store(&mut self, ty: IrType) -> Result<(), CoreError> {
        let arg = mem_arg(ty);
        self.op(match ty {
            IrType::I1 | IrType::I8 => Instruction::I32Store8(arg),
            IrType::I32 | IrType::Ptr => Instruction::I32Store(arg),
            IrType::I64 => Instruction::I64Store(arg),
            IrType::F32 => Instruction::F32Store(arg),
            IrType::F64 => Instruction::F64Store(arg),
            IrType::Void => return Err(unsupported("store of void")),
        });
        Ok(())
    }

    fn emit_call(
        &mut self,
        result: Option<ValueId>,
        callee: &str,
        args: &[Operand],
    ) -> Result<(), CoreError> {
        let module = self.module;
        let ext = module
            .find_extern(callee)
            .ok_or_else(|| unsupported(format!("call to undeclared `{callee}`")))?;
        let index = self
            .extern_indices
            .get(callee)
            .copied()
            .ok_or_else(|| unsupported(format!("`{callee}` is not imported")))?;
        let fixed = ext.params.len().min(args.len());

        for arg in &args[..fixed] {
            self.push(arg)?;
        }
        if ext.variadic {
            for (slot, arg) in args[fixed..].iter().enumerate() {
                let address = self.layout.varargs + VARARG_SLOT * slot as u32;
                self.op(Instruction::I32Const(address as i32));
                self.push(arg)?;
                let ty = self.operand_type(arg)?;
                self.store(ty)?;
            }
            self.op(Instruction::I32Const(self.layout.varargs as i32));
        }
        self.op(Instruction::Call(index));

        match result {
            Some(_) => self.set(result),
            None if ext.ret != IrType::Void => {
                self.op(Instruction::Drop);
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn emit_terminator(&mut self, terminator: &Terminator, depth: u32) -> Result<(), CoreError> {
        match terminator {
            Terminator::Br(target) => {
                self.op(Instruction::I32Const(target.0 as i32));
                self.op(Instruction::LocalSet(self.pc));
                self.op(Instruction::Br(depth));
            }
            Terminator::CondBr {
                cond,
                then_block,
                else_block,
            } => {
                self.op(Instruction::I32Const(then_block.0 as i32));
                self.op(Instruction::I32Const(else_block.0 as i32));
                self.push(cond)?;
                self.op(Instruction::Select);
                self.op(Instruction::LocalSet(self.pc));
                self.op(Instruction::Br(depth));
            }
            Terminator::Ret(value) => {
                if let Some(value) = value {
                    self.push(value)?;
                }
                self.op(Instruction::Return);
            }
            Terminator::Trap => self.op(Instruction::Unreachable),
        }
        Ok(())
    }
}

fn binary_instruction(op: BinOp, ty: IrType) -> Result<Instruction<'static>, CoreError> {
    let instruction = match (ty, op) {
        (IrType::I1 | IrType::I8 | IrType::I32, BinOp::Add) => Instruction::I32Add,
        (IrType::I1 | IrType::I8 | IrType::I32, BinOp::Sub) => Instruction::I32Sub,
        (IrType::I1 | IrType::I8 | IrType::I32, BinOp::Mul) => Instruction::I32Mul,
        (IrType::I1 | IrType::I8 | IrType::I32, BinOp::SDiv) => Instruction::I32DivS,
        (IrType::I64, BinOp::Add) => Instruction::I64Add,
        (IrType::I64, BinOp::Sub) => Instruction::I64Sub,
        (IrType::I64, BinOp::Mul) => Instruction::I64Mul,
        (IrType::I64, BinOp::SDiv) => Instruction::I64DivS,
        (IrType::F32, BinOp::FAdd) => Instruction::F32Add,
        (IrType::F32, BinOp::FSub) => Instruction::F32Sub,
        (IrType::F32, BinOp::FMul) => Instruction::F32Mul,
        (IrType::F32, BinOp::FDiv) => Instruction::F32Div,
        (IrType::F64, BinOp::FAdd) => Instruction::F64Add,
        (IrType::F64, BinOp::FSub) => Instruction::F64Sub,
        (IrType::F64, BinOp::FMul) => Instruction::F64Mul,
        (IrType::F64, BinOp::FDiv) => Instruction::F64Div,
        (ty, op) => {
            return Err(unsupported(format!(
                "`{}` on {}",
                op.mnemonic(),
                ty.name()
            )));
        }
    };
    Ok(instruction)
}

fn compare_instruction(pred: CmpPred, ty: IrType) -> Result<Instruction<'static>, CoreError> {
    let instruction = match (ty, pred) {
        (IrType::I64, CmpPred::Eq) => Instruction::I64Eq,
        (IrType::I64, CmpPred::Ne) => Instruction::I64Ne,
        (IrType::I64, CmpPred::Slt) => Instruction::I64LtS,
        (IrType::I64, CmpPred::Sle) => Instruction::I64LeS,
        (IrType::I64, CmpPred::Sgt) => Instruction::I64GtS,
        (IrType::I64, CmpPred::Sge) => Instruction::I64GeS,
        (IrType::I64, CmpPred::Ult) => Instruction::I64LtU,
        (IrType::I64, CmpPred::Uge) => Instruction::I64GeU,
        (IrType::I1 | IrType::I8 | IrType::I32, CmpPred::Eq) => Instruction::I32Eq,
        (IrType::I1 | IrType::I8 | IrType::I32, CmpPred::Ne) => Instruction::I32Ne,
        (IrType::I1 | IrType::I8 | IrType::I32, CmpPred::Slt) => Instruction::I32LtS,
        (IrType::I1 | IrType::I8 | IrType::I32, CmpPred::Sle) => Instruction::I32LeS,
        (IrType::I1 | IrType::I8 | IrType::I32, CmpPred::Sgt) => Instruction::I32GtS,
        (IrType::I1 | IrType::I8 | IrType::I32, CmpPred::Sge) => Instruction::I32GeS,
        (IrType::I1 | IrType::I8 | IrType::I32, CmpPred::Ult) => Instruction::I32LtU,
        (IrType::I1 | IrType::I8 | IrType::I32, CmpPred::Uge) => Instruction::I32GeU,
        (ty, pred) => {
            return Err(unsupported(format!(
                "icmp {} on {}",
                pred.mnemonic(),
                ty.name()
            )));
        }
    };
    Ok(instruction)
}

/// Conversions between integer widths assume narrow values are kept
/// zero-extended in their `i32` local.
fn cast_instructions(
    op: CastOp,
    from: IrType,
    to: IrType,
) -> Result<Vec<Instruction<'static>>, CoreError> {
    use IrType::*;
    let narrow = |ty: IrType| matches!(ty, I1 | I8);
    let instructions = match (op, from, to) {
        (CastOp::SExt, I8, I32) => vec![Instruction::I32Extend8S],
        (CastOp::SExt, I8, I64) => vec![Instruction::I32Extend8S, Instruction::I64ExtendI32S],
        (CastOp::SExt, I32, I64) => vec![Instruction::I64ExtendI32S],
        (CastOp::ZExt, f, I32) if narrow(f) => vec![],
        (CastOp::ZExt, f, I64) if narrow(f) || f == I32 => vec![Instruction::I64ExtendI32U],
        (CastOp::ZExt, I1, I8) => vec![],
        (CastOp::Trunc, I64, I32) => vec![Instruction::I32WrapI64],
        (CastOp::Trunc, I64, I8) => vec![
            Instruction::I32WrapI64,
            Instruction::I32Const(0xFF),
            Instruction::I32And,
        ],
        (CastOp::Trunc, I32, I8) => vec![Instruction::I32Const(0xFF), Instruction::I32And],
        (CastOp::Trunc, I64, I1) => vec![
            Instruction::I32WrapI64,
            Instruction::I32Const(1),
            Instruction::I32And,
        ],
        (CastOp::Trunc, I32 | I8, I1) => vec![Instruction::I32Const(1), Instruction::I32And],
        (CastOp::SIToFP, I32, F32) => vec![Instruction::F32ConvertI32S],
        (CastOp::SIToFP, I64, F32) => vec![Instruction::F32ConvertI64S],
        (CastOp::SIToFP, I32, F64) => vec![Instruction::F64ConvertI32S],
        (CastOp::SIToFP, I64, F64) => vec![Instruction::F64ConvertI64S],
        (CastOp::FPToSI, F32, I32) => vec![Instruction::I32TruncSatF32S],
        (CastOp::FPToSI, F64, I32) => vec![Instruction::I32TruncSatF64S],
        (CastOp::FPToSI, F32, I64) => vec![Instruction::I64TruncSatF32S],
        (CastOp::FPToSI, F64, I64) => vec![Instruction::I64TruncSatF64S],
        (CastOp::FPExt, F32, F64) => vec![Instruction::F64PromoteF32],
        (CastOp::FPTrunc, F64, F32) => vec![Instruction::F32DemoteF64],
        (op, from, to) => {
            return Err(unsupported(format!(
                "{} {} to {}",
                op.mnemonic(),
                from.name(),
                to.name()
            )));
        }
    };
    Ok(instructions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen_llvm::generate;
    use crate::parser::parse;
    use crate::typecheck::analyze;
    use wasmparser::{Parser, Payload, Validator};

    fn compile(source: &str) -> Vec<u8> {
        let mut program = parse(source).expect("parse");
        analyze(&mut program).expect("analyze");
        let module = generate(&program, "test").expect("lower");
        generate_wasm(&module).expect("wasm")
    }

    fn validate(bytes: &[u8]) {
        Validator::new().validate_all(bytes).expect("valid wasm");
    }

    #[test]
    fn emits_valid_module_for_every_construct() {
        let bytes = compile(
            "int a = 2; long b = 3000000000; float f = 1.5; double d = a / 3.0; \
             char c = 'x'; string s = \"hi\"; bool t = true; \
             <v> = 1, 2, 3; <w> = 4, 5, 6; print(<v>.<w>); print(v[a]); \
             ||m|| = [1, 0], [0, 1]; ||n|| = [1, 2], [3, 4]; print(||m||.||n||); \
             loop(i, 3) { print(i + b); print(-f); } print(c); print(s); print(t); print(d); \
             int back = d; float narrow = d;",
        );
        validate(&bytes);
    }

    #[test]
    fn exports_main_and_memory() {
        let bytes = compile("print(\"hello\");");
        validate(&bytes);

        let mut exports = Vec::new();
        for payload in Parser::new(0).parse_all(&bytes) {
            if let Payload::ExportSection(reader) = payload.expect("payload") {
                for export in reader {
                    exports.push(export.expect("export").name.to_string());
                }
            }
        }
        assert_eq!(exports, vec!["main".to_string(), "memory".to_string()]);
    }

    #[test]
    fn string_constants_live_in_data_segments() {
        let bytes = compile("print(\"hello\");");
        assert!(bytes.windows(6).any(|w| w == b"hello\0"));
        assert!(bytes.windows(4).any(|w| w == b"%s\n\0"));
    }

    #[test]
    fn layout_reserves_guard_and_aligned_slots() {
        let mut program = parse("long a = 1; char c = 'c'; <v> = 1, 2, 3; print(a);").expect("parse");
        analyze(&mut program).expect("analyze");
        let module = generate(&program, "test").expect("lower");
        let layout = Layout::compute(&module).expect("layout");

        assert_eq!(layout.globals, vec![GLOBAL_BASE]);
        assert_eq!(layout.varargs % 8, 0);
        assert!(layout.varargs >= GLOBAL_BASE + 6);
        let mut addresses: Vec<u32> = layout.allocas.values().copied().collect();
        addresses.sort_unstable();
        assert_eq!(addresses.len(), 3);
        assert!(addresses.iter().all(|address| address % 8 == 0));
        assert!(addresses[0] >= layout.varargs + VARARG_SLOT);
        assert_eq!(layout.pages(), 1);
    }
}
