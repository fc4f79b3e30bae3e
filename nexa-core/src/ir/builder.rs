use super::{
    BinOp, Block, BlockId, CastOp, CmpPred, Extern, Function, Global, GlobalId, Inst, InstKind,
    IrError, IrType, Module, Operand, Terminator, ValueId, ValueInfo,
};

/// Appends instructions to the function currently being built.
///
/// Every operation checks its operand types, so a lowering bug surfaces
/// as an [`IrError`] instead of a malformed module.
#[derive(Debug)]
pub struct Builder {
    module: Module,
    function: Option<Function>,
    current: BlockId,
    /// Allocas already placed at the head of the entry block.
    allocas: usize,
}

impl Builder {
    pub fn new(name: impl Into<String>) -> Self {
        Builder {
            module: Module {
                name: name.into(),
                ..Module::default()
            },
            function: None,
            current: BlockId(0),
            allocas: 0,
        }
    }

    /// Declare an external function. Redeclaring the same name is a no-op.
    pub fn declare_extern(&mut self, name: &str, ret: IrType, params: &[IrType], variadic: bool) {
        if self.module.find_extern(name).is_some() {
            return;
        }
        self.module.externs.push(Extern {
            name: name.to_string(),
            ret,
            params: params.to_vec(),
            variadic,
        });
    }

    /// Intern a NUL-terminated string constant and return its address.
    pub fn global_string(&mut self, text: &str) -> Operand {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        if let Some(index) = self.module.globals.iter().position(|g| g.bytes == bytes) {
            return Operand::Global(GlobalId(index as u32));
        }
        self.module.globals.push(Global { bytes });
        Operand::Global(GlobalId(self.module.globals.len() as u32 - 1))
    }

    pub fn begin_function(&mut self, name: &str, ret: IrType) -> Result<(), IrError> {
        if let Some(open) = &self.function {
            return Err(IrError::FunctionOpen(open.name.clone()));
        }
        self.function = Some(Function {
            name: name.to_string(),
            ret,
            blocks: vec![Block {
                label: "entry".to_string(),
                insts: Vec::new(),
                terminator: None,
            }],
            values: Vec::new(),
        });
        self.current = BlockId(0);
        self.allocas = 0;
        Ok(())
    }

    pub fn finish_function(&mut self) -> Result<(), IrError> {
        let function = self.function.take().ok_or(IrError::NoFunction)?;
        if let Some(block) = function.blocks.iter().find(|b| b.terminator.is_none()) {
            return Err(IrError::Unterminated(block.label.clone()));
        }
        self.module.functions.push(function);
        Ok(())
    }

    pub fn finish(self) -> Result<Module, IrError> {
        if let Some(open) = self.function {
            return Err(IrError::FunctionOpen(open.name));
        }
        Ok(self.module)
    }

    /// Create a new block labelled `{hint}{id}`. The insertion point does
    /// not move.
    pub fn append_block(&mut self, hint: &str) -> Result<BlockId, IrError> {
        let function = self.function_mut()?;
        let id = BlockId(function.blocks.len() as u32);
        function.blocks.push(Block {
            label: format!("{hint}{}", id.0),
            insts: Vec::new(),
            terminator: None,
        });
        Ok(id)
    }

    pub fn position_at_end(&mut self, block: BlockId) -> Result<(), IrError> {
        let function = self.function_mut()?;
        if block.0 as usize >= function.blocks.len() {
            return Err(IrError::UnknownBlock(block.0));
        }
        self.current = block;
        Ok(())
    }

    pub fn operand_type(&self, operand: &Operand) -> Result<IrType, IrError> {
        let function = self.function.as_ref().ok_or(IrError::NoFunction)?;
        function.operand_type(operand).ok_or(match operand {
            Operand::Value(id) => IrError::UnknownValue(id.0),
            _ => IrError::NoFunction,
        })
    }

    /// Reserve stack storage. Allocas are always placed at the head of
    /// the entry block, whatever the insertion point.
    pub fn alloca(&mut self, ty: IrType, count: u32, hint: &str) -> Result<Operand, IrError> {
        let id = self.new_value(IrType::Ptr, hint)?;
        let at = self.allocas;
        let function = self.function_mut()?;
        function.blocks[0].insts.insert(
            at,
            Inst {
                result: Some(id),
                kind: InstKind::Alloca { ty, count },
            },
        );
        self.allocas += 1;
        Ok(Operand::Value(id))
    }

    pub fn load(&mut self, ty: IrType, ptr: Operand, hint: &str) -> Result<Operand, IrError> {
        self.expect_type("load", &ptr, IrType::Ptr)?;
        self.emit_value(ty, hint, InstKind::Load { ty, ptr })
    }

    pub fn store(&mut self, value: Operand, ptr: Operand) -> Result<(), IrError> {
        self.expect_type("store", &ptr, IrType::Ptr)?;
        self.operand_type(&value)?;
        self.emit(None, InstKind::Store { value, ptr })
    }

    pub fn element_ptr(
        &mut self,
        elem: IrType,
        base: Operand,
        index: Operand,
        hint: &str,
    ) -> Result<Operand, IrError> {
        self.expect_type("getelementptr", &base, IrType::Ptr)?;
        let index_ty = self.operand_type(&index)?;
        if !index_ty.is_int() {
            return Err(mismatch("getelementptr", "an integer index", index_ty));
        }
        self.emit_value(IrType::Ptr, hint, InstKind::ElementPtr { elem, base, index })
    }

    pub fn binary(
        &mut self,
        op: BinOp,
        lhs: Operand,
        rhs: Operand,
        hint: &str,
    ) -> Result<Operand, IrError> {
        let ty = self.operand_type(&lhs)?;
        let valid = if op.is_float() { ty.is_float() } else { ty.is_int() };
        if !valid {
            return Err(mismatch(
                op.mnemonic(),
                if op.is_float() { "a float" } else { "an integer" },
                ty,
            ));
        }
        self.expect_type(op.mnemonic(), &rhs, ty)?;
        self.emit_value(ty, hint, InstKind::Binary { op, ty, lhs, rhs })
    }

    pub fn fneg(&mut self, operand: Operand, hint: &str) -> Result<Operand, IrError> {
        let ty = self.operand_type(&operand)?;
        if !ty.is_float() {
            return Err(mismatch("fneg", "a float", ty));
        }
        self.emit_value(ty, hint, InstKind::FNeg { ty, operand })
    }

    pub fn cmp(
        &mut self,
        pred: CmpPred,
        lhs: Operand,
        rhs: Operand,
        hint: &str,
    ) -> Result<Operand, IrError> {
        let ty = self.operand_type(&lhs)?;
        if !ty.is_int() {
            return Err(mismatch("icmp", "an integer", ty));
        }
        self.expect_type("icmp", &rhs, ty)?;
        self.emit_value(IrType::I1, hint, InstKind::Cmp { pred, ty, lhs, rhs })
    }

    pub fn cast(
        &mut self,
        op: CastOp,
        value: Operand,
        to: IrType,
        hint: &str,
    ) -> Result<Operand, IrError> {
        let from = self.operand_type(&value)?;
        let valid = match op {
            CastOp::SExt | CastOp::ZExt => from.is_int() && to.is_int() && from.size() <= to.size(),
            CastOp::Trunc => from.is_int() && to.is_int() && from.size() >= to.size(),
            CastOp::SIToFP => from.is_int() && to.is_float(),
            CastOp::FPToSI => from.is_float() && to.is_int(),
            CastOp::FPExt => from == IrType::F32 && to == IrType::F64,
            CastOp::FPTrunc => from == IrType::F64 && to == IrType::F32,
        };
        if !valid {
            return Err(mismatch(op.mnemonic(), "a convertible operand", from));
        }
        self.emit_value(to, hint, InstKind::Cast { op, from, to, value })
    }

    /// Call a declared extern. Returns the result unless it is `void`.
    pub fn call(
        &mut self,
        callee: &str,
        args: Vec<Operand>,
        hint: &str,
    ) -> Result<Option<Operand>, IrError> {
        let ext = self
            .module
            .find_extern(callee)
            .ok_or_else(|| IrError::UnknownExtern(callee.to_string()))?
            .clone();
        let arity_ok = if ext.variadic {
            args.len() >= ext.params.len()
        } else {
            args.len() == ext.params.len()
        };
        if !arity_ok {
            return Err(IrError::ArgumentCount {
                callee: callee.to_string(),
                expected: ext.params.len(),
                found: args.len(),
            });
        }
        for (arg, param) in args.iter().zip(&ext.params) {
            self.expect_type("call", arg, *param)?;
        }
        for arg in &args[ext.params.len()..] {
            self.operand_type(arg)?;
        }

        let kind = InstKind::Call {
            callee: callee.to_string(),
            args,
        };
        if ext.ret == IrType::Void {
            self.emit(None, kind)?;
            Ok(None)
        } else {
            self.emit_value(ext.ret, hint, kind).map(Some)
        }
    }

    pub fn br(&mut self, target: BlockId) -> Result<(), IrError> {
        self.check_block(target)?;
        self.terminate(Terminator::Br(target))
    }

    pub fn cond_br(
        &mut self,
        cond: Operand,
        then_block: BlockId,
        else_block: BlockId,
    ) -> Result<(), IrError> {
        self.expect_type("br", &cond, IrType::I1)?;
        self.check_block(then_block)?;
        self.check_block(else_block)?;
        self.terminate(Terminator::CondBr {
            cond,
            then_block,
            else_block,
        })
    }

    pub fn ret(&mut self, value: Option<Operand>) -> Result<(), IrError> {
        let ret = self.function.as_ref().ok_or(IrError::NoFunction)?.ret;
        match &value {
            Some(value) => self.expect_type("ret", value, ret)?,
            None if ret != IrType::Void => return Err(mismatch("ret", ret.name(), IrType::Void)),
            None => {}
        }
        self.terminate(Terminator::Ret(value))
    }

    pub fn trap(&mut self) -> Result<(), IrError> {
        self.terminate(Terminator::Trap)?;
        self.module.uses_trap = true;
        Ok(())
    }

    fn function_mut(&mut self) -> Result<&mut Function, IrError> {
        self.function.as_mut().ok_or(IrError::NoFunction)
    }

    fn check_block(&self, block: BlockId) -> Result<(), IrError> {
        let function = self.function.as_ref().ok_or(IrError::NoFunction)?;
        if block.0 as usize >= function.blocks.len() {
            return Err(IrError::UnknownBlock(block.0));
        }
        Ok(())
    }

    fn expect_type(
        &self,
        op: &'static str,
        operand: &Operand,
        expected: IrType,
    ) -> Result<(), IrError> {
        let found = self.operand_type(operand)?;
        if found != expected {
            return Err(mismatch(op, expected.name(), found));
        }
        Ok(())
    }

    fn new_value(&mut self, ty: IrType, hint: &str) -> Result<ValueId, IrError> {
        let function = self.function_mut()?;
        let id = ValueId(function.values.len() as u32);
        function.values.push(ValueInfo {
            ty,
            hint: if hint.is_empty() { "t" } else { hint }.to_string(),
        });
        Ok(id)
    }

    fn emit_value(&mut self, ty: IrType, hint: &str, kind: InstKind) -> Result<Operand, IrError> {
        let id = self.new_value(ty, hint)?;
        self.emit(Some(id), kind)?;
        Ok(Operand::Value(id))
    }

    fn emit(&mut self, result: Option<ValueId>, kind: InstKind) -> Result<(), IrError> {
        let current = self.current.0 as usize;
        let block = &mut self.function_mut()?.blocks[current];
        if block.terminator.is_some() {
            return Err(IrError::BlockTerminated(block.label.clone()));
        }
        block.insts.push(Inst { result, kind });
        Ok(())
    }

    fn terminate(&mut self, terminator: Terminator) -> Result<(), IrError> {
        let current = self.current.0 as usize;
        let block = &mut self.function_mut()?.blocks[current];
        if block.terminator.is_some() {
            return Err(IrError::BlockTerminated(block.label.clone()));
        }
        block.terminator = Some(terminator);
        Ok(())
    }
}

fn mismatch(op: &'static str, expected: &'static str, found: IrType) -> IrError {
    IrError::TypeMismatch {
        op,
        expected,
        found: found.name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder_with_main() -> Builder {
        let mut builder = Builder::new("test");
        builder.begin_function("main", IrType::I32).expect("begin");
        builder
    }

    #[test]
    fn allocas_are_hoisted_to_entry() {
        let mut builder = builder_with_main();
        let next = builder.append_block("next").expect("block");
        builder.br(next).expect("br");
        builder.position_at_end(next).expect("position");
        let slot = builder.alloca(IrType::I32, 1, "x").expect("alloca");
        builder.store(Operand::Int(IrType::I32, 7), slot).expect("store");
        builder.ret(Some(Operand::Int(IrType::I32, 0))).expect("ret");
        builder.finish_function().expect("finish function");

        let module = builder.finish().expect("finish");
        let main = module.find_function("main").expect("main");
        assert!(matches!(
            main.blocks[0].insts[0].kind,
            InstKind::Alloca { ty: IrType::I32, count: 1 }
        ));
        assert_eq!(main.blocks[1].insts.len(), 1);
        assert_eq!(main.blocks[1].label, "next1");
    }

    #[test]
    fn rejects_mismatched_binary_operands() {
        let mut builder = builder_with_main();
        let err = builder
            .binary(
                BinOp::Add,
                Operand::Int(IrType::I32, 1),
                Operand::Int(IrType::I64, 2),
                "",
            )
            .unwrap_err();
        assert!(matches!(err, IrError::TypeMismatch { op: "add", .. }));

        let err = builder
            .binary(
                BinOp::FAdd,
                Operand::Int(IrType::I32, 1),
                Operand::Int(IrType::I32, 2),
                "",
            )
            .unwrap_err();
        assert!(matches!(err, IrError::TypeMismatch { op: "fadd", .. }));
    }

    #[test]
    fn rejects_double_termination_and_open_blocks() {
        let mut builder = builder_with_main();
        builder.ret(Some(Operand::Int(IrType::I32, 0))).expect("ret");
        assert_eq!(
            builder.trap(),
            Err(IrError::BlockTerminated("entry".to_string()))
        );

        let mut builder = builder_with_main();
        builder.append_block("dangling").expect("block");
        builder.ret(Some(Operand::Int(IrType::I32, 0))).expect("ret");
        assert_eq!(
            builder.finish_function(),
            Err(IrError::Unterminated("dangling1".to_string()))
        );
    }

    #[test]
    fn checks_extern_calls() {
        let mut builder = builder_with_main();
        assert_eq!(
            builder.call("printf", vec![], ""),
            Err(IrError::UnknownExtern("printf".to_string()))
        );

        builder.declare_extern("printf", IrType::I32, &[IrType::Ptr], true);
        let fmt = builder.global_string("%d\n");
        let result = builder
            .call("printf", vec![fmt, Operand::Int(IrType::I32, 1)], "")
            .expect("call");
        assert!(result.is_some());
        assert!(matches!(
            builder.call("printf", vec![], ""),
            Err(IrError::ArgumentCount { expected: 1, found: 0, .. })
        ));
    }

    #[test]
    fn global_strings_are_interned() {
        let mut builder = Builder::new("test");
        let a = builder.global_string("%d\n");
        let b = builder.global_string("%f\n");
        let c = builder.global_string("%d\n");
        assert_eq!(a, c);
        assert_ne!(a, b);
        let module = builder.finish().expect("finish");
        assert_eq!(module.globals.len(), 2);
        assert_eq!(module.globals[0].bytes, b"%d\n\0");
    }

    #[test]
    fn requires_an_open_function() {
        let mut builder = Builder::new("test");
        assert_eq!(
            builder.alloca(IrType::I32, 1, "x"),
            Err(IrError::NoFunction)
        );
        builder.begin_function("main", IrType::I32).expect("begin");
        assert_eq!(
            builder.begin_function("other", IrType::I32),
            Err(IrError::FunctionOpen("main".to_string()))
        );
    }
}
