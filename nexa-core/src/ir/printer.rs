//! Textual LLVM IR output.

use std::fmt::{self, Write};

use super::{
    Block, Function, Inst, InstKind, IrType, Module, Operand, Terminator, ValueId,
};

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; ModuleID = '{}'", self.name)?;
        writeln!(f, "source_filename = \"{}\"", self.name)?;

        if !self.globals.is_empty() {
            writeln!(f)?;
        }
        for (index, global) in self.globals.iter().enumerate() {
            writeln!(
                f,
                "@.str.{index} = private unnamed_addr constant [{} x i8] c\"{}\", align 1",
                global.bytes.len(),
                escape_bytes(&global.bytes)
            )?;
        }

        if !self.externs.is_empty() || self.uses_trap {
            writeln!(f)?;
        }
        for ext in &self.externs {
            let mut params: Vec<&str> = ext.params.iter().map(|ty| ty.name()).collect();
            if ext.variadic {
                params.push("...");
            }
            writeln!(
                f,
                "declare {} @{}({})",
                ext.ret.name(),
                ext.name,
                params.join(", ")
            )?;
        }
        if self.uses_trap {
            writeln!(f, "declare void @llvm.trap()")?;
        }

        for function in &self.functions {
            writeln!(f)?;
            FunctionPrinter {
                module: self,
                function,
            }
            .print(f)?;
        }
        Ok(())
    }
}

struct FunctionPrinter<'a> {
    module: &'a Module,
    function: &'a Function,
}

impl FunctionPrinter<'_> {
    fn print(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "define {} @{}() {{",
            self.function.ret.name(),
            self.function.name
        )?;
        for (index, block) in self.function.blocks.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            self.print_block(f, block)?;
        }
        writeln!(f, "}}")
    }

    fn print_block(&self, f: &mut fmt::Formatter<'_>, block: &Block) -> fmt::Result {
        writeln!(f, "{}:", block.label)?;
        for inst in &block.insts {
            writeln!(f, "  {}", self.inst(inst))?;
        }
        match &block.terminator {
            Some(Terminator::Br(target)) => writeln!(f, "  br label %{}", self.label(target.0)),
            Some(Terminator::CondBr {
                cond,
                then_block,
                else_block,
            }) => writeln!(
                f,
                "  br i1 {}, label %{}, label %{}",
                self.operand(cond),
                self.label(then_block.0),
                self.label(else_block.0)
            ),
            Some(Terminator::Ret(Some(value))) => writeln!(f, "  ret {}", self.typed(value)),
            Some(Terminator::Ret(None)) => writeln!(f, "  ret void"),
            Some(Terminator::Trap) => {
                writeln!(f, "  call void @llvm.trap()")?;
                writeln!(f, "  unreachable")
            }
            None => Ok(()),
        }
    }

    fn inst(&self, inst: &Inst) -> String {
        let mut line = String::new();
        if let Some(result) = inst.result {
            let _ = write!(line, "{} = ", self.value(result));
        }
        let _ = match &inst.kind {
            InstKind::Alloca { ty, count } if *count == 1 => {
                write!(line, "alloca {}, align {}", ty.name(), ty.size())
            }
            InstKind::Alloca { ty, count } => write!(
                line,
                "alloca {}, i32 {count}, align {}",
                ty.name(),
                ty.size()
            ),
            InstKind::Load { ty, ptr } => write!(
                line,
                "load {}, ptr {}, align {}",
                ty.name(),
                self.operand(ptr),
                ty.size()
            ),
            InstKind::Store { value, ptr } => {
                let align = self.type_of(value).map_or(1, IrType::size);
                write!(
                    line,
                    "store {}, ptr {}, align {align}",
                    self.typed(value),
                    self.operand(ptr)
                )
            }
            InstKind::ElementPtr { elem, base, index } => write!(
                line,
                "getelementptr inbounds {}, ptr {}, {}",
                elem.name(),
                self.operand(base),
                self.typed(index)
            ),
            InstKind::Binary { op, ty, lhs, rhs } => write!(
                line,
                "{} {} {}, {}",
                op.mnemonic(),
                ty.name(),
                self.operand(lhs),
                self.operand(rhs)
            ),
            InstKind::FNeg { ty, operand } => {
                write!(line, "fneg {} {}", ty.name(), self.operand(operand))
            }
            InstKind::Cmp { pred, ty, lhs, rhs } => write!(
                line,
                "icmp {} {} {}, {}",
                pred.mnemonic(),
                ty.name(),
                self.operand(lhs),
                self.operand(rhs)
            ),
            InstKind::Cast {
                op,
                from,
                to,
                value,
            } => write!(
                line,
                "{} {} {} to {}",
                op.mnemonic(),
                from.name(),
                self.operand(value),
                to.name()
            ),
            InstKind::Call { callee, args } => self.call(&mut line, callee, args),
        };
        line
    }

    fn call(&self, line: &mut String, callee: &str, args: &[Operand]) -> fmt::Result {
        let args = args
            .iter()
            .map(|arg| self.typed(arg))
            .collect::<Vec<_>>()
            .join(", ");
        match self.module.find_extern(callee) {
            Some(ext) if ext.variadic => {
                let mut params: Vec<&str> = ext.params.iter().map(|ty| ty.name()).collect();
                params.push("...");
                write!(
                    line,
                    "call {} ({}) @{callee}({args})",
                    ext.ret.name(),
                    params.join(", ")
                )
            }
            Some(ext) => write!(line, "call {} @{callee}({args})", ext.ret.name()),
            None => write!(line, "call void @{callee}({args})"),
        }
    }

    fn label(&self, block: u32) -> &str {
        self.function
            .blocks
            .get(block as usize)
            .map_or("<invalid>", |b| b.label.as_str())
    }

    fn value(&self, id: ValueId) -> String {
        let hint = self
            .function
            .values
            .get(id.0 as usize)
            .map_or("t", |info| info.hint.as_str());
        format!("%{hint}.{}", id.0)
    }

    fn type_of(&self, operand: &Operand) -> Option<IrType> {
        self.function.operand_type(operand)
    }

    fn typed(&self, operand: &Operand) -> String {
        let ty = self.type_of(operand).unwrap_or(IrType::Void);
        format!("{} {}", ty.name(), self.operand(operand))
    }

    fn operand(&self, operand: &Operand) -> String {
        match operand {
            Operand::Int(IrType::I1, value) => {
                if *value == 0 { "false" } else { "true" }.to_string()
            }
            Operand::Int(_, value) => value.to_string(),
            Operand::Float(ty, value) => float_literal(*ty, *value),
            Operand::Value(id) => self.value(*id),
            Operand::Global(id) => format!("@.str.{}", id.0),
        }
    }
}

/// LLVM spells float constants as the hex bits of the equivalent double.
/// `float` constants must be exactly representable, so they are rounded
/// through `f32` first.
fn float_literal(ty: IrType, value: f64) -> String {
    let value = if ty == IrType::F32 {
        f64::from(value as f32)
    } else {
        value
    };
    format!("0x{:016X}", value.to_bits())
}

fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &byte in bytes {
        if (byte.is_ascii_graphic() && byte != b'"' && byte != b'\\') || byte == b' ' {
            out.push(byte as char);
        } else {
            let _ = write!(out, "\\{byte:02X}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinOp, Builder, CastOp, CmpPred};
    use pretty_assertions::assert_eq;

    #[test]
    fn prints_a_complete_module() {
        let mut builder = Builder::new("demo");
        builder.declare_extern("printf", IrType::I32, &[IrType::Ptr], true);
        builder.begin_function("main", IrType::I32).expect("begin");
        let x = builder.alloca(IrType::I32, 1, "x").expect("alloca");
        builder.store(Operand::Int(IrType::I32, 41), x).expect("store");
        let loaded = builder.load(IrType::I32, x, "").expect("load");
        let sum = builder
            .binary(BinOp::Add, loaded, Operand::Int(IrType::I32, 1), "")
            .expect("add");
        let fmt = builder.global_string("%d\n");
        builder.call("printf", vec![fmt, sum], "").expect("call");
        builder.ret(Some(Operand::Int(IrType::I32, 0))).expect("ret");
        builder.finish_function().expect("finish function");
        let module = builder.finish().expect("finish");

        let expected = "\
; ModuleID = 'demo'
source_filename = \"demo\"

@.str.0 = private unnamed_addr constant [4 x i8] c\"%d\\0A\\00\", align 1

declare i32 @printf(ptr, ...)

define i32 @main() {
entry:
  %x.0 = alloca i32, align 4
  store i32 41, ptr %x.0, align 4
  %t.1 = load i32, ptr %x.0, align 4
  %t.2 = add i32 %t.1, 1
  %t.3 = call i32 (ptr, ...) @printf(ptr @.str.0, i32 %t.2)
  ret i32 0
}
";
        assert_eq!(module.to_string(), expected);
    }

    #[test]
    fn prints_branches_casts_and_traps() {
        let mut builder = Builder::new("flow");
        builder.begin_function("main", IrType::I32).expect("begin");
        let ok = builder.append_block("index.ok").expect("block");
        let trap = builder.append_block("index.trap").expect("block");
        let wide = builder
            .cast(CastOp::SExt, Operand::Int(IrType::I32, 3), IrType::I64, "")
            .expect("sext");
        let cond = builder
            .cmp(CmpPred::Ult, wide, Operand::Int(IrType::I64, 4), "inb")
            .expect("cmp");
        builder.cond_br(cond, ok, trap).expect("cond_br");
        builder.position_at_end(trap).expect("position");
        builder.trap().expect("trap");
        builder.position_at_end(ok).expect("position");
        builder.ret(Some(Operand::Int(IrType::I32, 0))).expect("ret");
        builder.finish_function().expect("finish function");
        let text = builder.finish().expect("finish").to_string();

        assert!(text.contains("declare void @llvm.trap()"));
        assert!(text.contains("%t.0 = sext i32 3 to i64"));
        assert!(text.contains("%inb.1 = icmp ult i64 %t.0, 4"));
        assert!(text.contains("br i1 %inb.1, label %index.ok1, label %index.trap2"));
        assert!(text.contains("index.trap2:\n  call void @llvm.trap()\n  unreachable"));
    }

    #[test]
    fn float_constants_use_hex_bits() {
        assert_eq!(float_literal(IrType::F64, 1.0), "0x3FF0000000000000");
        assert_eq!(float_literal(IrType::F32, 0.1), "0x3FB99999A0000000");
    }

    #[test]
    fn escapes_non_printable_bytes() {
        assert_eq!(escape_bytes(b"a \"b\"\\\n\0"), "a \\22b\\22\\5C\\0A\\00");
    }
}
