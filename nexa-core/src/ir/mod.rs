//! A small LLVM-flavoured SSA IR.
//!
//! Lowering builds a [`Module`] through the [`Builder`]. The `Display`
//! impl prints it as textual LLVM IR, and the wasm backend translates the
//! same module into an executable artifact.

mod builder;
mod printer;

pub use builder::Builder;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IrType {
    I1,
    I8,
    I32,
    I64,
    F32,
    F64,
    Ptr,
    Void,
}

impl IrType {
    pub fn is_int(self) -> bool {
        matches!(self, IrType::I1 | IrType::I8 | IrType::I32 | IrType::I64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, IrType::F32 | IrType::F64)
    }

    /// Storage size in bytes; also used as the alignment.
    pub fn size(self) -> u32 {
        match self {
            IrType::I1 | IrType::I8 => 1,
            IrType::I32 | IrType::F32 => 4,
            IrType::I64 | IrType::F64 | IrType::Ptr => 8,
            IrType::Void => 0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            IrType::I1 => "i1",
            IrType::I8 => "i8",
            IrType::I32 => "i32",
            IrType::I64 => "i64",
            IrType::F32 => "float",
            IrType::F64 => "double",
            IrType::Ptr => "ptr",
            IrType::Void => "void",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Int(IrType, i64),
    Float(IrType, f64),
    Value(ValueId),
    /// Address of a global string.
    Global(GlobalId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    SDiv,
    FAdd,
    FSub,
    FMul,
    FDiv,
}

impl BinOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::SDiv => "sdiv",
            BinOp::FAdd => "fadd",
            BinOp::FSub => "fsub",
            BinOp::FMul => "fmul",
            BinOp::FDiv => "fdiv",
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, BinOp::FAdd | BinOp::FSub | BinOp::FMul | BinOp::FDiv)
    }
}

/// Integer comparison predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpPred {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
    Ult,
    Uge,
}

impl CmpPred {
    pub fn mnemonic(self) -> &'static str {
        match self {
            CmpPred::Eq => "eq",
            CmpPred::Ne => "ne",
            CmpPred::Slt => "slt",
            CmpPred::Sle => "sle",
            CmpPred::Sgt => "sgt",
            CmpPred::Sge => "sge",
            CmpPred::Ult => "ult",
            CmpPred::Uge => "uge",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastOp {
    SExt,
    ZExt,
    Trunc,
    SIToFP,
    FPToSI,
    FPExt,
    FPTrunc,
}

impl CastOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            CastOp::SExt => "sext",
            CastOp::ZExt => "zext",
            CastOp::Trunc => "trunc",
            CastOp::SIToFP => "sitofp",
            CastOp::FPToSI => "fptosi",
            CastOp::FPExt => "fpext",
            CastOp::FPTrunc => "fptrunc",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstKind {
    /// `count` contiguous slots of `ty`.
    Alloca { ty: IrType, count: u32 },
    Load { ty: IrType, ptr: Operand },
    Store { value: Operand, ptr: Operand },
    /// Address of element `index` in an array of `elem`.
    ElementPtr {
        elem: IrType,
        base: Operand,
        index: Operand,
    },
    Binary {
        op: BinOp,
        ty: IrType,
        lhs: Operand,
        rhs: Operand,
    },
    FNeg { ty: IrType, operand: Operand },
    Cmp {
        pred: CmpPred,
        ty: IrType,
        lhs: Operand,
        rhs: Operand,
    },
    Cast {
        op: CastOp,
        from: IrType,
        to: IrType,
        value: Operand,
    },
    Call { callee: String, args: Vec<Operand> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Inst {
    pub result: Option<ValueId>,
    pub kind: InstKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    Br(BlockId),
    CondBr {
        cond: Operand,
        then_block: BlockId,
        else_block: BlockId,
    },
    Ret(Option<Operand>),
    /// Abort execution.
    Trap,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub label: String,
    pub insts: Vec<Inst>,
    pub terminator: Option<Terminator>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueInfo {
    pub ty: IrType,
    pub hint: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub ret: IrType,
    /// The first block is the entry block.
    pub blocks: Vec<Block>,
    pub values: Vec<ValueInfo>,
}

impl Function {
    pub fn value_type(&self, id: ValueId) -> Option<IrType> {
        self.values.get(id.0 as usize).map(|info| info.ty)
    }

    pub fn operand_type(&self, operand: &Operand) -> Option<IrType> {
        match operand {
            Operand::Int(ty, _) | Operand::Float(ty, _) => Some(*ty),
            Operand::Value(id) => self.value_type(*id),
            Operand::Global(_) => Some(IrType::Ptr),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extern {
    pub name: String,
    pub ret: IrType,
    pub params: Vec<IrType>,
    pub variadic: bool,
}

/// A NUL-terminated byte string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Global {
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub name: String,
    pub globals: Vec<Global>,
    pub externs: Vec<Extern>,
    pub functions: Vec<Function>,
    /// Whether any block ends in [`Terminator::Trap`].
    pub uses_trap: bool,
}

impl Module {
    pub fn find_extern(&self, name: &str) -> Option<&Extern> {
        self.externs.iter().find(|ext| ext.name == name)
    }

    pub fn find_function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|func| func.name == name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IrError {
    #[error("no function is being built")]
    NoFunction,
    #[error("function `{0}` is still being built")]
    FunctionOpen(String),
    #[error("block {0} does not exist")]
    UnknownBlock(u32),
    #[error("block `{0}` already has a terminator")]
    BlockTerminated(String),
    #[error("block `{0}` has no terminator")]
    Unterminated(String),
    #[error("call to undeclared function `{0}`")]
    UnknownExtern(String),
    #[error("value {0} does not exist")]
    UnknownValue(u32),
    #[error("`{op}` expects {expected}, found {found}")]
    TypeMismatch {
        op: &'static str,
        expected: &'static str,
        found: &'static str,
    },
    #[error("`{callee}` expects {expected} argument(s), found {found}")]
    ArgumentCount {
        callee: String,
        expected: usize,
        found: usize,
    },
}
