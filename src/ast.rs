use crate::lexer::SourceLocation;
use crate::symbol_table::SymbolId;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Char,
    Int,
    Long,
    Pointer(Box<Type>),
    Function {
        ret: Box<Type>,
        params: Option<Vec<Type>>,
        variadic: bool,
    },
}

impl Type {
    /// Size of a value of this type in bytes.
    pub fn size(&self) -> i32 {
        match self {
            Type::Char => 1,
            Type::Int => 4,
            Type::Long | Type::Pointer(_) | Type::Function { .. } => 8,
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Type::Function { .. })
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Char | Type::Int | Type::Long)
    }

    pub fn pointee(&self) -> Option<&Type> {
        match self {
            Type::Pointer(inner) => Some(inner),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Char => write!(f, "char"),
            Type::Int => write!(f, "int"),
            Type::Long => write!(f, "long"),
            Type::Pointer(inner) => write!(f, "{} *", inner),
            Type::Function { ret, .. } => write!(f, "{} ()", ret),
        }
    }
}

/// Index of an expression in the [`Ast`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExprId(u32);

impl ExprId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Number(i64),
    String(String),
    Identifier {
        name: String,
        symbol: Option<SymbolId>,
    },
    Call {
        name: String,
        symbol: Option<SymbolId>,
        args: Vec<ExprId>,
    },
    Binary {
        op: BinOp,
        left: ExprId,
        right: ExprId,
    },
    Not(ExprId),
    Negate(ExprId),
    Address(ExprId),
    Dereference(ExprId),
    /// The target type is the node's own `ty`.
    Cast(ExprId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Equal,
    NotEqual,
    LogicalAnd,
    LogicalOr,
}

/// A single declarator: `int *p;` at file, parameter, or block scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Decl {
    pub name: String,
    pub ty: Type,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Simple(ExprId),
    Assignment {
        left: ExprId,
        right: ExprId,
        location: SourceLocation,
    },
    Declaration(Vec<Decl>),
    Block(Vec<Stmt>),
    If {
        cond: ExprId,
        then_stmt: Box<Stmt>,
        else_stmt: Option<Box<Stmt>>,
    },
    While {
        cond: ExprId,
        body: Box<Stmt>,
    },
    For {
        init: Box<Stmt>,
        cond: ExprId,
        incr: Box<Stmt>,
        body: Box<Stmt>,
    },
    Break(SourceLocation),
    Return {
        expr: Option<ExprId>,
        location: SourceLocation,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub ret: Type,
    pub params: Vec<Decl>,
    pub variadic: bool,
    /// None for a forward declaration.
    pub body: Option<Stmt>,
    pub location: SourceLocation,
    // Filled in by the checker.
    pub id: Option<SymbolId>,
    pub param_symbols: Vec<SymbolId>,
    pub locals: Vec<SymbolId>,
}

/// A parsed translation unit. Expressions live in a single arena so that
/// later phases can attach per-node state (registers, spill slots) in side
/// tables keyed by [`ExprId`].
#[derive(Debug, Default)]
pub struct Ast {
    pub exprs: Vec<Expr>,
    pub symbols: Vec<crate::symbol_table::Symbol>,
    pub declarations: Vec<Decl>,
    pub functions: Vec<Function>,
    /// File-scope symbols in declaration order, filled in by the checker.
    pub globals: Vec<SymbolId>,
}

impl Ast {
    pub fn new() -> Self {
        Ast::default()
    }

    pub fn add_expr(&mut self, expr: Expr) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(expr);
        id
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    pub fn expr_mut(&mut self, id: ExprId) -> &mut Expr {
        &mut self.exprs[id.index()]
    }

    /// Render the tree for `--parse-only`.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        out.push_str("Program\n");
        for decl in &self.declarations {
            out.push_str(&format!("  Declaration({}: {})\n", decl.name, decl.ty));
        }
        for func in &self.functions {
            let params: Vec<String> = func
                .params
                .iter()
                .map(|p| format!("{}: {}", p.name, p.ty))
                .collect();
            out.push_str(&format!(
                "  Function({}: {} ({}){})\n",
                func.name,
                func.ret,
                params.join(", "),
                if func.variadic { ", ..." } else { "" }
            ));
            if let Some(body) = &func.body {
                self.dump_stmt(body, 2, &mut out);
            }
        }
        out
    }

    fn dump_stmt(&self, stmt: &Stmt, depth: usize, out: &mut String) {
        let pad = "  ".repeat(depth);
        match stmt {
            Stmt::Simple(e) => {
                out.push_str(&format!("{}Simple\n", pad));
                self.dump_expr(*e, depth + 1, out);
            }
            Stmt::Assignment { left, right, .. } => {
                out.push_str(&format!("{}Assignment\n", pad));
                self.dump_expr(*left, depth + 1, out);
                self.dump_expr(*right, depth + 1, out);
            }
            Stmt::Declaration(decls) => {
                for d in decls {
                    out.push_str(&format!("{}Declaration({}: {})\n", pad, d.name, d.ty));
                }
            }
            Stmt::Block(stmts) => {
                out.push_str(&format!("{}Block\n", pad));
                for s in stmts {
                    self.dump_stmt(s, depth + 1, out);
                }
            }
            Stmt::If {
                cond,
                then_stmt,
                else_stmt,
            } => {
                out.push_str(&format!("{}If\n", pad));
                self.dump_expr(*cond, depth + 1, out);
                self.dump_stmt(then_stmt, depth + 1, out);
                if let Some(e) = else_stmt {
                    self.dump_stmt(e, depth + 1, out);
                }
            }
            Stmt::While { cond, body } => {
                out.push_str(&format!("{}While\n", pad));
                self.dump_expr(*cond, depth + 1, out);
                self.dump_stmt(body, depth + 1, out);
            }
            Stmt::For {
                init,
                cond,
                incr,
                body,
            } => {
                out.push_str(&format!("{}For\n", pad));
                self.dump_stmt(init, depth + 1, out);
                self.dump_expr(*cond, depth + 1, out);
                self.dump_stmt(incr, depth + 1, out);
                self.dump_stmt(body, depth + 1, out);
            }
            Stmt::Break(_) => out.push_str(&format!("{}Break\n", pad)),
            Stmt::Return { expr, .. } => {
                out.push_str(&format!("{}Return\n", pad));
                if let Some(e) = expr {
                    self.dump_expr(*e, depth + 1, out);
                }
            }
        }
    }

    fn dump_expr(&self, id: ExprId, depth: usize, out: &mut String) {
        let pad = "  ".repeat(depth);
        match &self.expr(id).kind {
            ExprKind::Number(n) => out.push_str(&format!("{}Number({})\n", pad, n)),
            ExprKind::String(s) => out.push_str(&format!("{}String({:?})\n", pad, s)),
            ExprKind::Identifier { name, .. } => {
                out.push_str(&format!("{}Identifier({})\n", pad, name))
            }
            ExprKind::Call { name, args, .. } => {
                out.push_str(&format!("{}Call({})\n", pad, name));
                for a in args {
                    self.dump_expr(*a, depth + 1, out);
                }
            }
            ExprKind::Binary { op, left, right } => {
                out.push_str(&format!("{}BinaryOp({:?})\n", pad, op));
                self.dump_expr(*left, depth + 1, out);
                self.dump_expr(*right, depth + 1, out);
            }
            ExprKind::Not(e) => {
                out.push_str(&format!("{}Not\n", pad));
                self.dump_expr(*e, depth + 1, out);
            }
            ExprKind::Negate(e) => {
                out.push_str(&format!("{}Negate\n", pad));
                self.dump_expr(*e, depth + 1, out);
            }
            ExprKind::Address(e) => {
                out.push_str(&format!("{}Address\n", pad));
                self.dump_expr(*e, depth + 1, out);
            }
            ExprKind::Dereference(e) => {
                out.push_str(&format!("{}Dereference\n", pad));
                self.dump_expr(*e, depth + 1, out);
            }
            ExprKind::Cast(e) => {
                out.push_str(&format!("{}Cast({})\n", pad, self.expr(id).ty));
                self.dump_expr(*e, depth + 1, out);
            }
        }
    }
}
