use crate::ast::{Ast, BinOp, ExprId, ExprKind, Stmt, Type};
use crate::checker;
use crate::machine::{
    GLOBAL_PREFIX, GLOBAL_SUFFIX, NUM_PARAM_REGS, PARAM_ALIGNMENT, SIZEOF_REG, STACK_ALIGNMENT,
};
use crate::symbol_table::SymbolId;
use std::fmt;

/// The general-purpose registers the generator allocates from, in
/// allocation order. The callee-saved registers (rbx, r12-r15) are left
/// untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg {
    Rax,
    Rdi,
    Rsi,
    Rdx,
    Rcx,
    R8,
    R9,
    R10,
    R11,
}

pub const REGISTERS: [Reg; 9] = [
    Reg::Rax,
    Reg::Rdi,
    Reg::Rsi,
    Reg::Rdx,
    Reg::Rcx,
    Reg::R8,
    Reg::R9,
    Reg::R10,
    Reg::R11,
];

/// Integer argument registers in System V order.
pub const PARAMETERS: [Reg; NUM_PARAM_REGS] = [
    Reg::Rdi,
    Reg::Rsi,
    Reg::Rdx,
    Reg::Rcx,
    Reg::R8,
    Reg::R9,
];

impl Reg {
    /// The operand spelling for the given access size.
    pub fn name(self, size: i32) -> &'static str {
        match self {
            Reg::Rax => pick(size, "%al", "%eax", "%rax"),
            Reg::Rdi => pick(size, "%dil", "%edi", "%rdi"),
            Reg::Rsi => pick(size, "%sil", "%esi", "%rsi"),
            Reg::Rdx => pick(size, "%dl", "%edx", "%rdx"),
            Reg::Rcx => pick(size, "%cl", "%ecx", "%rcx"),
            Reg::R8 => pick(size, "%r8b", "%r8d", "%r8"),
            Reg::R9 => pick(size, "%r9b", "%r9d", "%r9"),
            Reg::R10 => pick(size, "%r10b", "%r10d", "%r10"),
            Reg::R11 => pick(size, "%r11b", "%r11d", "%r11"),
        }
    }

    pub fn byte(self) -> &'static str {
        self.name(1)
    }

    fn index(self) -> usize {
        match self {
            Reg::Rax => 0,
            Reg::Rdi => 1,
            Reg::Rsi => 2,
            Reg::Rdx => 3,
            Reg::Rcx => 4,
            Reg::R8 => 5,
            Reg::R9 => 6,
            Reg::R10 => 7,
            Reg::R11 => 8,
        }
    }
}

fn pick(size: i32, byte: &'static str, dword: &'static str, qword: &'static str) -> &'static str {
    match size {
        1 => byte,
        4 => dword,
        _ => qword,
    }
}

/// A local assembler label, numbered per translation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, ".L{}", self.0)
    }
}

/// Opcode suffix for an operand size.
fn suffix(size: i32) -> &'static str {
    match size {
        1 => "b",
        4 => "l",
        _ => "q",
    }
}

/// Bytes needed to round `offset` out to the stack alignment.
fn align(offset: i32) -> i32 {
    if offset % STACK_ALIGNMENT == 0 {
        0
    } else {
        STACK_ALIGNMENT - (offset.abs() % STACK_ALIGNMENT)
    }
}

fn size_of(ast: &Ast, e: ExprId) -> i32 {
    ast.expr(e).ty.size()
}

/// Escape a decoded literal for `.asciz`: printable ASCII passes through,
/// everything else becomes an octal escape.
pub fn escape_string(text: &str) -> String {
    let mut out = String::new();
    for &b in text.as_bytes() {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\{:03o}", b)),
        }
    }
    out
}

/// Emits x86-64 System V assembly (AT&T syntax) for a checked translation
/// unit.
///
/// The register file and every expression's register and spill slot are
/// tracked here in side tables keyed by register index and [`ExprId`];
/// `assign` is the only place either side of the register<->node binding is
/// written, which keeps the two views inverse of each other.
pub struct CodeGenerator {
    output: String,
    label_counter: usize,
    /// reg -> expression currently held.
    reg_node: [Option<ExprId>; REGISTERS.len()],
    /// expression -> register currently holding it.
    expr_reg: Vec<Option<Reg>>,
    /// expression -> spill slot; 0 means never spilled.
    expr_offset: Vec<i32>,
    /// Lowest frame address in use by the current function.
    offset: i32,
    funcname: String,
    /// `break` targets, innermost last.
    exit_labels: Vec<Label>,
    /// String-literal pool, in order of first appearance.
    strings: Vec<(String, Label)>,
}

impl CodeGenerator {
    pub fn new() -> Self {
        CodeGenerator {
            output: String::new(),
            label_counter: 0,
            reg_node: [None; REGISTERS.len()],
            expr_reg: Vec::new(),
            expr_offset: Vec::new(),
            offset: 0,
            funcname: String::new(),
            exit_labels: Vec::new(),
            strings: Vec::new(),
        }
    }

    pub fn generate(&mut self, ast: &mut Ast) -> String {
        self.output.clear();
        self.label_counter = 0;
        self.reg_node = [None; REGISTERS.len()];
        self.expr_reg = vec![None; ast.exprs.len()];
        self.expr_offset = vec![0; ast.exprs.len()];
        self.exit_labels.clear();
        self.strings.clear();

        for f in 0..ast.functions.len() {
            if ast.functions[f].body.is_some() {
                self.generate_function(ast, f);
            }
        }
        self.generate_globals(ast);

        self.output.clone()
    }

    fn emit(&mut self, line: &str) {
        self.output.push_str(line);
        self.output.push('\n');
    }

    fn next_label(&mut self) -> Label {
        let label = Label(self.label_counter);
        self.label_counter += 1;
        label
    }

    // ----- register allocation ------------------------------------------

    /// Re-point the node<->register binding, breaking any prior binding on
    /// either side first. Either argument may be None.
    fn assign(&mut self, expr: Option<ExprId>, reg: Option<Reg>) {
        if let Some(e) = expr {
            if let Some(old) = self.expr_reg[e.index()] {
                self.reg_node[old.index()] = None;
            }
            self.expr_reg[e.index()] = reg;
        }
        if let Some(r) = reg {
            if let Some(old) = self.reg_node[r.index()] {
                self.expr_reg[old.index()] = None;
            }
            self.reg_node[r.index()] = expr;
        }
    }

    /// Make sure `expr` ends up in `reg`, spilling the current occupant to
    /// a fresh stack slot if there is one. `load(None, reg)` just evicts.
    fn load(&mut self, ast: &Ast, expr: Option<ExprId>, reg: Reg) {
        if self.reg_node[reg.index()] != expr {
            if let Some(occupant) = self.reg_node[reg.index()] {
                let size = size_of(ast, occupant);
                self.offset -= size;
                let rem = self.offset.rem_euclid(size);
                self.offset -= rem;
                self.expr_offset[occupant.index()] = self.offset;
                self.emit(&format!(
                    "    mov{} {}, {}(%rbp)",
                    suffix(size),
                    reg.name(size),
                    self.offset
                ));
            }
            if let Some(e) = expr {
                let size = size_of(ast, e);
                let src = self.operand(ast, e);
                self.emit(&format!(
                    "    mov{} {}, {}",
                    suffix(size),
                    src,
                    reg.name(size)
                ));
            }
            self.assign(expr, Some(reg));
        }
    }

    /// First free register in allocation order; spills the head of the
    /// table when every register is occupied.
    fn getreg(&mut self, ast: &Ast) -> Reg {
        for reg in REGISTERS {
            if self.reg_node[reg.index()].is_none() {
                return reg;
            }
        }
        self.load(ast, None, REGISTERS[0]);
        REGISTERS[0]
    }

    // ----- operands -----------------------------------------------------

    /// Spell an expression as an instruction operand: its register if it
    /// has one, otherwise an immediate, a symbol, a string label, or its
    /// spill slot.
    fn operand(&mut self, ast: &Ast, e: ExprId) -> String {
        if let Some(reg) = self.expr_reg[e.index()] {
            return reg.name(size_of(ast, e)).to_string();
        }
        match &ast.expr(e).kind {
            ExprKind::Number(n) => format!("${}", n),
            ExprKind::Identifier { symbol, .. } => {
                let sym = &ast.symbols[symbol.expect("unresolved identifier").index()];
                if sym.is_global() {
                    format!("{}{}{}", GLOBAL_PREFIX, sym.name, GLOBAL_SUFFIX)
                } else {
                    format!("{}(%rbp)", sym.offset)
                }
            }
            ExprKind::String(text) => {
                let label = self.intern_string(text);
                label.to_string()
            }
            _ => {
                let offset = self.expr_offset[e.index()];
                assert!(
                    offset != 0,
                    "expression has neither a register nor a stack slot"
                );
                format!("{}(%rbp)", offset)
            }
        }
    }

    fn intern_string(&mut self, text: &str) -> Label {
        if let Some((_, label)) = self.strings.iter().find(|(s, _)| s == text) {
            return *label;
        }
        let label = self.next_label();
        self.strings.push((text.to_string(), label));
        label
    }

    // ----- functions and globals ----------------------------------------

    fn generate_function(&mut self, ast: &mut Ast, f: usize) {
        // Assign offsets to the parameters and local variables.
        let param_offset = 2 * SIZEOF_REG;
        self.offset = param_offset;
        checker::allocate(ast, f, &mut self.offset);

        let ast: &Ast = ast;
        let func = &ast.functions[f];
        let name = func.name.clone();
        self.funcname = name.clone();

        // The frame size is not known until the body has been generated,
        // so the prologue subtracts an assembler symbol fixed up below.
        self.emit(&format!("{}{}:", GLOBAL_PREFIX, name));
        self.emit("    pushq %rbp");
        self.emit("    movq %rsp, %rbp");
        self.emit(&format!("    movl ${}.size, %eax", name));
        self.emit("    subq %rax, %rsp");

        // Spill the register parameters into their stack slots.
        for (i, id) in func.param_symbols.iter().take(NUM_PARAM_REGS).enumerate() {
            let sym = &ast.symbols[id.index()];
            let size = sym.ty.size();
            self.emit(&format!(
                "    mov{} {}, {}(%rbp)",
                suffix(size),
                PARAMETERS[i].name(size),
                sym.offset
            ));
        }

        self.generate_stmt(ast, func.body.as_ref().unwrap());

        self.emit("");
        self.emit(&format!("{}{}.exit:", GLOBAL_PREFIX, name));
        self.emit("    movq %rbp, %rsp");
        self.emit("    popq %rbp");
        self.emit("    ret");
        self.emit("");

        self.offset -= align(self.offset - param_offset);
        self.emit(&format!("    .set {}.size, {}", name, -self.offset));
        self.emit(&format!("    .globl {}{}", GLOBAL_PREFIX, name));
        self.emit("");
    }

    fn generate_globals(&mut self, ast: &Ast) {
        for id in &ast.globals {
            let sym = &ast.symbols[id.index()];
            if !sym.ty.is_function() {
                self.emit(&format!(
                    "    .comm {}{}, {}",
                    GLOBAL_PREFIX,
                    sym.name,
                    sym.ty.size()
                ));
            }
        }
        self.emit("    .data");
        for i in 0..self.strings.len() {
            let (text, label) = self.strings[i].clone();
            self.emit(&format!("{}: .asciz \"{}\"", label, escape_string(&text)));
        }
    }

    // ----- statements ---------------------------------------------------

    fn generate_stmt(&mut self, ast: &Ast, stmt: &Stmt) {
        match stmt {
            Stmt::Block(stmts) => {
                for s in stmts {
                    self.generate_stmt(ast, s);

                    // Expression emission must leave nothing behind.
                    for reg in REGISTERS {
                        assert!(
                            self.reg_node[reg.index()].is_none(),
                            "{} still holds a value at a statement boundary",
                            reg.name(SIZEOF_REG)
                        );
                    }
                }
            }
            Stmt::Declaration(_) => {}
            Stmt::Simple(e) => {
                self.generate_expr(ast, *e);
                self.assign(Some(*e), None);
            }
            Stmt::Assignment { left, right, .. } => {
                self.generate_assignment(ast, *left, *right);
            }
            Stmt::If {
                cond,
                then_stmt,
                else_stmt,
            } => {
                let skip = self.next_label();
                let exit = self.next_label();
                self.test(ast, *cond, skip, false);
                self.generate_stmt(ast, then_stmt);
                self.emit(&format!("    jmp {}", exit));
                self.emit(&format!("{}:", skip));
                if let Some(else_stmt) = else_stmt {
                    self.generate_stmt(ast, else_stmt);
                }
                self.emit(&format!("{}:", exit));
            }
            Stmt::While { cond, body } => {
                let top = self.next_label();
                let exit = self.next_label();
                self.exit_labels.push(exit);
                self.emit(&format!("{}:", top));
                self.test(ast, *cond, exit, false);
                self.generate_stmt(ast, body);
                self.emit(&format!("    jmp {}", top));
                self.emit(&format!("{}:", exit));
                self.exit_labels.pop();
            }
            Stmt::For {
                init,
                cond,
                incr,
                body,
            } => {
                let top = self.next_label();
                let exit = self.next_label();
                self.exit_labels.push(exit);
                self.generate_stmt(ast, init);
                self.emit(&format!("{}:", top));
                self.test(ast, *cond, exit, false);
                self.generate_stmt(ast, body);
                self.generate_stmt(ast, incr);
                self.emit(&format!("    jmp {}", top));
                self.emit(&format!("{}:", exit));
                self.exit_labels.pop();
            }
            Stmt::Break(_) => {
                let exit = *self.exit_labels.last().expect("break outside of a loop");
                self.emit(&format!("    jmp {}", exit));
            }
            Stmt::Return { expr, .. } => {
                if let Some(e) = expr {
                    self.generate_expr(ast, *e);
                    self.load(ast, Some(*e), Reg::Rax);
                }
                let line = format!("    jmp {}.exit", self.funcname);
                self.emit(&line);
                if let Some(e) = expr {
                    self.assign(Some(*e), None);
                }
            }
        }
    }

    fn generate_assignment(&mut self, ast: &Ast, left: ExprId, right: ExprId) {
        self.generate_expr(ast, right);

        if let ExprKind::Dereference(pointer) = ast.expr(left).kind {
            self.generate_expr(ast, pointer);

            if self.expr_reg[pointer.index()].is_none() {
                let reg = self.getreg(ast);
                self.load(ast, Some(pointer), reg);
            }
            if self.expr_reg[right.index()].is_none() {
                let reg = self.getreg(ast);
                self.load(ast, Some(right), reg);
            }

            let src = self.operand(ast, right);
            let ptr = self.operand(ast, pointer);
            self.emit(&format!(
                "    mov{} {}, ({})",
                suffix(size_of(ast, right)),
                src,
                ptr
            ));

            self.assign(Some(right), None);
            self.assign(Some(pointer), None);
        } else {
            if self.expr_reg[right.index()].is_none() {
                let reg = self.getreg(ast);
                self.load(ast, Some(right), reg);
            }

            let src = self.operand(ast, right);
            let dst = self.operand(ast, left);
            self.emit(&format!(
                "    mov{} {}, {}",
                suffix(size_of(ast, right)),
                src,
                dst
            ));

            self.assign(Some(right), None);
            self.assign(Some(left), None);
        }
    }

    // ----- expressions --------------------------------------------------

    /// After this returns, the node's value is in a register or at its
    /// spill slot. Leaves (numbers, identifiers, strings) stay unmaterialized
    /// until a consumer spells them as operands or loads them.
    fn generate_expr(&mut self, ast: &Ast, e: ExprId) {
        match &ast.expr(e).kind {
            ExprKind::Number(_) | ExprKind::String(_) | ExprKind::Identifier { .. } => {}
            ExprKind::Binary { op, left, right } => {
                let (op, left, right) = (*op, *left, *right);
                match op {
                    BinOp::Add => self.generate_arith(ast, e, left, right, "add"),
                    BinOp::Subtract => self.generate_arith(ast, e, left, right, "sub"),
                    BinOp::Multiply => self.generate_arith(ast, e, left, right, "imul"),
                    BinOp::Divide => self.generate_divide(ast, e, left, right, Reg::Rax),
                    BinOp::Remainder => self.generate_divide(ast, e, left, right, Reg::Rdx),
                    BinOp::Less => self.generate_compare(ast, e, left, right, "setl"),
                    BinOp::Greater => self.generate_compare(ast, e, left, right, "setg"),
                    BinOp::LessEqual => self.generate_compare(ast, e, left, right, "setle"),
                    BinOp::GreaterEqual => self.generate_compare(ast, e, left, right, "setge"),
                    BinOp::Equal => self.generate_compare(ast, e, left, right, "sete"),
                    BinOp::NotEqual => self.generate_compare(ast, e, left, right, "setne"),
                    BinOp::LogicalAnd => self.generate_logical_and(ast, e, left, right),
                    BinOp::LogicalOr => self.generate_logical_or(ast, e, left, right),
                }
            }
            ExprKind::Not(x) => self.generate_not(ast, e, *x),
            ExprKind::Negate(x) => self.generate_negate(ast, e, *x),
            ExprKind::Address(x) => self.generate_address(ast, e, *x),
            ExprKind::Dereference(x) => self.generate_dereference(ast, e, *x),
            ExprKind::Cast(x) => self.generate_cast(ast, e, *x),
            ExprKind::Call { symbol, args, .. } => {
                let callee = symbol.expect("unresolved callee");
                let args = args.clone();
                self.generate_call(ast, e, callee, &args);
            }
        }
    }

    fn generate_arith(&mut self, ast: &Ast, e: ExprId, left: ExprId, right: ExprId, op: &str) {
        self.generate_expr(ast, left);
        self.generate_expr(ast, right);

        if self.expr_reg[left.index()].is_none() {
            let reg = self.getreg(ast);
            self.load(ast, Some(left), reg);
        }

        let src = self.operand(ast, right);
        let dst = self.operand(ast, left);
        self.emit(&format!(
            "    {}{} {}, {}",
            op,
            suffix(size_of(ast, left)),
            src,
            dst
        ));

        self.assign(Some(right), None);
        let result = self.expr_reg[left.index()];
        self.assign(Some(e), result);
    }

    /// idiv leaves the quotient in rax and the remainder in rdx; `result`
    /// picks which one this node is.
    fn generate_divide(&mut self, ast: &Ast, e: ExprId, left: ExprId, right: ExprId, result: Reg) {
        self.generate_expr(ast, left);
        self.generate_expr(ast, right);

        self.load(ast, Some(left), Reg::Rax);
        self.load(ast, None, Reg::Rdx);
        self.load(ast, Some(right), Reg::Rcx);

        if size_of(ast, left) == 8 {
            self.emit("    cqto");
        } else {
            self.emit("    cltd");
        }

        let divisor = self.operand(ast, right);
        self.emit(&format!(
            "    idiv{} {}",
            suffix(size_of(ast, right)),
            divisor
        ));

        self.assign(Some(right), None);
        self.assign(Some(left), None);
        self.assign(Some(e), Some(result));
    }

    fn generate_compare(&mut self, ast: &Ast, e: ExprId, left: ExprId, right: ExprId, set: &str) {
        self.generate_expr(ast, left);
        self.generate_expr(ast, right);

        if self.expr_reg[left.index()].is_none() {
            let reg = self.getreg(ast);
            self.load(ast, Some(left), reg);
        }

        let src = self.operand(ast, right);
        let dst = self.operand(ast, left);
        self.emit(&format!(
            "    cmp{} {}, {}",
            suffix(size_of(ast, left)),
            src,
            dst
        ));

        self.assign(Some(right), None);
        self.assign(Some(left), None);
        let reg = self.getreg(ast);
        self.assign(Some(e), Some(reg));

        self.emit(&format!("    {} {}", set, reg.byte()));
        self.emit(&format!(
            "    movzb{} {}, {}",
            suffix(size_of(ast, e)),
            reg.byte(),
            reg.name(size_of(ast, e))
        ));
    }

    fn generate_not(&mut self, ast: &Ast, e: ExprId, x: ExprId) {
        self.generate_expr(ast, x);
        if self.expr_reg[x.index()].is_none() {
            let reg = self.getreg(ast);
            self.load(ast, Some(x), reg);
        }

        let src = self.operand(ast, x);
        self.emit(&format!("    cmp{} $0, {}", suffix(size_of(ast, x)), src));

        let reg = self.getreg(ast);
        self.assign(Some(e), Some(reg));
        self.emit(&format!("    sete {}", reg.byte()));
        self.emit(&format!("    movzbl {}, {}", reg.byte(), reg.name(4)));
        self.assign(Some(x), None);
    }

    fn generate_negate(&mut self, ast: &Ast, e: ExprId, x: ExprId) {
        self.generate_expr(ast, x);
        if self.expr_reg[x.index()].is_none() {
            let reg = self.getreg(ast);
            self.load(ast, Some(x), reg);
        }

        let target = self.operand(ast, x);
        self.emit(&format!("    neg{} {}", suffix(size_of(ast, x)), target));

        let result = self.expr_reg[x.index()];
        self.assign(Some(e), result);
        self.assign(Some(x), None);
    }

    /// Branch to `label` depending on whether the expression is nonzero.
    /// Used by the control-flow statements and the short-circuit operators,
    /// so the right-hand side of `&&`/`||` only executes when control falls
    /// through the first test.
    fn test(&mut self, ast: &Ast, e: ExprId, label: Label, if_true: bool) {
        self.generate_expr(ast, e);

        if self.expr_reg[e.index()].is_none() {
            let reg = self.getreg(ast);
            self.load(ast, Some(e), reg);
        }

        let target = self.operand(ast, e);
        self.emit(&format!("    cmp{} $0, {}", suffix(size_of(ast, e)), target));
        self.emit(&format!(
            "    {} {}",
            if if_true { "jne" } else { "je" },
            label
        ));

        self.assign(Some(e), None);
    }

    fn generate_logical_and(&mut self, ast: &Ast, e: ExprId, left: ExprId, right: ExprId) {
        let fail = self.next_label();
        let done = self.next_label();

        self.test(ast, left, fail, false);
        self.test(ast, right, fail, false);

        if self.expr_reg[e.index()].is_none() {
            let reg = self.getreg(ast);
            self.assign(Some(e), Some(reg));
        }
        let result = self.operand(ast, e);

        self.emit(&format!("    movl $1, {}", result));
        self.emit(&format!("    jmp {}", done));
        self.emit(&format!("{}:", fail));
        self.emit(&format!("    movl $0, {}", result));
        self.emit(&format!("{}:", done));
    }

    fn generate_logical_or(&mut self, ast: &Ast, e: ExprId, left: ExprId, right: ExprId) {
        let success = self.next_label();
        let done = self.next_label();

        self.test(ast, left, success, true);
        self.test(ast, right, success, true);

        if self.expr_reg[e.index()].is_none() {
            let reg = self.getreg(ast);
            self.assign(Some(e), Some(reg));
        }
        let result = self.operand(ast, e);

        self.emit(&format!("    movl $0, {}", result));
        self.emit(&format!("    jmp {}", done));
        self.emit(&format!("{}:", success));
        self.emit(&format!("    movl $1, {}", result));
        self.emit(&format!("{}:", done));
    }

    fn generate_address(&mut self, ast: &Ast, e: ExprId, x: ExprId) {
        // &*p collapses: the operand's pointer is the result.
        if let ExprKind::Dereference(pointer) = ast.expr(x).kind {
            self.generate_expr(ast, pointer);
            if self.expr_reg[pointer.index()].is_none() {
                let reg = self.getreg(ast);
                self.load(ast, Some(pointer), reg);
            }
            let result = self.expr_reg[pointer.index()];
            self.assign(Some(e), result);
        } else {
            let reg = self.getreg(ast);
            self.assign(Some(e), Some(reg));
            let src = self.operand(ast, x);
            let dst = self.operand(ast, e);
            self.emit(&format!("    leaq {}, {}", src, dst));
        }
    }

    fn generate_dereference(&mut self, ast: &Ast, e: ExprId, x: ExprId) {
        self.generate_expr(ast, x);
        if self.expr_reg[x.index()].is_none() {
            let reg = self.getreg(ast);
            self.load(ast, Some(x), reg);
        }

        // Reuse the pointer's register for the loaded value.
        let reg = self.expr_reg[x.index()].unwrap();
        let size = size_of(ast, e);
        self.emit(&format!(
            "    mov{} ({}), {}",
            suffix(size),
            reg.name(SIZEOF_REG),
            reg.name(size)
        ));
        self.assign(Some(e), Some(reg));
    }

    /// Widening casts sign-extend in place; narrowing and same-size casts
    /// emit nothing, since consumers pick their suffix from the result
    /// type.
    fn generate_cast(&mut self, ast: &Ast, e: ExprId, x: ExprId) {
        self.generate_expr(ast, x);
        if self.expr_reg[x.index()].is_none() {
            let reg = self.getreg(ast);
            self.load(ast, Some(x), reg);
        }

        let source = size_of(ast, x);
        let target = size_of(ast, e);
        if source < target {
            let op = match (source, target) {
                (1, 4) => "movsbl",
                (1, 8) => "movsbq",
                _ => "movslq",
            };
            let reg = self.expr_reg[x.index()].unwrap();
            let src = self.operand(ast, x);
            self.emit(&format!("    {} {}, {}", op, src, reg.name(target)));
        }

        let result = self.expr_reg[x.index()];
        self.assign(Some(e), result);
    }

    // ----- calls --------------------------------------------------------

    fn generate_call(&mut self, ast: &Ast, e: ExprId, callee: SymbolId, args: &[ExprId]) {
        let mut num_bytes: i32 = 0;

        // Generate code for the arguments first, right to left, so earlier
        // arguments can still be sitting in registers when later ones are
        // placed.
        for &arg in args.iter().rev() {
            self.generate_expr(ast, arg);
        }

        // Pre-adjust the stack so it is 16-byte aligned at the call
        // instruction once the memory arguments are pushed.
        if args.len() > NUM_PARAM_REGS {
            num_bytes = align((args.len() - NUM_PARAM_REGS) as i32 * PARAM_ALIGNMENT);
            if num_bytes > 0 {
                self.emit(&format!("    subq ${}, %rsp", num_bytes));
            }
        }

        // Move the arguments into their registers or memory slots.
        for i in (0..args.len()).rev() {
            let arg = args[i];
            if i >= NUM_PARAM_REGS {
                num_bytes += PARAM_ALIGNMENT;
                self.load(ast, Some(arg), Reg::Rax);
                self.sign_extend_byte_arg(ast, arg);
                self.emit("    pushq %rax");
            } else {
                self.load(ast, Some(arg), PARAMETERS[i]);
                self.sign_extend_byte_arg(ast, arg);
            }
            self.assign(Some(arg), None);
        }

        // Spill anything still live across the call.
        for reg in REGISTERS {
            self.load(ast, None, reg);
        }

        // A variadic callee expects the number of vector arguments in al.
        let sym = &ast.symbols[callee.index()];
        if let Type::Function { variadic: true, .. } = sym.ty {
            self.emit("    movl $0, %eax");
        }

        self.emit(&format!("    call {}{}", GLOBAL_PREFIX, sym.name));

        if num_bytes > 0 {
            self.emit(&format!("    addq ${}, %rsp", num_bytes));
        }

        self.assign(Some(e), Some(Reg::Rax));
    }

    /// Writing a byte register leaves the rest of the 64-bit register
    /// alone; gcc and clang pass byte arguments sign-extended to 32 bits
    /// and some callees rely on it, so extend explicitly.
    fn sign_extend_byte_arg(&mut self, ast: &Ast, arg: ExprId) {
        if size_of(ast, arg) == 1 {
            let reg = self.expr_reg[arg.index()].expect("byte argument not in a register");
            let src = self.operand(ast, arg);
            self.emit(&format!("    movsbl {}, {}", src, reg.name(4)));
        }
    }
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::new()
    }
}
