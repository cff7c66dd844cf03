use crate::ast::*;
use crate::error::CompileError;
use crate::machine::{NUM_PARAM_REGS, SIZEOF_REG};
use crate::symbol_table::{Symbol, SymbolId, SymbolTable};

/// Resolve names, compute types, and insert the conversions the code
/// generator expects to find already in the tree: integer promotions,
/// pointer-arithmetic scaling, and array-to-pointer decay of string
/// literals.
pub fn check(ast: &mut Ast) -> Result<(), Vec<CompileError>> {
    let mut checker = Checker {
        ast,
        table: SymbolTable::new(),
        errors: Vec::new(),
        loop_depth: 0,
        return_ty: Type::Int,
        locals: Vec::new(),
    };
    checker.check_program();
    if checker.errors.is_empty() {
        Ok(())
    } else {
        Err(checker.errors)
    }
}

/// Assign stack offsets to the parameters and locals of `func`. On entry
/// `offset` is the base of the incoming stack-argument area; on return it
/// is the lowest frame address in use (0 when the frame is empty).
/// Parameters past the register set stay above the frame; everything else
/// gets a negative slot, aligned to its own size.
pub fn allocate(ast: &mut Ast, func: usize, offset: &mut i32) {
    let param_offset = *offset;
    let params = ast.functions[func].param_symbols.clone();
    let locals = ast.functions[func].locals.clone();

    *offset = 0;
    for (i, id) in params.iter().enumerate() {
        if i < NUM_PARAM_REGS {
            push_slot(ast, *id, offset);
        } else {
            ast.symbols[id.index()].offset =
                param_offset + SIZEOF_REG * (i - NUM_PARAM_REGS) as i32;
        }
    }
    for id in &locals {
        push_slot(ast, *id, offset);
    }
}

fn push_slot(ast: &mut Ast, id: SymbolId, offset: &mut i32) {
    let size = ast.symbols[id.index()].ty.size();
    *offset -= size;
    let rem = (*offset).rem_euclid(size);
    *offset -= rem;
    ast.symbols[id.index()].offset = *offset;
}

struct Checker<'a> {
    ast: &'a mut Ast,
    table: SymbolTable,
    errors: Vec<CompileError>,
    loop_depth: usize,
    return_ty: Type,
    locals: Vec<SymbolId>,
}

impl<'a> Checker<'a> {
    fn check_program(&mut self) {
        let declarations = self.ast.declarations.clone();
        for decl in &declarations {
            let id = self.new_symbol(&decl.name, decl.ty.clone());
            if !self.table.declare(&decl.name, id) {
                self.error(decl.location.line, format!("'{}' redeclared", decl.name));
            } else {
                self.ast.globals.push(id);
            }
        }

        // Declare every function up front so calls can resolve forward.
        let mut defined = std::collections::HashSet::new();
        for f in 0..self.ast.functions.len() {
            let func = &self.ast.functions[f];
            let name = func.name.clone();
            let line = func.location.line;
            let has_body = func.body.is_some();
            let ty = Type::Function {
                ret: Box::new(func.ret.clone()),
                params: Some(func.params.iter().map(|p| p.ty.clone()).collect()),
                variadic: func.variadic,
            };
            if has_body && !defined.insert(name.clone()) {
                self.error(line, format!("'{}' redefined", name));
            }
            let id = match self.table.lookup(&name) {
                Some(existing) if self.ast.symbols[existing.index()].ty == ty => existing,
                Some(_) => {
                    self.error(line, format!("conflicting declaration of '{}'", name));
                    continue;
                }
                None => {
                    let id = self.new_symbol(&name, ty);
                    self.table.declare(&name, id);
                    self.ast.globals.push(id);
                    id
                }
            };
            self.ast.functions[f].id = Some(id);
        }

        for f in 0..self.ast.functions.len() {
            if self.ast.functions[f].body.is_some() {
                self.check_function(f);
            }
        }
    }

    fn check_function(&mut self, f: usize) {
        let params = self.ast.functions[f].params.clone();
        self.return_ty = self.ast.functions[f].ret.clone();
        self.loop_depth = 0;
        self.locals = Vec::new();

        self.table.enter_scope();
        let mut param_symbols = Vec::new();
        for param in &params {
            let id = self.new_symbol(&param.name, param.ty.clone());
            if !self.table.declare(&param.name, id) {
                self.error(
                    param.location.line,
                    format!("parameter '{}' redeclared", param.name),
                );
            }
            param_symbols.push(id);
        }

        let mut body = self.ast.functions[f].body.take();
        if let Some(stmt) = &mut body {
            self.check_stmt(stmt);
        }
        self.table.exit_scope();

        let func = &mut self.ast.functions[f];
        func.body = body;
        func.param_symbols = param_symbols;
        func.locals = std::mem::take(&mut self.locals);
    }

    fn check_stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Simple(e) => {
                *e = self.check_value(*e).0;
            }
            Stmt::Assignment {
                left,
                right,
                location,
            } => {
                let line = location.line;
                if !matches!(
                    self.ast.expr(*left).kind,
                    ExprKind::Identifier { .. } | ExprKind::Dereference(_)
                ) {
                    self.error(line, "lvalue required on left of assignment".to_string());
                }
                let left_ty = self.check_expr(*left);
                let (r, right_ty) = self.check_value(*right);
                *right = r;
                if left_ty != right_ty {
                    if left_ty.is_integer() && right_ty.is_integer() {
                        *right = self.cast_to(*right, left_ty);
                    } else {
                        self.error(line, "incompatible types in assignment".to_string());
                    }
                }
            }
            Stmt::Declaration(decls) => {
                for decl in decls {
                    let id = self.new_symbol(&decl.name, decl.ty.clone());
                    if !self.table.declare(&decl.name, id) {
                        self.error(
                            decl.location.line,
                            format!("'{}' redeclared", decl.name),
                        );
                    }
                    self.locals.push(id);
                }
            }
            Stmt::Block(stmts) => {
                self.table.enter_scope();
                for s in stmts {
                    self.check_stmt(s);
                }
                self.table.exit_scope();
            }
            Stmt::If {
                cond,
                then_stmt,
                else_stmt,
            } => {
                *cond = self.check_condition(*cond);
                self.check_stmt(then_stmt);
                if let Some(e) = else_stmt {
                    self.check_stmt(e);
                }
            }
            Stmt::While { cond, body } => {
                *cond = self.check_condition(*cond);
                self.loop_depth += 1;
                self.check_stmt(body);
                self.loop_depth -= 1;
            }
            Stmt::For {
                init,
                cond,
                incr,
                body,
            } => {
                self.check_stmt(init);
                *cond = self.check_condition(*cond);
                self.check_stmt(incr);
                self.loop_depth += 1;
                self.check_stmt(body);
                self.loop_depth -= 1;
            }
            Stmt::Break(location) => {
                if self.loop_depth == 0 {
                    self.error(
                        location.line,
                        "break statement not within a loop".to_string(),
                    );
                }
            }
            Stmt::Return { expr, location } => {
                if let Some(e) = expr {
                    let (r, ty) = self.check_value(*e);
                    *e = r;
                    let ret = self.return_ty.clone();
                    if ty != ret {
                        if ty.is_integer() && ret.is_integer() {
                            *e = self.cast_to(r, ret);
                        } else {
                            self.error(
                                location.line,
                                "incompatible return type".to_string(),
                            );
                        }
                    }
                }
            }
        }
    }

    fn check_condition(&mut self, e: ExprId) -> ExprId {
        let (e, ty) = self.check_value(e);
        if !is_scalar(&ty) {
            let line = self.ast.expr(e).location.line;
            self.error(line, "scalar expression required".to_string());
        }
        e
    }

    /// Check `e` as a value. String literals decay here: the generator only
    /// knows how to take their address.
    fn check_value(&mut self, e: ExprId) -> (ExprId, Type) {
        let ty = self.check_expr(e);
        if matches!(self.ast.expr(e).kind, ExprKind::String(_)) {
            let location = self.ast.expr(e).location;
            let ptr = Type::Pointer(Box::new(Type::Char));
            let decayed = self.ast.add_expr(Expr {
                kind: ExprKind::Address(e),
                ty: ptr.clone(),
                location,
            });
            return (decayed, ptr);
        }
        (e, ty)
    }

    fn check_expr(&mut self, e: ExprId) -> Type {
        let kind = self.ast.expr(e).kind.clone();
        let line = self.ast.expr(e).location.line;
        let ty = match kind {
            ExprKind::Number(_) | ExprKind::String(_) => self.ast.expr(e).ty.clone(),
            ExprKind::Identifier { name, .. } => {
                let ty = match self.table.lookup(&name) {
                    Some(id) => {
                        let sym_ty = self.ast.symbols[id.index()].ty.clone();
                        if sym_ty.is_function() {
                            self.error(line, format!("function '{}' used as a value", name));
                        }
                        self.ast.expr_mut(e).kind = ExprKind::Identifier {
                            name,
                            symbol: Some(id),
                        };
                        sym_ty
                    }
                    None => {
                        self.error(line, format!("'{}' undeclared", name));
                        Type::Int
                    }
                };
                ty
            }
            ExprKind::Call { name, args, .. } => self.check_call(e, name, args, line),
            ExprKind::Binary { op, left, right } => {
                let ty = self.check_binary(op, left, right, line, e);
                ty
            }
            ExprKind::Not(x) => {
                let (x, ty) = self.check_value(x);
                if !is_scalar(&ty) {
                    self.error(line, "scalar operand required for '!'".to_string());
                }
                self.ast.expr_mut(e).kind = ExprKind::Not(x);
                Type::Int
            }
            ExprKind::Negate(x) => {
                let (x, ty) = self.check_value(x);
                if !ty.is_integer() {
                    self.error(line, "integer operand required for unary '-'".to_string());
                    self.ast.expr_mut(e).kind = ExprKind::Negate(x);
                    Type::Int
                } else {
                    let promoted = promote(&ty);
                    let x = self.cast_to(x, promoted.clone());
                    self.ast.expr_mut(e).kind = ExprKind::Negate(x);
                    promoted
                }
            }
            ExprKind::Address(x) => {
                let ty = self.check_expr(x);
                let is_lvalue = match &self.ast.expr(x).kind {
                    ExprKind::Identifier { .. } => !ty.is_function(),
                    ExprKind::Dereference(_) => true,
                    _ => false,
                };
                if !is_lvalue {
                    self.error(line, "lvalue required for unary '&'".to_string());
                }
                Type::Pointer(Box::new(ty))
            }
            ExprKind::Dereference(x) => {
                let (x, ty) = self.check_value(x);
                self.ast.expr_mut(e).kind = ExprKind::Dereference(x);
                match ty.pointee() {
                    Some(inner) => inner.clone(),
                    None => {
                        self.error(line, "cannot dereference non-pointer type".to_string());
                        Type::Int
                    }
                }
            }
            ExprKind::Cast(x) => {
                let (x, ty) = self.check_value(x);
                let target = self.ast.expr(e).ty.clone();
                if !is_scalar(&ty) || !is_scalar(&target) {
                    self.error(line, "invalid cast".to_string());
                }
                self.ast.expr_mut(e).kind = ExprKind::Cast(x);
                target
            }
        };
        self.ast.expr_mut(e).ty = ty.clone();
        ty
    }

    fn check_call(
        &mut self,
        e: ExprId,
        name: String,
        args: Vec<ExprId>,
        line: usize,
    ) -> Type {
        let symbol = self.table.lookup(&name);
        let (ret, params, variadic) = match symbol {
            Some(id) => match self.ast.symbols[id.index()].ty.clone() {
                Type::Function {
                    ret,
                    params,
                    variadic,
                } => ((*ret).clone(), params, variadic),
                _ => {
                    self.error(line, format!("'{}' is not a function", name));
                    (Type::Int, None, false)
                }
            },
            None => {
                self.error(line, format!("'{}' undeclared", name));
                (Type::Int, None, false)
            }
        };

        let mut checked = Vec::with_capacity(args.len());
        for arg in args {
            checked.push(self.check_value(arg));
        }

        if let Some(params) = &params {
            let ok = if variadic {
                checked.len() >= params.len()
            } else {
                checked.len() == params.len()
            };
            if !ok {
                self.error(line, format!("wrong number of arguments to '{}'", name));
            }
        }

        let mut new_args = Vec::with_capacity(checked.len());
        for (i, (arg, ty)) in checked.into_iter().enumerate() {
            if !is_scalar(&ty) {
                self.error(line, "scalar argument required".to_string());
                new_args.push(arg);
                continue;
            }
            let expected = params.as_ref().and_then(|ps| ps.get(i)).cloned();
            match expected {
                Some(param_ty) if param_ty != ty => {
                    if param_ty.is_integer() && ty.is_integer() {
                        new_args.push(self.cast_to(arg, param_ty));
                    } else {
                        self.error(
                            line,
                            format!("incompatible argument in call to '{}'", name),
                        );
                        new_args.push(arg);
                    }
                }
                Some(_) => new_args.push(arg),
                // Past the declared parameters (or no prototype): default
                // argument promotions.
                None => {
                    if ty == Type::Char {
                        new_args.push(self.cast_to(arg, Type::Int));
                    } else {
                        new_args.push(arg);
                    }
                }
            }
        }

        self.ast.expr_mut(e).kind = ExprKind::Call {
            name,
            symbol,
            args: new_args,
        };
        ret
    }

    fn check_binary(
        &mut self,
        op: BinOp,
        left: ExprId,
        right: ExprId,
        line: usize,
        e: ExprId,
    ) -> Type {
        let (mut left, left_ty) = self.check_value(left);
        let (mut right, right_ty) = self.check_value(right);

        let ty = match op {
            BinOp::Add | BinOp::Subtract => {
                if left_ty.is_pointer() && right_ty.is_integer() {
                    right = self.scale_index(right, &left_ty);
                    left_ty.clone()
                } else if right_ty.is_pointer() && left_ty.is_integer() && op == BinOp::Add {
                    left = self.scale_index(left, &right_ty);
                    right_ty.clone()
                } else if left_ty.is_integer() && right_ty.is_integer() {
                    let common = common_type(&left_ty, &right_ty);
                    left = self.cast_to(left, common.clone());
                    right = self.cast_to(right, common.clone());
                    common
                } else {
                    self.error(line, format!("invalid operands to {}", op_name(op)));
                    Type::Int
                }
            }
            BinOp::Multiply | BinOp::Divide | BinOp::Remainder => {
                if left_ty.is_integer() && right_ty.is_integer() {
                    let common = common_type(&left_ty, &right_ty);
                    left = self.cast_to(left, common.clone());
                    right = self.cast_to(right, common.clone());
                    common
                } else {
                    self.error(line, format!("invalid operands to {}", op_name(op)));
                    Type::Int
                }
            }
            BinOp::Less
            | BinOp::Greater
            | BinOp::LessEqual
            | BinOp::GreaterEqual
            | BinOp::Equal
            | BinOp::NotEqual => {
                if left_ty.is_integer() && right_ty.is_integer() {
                    let common = common_type(&left_ty, &right_ty);
                    left = self.cast_to(left, common.clone());
                    right = self.cast_to(right, common);
                } else if !(left_ty.is_pointer() && left_ty == right_ty) {
                    self.error(line, format!("invalid operands to {}", op_name(op)));
                }
                Type::Int
            }
            BinOp::LogicalAnd | BinOp::LogicalOr => {
                if !is_scalar(&left_ty) || !is_scalar(&right_ty) {
                    self.error(line, format!("invalid operands to {}", op_name(op)));
                }
                Type::Int
            }
        };

        self.ast.expr_mut(e).kind = ExprKind::Binary { op, left, right };
        ty
    }

    /// Pointer arithmetic reaches the generator pre-scaled: widen the index
    /// to 8 bytes and multiply by the element size.
    fn scale_index(&mut self, index: ExprId, pointer_ty: &Type) -> ExprId {
        let index = self.cast_to(index, Type::Long);
        let elem_size = pointer_ty.pointee().map_or(1, Type::size);
        if elem_size == 1 {
            return index;
        }
        let location = self.ast.expr(index).location;
        let size = self.ast.add_expr(Expr {
            kind: ExprKind::Number(elem_size as i64),
            ty: Type::Long,
            location,
        });
        self.ast.add_expr(Expr {
            kind: ExprKind::Binary {
                op: BinOp::Multiply,
                left: index,
                right: size,
            },
            ty: Type::Long,
            location,
        })
    }

    fn cast_to(&mut self, e: ExprId, target: Type) -> ExprId {
        if self.ast.expr(e).ty == target {
            return e;
        }
        let location = self.ast.expr(e).location;
        self.ast.add_expr(Expr {
            kind: ExprKind::Cast(e),
            ty: target,
            location,
        })
    }

    fn new_symbol(&mut self, name: &str, ty: Type) -> SymbolId {
        let id = SymbolId::new(self.ast.symbols.len());
        self.ast.symbols.push(Symbol::new(name.to_string(), ty));
        id
    }

    fn error(&mut self, line: usize, message: String) {
        self.errors.push(CompileError::with_location(
            message,
            crate::lexer::SourceLocation::new(line, 1),
        ));
    }
}

fn is_scalar(ty: &Type) -> bool {
    ty.is_integer() || ty.is_pointer()
}

/// Integer promotion: char widens to int.
fn promote(ty: &Type) -> Type {
    match ty {
        Type::Char => Type::Int,
        other => other.clone(),
    }
}

fn common_type(left: &Type, right: &Type) -> Type {
    let left = promote(left);
    let right = promote(right);
    if left == Type::Long || right == Type::Long {
        Type::Long
    } else {
        Type::Int
    }
}

fn op_name(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "binary '+'",
        BinOp::Subtract => "binary '-'",
        BinOp::Multiply => "binary '*'",
        BinOp::Divide => "binary '/'",
        BinOp::Remainder => "binary '%'",
        BinOp::Less => "binary '<'",
        BinOp::Greater => "binary '>'",
        BinOp::LessEqual => "binary '<='",
        BinOp::GreaterEqual => "binary '>='",
        BinOp::Equal => "binary '=='",
        BinOp::NotEqual => "binary '!='",
        BinOp::LogicalAnd => "binary '&&'",
        BinOp::LogicalOr => "binary '||'",
    }
}
